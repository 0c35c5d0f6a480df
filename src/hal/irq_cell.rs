//! Uniprocessor cell guarded only by interrupt masking.

use core::cell::UnsafeCell;

use super::cpu::without_interrupts;

/// Grants exclusive access to `T` by masking interrupts.
///
/// There is no lock word: a context switch may happen inside [`IrqCell::with`]
/// and the next task may enter the cell again before the first closure
/// returns. This is sound only on a single processor where every entry is
/// either the timer interrupt (interrupts already masked) or a foreground
/// call that reaches a switch point through the scheduler itself.
pub struct IrqCell<T> {
    inner: UnsafeCell<T>,
}

// Single logical processor; concurrent access is excluded by masking.
unsafe impl<T: Send> Sync for IrqCell<T> {}

impl<T> IrqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: UnsafeCell::new(value),
        }
    }

    /// Runs `f` on the inner value with interrupts masked.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        without_interrupts(|| f(unsafe { &mut *self.inner.get() }))
    }

    /// Consumes the cell.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}
