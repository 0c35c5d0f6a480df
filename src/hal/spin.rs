//! Interrupt-masking spin lock.
//!
//! Used for short critical sections that never reach a context switch
//! (console output). Scheduler state uses [`super::IrqCell`] instead.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use lock_api::{GuardSend, RawMutex};

use super::cpu::{disable_irqs, enable_irqs, irqs_disabled};

/// Raw lock that masks interrupts for as long as it is held.
pub struct SpinNoIrq {
    locked: AtomicBool,
    irqs_were_enabled: UnsafeCell<bool>,
}

unsafe impl Sync for SpinNoIrq {}
unsafe impl Send for SpinNoIrq {}

impl SpinNoIrq {
    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

unsafe impl RawMutex for SpinNoIrq {
    type GuardMarker = GuardSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
        irqs_were_enabled: UnsafeCell::new(false),
    };

    fn lock(&self) {
        let enabled = !irqs_disabled();
        disable_irqs();
        while !self.try_acquire() {
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
        unsafe { *self.irqs_were_enabled.get() = enabled };
    }

    fn try_lock(&self) -> bool {
        let enabled = !irqs_disabled();
        disable_irqs();
        if self.try_acquire() {
            unsafe { *self.irqs_were_enabled.get() = enabled };
            return true;
        }
        if enabled {
            enable_irqs();
        }
        false
    }

    unsafe fn unlock(&self) {
        let enabled = unsafe { *self.irqs_were_enabled.get() };
        self.locked.store(false, Ordering::Release);
        if enabled {
            enable_irqs();
        }
    }
}

/// Mutex whose guard keeps interrupts masked.
pub type Mutex<T> = lock_api::Mutex<SpinNoIrq, T>;
