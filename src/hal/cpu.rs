//! CPU-related operations and utilities.
//!
//! Hosted builds (unit tests) have no interrupt flag to toggle, so the
//! interrupt state is modelled by an atomic and `halt`/`read_cr3` are inert.

#[cfg(target_os = "none")]
mod imp {
    use core::arch::asm;

    /// RFLAGS.IF
    const RFLAGS_IF: u64 = 1 << 9;

    #[inline]
    pub fn disable_irqs() {
        unsafe { asm!("cli", options(nomem, nostack)) };
    }

    #[inline]
    pub fn enable_irqs() {
        unsafe { asm!("sti", options(nomem, nostack)) };
    }

    #[inline]
    pub fn irqs_disabled() -> bool {
        let rflags: u64;
        unsafe { asm!("pushfq; pop {}", out(reg) rflags, options(nomem, preserves_flags)) };
        rflags & RFLAGS_IF == 0
    }

    #[inline]
    pub fn halt() {
        unsafe { asm!("hlt", options(nomem, nostack)) };
    }

    #[inline]
    pub fn read_cr3() -> u64 {
        let cr3: u64;
        unsafe { asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags)) };
        cr3
    }
}

#[cfg(not(target_os = "none"))]
mod imp {
    use core::sync::atomic::{AtomicBool, Ordering};

    static IRQS_ENABLED: AtomicBool = AtomicBool::new(true);

    pub fn disable_irqs() {
        IRQS_ENABLED.store(false, Ordering::SeqCst);
    }

    pub fn enable_irqs() {
        IRQS_ENABLED.store(true, Ordering::SeqCst);
    }

    pub fn irqs_disabled() -> bool {
        !IRQS_ENABLED.load(Ordering::SeqCst)
    }

    pub fn halt() {
        core::hint::spin_loop();
    }

    pub fn read_cr3() -> u64 {
        0
    }
}

/// Masks maskable hardware interrupts.
pub use imp::disable_irqs;
/// Unmasks maskable hardware interrupts.
pub use imp::enable_irqs;
/// Returns `true` if maskable interrupts are currently masked.
pub use imp::irqs_disabled;
/// Halts the CPU until the next interrupt.
pub use imp::halt;
/// Returns the active page-table root.
pub use imp::read_cr3;

/// Runs `f` with interrupts masked, restoring the previous state afterwards.
#[inline]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let enabled_before = !irqs_disabled();
    disable_irqs();
    let ret = f();
    if enabled_before {
        enable_irqs();
    }
    ret
}
