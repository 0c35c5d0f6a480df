//! Saved hardware context and the context-swap primitive.
//!
//! All knowledge of the register layout lives in this file. Everything above
//! it treats [`TaskContext`] as an opaque blob handed to [`switch_context`].

use core::fmt;

use bitflags::bitflags;

use crate::config::kernel::{KERNEL_CS, KERNEL_SS};

bitflags! {
    /// RFLAGS bits set in a fresh context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RFlags: u64 {
        /// Always reads as one.
        const RESERVED_1 = 1 << 1;
        const INTERRUPT_ENABLE = 1 << 9;
    }

    /// MXCSR exception mask bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mxcsr: u32 {
        const INVALID_OPERATION_MASK = 1 << 7;
        const DENORMAL_MASK = 1 << 8;
        const DIVIDE_BY_ZERO_MASK = 1 << 9;
        const OVERFLOW_MASK = 1 << 10;
        const UNDERFLOW_MASK = 1 << 11;
        const PRECISION_MASK = 1 << 12;
    }
}

/// Offset of MXCSR inside the FXSAVE image.
const FXSAVE_MXCSR_OFFSET: usize = 24;

/// Every register needed to resume a task.
///
/// The layout is shared with the `switch_context` assembly; offsets are
/// checked at compile time below.
#[repr(C, align(16))]
pub struct TaskContext {
    pub cr3: u64,
    pub rip: u64,
    pub rflags: u64,
    pub reserved1: u64,
    pub cs: u64,
    pub ss: u64,
    pub fs: u64,
    pub gs: u64,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub fxsave_area: [u8; 512],
}

const _: () = {
    use core::mem::offset_of;
    assert!(offset_of!(TaskContext, cr3) == 0x00);
    assert!(offset_of!(TaskContext, cs) == 0x20);
    assert!(offset_of!(TaskContext, rax) == 0x40);
    assert!(offset_of!(TaskContext, rsp) == 0x70);
    assert!(offset_of!(TaskContext, r8) == 0x80);
    assert!(offset_of!(TaskContext, fxsave_area) == 0xc0);
};

impl TaskContext {
    /// An all-zero context. A task whose context is never initialised is
    /// only ever switched away from, which fills it in.
    pub const fn zeroed() -> Self {
        Self {
            cr3: 0,
            rip: 0,
            rflags: 0,
            reserved1: 0,
            cs: 0,
            ss: 0,
            fs: 0,
            gs: 0,
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rdi: 0,
            rsi: 0,
            rsp: 0,
            rbp: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            fxsave_area: [0; 512],
        }
    }

    /// Resets the context so the first switch to it calls
    /// `entry(arg0, arg1)` on the stack ending at `stack_end`.
    pub fn init(&mut self, entry: usize, stack_end: usize, arg0: u64, arg1: u64) {
        *self = Self::zeroed();
        self.cr3 = crate::hal::cpu::read_cr3();
        self.rflags = (RFlags::INTERRUPT_ENABLE | RFlags::RESERVED_1).bits();
        self.cs = KERNEL_CS as u64;
        self.ss = KERNEL_SS as u64;
        // Entered as if called: rsp + 8 is 16-byte aligned.
        self.rsp = ((stack_end & !0xf) - 8) as u64;
        self.rip = entry as u64;
        self.rdi = arg0;
        self.rsi = arg1;

        self.fxsave_area[FXSAVE_MXCSR_OFFSET..FXSAVE_MXCSR_OFFSET + 4]
            .copy_from_slice(&Mxcsr::all().bits().to_le_bytes());
    }

    /// MXCSR value stored in the FXSAVE image.
    pub fn mxcsr(&self) -> Mxcsr {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.fxsave_area[FXSAVE_MXCSR_OFFSET..FXSAVE_MXCSR_OFFSET + 4]);
        Mxcsr::from_bits_retain(u32::from_le_bytes(bytes))
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("cr3", &format_args!("{:#x}", self.cr3))
            .field("rip", &format_args!("{:#x}", self.rip))
            .field("rflags", &format_args!("{:#x}", self.rflags))
            .field("rsp", &format_args!("{:#x}", self.rsp))
            .field("rbp", &format_args!("{:#x}", self.rbp))
            .field("rdi", &format_args!("{:#x}", self.rdi))
            .field("rsi", &format_args!("{:#x}", self.rsi))
            .finish_non_exhaustive()
    }
}

#[cfg(target_os = "none")]
core::arch::global_asm!(
    r#"
.global __switch_context
__switch_context:
    mov [rsi + 0x40], rax
    mov [rsi + 0x48], rbx
    mov [rsi + 0x50], rcx
    mov [rsi + 0x58], rdx
    mov [rsi + 0x60], rdi
    mov [rsi + 0x68], rsi

    lea rax, [rsp + 8]
    mov [rsi + 0x70], rax
    mov [rsi + 0x78], rbp

    mov [rsi + 0x80], r8
    mov [rsi + 0x88], r9
    mov [rsi + 0x90], r10
    mov [rsi + 0x98], r11
    mov [rsi + 0xa0], r12
    mov [rsi + 0xa8], r13
    mov [rsi + 0xb0], r14
    mov [rsi + 0xb8], r15

    mov rax, cr3
    mov [rsi + 0x00], rax
    mov rax, [rsp]
    mov [rsi + 0x08], rax
    pushfq
    pop qword ptr [rsi + 0x10]

    mov rax, cs
    mov [rsi + 0x20], rax
    mov rax, ss
    mov [rsi + 0x28], rax
    mov rax, fs
    mov [rsi + 0x30], rax
    mov rax, gs
    mov [rsi + 0x38], rax

    fxsave [rsi + 0xc0]

    push qword ptr [rdi + 0x28]
    push qword ptr [rdi + 0x70]
    push qword ptr [rdi + 0x10]
    push qword ptr [rdi + 0x20]
    push qword ptr [rdi + 0x08]

    fxrstor [rdi + 0xc0]

    mov rax, [rdi + 0x00]
    mov cr3, rax
    mov rax, [rdi + 0x30]
    mov fs, ax
    mov rax, [rdi + 0x38]
    mov gs, ax

    mov rax, [rdi + 0x40]
    mov rbx, [rdi + 0x48]
    mov rcx, [rdi + 0x50]
    mov rdx, [rdi + 0x58]
    mov rsi, [rdi + 0x68]
    mov rbp, [rdi + 0x78]
    mov r8,  [rdi + 0x80]
    mov r9,  [rdi + 0x88]
    mov r10, [rdi + 0x90]
    mov r11, [rdi + 0x98]
    mov r12, [rdi + 0xa0]
    mov r13, [rdi + 0xa8]
    mov r14, [rdi + 0xb0]
    mov r15, [rdi + 0xb8]

    mov rdi, [rdi + 0x60]

    iretq
"#
);

/// Saves the running register state into `current` and resumes `next`.
///
/// Returns when some later switch resumes `current`.
///
/// # Safety
///
/// `next` must hold a context produced by [`TaskContext::init`] or by an
/// earlier switch away from it, and both pointers must stay valid until the
/// saved task is resumed. Hosted builds have a single stack and do nothing.
#[inline]
pub unsafe fn switch_context(next: *const TaskContext, current: *mut TaskContext) {
    #[cfg(target_os = "none")]
    unsafe {
        unsafe extern "C" {
            fn __switch_context(next: *const TaskContext, current: *mut TaskContext);
        }
        __switch_context(next, current);
    }
    #[cfg(not(target_os = "none"))]
    {
        let _ = (next, current);
        #[cfg(test)]
        SWITCHES.with(|n| n.set(n.get() + 1));
    }
}

#[cfg(test)]
std::thread_local! {
    static SWITCHES: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
}

/// Context swaps requested so far by the current test thread.
#[cfg(test)]
pub(crate) fn switch_count() -> usize {
    SWITCHES.with(|n| n.get())
}
