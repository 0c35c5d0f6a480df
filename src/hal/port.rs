//! x86 port I/O.

#[cfg(target_os = "none")]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe { core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack)) };
}

#[cfg(target_os = "none")]
pub unsafe fn inb(port: u16) -> u8 {
    let val: u8;
    unsafe { core::arch::asm!("in al, dx", out("al") val, in("dx") port, options(nomem, nostack)) };
    val
}

#[cfg(not(target_os = "none"))]
pub unsafe fn outb(_port: u16, _val: u8) {}

/// Hosted builds read an idle bus.
#[cfg(not(target_os = "none"))]
pub unsafe fn inb(_port: u16) -> u8 {
    0xff
}
