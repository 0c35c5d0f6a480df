//! 16550-compatible serial port on COM1.

use crate::config::kernel::COM1_PORT;
use crate::hal::port::{inb, outb};

const DATA: u16 = COM1_PORT;
const INT_ENABLE: u16 = COM1_PORT + 1;
const FIFO_CTRL: u16 = COM1_PORT + 2;
const LINE_CTRL: u16 = COM1_PORT + 3;
const MODEM_CTRL: u16 = COM1_PORT + 4;
const LINE_STATUS: u16 = COM1_PORT + 5;

const LSR_THR_EMPTY: u8 = 1 << 5;

fn do_putchar(c: u8) {
    unsafe {
        while inb(LINE_STATUS) & LSR_THR_EMPTY == 0 {
            core::hint::spin_loop();
        }
        outb(DATA, c);
    }
}

/// Writes a byte to the console.
pub fn putchar(c: u8) {
    if c == b'\n' {
        do_putchar(b'\r');
    }
    do_putchar(c);
}

/// Writes a byte slice to the console.
pub fn write_bytes(bytes: &[u8]) {
    bytes.iter().copied().for_each(putchar);
}

/// Early stage initialization: 115200 baud, 8N1, FIFO on, interrupts off.
pub fn init_early() {
    unsafe {
        outb(INT_ENABLE, 0x00);
        outb(LINE_CTRL, 0x80);
        outb(DATA, 0x01);
        outb(INT_ENABLE, 0x00);
        outb(LINE_CTRL, 0x03);
        outb(FIFO_CTRL, 0xc7);
        outb(MODEM_CTRL, 0x0b);
    }
}
