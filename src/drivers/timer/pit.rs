//! 8254 PIT channel 2, used as a polled delay source.

use crate::hal::port::{inb, outb};

/// PIT input clock in Hz.
const PIT_FREQ: u64 = 1_193_182;

const CHANNEL2_DATA: u16 = 0x42;
const COMMAND: u16 = 0x43;
/// NMI status and control: bit 0 gates channel 2, bit 1 drives the speaker,
/// bit 5 mirrors the channel 2 output.
const GATE_CTRL: u16 = 0x61;

const GATE_ENABLE: u8 = 1 << 0;
const SPEAKER_ENABLE: u8 = 1 << 1;
const OUT2: u8 = 1 << 5;

/// Longest delay a single 16-bit count can express.
const MAX_CHUNK_MS: u64 = 50;

fn pit_count(ms: u64) -> u16 {
    let count = PIT_FREQ * ms / 1000;
    count.min(u16::MAX as u64) as u16
}

fn one_shot(count: u16) {
    unsafe {
        let gate = inb(GATE_CTRL) & !(SPEAKER_ENABLE | GATE_ENABLE);
        outb(GATE_CTRL, gate);
        // channel 2, lobyte/hibyte, mode 0 (interrupt on terminal count)
        outb(COMMAND, 0b1011_0000);
        outb(CHANNEL2_DATA, count as u8);
        outb(CHANNEL2_DATA, (count >> 8) as u8);
        outb(GATE_CTRL, gate | GATE_ENABLE);
        while inb(GATE_CTRL) & OUT2 == 0 {
            core::hint::spin_loop();
        }
        outb(GATE_CTRL, gate);
    }
}

/// Busy-waits for `ms` milliseconds.
pub fn wait_milliseconds(ms: u64) {
    let mut remaining = ms;
    while remaining > 0 {
        let chunk = remaining.min(MAX_CHUNK_MS);
        one_shot(pit_count(chunk));
        remaining -= chunk;
    }
}
