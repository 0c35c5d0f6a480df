//! Device drivers module.
//!
//! COM1 serial console, the Local APIC timer with its PIT calibration delay,
//! and the timer interrupt glue.

pub mod irq;
pub mod timer;
pub mod uart;
