//! HAL (Hardware Abstraction Layer) module.
//!
//! x86-64 CPU control, port I/O and the two synchronisation primitives of
//! the kernel: [`IrqCell`] for scheduler state and [`Mutex`] for short
//! critical sections.

pub mod cpu;
pub mod irq_cell;
pub mod port;
pub mod spin;

pub use cpu::without_interrupts;
pub use irq_cell::IrqCell;
pub use spin::{Mutex, SpinNoIrq};
