//! RstinyOS scheduling core.
//!
//! Multi-level preemptive task scheduler, logical software timers and
//! inter-task messages, driven by the Local APIC periodic timer interrupt.
//!
//! The crate targets `x86_64-unknown-none`. Privileged instructions are only
//! compiled for `target_os = "none"`; hosted builds get inert shims so the
//! scheduling logic can be exercised with `cargo test`.

#![cfg_attr(not(test), no_std)]

#[cfg(all(target_os = "none", not(target_arch = "x86_64")))]
compile_error!("the RstinyOS scheduling core only supports x86_64 bare-metal targets");

#[macro_use]
extern crate log;

extern crate alloc;

pub mod config;
#[macro_use]
pub mod console;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod task;

pub use error::{TinyError, TinyResult};
pub use task::{Message, MessageKind, Scheduler, Task, TaskId, TaskManager, Timer, TimerManager};

/// Brings up the scheduling core on the boot processor: serial console,
/// logger, LAPIC timer, then the scheduler. The caller continues as task 1.
///
/// Interrupts should stay masked until this returns.
pub fn init() -> anyhow::Result<()> {
    drivers::uart::init_early();
    console::init_logger().map_err(|e| anyhow::anyhow!("{e}"))?;
    drivers::timer::init()?;
    task::init()
}
