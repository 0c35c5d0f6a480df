//! Kernel configuration constants.
//!
//! Values marked `#[from_env]` can be overridden at build time, e.g.
//! `TIMER_FREQ=1000 cargo build`.

use const_env::from_env;

/// Hardware timer interrupts per second.
#[from_env]
pub const TIMER_FREQ: u64 = 100;

/// Preemption period in ticks (20ms at the default frequency).
pub const TASK_TIMER_PERIOD: u64 = TIMER_FREQ * 2 / 100;

/// Payload reserved for the recurring preemption timer.
pub const TASK_TIMER_VALUE: i32 = i32::MIN;

/// Payload of the sentinel timer that never expires.
pub const SENTINEL_TIMER_VALUE: i32 = -1;

/// Highest priority level. Level 0 is the lowest.
pub const MAX_LEVEL: usize = 3;

/// Level given to newly created tasks.
pub const DEFAULT_LEVEL: usize = 1;

/// Stack size of every task created with `init_context`.
#[from_env]
pub const TASK_STACK_SIZE: usize = 4096;

/// Task that receives timer timeout messages (the bootstrap task).
pub const EVENT_SINK_TASK_ID: u64 = 1;

/// Kernel code segment selector.
pub const KERNEL_CS: u16 = 1 << 3;
/// Kernel stack segment selector.
pub const KERNEL_SS: u16 = 2 << 3;

/// Interrupt vector of the Local APIC periodic timer.
pub const LAPIC_TIMER_VECTOR: u8 = 0x41;

/// Local APIC MMIO base (identity mapped).
pub const LAPIC_BASE: usize = 0xfee0_0000;

/// COM1 serial port used by the console.
pub const COM1_PORT: u16 = 0x3f8;

const _: () = assert!(TASK_TIMER_PERIOD > 0, "TIMER_FREQ too low for a 20ms preemption period");
