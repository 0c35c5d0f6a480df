//! Task management.
//!
//! - [`Task`]: stack, saved context, level and inbox of one task
//! - [`TaskManager`]: multi-level round-robin ready queues
//! - [`TimerManager`]: tick counter, logical timers and the preemption heartbeat
//! - [`Message`]: what tasks and timers send each other

pub mod context;
mod manager;
mod message;
#[allow(clippy::module_inception)]
mod task;
mod timers;

#[cfg(test)]
mod tests;

pub use manager::{TaskManager, TaskMut};
pub use message::{KERNEL_SENDER, LayerOperation, Message, MessageKind};
pub use task::{Task, TaskFunc, TaskId};
pub use timers::{Timer, TimerManager};

use crate::config::kernel::{TASK_TIMER_PERIOD, TASK_TIMER_VALUE};
use crate::hal::without_interrupts;

/// The scheduling core: tasks plus timers.
///
/// Built once at boot and handed to the timer interrupt with
/// [`crate::drivers::irq::install`].
pub struct Scheduler {
    pub tasks: TaskManager,
    pub timers: TimerManager,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: TaskManager::new(),
            timers: TimerManager::new(),
        }
    }

    /// Arms the recurring preemption timer one period from now.
    pub fn start_preemption(&mut self) {
        without_interrupts(|| {
            let deadline = self.timers.current_tick() + TASK_TIMER_PERIOD;
            self.timers.add_timer(Timer::new(deadline, TASK_TIMER_VALUE));
        });
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the scheduler, starts preemption and hands it to the timer
/// interrupt. The caller continues as task 1.
pub fn init() -> anyhow::Result<()> {
    let mut scheduler = Scheduler::new();
    scheduler.start_preemption();
    crate::drivers::irq::install(scheduler).map_err(|e| anyhow::anyhow!("scheduler: {e}"))?;

    info!("Task system initialized, preemption every {} ticks", TASK_TIMER_PERIOD);
    Ok(())
}
