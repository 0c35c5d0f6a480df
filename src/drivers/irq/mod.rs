//! Timer interrupt glue.
//!
//! The vector stub for [`LAPIC_TIMER_VECTOR`](crate::config::kernel::LAPIC_TIMER_VECTOR)
//! calls [`lapic_timer_on_interrupt`], which ticks the installed
//! [`Scheduler`] and preempts the running task when the preemption timer
//! fires.

use lazyinit::LazyInit;

use crate::drivers::timer::{Lapic, lapic};
use crate::error::{TinyError, TinyResult};
use crate::hal::IrqCell;
use crate::task::{Scheduler, TaskManager, TimerManager};

/// Acknowledges the interrupt being serviced.
pub trait EndOfInterrupt {
    fn end_of_interrupt(&self);
}

impl EndOfInterrupt for Lapic {
    fn end_of_interrupt(&self) {
        self.notify_end_of_interrupt();
    }
}

/// Handles one timer interrupt: tick, acknowledge, then switch if the
/// preemption timer fired.
///
/// The acknowledgement comes before the switch because the switch may not
/// return to this frame for a long time.
pub fn on_timer_interrupt(timers: &mut TimerManager, tasks: &mut TaskManager, eoi: &impl EndOfInterrupt) {
    let task_timer_timeout = timers.tick(tasks);
    eoi.end_of_interrupt();

    if task_timer_timeout {
        tasks.switch_task(false);
    }
}

static SCHEDULER: LazyInit<IrqCell<Scheduler>> = LazyInit::new();

/// Hands the scheduler to the timer interrupt. Can only be done once.
pub fn install(scheduler: Scheduler) -> TinyResult<()> {
    if SCHEDULER.is_inited() {
        return Err(TinyError::AlreadyInitialized);
    }
    SCHEDULER.init_once(IrqCell::new(scheduler));
    Ok(())
}

/// Runs `f` on the installed scheduler with interrupts masked.
///
/// `f` may put the calling task to sleep; it then returns only after the
/// task is woken and scheduled again.
pub fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> TinyResult<R> {
    SCHEDULER
        .get()
        .map(|cell| cell.with(f))
        .ok_or(TinyError::NotInitialized)
}

/// Entry point called by the timer vector stub with interrupts masked.
#[unsafe(no_mangle)]
pub extern "C" fn lapic_timer_on_interrupt() {
    let lapic = lapic();
    match SCHEDULER.get() {
        Some(cell) => cell.with(|s| on_timer_interrupt(&mut s.timers, &mut s.tasks, lapic)),
        None => lapic.end_of_interrupt(),
    }
}
