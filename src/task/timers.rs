//! Logical timers counted in ticks of the periodic hardware interrupt.

use alloc::collections::BinaryHeap;
use core::cmp::Reverse;

use super::manager::TaskManager;
use super::message::Message;
use crate::config::kernel::{
    EVENT_SINK_TASK_ID, SENTINEL_TIMER_VALUE, TASK_TIMER_PERIOD, TASK_TIMER_VALUE,
};

/// A deadline with an opaque payload.
///
/// Timers compare by deadline first, then by value, so the smallest timer
/// is the one that expires soonest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timer {
    deadline: u64,
    value: i32,
}

impl Timer {
    pub const fn new(deadline: u64, value: i32) -> Self {
        Self { deadline, value }
    }

    pub const fn deadline(&self) -> u64 {
        self.deadline
    }

    pub const fn value(&self) -> i32 {
        self.value
    }
}

/// The tick counter and the pending timers.
pub struct TimerManager {
    tick: u64,
    /// Min-heap on [`Timer`]'s ordering: `peek` yields the nearest deadline.
    /// Always holds the sentinel, so it is never empty.
    timers: BinaryHeap<Reverse<Timer>>,
}

impl TimerManager {
    pub fn new() -> Self {
        let mut timers = BinaryHeap::new();
        timers.push(Reverse(Timer::new(u64::MAX, SENTINEL_TIMER_VALUE)));
        Self { tick: 0, timers }
    }

    pub fn add_timer(&mut self, timer: Timer) {
        self.timers.push(Reverse(timer));
    }

    /// Advances the clock by one tick and fires every expired timer.
    ///
    /// The preemption timer re-arms itself one period ahead; any other timer
    /// becomes a timeout message for the event sink task. Returns whether
    /// the preemption timer fired.
    pub fn tick(&mut self, tasks: &mut TaskManager) -> bool {
        self.tick += 1;
        crate::console::logger::set_tick(self.tick);

        let mut task_timer_timeout = false;
        while let Some(&Reverse(timer)) = self.timers.peek() {
            if timer.deadline > self.tick {
                break;
            }
            self.timers.pop();

            if timer.value == TASK_TIMER_VALUE {
                task_timer_timeout = true;
                self.add_timer(Timer::new(self.tick + TASK_TIMER_PERIOD, TASK_TIMER_VALUE));
                continue;
            }

            debug!("timer {} expired at tick {}", timer.value, self.tick);
            let msg = Message::timer_timeout(timer.deadline, timer.value);
            if let Err(e) = tasks.send_message(EVENT_SINK_TASK_ID, msg) {
                warn!("timeout of timer {} dropped: {}", timer.value, e);
            }
        }

        task_timer_timeout
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Number of pending timers, the sentinel included.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}
