use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use super::context::TaskContext;
use super::message::Message;
use crate::config::kernel::{DEFAULT_LEVEL, TASK_STACK_SIZE};

/// Task identifier. Ids start at 1 and are never reused.
pub type TaskId = u64;

/// Task entry point, called as `entry(task_id, arg)`.
pub type TaskFunc = extern "C" fn(u64, i64);

/// A schedulable unit of execution.
///
/// A task owns its stack, its saved register context and its inbox. Its
/// scheduling state (`level`, `running`) is only changed by the
/// [`TaskManager`](super::TaskManager).
pub struct Task {
    id: TaskId,
    stack: Vec<u64>,
    context: TaskContext,
    level: usize,
    running: bool,
    msgs: VecDeque<Message>,
}

impl Task {
    pub(super) fn new(id: TaskId) -> Self {
        Self {
            id,
            stack: Vec::new(),
            context: TaskContext::zeroed(),
            level: DEFAULT_LEVEL,
            running: false,
            msgs: VecDeque::new(),
        }
    }

    /// Allocates a fresh stack and prepares the context so the first switch
    /// to this task calls `entry(id, arg)`.
    pub(super) fn init_context(&mut self, entry: TaskFunc, arg: i64) -> &mut Self {
        self.stack = vec![0; TASK_STACK_SIZE / core::mem::size_of::<u64>()];
        let stack_end = self.stack.as_ptr() as usize + self.stack.len() * core::mem::size_of::<u64>();
        self.context
            .init(entry as usize, stack_end, self.id, arg as u64);
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Whether the task is in a ready queue.
    pub fn running(&self) -> bool {
        self.running
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    /// Removes the oldest pending message.
    pub fn receive_message(&mut self) -> Option<Message> {
        self.msgs.pop_front()
    }

    pub fn pending_messages(&self) -> usize {
        self.msgs.len()
    }

    pub(super) fn context_ptr(&mut self) -> *mut TaskContext {
        &mut self.context
    }

    pub(super) fn set_level(&mut self, level: usize) {
        self.level = level;
    }

    pub(super) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub(super) fn push_message(&mut self, msg: Message) {
        self.msgs.push_back(msg);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("running", &self.running)
            .field("pending", &self.msgs.len())
            .field("stack_words", &self.stack.len())
            .finish()
    }
}
