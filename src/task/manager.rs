//! Multi-level ready queues and the context-switch decision.
//!
//! Every level owns a FIFO ready queue. The head of the queue at
//! `current_level` is the running task; the others are ready. Higher levels
//! strictly preempt lower ones, tasks within a level round-robin. The idle
//! task sits alone at level 0 and never sleeps, so some queue is always
//! non-empty.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::ops::Deref;

use super::context::{TaskContext, switch_context};
use super::message::Message;
use super::task::{Task, TaskFunc, TaskId};
use crate::config::kernel::MAX_LEVEL;
use crate::error::{TinyError, TinyResult};

/// Owns every task and decides which one runs.
pub struct TaskManager {
    /// Indexed by `id - 1`. Boxed so saved contexts never move.
    tasks: Vec<Box<Task>>,
    running: [VecDeque<TaskId>; MAX_LEVEL + 1],
    current_level: usize,
    level_changed: bool,
}

impl TaskManager {
    /// Creates the manager with two tasks already running: the caller's own
    /// flow of control (id 1, [`MAX_LEVEL`]) and the idle task (id 2,
    /// level 0).
    ///
    /// The bootstrap task gets no fresh context; the first switch away from
    /// it saves the caller's registers.
    pub fn new() -> Self {
        let mut manager = Self {
            tasks: Vec::new(),
            running: core::array::from_fn(|_| VecDeque::new()),
            current_level: MAX_LEVEL,
            level_changed: false,
        };

        let bootstrap = manager.push_task();
        manager.admit(bootstrap, MAX_LEVEL);

        let idle = manager.push_task();
        manager.slot_mut(idle).init_context(idle_loop, 0);
        manager.admit(idle, 0);

        manager
    }

    fn push_task(&mut self) -> TaskId {
        let id = self.tasks.len() as TaskId + 1;
        self.tasks.push(Box::new(Task::new(id)));
        id
    }

    /// Marks `id` running at `level` and appends it to that queue.
    fn admit(&mut self, id: TaskId, level: usize) {
        let task = self.slot_mut(id);
        task.set_level(level);
        task.set_running(true);
        self.running[level].push_back(id);
    }

    fn index(&self, id: TaskId) -> TinyResult<usize> {
        match id.checked_sub(1) {
            Some(idx) if (idx as usize) < self.tasks.len() => Ok(idx as usize),
            _ => Err(TinyError::NoSuchTask(id)),
        }
    }

    /// Task `id`, which must exist.
    fn slot(&self, id: TaskId) -> &Task {
        &self.tasks[id as usize - 1]
    }

    fn slot_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id as usize - 1]
    }

    /// Allocates a sleeping task with the next id. It will not run until
    /// woken.
    pub fn new_task(&mut self) -> TaskMut<'_> {
        let id = self.push_task();
        debug!("task {} created", id);
        TaskMut { manager: self, id }
    }

    /// Number of tasks ever created.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> TinyResult<&Task> {
        self.index(id).map(|idx| &*self.tasks[idx])
    }

    pub fn task_mut(&mut self, id: TaskId) -> TinyResult<TaskMut<'_>> {
        self.index(id)?;
        Ok(TaskMut { manager: self, id })
    }

    pub fn current_task_id(&self) -> TaskId {
        match self.running[self.current_level].front() {
            Some(&id) => id,
            None => panic!("ready queue of level {} is empty", self.current_level),
        }
    }

    /// The task at the head of the current level's queue.
    pub fn current_task(&self) -> &Task {
        self.slot(self.current_task_id())
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    /// Whether the next switch rescans the levels.
    pub fn level_changed(&self) -> bool {
        self.level_changed
    }

    /// Task ids queued at `level`, head first.
    pub fn ready_queue(&self, level: usize) -> impl Iterator<Item = TaskId> + '_ {
        self.running[level].iter().copied()
    }

    /// Rotates the current level and switches to whatever runs next.
    ///
    /// With `sleep_current` the running task leaves the queues instead of
    /// moving to the tail of its level. Returns once the calling task is
    /// scheduled again.
    pub fn switch_task(&mut self, sleep_current: bool) {
        if let Some((next, current)) = self.rotate(sleep_current) {
            unsafe { switch_context(next, current) };
        }
    }

    /// Queue bookkeeping of [`TaskManager::switch_task`]. Returns the
    /// contexts to swap, or `None` when the running task stays the same.
    fn rotate(&mut self, sleep_current: bool) -> Option<(*const TaskContext, *mut TaskContext)> {
        let current_id = self.current_task_id();
        let level_queue = &mut self.running[self.current_level];
        level_queue.pop_front();
        if !sleep_current {
            level_queue.push_back(current_id);
        }
        if level_queue.is_empty() {
            self.level_changed = true;
        }

        if self.level_changed {
            self.level_changed = false;
            if let Some(level) = (0..=MAX_LEVEL).rev().find(|&lv| !self.running[lv].is_empty()) {
                self.current_level = level;
            }
        }

        let next_id = self.current_task_id();
        if next_id == current_id {
            return None;
        }
        trace!(
            "context switch: {} -> {} (level {})",
            current_id, next_id, self.current_level
        );

        let current = self.slot_mut(current_id).context_ptr();
        let next = self.slot_mut(next_id).context_ptr() as *const TaskContext;
        Some((next, current))
    }

    /// Takes `id` out of the ready queues. A task putting itself to sleep
    /// switches away and only returns once woken again.
    pub fn sleep(&mut self, id: TaskId) -> TinyResult<()> {
        self.index(id)?;
        self.sleep_task(id);
        Ok(())
    }

    fn sleep_task(&mut self, id: TaskId) {
        let task = self.slot_mut(id);
        if !task.running() {
            return;
        }
        task.set_running(false);
        let level = task.level();
        debug!("task {} sleeps", id);

        if id == self.current_task_id() {
            self.switch_task(true);
            return;
        }
        self.running[level].retain(|&t| t != id);
    }

    /// Makes `id` ready. A negative `level` keeps the task's level; a task
    /// that is already running only changes level.
    pub fn wakeup(&mut self, id: TaskId, level: i32) -> TinyResult<()> {
        self.index(id)?;
        let level = match level {
            lv if lv < 0 => None,
            lv if lv as usize <= MAX_LEVEL => Some(lv as usize),
            lv => return Err(TinyError::InvalidLevel(lv)),
        };
        self.wakeup_task(id, level);
        Ok(())
    }

    fn wakeup_task(&mut self, id: TaskId, level: Option<usize>) {
        let task = self.slot(id);
        if task.running() {
            self.change_level_running(id, level);
            return;
        }

        let level = level.unwrap_or(task.level());
        debug!("task {} wakes up at level {}", id, level);
        self.admit(id, level);
        if level > self.current_level {
            self.level_changed = true;
        }
    }

    /// Moves a running task to another level.
    ///
    /// A task changing its own level stays at the head of its new queue and
    /// drags `current_level` along. Only a drop in level forces the next
    /// switch to rescan; a rise cannot hide a higher non-empty queue.
    fn change_level_running(&mut self, id: TaskId, level: Option<usize>) {
        let Some(level) = level else { return };
        let old_level = self.slot(id).level();
        if level == old_level {
            return;
        }
        debug!("task {} moves from level {} to {}", id, old_level, level);

        if id != self.current_task_id() {
            self.running[old_level].retain(|&t| t != id);
            self.running[level].push_back(id);
            self.slot_mut(id).set_level(level);
            if level > self.current_level {
                self.level_changed = true;
            }
            return;
        }

        self.running[self.current_level].pop_front();
        self.running[level].push_front(id);
        self.slot_mut(id).set_level(level);
        if level < self.current_level {
            self.level_changed = true;
        }
        self.current_level = level;
    }

    /// Queues `msg` for `id` and wakes it.
    pub fn send_message(&mut self, id: TaskId, msg: Message) -> TinyResult<()> {
        self.index(id)?;
        self.deliver(id, msg);
        Ok(())
    }

    fn deliver(&mut self, id: TaskId, msg: Message) {
        self.slot_mut(id).push_message(msg);
        self.wakeup_task(id, None);
    }

    /// Logs every task and every ready queue.
    pub fn dump_tasks(&self) {
        info!(
            "tasks: {} (current level {}, level changed {})",
            self.tasks.len(),
            self.current_level,
            self.level_changed
        );
        for task in &self.tasks {
            info!(
                "  task {}: level {} running {} inbox {}",
                task.id(),
                task.level(),
                task.running(),
                task.pending_messages()
            );
        }
        for (level, queue) in self.running.iter().enumerate().rev() {
            info!("  level {}: {:?}", level, queue);
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of the idle task.
extern "C" fn idle_loop(_id: u64, _arg: i64) {
    loop {
        crate::hal::cpu::halt();
    }
}

/// A task borrowed together with its manager, so scheduling operations
/// chain off it:
///
/// ```ignore
/// tasks.new_task().init_context(task_main, 45).wakeup();
/// ```
pub struct TaskMut<'a> {
    manager: &'a mut TaskManager,
    id: TaskId,
}

impl TaskMut<'_> {
    /// # Panics
    ///
    /// Panics if this is the running task, whose stack would be freed.
    pub fn init_context(&mut self, entry: TaskFunc, arg: i64) -> &mut Self {
        assert!(
            self.id != self.manager.current_task_id(),
            "task {} reinitialised while running",
            self.id
        );
        self.manager.slot_mut(self.id).init_context(entry, arg);
        self
    }

    pub fn sleep(&mut self) -> &mut Self {
        self.manager.sleep_task(self.id);
        self
    }

    /// Wakes the task at its current level.
    pub fn wakeup(&mut self) -> &mut Self {
        self.manager.wakeup_task(self.id, None);
        self
    }

    /// Wakes the task at `level`, capped at [`MAX_LEVEL`].
    pub fn wakeup_at(&mut self, level: usize) -> &mut Self {
        if level > MAX_LEVEL {
            warn!("task {}: level {} capped at {}", self.id, level, MAX_LEVEL);
        }
        self.manager.wakeup_task(self.id, Some(level.min(MAX_LEVEL)));
        self
    }

    /// Queues `msg` in this task's inbox and wakes it.
    pub fn send_message(&mut self, msg: Message) -> &mut Self {
        self.manager.deliver(self.id, msg);
        self
    }

    pub fn receive_message(&mut self) -> Option<Message> {
        self.manager.slot_mut(self.id).receive_message()
    }
}

impl Deref for TaskMut<'_> {
    type Target = Task;

    fn deref(&self) -> &Task {
        self.manager.slot(self.id)
    }
}
