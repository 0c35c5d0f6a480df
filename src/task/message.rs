//! Messages exchanged between tasks.

use super::TaskId;

/// Sender id used for messages produced by the kernel itself (timers).
pub const KERNEL_SENDER: TaskId = 0;

/// Operation requested by a [`MessageKind::Layer`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerOperation {
    Move,
    MoveRelative,
    Draw,
    DrawArea,
}

/// Payload of a [`Message`]. Each variant carries only its own fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    InterruptXhci,
    /// A logical timer expired at tick `timeout`.
    TimerTimeout { timeout: u64, value: i32 },
    KeyPush { modifier: u8, keycode: u8, ascii: u8 },
    Layer {
        op: LayerOperation,
        layer_id: u32,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    },
    LayerFinish,
}

/// A message queued in a task's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub src_task: TaskId,
}

impl Message {
    pub const fn new(kind: MessageKind, src_task: TaskId) -> Self {
        Self { kind, src_task }
    }

    /// Timeout notification sent by the timer manager.
    pub const fn timer_timeout(timeout: u64, value: i32) -> Self {
        Self::new(MessageKind::TimerTimeout { timeout, value }, KERNEL_SENDER)
    }
}
