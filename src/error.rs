//! Unified error types for the RstinyOS scheduling core.
//!
//! Fallible by-id operations return [`TinyResult<T>`] so callers can match on
//! the exact failure. Bring-up code that chains several steps uses
//! `anyhow::Result<()>` instead:
//!
//! ```ignore
//! anyhow::ensure!(freq != 0, "LAPIC timer did not count");
//! ```

use thiserror::Error;

use crate::task::TaskId;

/// Errors surfaced by the scheduling core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TinyError {
    /// No task with this id was ever created.
    #[error("no such task: {0}")]
    NoSuchTask(TaskId),
    /// Requested priority level is outside `-1..=MAX_LEVEL`.
    #[error("invalid task level: {0}")]
    InvalidLevel(i32),
    #[error("logger already initialized")]
    LoggerInitFailed,
    /// A kernel-lifetime singleton was installed twice.
    #[error("already initialized")]
    AlreadyInitialized,
    /// A kernel-lifetime singleton was used before being installed.
    #[error("not initialized")]
    NotInitialized,
    #[error("LAPIC timer calibration failed")]
    TimerCalibrationFailed,
}

/// Result type alias used by the scheduling core.
pub type TinyResult<T> = Result<T, TinyError>;
