//! Error types for the scheduler.

use thiserror::Error;

use crosspost_store::Repeat;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed trigger input.
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    /// A next-occurrence computation was requested for a one-shot policy.
    #[error("repeat policy {0:?} has no future occurrence")]
    NotRecurring(Repeat),

    /// The scheduler has been shut down.
    #[error("scheduler is shut down")]
    ShutDown,
}
