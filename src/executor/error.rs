//! Executor error types.

use thiserror::Error;

/// Errors that can occur when submitting work to an executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor thread could not be started
    #[error("Failed to spawn executor thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The executor thread has stopped and accepts no more work
    #[error("Executor has terminated")]
    Terminated,

    /// The submitted work panicked before producing a result
    #[error("Work panicked on the executor thread")]
    Panicked,
}
