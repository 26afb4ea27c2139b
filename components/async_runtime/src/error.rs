//! Host-level errors of the async runtime.
//!
//! Script-level failures never show up here: a throwing handler or
//! initializer becomes a promise rejection. `RuntimeError` covers misuse of
//! the host API and failures of host-supplied tasks, which abort the current
//! drain.

use crate::promise::PromiseId;
use core_types::Value;

/// Errors reported to the host embedding the event loop.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A promise handle from another event loop was passed in.
    #[error("{0} does not belong to this event loop")]
    ForeignPromise(PromiseId),

    /// The record behind a handle is gone.
    #[error("{0} has already been collected")]
    Collected(PromiseId),

    /// A background worker thread could not be started.
    #[error("failed to spawn background worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// A host task or microtask failed.
    #[error("task failed: {0}")]
    Task(String),
}

impl RuntimeError {
    /// Converts the error into a script-visible `TypeError`, for intrinsics
    /// that surface host misuse as an exception.
    pub fn into_thrown(self) -> Value {
        Value::type_error(self.to_string())
    }
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
