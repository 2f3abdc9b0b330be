//! # Dispatch Error Types
//!
//! All errors that can occur between a producer and the worker.

use thiserror::Error;

/// Errors that can occur in the dispatch engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The queue was closed by shutdown; no further commands are accepted.
    #[error("command queue is closed")]
    QueueClosed,

    /// Non-blocking push found the queue at capacity.
    #[error("command queue full: capacity {capacity}")]
    QueueFull {
        /// Fixed capacity of the queue.
        capacity: usize,
    },

    /// The command carrying a barrier was dropped before signalling it.
    ///
    /// Happens when the command panics on the worker or drops its signal.
    #[error("barrier abandoned before it was signalled")]
    BarrierAbandoned,

    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    /// The worker thread died instead of returning.
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
