//! # Render Error Types

use tandem_core::DispatchError;
use thiserror::Error;

use crate::cache::StateKey;

/// Errors that can occur in the renderer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The command could not be queued or its barrier never fired.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// An argument was malformed at issue time.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation needs pipeline state that was never bound.
    #[error("missing pipeline state: {0}")]
    MissingState(&'static str),

    /// A query for a property the local cache does not track.
    ///
    /// Asking the worker would mean a hidden barrier; guessing would mean a
    /// wrong answer. Neither happens.
    #[error("state {0} is not tracked by the local cache")]
    UntrackedState(StateKey),

    /// Index or slot outside the device's limits.
    #[error("{what} {index} out of range (limit {limit})")]
    OutOfRange {
        /// What was indexed.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// Exclusive upper bound.
        limit: usize,
    },

    /// The device or presentation target reported a failure.
    #[error("device error: {0}")]
    Device(String),

    /// Invalid renderer parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;
