//! # Command Model
//!
//! A command is a deferred invocation that owns everything it needs.
//!
//! The caller's stack frame is usually gone by the time the worker gets to a
//! command, so a command must never hold a reference into caller memory.
//! `Send + 'static` on the trait enforces that at compile time: slices are
//! copied into `Vec`s, shared resources travel as `Arc`s.
//!
//! ```rust,ignore
//! enum CounterCommand {
//!     Add(u64),
//!     Reset,
//! }
//!
//! impl Command<u64> for CounterCommand {
//!     type Error = std::convert::Infallible;
//!
//!     fn label(&self) -> &'static str {
//!         match self {
//!             Self::Add(_) => "add",
//!             Self::Reset => "reset",
//!         }
//!     }
//!
//!     fn execute(self, target: &mut u64) -> Result<(), Self::Error> {
//!         match self {
//!             Self::Add(n) => *target += n,
//!             Self::Reset => *target = 0,
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::fmt::Display;

/// A self-contained operation executed against a target of type `T`.
///
/// Consumed exactly once, on the worker thread.
pub trait Command<T>: Send + 'static {
    /// Failure type. Failures of deferred commands are logged by the worker,
    /// never returned to the issuing caller.
    type Error: Display;

    /// Short static name used in logs and stats.
    fn label(&self) -> &'static str;

    /// Runs the operation against the target.
    ///
    /// # Errors
    ///
    /// Whatever the operation reports. The worker logs it and moves on.
    fn execute(self, target: &mut T) -> Result<(), Self::Error>;
}

/// What actually travels through the queue.
#[derive(Debug)]
pub(crate) enum Envelope<C> {
    /// A command to execute.
    Run(C),
    /// Poison pill: everything before it has been drained, stop.
    Shutdown,
}
