//! # TANDEM Core
//!
//! Ordered single-worker command dispatch.
//!
//! A caller issues a stream of stateful operations; a dedicated worker thread
//! performs them against a target it owns exclusively, in exactly the order
//! they were issued. The caller only waits when it asks to.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   Command    ┌──────────────┐   pop    ┌──────────┐
//! │  Caller  │─────────────>│ CommandQueue │─────────>│  Worker  │──> Target
//! └──────────┘  (owned args)│  (bounded N) │          └──────────┘
//!      ▲                    └──────────────┘               │
//!      │                                                   │
//!      └──────────────── Barrier (one-shot) ◄──────────────┘
//!                      synchronizing calls only
//! ```
//!
//! ## Guarantees
//!
//! 1. **Total order** - commands execute in push order (single consumer)
//! 2. **Exclusive target** - at most one command runs at any instant
//! 3. **Barrier ordering** - a synchronizing call returns only after every
//!    command its caller pushed earlier has executed
//! 4. **Graceful teardown** - the poison pill drains everything before it
//!
//! ## Non-guarantees
//!
//! No timeouts, no cancellation, no retries, no priorities. A failed deferred
//! command is logged, never reported back.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod barrier;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod stats;
pub mod worker;

pub use barrier::{barrier, Signal, Waiter};
pub use command::Command;
pub use config::{DispatchConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_NAME};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use queue::{CommandQueue, CommandReceiver};
pub use stats::{DispatchStats, DispatchStatsSnapshot};
pub use worker::Worker;
