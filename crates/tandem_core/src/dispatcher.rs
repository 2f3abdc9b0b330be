//! # Dispatcher
//!
//! Queue + worker + stats behind one handle. This is the domain-agnostic half
//! of a proxy: the proxy decides *which* path an operation takes, the
//! dispatcher implements the deferred and synchronizing paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::start(&DispatchConfig::default(), target)?;
//!
//! // Deferred: returns as soon as the command is queued.
//! dispatcher.submit(MyCommand::SetThing(3))?;
//!
//! // Synchronizing: returns once the worker has run everything queued before.
//! let value = dispatcher.submit_and_wait(|signal| MyCommand::ReadThing(signal))?;
//!
//! dispatcher.shutdown()?;
//! ```
//!
//! ## Ordering across producers
//!
//! A synchronizing call only waits for commands pushed *before* it. With
//! several producer threads that means "before it in this producer's issue
//! order" plus whatever other producers happened to push first. Serialize
//! blocking callers externally if a global ordering is needed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::barrier::{barrier, Signal};
use crate::command::Command;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::queue::CommandQueue;
use crate::stats::{DispatchStats, DispatchStatsSnapshot};
use crate::worker::Worker;

/// Ordered single-worker executor for commands of type `C` against a target
/// of type `T`.
pub struct Dispatcher<T, C> {
    queue: CommandQueue<C>,
    worker: Mutex<Option<Worker>>,
    stats: Arc<DispatchStats>,
    _target: std::marker::PhantomData<fn(T)>,
}

impl<T, C> Dispatcher<T, C>
where
    T: Send + 'static,
    C: Command<T>,
{
    /// Moves `target` onto a freshly spawned worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] for a bad config and
    /// [`DispatchError::WorkerSpawn`] if the thread cannot be started.
    pub fn start(config: &DispatchConfig, target: T) -> DispatchResult<Self> {
        config.validate()?;

        let (queue, receiver) = CommandQueue::bounded(config.queue_capacity)?;
        let stats = Arc::new(DispatchStats::default());
        let worker = Worker::spawn(&config.worker_name, target, receiver, Arc::clone(&stats))?;

        tracing::info!(
            worker = %config.worker_name,
            capacity = config.queue_capacity,
            "dispatcher started"
        );

        Ok(Self {
            queue,
            worker: Mutex::new(Some(worker)),
            stats,
            _target: std::marker::PhantomData,
        })
    }

    /// Deferred path: queues the command and returns immediately.
    ///
    /// `Ok` means "accepted", not "executed". The command's own failure, if
    /// any, is logged by the worker and never comes back here.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] after shutdown.
    pub fn submit(&self, command: C) -> DispatchResult<()> {
        self.queue.push(command)?;
        self.stats.record_submitted();
        Ok(())
    }

    /// Synchronizing path: queues the command built by `make` around a fresh
    /// barrier, then blocks until the worker signals it.
    ///
    /// Every command this caller pushed earlier has executed by the time this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] after shutdown, or
    /// [`DispatchError::BarrierAbandoned`] if the command never signalled.
    pub fn submit_and_wait<R, F>(&self, make: F) -> DispatchResult<R>
    where
        F: FnOnce(Signal<R>) -> C,
    {
        let (signal, waiter) = barrier();
        self.submit(make(signal))?;
        let value = waiter.wait()?;
        self.stats.record_barrier();
        Ok(value)
    }
}

impl<T, C> Dispatcher<T, C> {
    /// Commands queued but not yet picked up by the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Fixed queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// False once shutdown has started.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Graceful teardown: enqueue the poison pill, let the worker drain
    /// everything before it, join the thread.
    ///
    /// Idempotent. Must not be called from the worker thread itself.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::WorkerPanicked`] if the worker thread died.
    pub fn shutdown(&self) -> DispatchResult<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };

        match self.queue.close() {
            // Worker already gone; join reports why.
            Ok(()) | Err(DispatchError::QueueClosed) => {}
            Err(other) => return Err(other),
        }

        let name = worker.name().to_string();
        worker.join()?;

        let stats = self.stats.snapshot();
        tracing::info!(
            worker = %name,
            executed = stats.executed,
            failed = stats.failed,
            panicked = stats.panicked,
            "dispatcher shut down"
        );
        Ok(())
    }
}

impl<T, C> Drop for Dispatcher<T, C> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "dispatcher teardown failed");
        }
    }
}
