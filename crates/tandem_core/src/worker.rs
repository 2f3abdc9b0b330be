//! # Worker Thread
//!
//! The only thread that touches the target through the queue.
//!
//! ```text
//!   Running:  pop ──> execute ──> pop ──> execute ...
//!                                   │
//!                                   └── poison pill
//!   Exiting:  drop target ──> thread returns
//! ```
//!
//! Execution is strictly sequential. A command that fails or panics is
//! logged and counted, then the loop moves on to the next one.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::command::{Command, Envelope};
use crate::error::{DispatchError, DispatchResult};
use crate::queue::CommandReceiver;
use crate::stats::DispatchStats;

/// Handle to the worker thread.
#[derive(Debug)]
pub struct Worker {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Starts the worker. The target moves into the thread and is dropped
    /// there once the poison pill is reached.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::WorkerSpawn`] if the OS refuses the thread.
    pub fn spawn<T, C>(
        name: &str,
        target: T,
        receiver: CommandReceiver<C>,
        stats: Arc<DispatchStats>,
    ) -> DispatchResult<Self>
    where
        T: Send + 'static,
        C: Command<T>,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(target, &receiver, &stats))
            .map_err(|e| DispatchError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            handle: Some(handle),
        })
    }

    /// Thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the thread has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(&self.handle, Some(handle) if !handle.is_finished())
    }

    /// Waits for the thread to return.
    ///
    /// Only returns once the queue has been closed (or every producer is
    /// gone); joining a live worker from a producer blocks forever.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::WorkerPanicked`] if the thread died.
    pub fn join(mut self) -> DispatchResult<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| DispatchError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

fn run_loop<T, C>(mut target: T, receiver: &CommandReceiver<C>, stats: &DispatchStats)
where
    C: Command<T>,
{
    tracing::info!("worker running");

    loop {
        match receiver.pop() {
            Some(Envelope::Run(command)) => execute_one(&mut target, command, stats),
            Some(Envelope::Shutdown) => {
                tracing::debug!("poison pill reached, queue drained");
                break;
            }
            None => {
                tracing::warn!("every producer is gone without a shutdown, stopping");
                break;
            }
        }
    }

    drop(target);
    tracing::info!("worker released target and is exiting");
}

fn execute_one<T, C>(target: &mut T, command: C, stats: &DispatchStats)
where
    C: Command<T>,
{
    let label = command.label();
    match panic::catch_unwind(AssertUnwindSafe(|| command.execute(target))) {
        Ok(Ok(())) => {
            tracing::trace!(command = label, "executed");
            stats.record_executed(true);
        }
        Ok(Err(error)) => {
            // The issuing caller already got "accepted"; this is the only report.
            tracing::warn!(command = label, %error, "command failed");
            stats.record_executed(false);
        }
        Err(payload) => {
            tracing::error!(
                command = label,
                panic = panic_message(payload.as_ref()),
                "command panicked, continuing with next command"
            );
            stats.record_panicked();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::CommandQueue;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Target that records into shared state so the test can look after join.
    struct Scripted {
        seen: Arc<parking_lot::Mutex<Vec<u32>>>,
        dropped: Arc<AtomicU32>,
    }

    impl Drop for Scripted {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    enum ScriptCommand {
        Record(u32),
        Fail,
        Panic,
    }

    impl Command<Scripted> for ScriptCommand {
        type Error = String;

        fn label(&self) -> &'static str {
            match self {
                Self::Record(_) => "record",
                Self::Fail => "fail",
                Self::Panic => "panic",
            }
        }

        fn execute(self, target: &mut Scripted) -> Result<(), String> {
            match self {
                Self::Record(n) => {
                    target.seen.lock().push(n);
                    Ok(())
                }
                Self::Fail => Err("refused".to_string()),
                Self::Panic => panic!("command exploded"),
            }
        }
    }

    #[test]
    fn test_failures_do_not_stop_the_loop() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let dropped = Arc::new(AtomicU32::new(0));
        let stats = Arc::new(DispatchStats::default());
        let (queue, receiver) = CommandQueue::bounded(16).unwrap();

        let worker = Worker::spawn(
            "script-worker",
            Scripted {
                seen: Arc::clone(&seen),
                dropped: Arc::clone(&dropped),
            },
            receiver,
            Arc::clone(&stats),
        )
        .unwrap();
        assert_eq!(worker.name(), "script-worker");

        queue.push(ScriptCommand::Record(1)).unwrap();
        queue.push(ScriptCommand::Fail).unwrap();
        queue.push(ScriptCommand::Panic).unwrap();
        queue.push(ScriptCommand::Record(2)).unwrap();
        queue.close().unwrap();
        worker.join().unwrap();

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.executed, 3);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.panicked, 1);
    }

    #[test]
    fn test_worker_stops_when_producers_vanish() {
        let dropped = Arc::new(AtomicU32::new(0));
        let (queue, receiver) = CommandQueue::<ScriptCommand>::bounded(4).unwrap();
        let worker = Worker::spawn(
            "orphan-worker",
            Scripted {
                seen: Arc::default(),
                dropped: Arc::clone(&dropped),
            },
            receiver,
            Arc::default(),
        )
        .unwrap();

        drop(queue);
        worker.join().unwrap();
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }
}
