//! # Bounded Command Queue
//!
//! ```text
//!   Producer 1 ──┐
//!   Producer 2 ──┼──> [Bounded FIFO, capacity N] ──> [Worker] ──> Target
//!   Producer N ──┘        (blocks when full)         (single consumer)
//! ```
//!
//! Built on a bounded crossbeam channel. A producer that outruns the worker
//! stalls in `push` instead of growing the queue.
//!
//! Closing is gated by a read/write lock: pushes hold the read side, `close`
//! takes the write side, enqueues the poison pill and flips the flag in one
//! critical section. No command can land behind the pill, so every accepted
//! command is eventually executed.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::command::Envelope;
use crate::error::{DispatchError, DispatchResult};

struct Shared<C> {
    sender: Sender<Envelope<C>>,
    closed: RwLock<bool>,
    capacity: usize,
}

/// Producer handle. Cheap to clone, one per producer thread if needed.
pub struct CommandQueue<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for CommandQueue<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Consumer handle. Owned by the worker.
pub struct CommandReceiver<C> {
    receiver: Receiver<Envelope<C>>,
}

impl<C> CommandQueue<C> {
    /// Creates a queue holding at most `capacity` pending commands.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] for a zero capacity.
    pub fn bounded(capacity: usize) -> DispatchResult<(Self, CommandReceiver<C>)> {
        if capacity == 0 {
            return Err(DispatchError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        let (sender, receiver) = bounded(capacity);
        let queue = Self {
            shared: Arc::new(Shared {
                sender,
                closed: RwLock::new(false),
                capacity,
            }),
        };
        Ok((queue, CommandReceiver { receiver }))
    }

    /// Appends a command, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] after [`close`](Self::close), or
    /// if the worker is gone.
    pub fn push(&self, command: C) -> DispatchResult<()> {
        let closed = self.shared.closed.read();
        if *closed {
            return Err(DispatchError::QueueClosed);
        }
        if self.shared.sender.is_full() {
            tracing::trace!(capacity = self.shared.capacity, "command queue full, producer stalls");
        }
        self.shared
            .sender
            .send(Envelope::Run(command))
            .map_err(|_| DispatchError::QueueClosed)
    }

    /// Appends a command without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueFull`] if the queue is at capacity (the
    /// command is dropped), or [`DispatchError::QueueClosed`].
    pub fn try_push(&self, command: C) -> DispatchResult<()> {
        let closed = self.shared.closed.read();
        if *closed {
            return Err(DispatchError::QueueClosed);
        }
        match self.shared.sender.try_send(Envelope::Run(command)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull {
                capacity: self.shared.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::QueueClosed),
        }
    }

    /// Enqueues the poison pill and rejects all later pushes.
    ///
    /// Blocks for space like `push`. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] if the worker is already gone.
    pub fn close(&self) -> DispatchResult<()> {
        let mut closed = self.shared.closed.write();
        if *closed {
            return Ok(());
        }
        self.shared
            .sender
            .send(Envelope::Shutdown)
            .map_err(|_| DispatchError::QueueClosed)?;
        *closed = true;
        Ok(())
    }

    /// Number of commands waiting for the worker.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.sender.len()
    }

    /// True if nothing is waiting.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.sender.is_empty()
    }

    /// Fixed capacity chosen at construction.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// True once `close` has enqueued the poison pill.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.shared.closed.read()
    }
}

impl<C> CommandReceiver<C> {
    /// Removes the oldest entry, blocking while the queue is empty.
    ///
    /// `None` means every producer handle is gone without a pill.
    pub(crate) fn pop(&self) -> Option<Envelope<C>> {
        self.receiver.recv().ok()
    }

    /// Number of entries waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// True if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn pop_value(rx: &CommandReceiver<u32>) -> Option<u32> {
        match rx.pop() {
            Some(Envelope::Run(v)) => Some(v),
            _ => None,
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(CommandQueue::<u32>::bounded(0).is_err());
    }

    #[test]
    fn test_fifo_order() {
        let (queue, rx) = CommandQueue::bounded(8).unwrap();
        for i in 0..8 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 8);
        for i in 0..8 {
            assert_eq!(pop_value(&rx), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_try_push_respects_capacity() {
        let (queue, rx) = CommandQueue::bounded(2).unwrap();
        queue.try_push(1).unwrap();
        queue.try_push(2).unwrap();
        assert_eq!(
            queue.try_push(3),
            Err(DispatchError::QueueFull { capacity: 2 })
        );
        assert_eq!(queue.len(), 2);

        assert_eq!(pop_value(&rx), Some(1));
        queue.try_push(3).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_blocked_push_resumes_after_pop() {
        let (queue, rx) = CommandQueue::bounded(1).unwrap();
        queue.push(1).unwrap();

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished(), "push must block on a full queue");
        assert_eq!(queue.len(), 1);

        assert_eq!(pop_value(&rx), Some(1));
        producer.join().unwrap().unwrap();
        assert_eq!(pop_value(&rx), Some(2));
    }

    #[test]
    fn test_close_enqueues_pill_and_rejects_pushes() {
        let (queue, rx) = CommandQueue::bounded(4).unwrap();
        queue.push(7).unwrap();
        queue.close().unwrap();
        assert!(queue.is_closed());

        assert_eq!(queue.push(8), Err(DispatchError::QueueClosed));
        assert_eq!(queue.try_push(8), Err(DispatchError::QueueClosed));
        // Closing again does not enqueue a second pill.
        queue.close().unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(pop_value(&rx), Some(7));
        assert!(matches!(rx.pop(), Some(Envelope::Shutdown)));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_push_fails_when_consumer_dropped() {
        let (queue, rx) = CommandQueue::<u32>::bounded(4).unwrap();
        drop(rx);
        assert_eq!(queue.push(1), Err(DispatchError::QueueClosed));
    }
}
