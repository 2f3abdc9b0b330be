//! # One-Shot Barriers
//!
//! A synchronizing call creates a fresh `(Signal, Waiter)` pair, moves the
//! `Signal` into the command it pushes, and blocks on the `Waiter`.
//!
//! ```text
//!   caller                        worker
//!   ──────                        ──────
//!   (signal, waiter) = barrier()
//!   push(cmd{signal}) ──────────> ... earlier commands ...
//!   waiter.wait()                 cmd runs, signal.signal(result)
//!        <───────────────────────────────┘
//!   result
//! ```
//!
//! Because the queue is FIFO with a single consumer, the signal cannot fire
//! before every command pushed earlier by the same caller has finished.
//!
//! Each pair is used exactly once, so overlapping blocking calls from
//! different threads never share a slot and cannot steal each other's wakeup.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{DispatchError, DispatchResult};

enum SlotState<R> {
    Pending,
    Ready(R),
    Abandoned,
}

struct Slot<R> {
    state: Mutex<SlotState<R>>,
    condvar: Condvar,
}

impl<R> Slot<R> {
    fn settle(&self, next: SlotState<R>) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending) {
            *state = next;
            self.condvar.notify_one();
        }
    }
}

/// Creates a connected one-shot pair.
#[must_use]
pub fn barrier<R>() -> (Signal<R>, Waiter<R>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        condvar: Condvar::new(),
    });
    (
        Signal {
            slot: Some(Arc::clone(&slot)),
        },
        Waiter { slot },
    )
}

/// Worker-side half. Consumed by [`signal`](Signal::signal).
///
/// Dropping it unsignalled abandons the barrier, so the waiter fails instead
/// of sleeping forever.
pub struct Signal<R> {
    slot: Option<Arc<Slot<R>>>,
}

impl<R> Signal<R> {
    /// Stores the result and wakes the waiter.
    pub fn signal(mut self, value: R) {
        if let Some(slot) = self.slot.take() {
            slot.settle(SlotState::Ready(value));
        }
    }
}

impl<R> Drop for Signal<R> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::debug!("barrier signal dropped without a result");
            slot.settle(SlotState::Abandoned);
        }
    }
}

impl<R> std::fmt::Debug for Signal<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("armed", &self.slot.is_some())
            .finish()
    }
}

/// Caller-side half.
pub struct Waiter<R> {
    slot: Arc<Slot<R>>,
}

impl<R> Waiter<R> {
    /// Blocks until the paired signal fires. No timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::BarrierAbandoned`] if the signal was dropped
    /// without a result.
    pub fn wait(self) -> DispatchResult<R> {
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Pending) {
            self.slot.condvar.wait(&mut state);
        }
        match std::mem::replace(&mut *state, SlotState::Abandoned) {
            SlotState::Ready(value) => Ok(value),
            SlotState::Pending | SlotState::Abandoned => Err(DispatchError::BarrierAbandoned),
        }
    }

    /// True once the signal fired or was abandoned. Never blocks.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !matches!(*self.slot.state.lock(), SlotState::Pending)
    }
}
