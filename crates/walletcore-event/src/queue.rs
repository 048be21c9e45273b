//! Blocking event queue with head insertion and an abort signal.
//!
//! Producers on any thread append at the tail, or prepend at the head for
//! out-of-band events. A single consumer blocks in [`EventQueue::dequeue_wait`]
//! until an event arrives or an abort is requested. Abort is two-phase: once
//! requested it stays set, so every wait returns immediately, until
//! [`EventQueue::dequeue_wait_abort_reset`] clears it. Reset only after the
//! aborted consumer has exited, or a fresh wait may swallow a stale abort.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{EventError, EventResult};

struct QueueState<T> {
    events: VecDeque<T>,
    abort: bool,
}

/// Single-consumer blocking queue.
pub struct EventQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> EventQueue<T> {
    /// Create an empty queue with room for `capacity` events before growing.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(capacity),
                abort: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append an event at the tail.
    pub fn enqueue_tail(&self, event: T) {
        let mut state = self.state.lock();
        state.events.push_back(event);
        drop(state);
        self.available.notify_one();
    }

    /// Prepend an event at the head; it is the next one dequeued.
    pub fn enqueue_head(&self, event: T) {
        let mut state = self.state.lock();
        state.events.push_front(event);
        drop(state);
        self.available.notify_one();
    }

    /// Block until an event is available or an abort is requested.
    ///
    /// An abort takes precedence over pending events and leaves them queued.
    pub fn dequeue_wait(&self) -> EventResult<T> {
        let mut state = self.state.lock();
        loop {
            if state.abort {
                return Err(EventError::WaitAbort);
            }
            if let Some(event) = state.events.pop_front() {
                return Ok(event);
            }
            self.available.wait(&mut state);
        }
    }

    /// Like [`dequeue_wait`](Self::dequeue_wait), but give up after `timeout`.
    ///
    /// Returns `WaitError` when the time elapses with neither an event nor an
    /// abort; callers are expected to retry.
    pub fn dequeue_wait_timeout(&self, timeout: Duration) -> EventResult<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.abort {
                return Err(EventError::WaitAbort);
            }
            if let Some(event) = state.events.pop_front() {
                return Ok(event);
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                // One last look; the producer may have raced the timeout.
                if state.abort {
                    return Err(EventError::WaitAbort);
                }
                return state.events.pop_front().ok_or_else(|| {
                    EventError::WaitError(format!("no event within {:?}", timeout))
                });
            }
        }
    }

    /// Take the head event without blocking.
    pub fn try_dequeue(&self) -> EventResult<T> {
        self.state
            .lock()
            .events
            .pop_front()
            .ok_or(EventError::NonePending)
    }

    /// Wake every blocked consumer with `WaitAbort`. Idempotent.
    pub fn dequeue_wait_abort(&self) {
        let mut state = self.state.lock();
        state.abort = true;
        drop(state);
        self.available.notify_all();
        trace!("Event queue abort requested");
    }

    /// Clear a previous abort so waits block normally again.
    pub fn dequeue_wait_abort_reset(&self) {
        self.state.lock().abort = false;
    }

    /// Check whether an abort is outstanding.
    pub fn is_aborted(&self) -> bool {
        self.state.lock().abort
    }

    /// Discard all pending events. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        // Drop the events outside the lock; their destructors may be arbitrary.
        let drained: Vec<T> = self.state.lock().events.drain(..).collect();
        drained.len()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Check if no events are pending.
    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> std::fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventQueue")
            .field("pending", &state.events.len())
            .field("abort", &state.abort)
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
