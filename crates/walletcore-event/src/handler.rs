//! Event handler - one worker thread draining one event queue.
//!
//! A handler owns a queue of its event type, a table of dispatchers and at
//! most one worker thread. Producers on any thread call
//! [`EventHandler::signal_event`] or [`EventHandler::signal_event_oob`]; the
//! worker dequeues and runs the registered dispatcher, optionally under a
//! caller-supplied dispatch lock shared with other handlers.
//!
//! ```text
//!  producers ──signal_event──────▶ ┌──────────────┐
//!  producers ──signal_event_oob──▶ │  EventQueue  │──dequeue_wait──▶ worker ──▶ dispatcher
//!  alarm clock ──timeout (OOB)───▶ └──────────────┘
//! ```
//!
//! Lifecycle: `create → start → stop → start → … → destroy`. `start` and
//! `stop` are idempotent. `stop` is cooperative: the event being dispatched
//! finishes, then the worker observes the queue abort and exits, and `stop`
//! discards whatever is still queued.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::alarm::{AlarmCallback, AlarmClock, AlarmId};
use crate::config::HandlerConfig;
use crate::error::{EventError, EventResult};
use crate::event::{Event, EventType, EventTypes, TimeoutEvent, TimeoutType, TIMEOUT_EVENT_NAME};
use crate::metrics::HandlerMetrics;
use crate::queue::EventQueue;

/// Lock held around every dispatch call; share one between handlers that
/// must never dispatch concurrently.
pub type DispatchLock = Arc<Mutex<()>>;

/// A queued record: the event plus the type that will process it.
enum Queued<E: Event> {
    Event {
        kind: Arc<EventType<E>>,
        event: E,
    },
    Timeout {
        kind: Arc<TimeoutType<E>>,
        event: TimeoutEvent,
    },
}

struct HandlerState<E: Event> {
    /// Worker identity; `Some` from spawn until the worker exits.
    thread: Option<ThreadId>,
    /// The worker has registered itself.
    started: bool,
    /// Number of worker exits, for stop to wait on.
    exits: u64,
    worker: Option<JoinHandle<()>>,
    timeout: Option<Arc<TimeoutType<E>>>,
    timeout_alarm: Option<AlarmId>,
    clock: Option<Arc<AlarmClock>>,
    /// A stop is pending; the exiting worker resets and clears the queue.
    stop_requested: bool,
}

struct Shared<E: Event> {
    config: HandlerConfig,
    types: EventTypes<E>,
    queue: EventQueue<Queued<E>>,
    dispatch_lock: Option<DispatchLock>,
    state: Mutex<HandlerState<E>>,
    /// Signalled when the worker registers and when it exits.
    thread_changed: Condvar,
    metrics: HandlerMetrics,
}

/// Handle to an event handler.
///
/// Handles are cheap to clone; every clone refers to the same handler. A
/// running worker keeps the handler alive, so a handler must be stopped (or
/// destroyed) to release it.
pub struct EventHandler<E: Event> {
    shared: Arc<Shared<E>>,
}

impl<E: Event> Clone for EventHandler<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<E: Event> EventHandler<E> {
    /// Create a stopped handler with default configuration.
    pub fn create(
        name: impl Into<String>,
        types: Vec<EventType<E>>,
        dispatch_lock: Option<DispatchLock>,
    ) -> Self {
        Self::with_config(HandlerConfig::new(name), types, dispatch_lock)
    }

    /// Create a stopped handler.
    pub fn with_config(
        config: HandlerConfig,
        types: Vec<EventType<E>>,
        dispatch_lock: Option<DispatchLock>,
    ) -> Self {
        let types = EventTypes::new(types);
        debug!(
            "Event handler {} created: {} types plus timeout, {} byte slots",
            config.name,
            types.len(),
            std::mem::size_of::<Queued<E>>()
        );

        let shared = Shared {
            queue: EventQueue::new(config.queue_capacity),
            config,
            types,
            dispatch_lock,
            state: Mutex::new(HandlerState {
                thread: None,
                started: false,
                exits: 0,
                worker: None,
                timeout: None,
                timeout_alarm: None,
                clock: None,
                stop_requested: false,
            }),
            thread_changed: Condvar::new(),
            metrics: HandlerMetrics::new(),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Use `clock` instead of the process-wide alarm clock.
    pub fn with_alarm_clock(self, clock: Arc<AlarmClock>) -> Self {
        self.shared.state.lock().clock = Some(clock);
        self
    }

    /// Get the handler name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Get the registered event types.
    pub fn event_types(&self) -> &EventTypes<E> {
        &self.shared.types
    }

    /// Get metrics.
    pub fn metrics(&self) -> &HandlerMetrics {
        &self.shared.metrics
    }

    /// Number of queued, undispatched events.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Size in bytes of one queued record, the largest event type included.
    pub fn event_slot_size(&self) -> usize {
        std::mem::size_of::<Queued<E>>()
    }

    /// Configure the periodic timeout.
    ///
    /// `dispatcher` runs on the worker thread with `context` each time the
    /// alarm fires. A new dispatcher applies to the next timeout delivered; a
    /// new interval applies from the next `start`.
    pub fn set_timeout_dispatcher<C, F>(&self, interval: Duration, dispatcher: F, context: C)
    where
        C: Send + Sync + 'static,
        F: Fn(&EventHandler<E>, &TimeoutEvent, &C) + Send + Sync + 'static,
    {
        let kind = TimeoutType::new(
            interval,
            Box::new(move |handler, event| dispatcher(handler, event, &context)),
        );
        self.shared.state.lock().timeout = Some(Arc::new(kind));
        debug!("Event handler {}: timeout every {:?}", self.name(), interval);
    }

    /// Start the worker thread. Events queued while stopped are dispatched
    /// in order.
    pub fn start(&self) -> EventResult<()> {
        let clock = self
            .shared
            .state
            .lock()
            .clock
            .get_or_insert_with(AlarmClock::global)
            .clone();
        clock.start()?;

        let mut state = self.shared.state.lock();
        if state.thread.is_some() {
            return Ok(());
        }

        // Reap a worker that exited without a waiting stop.
        if let Some(stale) = state.worker.take() {
            let _ = stale.join();
        }
        // A new worker never inherits an abort.
        self.shared.queue.dequeue_wait_abort_reset();
        state.stop_requested = false;

        if let Some(timeout) = state.timeout.clone() {
            let alarm = clock.add_alarm_periodic(self.alarm_callback(), timeout.interval);
            state.timeout_alarm = Some(alarm);
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(self.shared.config.thread_name())
            .stack_size(self.shared.config.stack_size)
            .spawn(move || run_worker(shared));
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                if let Some(alarm) = state.timeout_alarm.take() {
                    clock.remove_alarm(alarm);
                }
                error!("Event handler {}: worker spawn failed: {}", self.name(), e);
                return Err(EventError::NotStarted(format!("{}: {}", self.name(), e)));
            }
        };

        state.thread = Some(worker.thread().id());
        state.started = false;
        state.worker = Some(worker);

        // Return only once the worker has registered itself.
        while !state.started && state.thread.is_some() {
            self.shared.thread_changed.wait(&mut state);
        }
        drop(state);

        self.shared.metrics.record_start();
        info!("Event handler {} started", self.name());
        Ok(())
    }

    /// Stop the worker thread and discard pending events.
    ///
    /// Blocks until the worker has exited. Called from one of this handler's
    /// own dispatchers, it cannot wait for itself: it requests the stop and
    /// returns, and the worker exits after the current event.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        let Some(thread) = state.thread else {
            return;
        };

        // No new timeouts from here on.
        if let Some(alarm) = state.timeout_alarm.take() {
            if let Some(clock) = &state.clock {
                clock.remove_alarm(alarm);
            }
        }

        // The exiting worker resets the abort and clears the queue.
        state.stop_requested = true;
        self.shared.queue.dequeue_wait_abort();

        if thread == thread::current().id() {
            warn!(
                "Event handler {}: stop requested from its own worker; exiting after this event",
                self.name()
            );
            return;
        }

        // The lock is released while waiting so a dispatcher that needs it
        // can finish.
        let exits = state.exits;
        while state.exits == exits {
            self.shared.thread_changed.wait(&mut state);
        }

        // A concurrent start has already reaped the old worker.
        if state.thread.is_none() {
            if let Some(worker) = state.worker.take() {
                let _ = worker.join();
            }
        }
    }

    /// Stop the handler and release it.
    ///
    /// # Panics
    ///
    /// Panics if the worker is still registered after stopping, which
    /// happens when called from one of this handler's own dispatchers.
    pub fn destroy(self) {
        self.stop();
        let state = self.shared.state.lock();
        assert!(
            state.thread.is_none(),
            "event handler {} destroyed with a live worker",
            self.shared.config.name
        );
        drop(state);
        debug!("Event handler {} destroyed", self.shared.config.name);
    }

    /// Queue an event at the tail.
    pub fn signal_event(&self, event: E) -> EventResult<()> {
        let kind = self.resolve(&event)?;
        self.shared.queue.enqueue_tail(Queued::Event { kind, event });
        self.shared.metrics.record_enqueued();
        Ok(())
    }

    /// Queue an event at the head, ahead of everything already queued.
    pub fn signal_event_oob(&self, event: E) -> EventResult<()> {
        let kind = self.resolve(&event)?;
        self.shared.queue.enqueue_head(Queued::Event { kind, event });
        self.shared.metrics.record_enqueued_oob();
        Ok(())
    }

    /// Check if the worker thread is running.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().thread.is_some()
    }

    /// Check if the caller is running on this handler's worker thread.
    pub fn is_current_thread(&self) -> bool {
        self.shared.state.lock().thread == Some(thread::current().id())
    }

    /// Discard pending events without dispatching them. Returns how many
    /// were dropped.
    pub fn clear(&self) -> usize {
        let cleared = self.shared.queue.clear();
        if cleared > 0 {
            self.shared.metrics.record_cleared(cleared);
            debug!("Event handler {}: cleared {} events", self.name(), cleared);
        }
        cleared
    }

    fn resolve(&self, event: &E) -> EventResult<Arc<EventType<E>>> {
        self.shared.types.resolve(event).inspect_err(|e| {
            error!("Event handler {}: {}", self.name(), e);
        })
    }

    fn alarm_callback(&self) -> AlarmCallback {
        let shared: Weak<Shared<E>> = Arc::downgrade(&self.shared);
        Arc::new(move |alarm, deadline| {
            if let Some(shared) = shared.upgrade() {
                EventHandler { shared }.signal_timeout(alarm, deadline);
            }
        })
    }

    /// Called on the timer thread.
    fn signal_timeout(&self, alarm: AlarmId, deadline: Instant) {
        let state = self.shared.state.lock();
        // A stop removed this alarm while it was firing.
        if state.timeout_alarm != Some(alarm) {
            return;
        }
        let Some(kind) = state.timeout.clone() else {
            return;
        };
        // Enqueue under the handler lock so a concurrent stop clears it.
        self.shared.queue.enqueue_head(Queued::Timeout {
            kind,
            event: TimeoutEvent::new(alarm, deadline),
        });
        drop(state);
        self.shared.metrics.record_enqueued_oob();
    }

    fn dispatch_loop(&self) {
        loop {
            match self.shared.queue.dequeue_wait() {
                Ok(queued) => self.dispatch(queued),
                Err(EventError::WaitAbort) => break,
                Err(EventError::WaitError(reason)) => {
                    trace!("Event handler {}: wait retried: {}", self.name(), reason);
                }
                Err(other) => panic!(
                    "event handler {}: queue returned {} to the dispatch loop",
                    self.name(),
                    other.status()
                ),
            }
        }
    }

    fn dispatch(&self, queued: Queued<E>) {
        let _guard = self.shared.dispatch_lock.as_ref().map(|lock| lock.lock());
        let started = Instant::now();
        match queued {
            Queued::Event { kind, event } => {
                trace!("Event handler {}: dispatching {}", self.name(), kind.name());
                kind.dispatch(self, event);
                self.shared
                    .metrics
                    .record_dispatched(started.elapsed().as_micros() as u64);
            }
            Queued::Timeout { kind, event } => {
                trace!("Event handler {}: dispatching {}", self.name(), TIMEOUT_EVENT_NAME);
                kind.dispatch(self, &event);
                self.shared
                    .metrics
                    .record_timeout(started.elapsed().as_micros() as u64);
            }
        }
    }
}

impl<E: Event> std::fmt::Debug for EventHandler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("name", &self.shared.config.name)
            .field("types", &self.shared.types)
            .field("pending", &self.shared.queue.len())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Worker thread body.
fn run_worker<E: Event>(shared: Arc<Shared<E>>) {
    {
        let mut state = shared.state.lock();
        let current = thread::current().id();
        if state.thread.is_none() {
            state.thread = Some(current);
        }
        state.started = true;
        shared.thread_changed.notify_all();
    }

    let handler = EventHandler { shared };
    let _exit = WorkerExit {
        handler: &handler,
    };
    handler.dispatch_loop();
}

/// Unregisters the worker when the dispatch loop ends, including by panic.
struct WorkerExit<'a, E: Event> {
    handler: &'a EventHandler<E>,
}

impl<E: Event> Drop for WorkerExit<'_, E> {
    fn drop(&mut self) {
        let shared = &self.handler.shared;
        if thread::panicking() {
            error!("Event handler {}: dispatcher panicked", shared.config.name);
        }

        let mut state = shared.state.lock();
        if std::mem::take(&mut state.stop_requested) {
            // Finish the stop before the worker slot empties, so a start
            // racing a waiting stop finds a clean queue.
            shared.queue.dequeue_wait_abort_reset();
            self.handler.clear();
            shared.metrics.record_stop();
            info!("Event handler {} stopped", shared.config.name);
        }

        state.thread = None;
        state.started = false;
        state.exits += 1;
        shared.thread_changed.notify_all();
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
