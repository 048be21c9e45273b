//! Event types and the per-handler type registry.
//!
//! A handler works over one closed set of events, usually an enum. Each
//! variant is registered under a name together with the closure that
//! processes it; the registry is built once when the handler is created
//! and is read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::alarm::AlarmId;
use crate::error::{EventError, EventResult};
use crate::handler::EventHandler;

/// Name of the implicit timeout event type every handler carries.
pub const TIMEOUT_EVENT_NAME: &str = "Timeout Event";

/// An event that can be queued on an [`EventHandler`].
pub trait Event: Send + 'static {
    /// Name of the registered [`EventType`] this event belongs to.
    fn type_name(&self) -> &'static str;
}

/// Closure invoked on the handler's worker thread for each event of a type.
pub type Dispatcher<E> = dyn Fn(&EventHandler<E>, E) + Send + Sync;

/// Closure invoked on the handler's worker thread for each timeout.
pub type TimeoutDispatcher<E> = dyn Fn(&EventHandler<E>, &TimeoutEvent) + Send + Sync;

/// Immutable descriptor of one event variant.
pub struct EventType<E: Event> {
    name: &'static str,
    dispatcher: Box<Dispatcher<E>>,
}

impl<E: Event> EventType<E> {
    /// Create a descriptor that routes events named `name` to `dispatcher`.
    pub fn new<F>(name: &'static str, dispatcher: F) -> Self
    where
        F: Fn(&EventHandler<E>, E) + Send + Sync + 'static,
    {
        Self {
            name,
            dispatcher: Box::new(dispatcher),
        }
    }

    /// Get the type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn dispatch(&self, handler: &EventHandler<E>, event: E) {
        (self.dispatcher)(handler, event)
    }
}

impl<E: Event> std::fmt::Debug for EventType<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventType").field("name", &self.name).finish()
    }
}

/// The synthetic event delivered when a handler's periodic alarm fires.
#[derive(Debug, Clone)]
pub struct TimeoutEvent {
    /// Alarm that produced this event.
    pub alarm: AlarmId,

    /// Monotonic deadline the alarm was scheduled for.
    pub deadline: Instant,

    /// Wall-clock time corresponding to `deadline`.
    pub expiration: DateTime<Utc>,
}

impl TimeoutEvent {
    pub(crate) fn new(alarm: AlarmId, deadline: Instant) -> Self {
        // Project the monotonic deadline onto the wall clock.
        let late = Instant::now().saturating_duration_since(deadline);
        let expiration = Utc::now()
            - chrono::Duration::from_std(late).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            alarm,
            deadline,
            expiration,
        }
    }
}

/// The handler's timeout type: its dispatcher and period.
pub(crate) struct TimeoutType<E: Event> {
    pub(crate) interval: Duration,
    dispatcher: Box<TimeoutDispatcher<E>>,
}

impl<E: Event> TimeoutType<E> {
    pub(crate) fn new(interval: Duration, dispatcher: Box<TimeoutDispatcher<E>>) -> Self {
        Self {
            interval,
            dispatcher,
        }
    }

    pub(crate) fn dispatch(&self, handler: &EventHandler<E>, event: &TimeoutEvent) {
        (self.dispatcher)(handler, event)
    }
}

/// Read-only table of the event types registered with one handler.
pub struct EventTypes<E: Event> {
    types: HashMap<&'static str, Arc<EventType<E>>>,
}

impl<E: Event> EventTypes<E> {
    /// Build the table. The first registration of a name wins.
    pub fn new(types: Vec<EventType<E>>) -> Self {
        let mut table = HashMap::with_capacity(types.len());
        for event_type in types {
            if table.contains_key(event_type.name) {
                warn!("Duplicate event type {} ignored", event_type.name);
                continue;
            }
            table.insert(event_type.name, Arc::new(event_type));
        }
        Self { types: table }
    }

    /// Look up the type an event belongs to.
    pub fn resolve(&self, event: &E) -> EventResult<Arc<EventType<E>>> {
        let name = event.type_name();
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| EventError::UnknownType(name.to_string()))
    }

    /// Check whether a type name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of registered types, not counting the implicit timeout type.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<E: Event> std::fmt::Debug for EventTypes<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTypes")
            .field("types", &self.names())
            .finish()
    }
}
