//! # walletcore-event
//!
//! Event dispatch for the long-lived subsystems of a wallet process.
//!
//! Each subsystem (wallet manager, peer manager, ...) owns an
//! [`EventHandler`]: a worker thread draining its own [`EventQueue`] and
//! running the dispatcher registered for each event's type. Any thread may
//! signal events; only the worker consumes them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        AlarmClock (one thread)                       │
//! │   sorted alarms ── periodic timeout per handler ── enqueue at head   │
//! └───────────────┬─────────────────────────────────┬───────────────────┘
//!                 │                                 │
//! ┌───────────────▼───────────────┐ ┌───────────────▼───────────────────┐
//! │   EventHandler "wallet"       │ │   EventHandler "peers"            │
//! │   EventQueue ─▶ worker thread │ │   EventQueue ─▶ worker thread     │
//! │   EventTypes: name → closure  │ │   EventTypes: name → closure      │
//! └───────────────┬───────────────┘ └───────────────┬───────────────────┘
//!                 └──────── optional DispatchLock ───┘
//! ```
//!
//! ## Key Components
//!
//! - [`EventQueue`]: FIFO with out-of-band head insertion and abortable waits
//! - [`EventHandler`]: worker lifecycle, signalling and dispatch
//! - [`EventType`] / [`EventTypes`]: per-handler dispatcher registry
//! - [`AlarmClock`]: shared timer thread behind handler timeouts
//! - [`HandlerMetrics`]: counters for queue and dispatch activity
//! - [`EventsConfig`] / [`ConfigLoader`]: TOML configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use walletcore_event::{Event, EventHandler, EventType};
//!
//! enum WalletEvent {
//!     Balance(u64),
//! }
//!
//! impl Event for WalletEvent {
//!     fn type_name(&self) -> &'static str {
//!         "Balance"
//!     }
//! }
//!
//! let handler = EventHandler::create(
//!     "wallet",
//!     vec![EventType::new("Balance", |_, event: WalletEvent| {
//!         let WalletEvent::Balance(amount) = event;
//!         println!("balance: {}", amount);
//!     })],
//!     None,
//! );
//! handler.set_timeout_dispatcher(Duration::from_secs(1), |_, _, _: &()| {}, ());
//! handler.start().unwrap();
//! handler.signal_event(WalletEvent::Balance(42)).unwrap();
//! handler.destroy();
//! ```

pub mod alarm;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod metrics;
pub mod queue;

// Re-exports
pub use alarm::{AlarmCallback, AlarmClock, AlarmId};
pub use config::{AlarmClockConfig, ConfigLoader, EventsConfig, HandlerConfig};
pub use error::{ConfigError, EventError, EventResult, EventStatus};
pub use event::{Event, EventType, EventTypes, TimeoutEvent, TIMEOUT_EVENT_NAME};
pub use handler::{DispatchLock, EventHandler};
pub use metrics::{HandlerMetrics, MetricsSnapshot};
pub use queue::EventQueue;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
