//! Alarm clock - one timer thread serving every handler's deadlines.
//!
//! The clock keeps its alarms sorted by next deadline and sleeps until the
//! earliest one. Adding an alarm that becomes the earliest, or removing one,
//! wakes the timer thread so it can recompute its sleep. Due alarms are
//! fired outside the clock's lock; periodic alarms are rescheduled to
//! `deadline + period`, one-shot alarms are dropped after firing.
//!
//! A callback may still run once for an alarm that is being removed
//! concurrently; callers that care must check their own state in the
//! callback (event handlers do).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, trace};

use crate::config::{truncate_thread_name, AlarmClockConfig};
use crate::error::{EventError, EventResult};

/// Unique identifier of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmId(u64);

impl AlarmId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AlarmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "alarm-{}", self.0)
    }
}

/// Callback run on the timer thread with the alarm and its deadline.
pub type AlarmCallback = Arc<dyn Fn(AlarmId, Instant) + Send + Sync>;

/// Shortest period accepted for a periodic alarm.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Deadline used when `from + period` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `from + period`, saturating to a far-future deadline.
fn deadline_after(from: Instant, period: Duration) -> Instant {
    from.checked_add(period)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

struct Alarm {
    id: AlarmId,
    deadline: Instant,
    period: Option<Duration>,
    callback: AlarmCallback,
}

impl Alarm {
    fn key(&self) -> (Instant, AlarmId) {
        (self.deadline, self.id)
    }
}

struct Firing {
    id: AlarmId,
    deadline: Instant,
    callback: AlarmCallback,
}

struct ClockState {
    /// Sorted by (deadline, id).
    alarms: Vec<Alarm>,
    /// Bumped on every stop; a timer thread exits once its generation is stale.
    generation: u64,
}

impl ClockState {
    /// Insert keeping the order; returns true when it became the earliest.
    fn insert(&mut self, alarm: Alarm) -> bool {
        let key = alarm.key();
        let pos = self.alarms.partition_point(|a| a.key() <= key);
        self.alarms.insert(pos, alarm);
        pos == 0
    }

    fn take_due(&mut self, now: Instant) -> Vec<Firing> {
        let split = self.alarms.partition_point(|a| a.deadline <= now);
        let due: Vec<Alarm> = self.alarms.drain(..split).collect();

        let mut firings = Vec::with_capacity(due.len());
        for mut alarm in due {
            firings.push(Firing {
                id: alarm.id,
                deadline: alarm.deadline,
                callback: alarm.callback.clone(),
            });
            if let Some(period) = alarm.period {
                let mut next = deadline_after(alarm.deadline, period);
                if next <= now {
                    // Fell behind; skip the missed periods instead of bursting.
                    let mut skipped = 0u32;
                    while next <= now {
                        let later = deadline_after(next, period);
                        if later == next {
                            break;
                        }
                        next = later;
                        skipped += 1;
                    }
                    debug!("Alarm {} skipped {} missed periods", alarm.id, skipped);
                }
                alarm.deadline = next;
                self.insert(alarm);
            }
        }
        firings
    }
}

/// Process-wide timer service.
pub struct AlarmClock {
    config: AlarmClockConfig,
    state: Mutex<ClockState>,
    changed: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

static GLOBAL: OnceLock<Arc<AlarmClock>> = OnceLock::new();

impl AlarmClock {
    /// Create a clock. Its timer thread is not running until started.
    pub fn new(config: AlarmClockConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(ClockState {
                alarms: Vec::new(),
                generation: 0,
            }),
            changed: Condvar::new(),
            worker: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// The shared clock, created with default configuration on first use.
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| AlarmClock::new(AlarmClockConfig::default()))
            .clone()
    }

    /// Create the shared clock with `config`.
    ///
    /// Returns false when the shared clock already exists; it keeps its
    /// initial configuration.
    pub fn configure_global(config: AlarmClockConfig) -> bool {
        GLOBAL.set(AlarmClock::new(config)).is_ok()
    }

    /// Start the timer thread unless it is already running.
    pub fn start(self: &Arc<Self>) -> EventResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        let generation = self.state.lock().generation;

        let clock = self.clone();
        let handle = thread::Builder::new()
            .name(truncate_thread_name(&self.config.thread_name))
            .stack_size(self.config.stack_size)
            .spawn(move || clock.run(generation))
            .map_err(|e| EventError::NotStarted(format!("alarm clock: {}", e)))?;
        *worker = Some(handle);

        info!("Alarm clock started ({})", self.config.thread_name);
        Ok(())
    }

    /// Stop the timer thread and wait for it to exit. Alarms are kept and
    /// resume firing on the next start.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        self.state.lock().generation += 1;
        self.changed.notify_all();

        // A callback stopping its own clock cannot join itself.
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
        drop(worker);
        info!("Alarm clock stopped ({})", self.config.thread_name);
    }

    /// Check if the timer thread is running.
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Add a periodic alarm first due one `period` from now.
    pub fn add_alarm_periodic(&self, callback: AlarmCallback, period: Duration) -> AlarmId {
        let period = period.max(MIN_PERIOD);
        self.add(callback, deadline_after(Instant::now(), period), Some(period))
    }

    /// Add a one-shot alarm due at `deadline`.
    pub fn add_alarm(&self, callback: AlarmCallback, deadline: Instant) -> AlarmId {
        self.add(callback, deadline, None)
    }

    fn add(&self, callback: AlarmCallback, deadline: Instant, period: Option<Duration>) -> AlarmId {
        let id = AlarmId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let earliest = self.state.lock().insert(Alarm {
            id,
            deadline,
            period,
            callback,
        });
        if earliest {
            self.changed.notify_one();
        }
        debug!("Alarm {} added (period: {:?})", id, period);
        id
    }

    /// Remove an alarm. Returns false if it was already gone.
    pub fn remove_alarm(&self, id: AlarmId) -> bool {
        let mut state = self.state.lock();
        let before = state.alarms.len();
        state.alarms.retain(|a| a.id != id);
        let removed = state.alarms.len() != before;
        drop(state);

        if removed {
            self.changed.notify_one();
            debug!("Alarm {} removed", id);
        }
        removed
    }

    /// Number of scheduled alarms.
    pub fn alarm_count(&self) -> usize {
        self.state.lock().alarms.len()
    }

    /// The earliest scheduled deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().alarms.first().map(|a| a.deadline)
    }

    fn run(&self, generation: u64) {
        let mut state = self.state.lock();
        while state.generation == generation {
            let due = state.take_due(Instant::now());
            if !due.is_empty() {
                MutexGuard::unlocked(&mut state, || {
                    for firing in due {
                        trace!("Alarm {} fired", firing.id);
                        (firing.callback)(firing.id, firing.deadline);
                    }
                });
                continue;
            }

            match state.alarms.first().map(|a| a.deadline) {
                Some(deadline) => {
                    self.changed.wait_until(&mut state, deadline);
                }
                None => self.changed.wait(&mut state),
            }
        }
    }
}

impl std::fmt::Debug for AlarmClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmClock")
            .field("thread_name", &self.config.thread_name)
            .field("alarms", &self.alarm_count())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
#[path = "alarm_tests.rs"]
mod tests;
