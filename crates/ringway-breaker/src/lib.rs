//! Per-backend circuit breakers keyed by [`BackendId`].
//!
//! Each tracked backend owns an independent circuit state machine:
//!
//! - **Closed**: calls pass through; outcomes land in a bounded FIFO window
//! - **Open**: calls are rejected until the cooldown elapses
//! - **Half-open**: a bounded number of trial calls probe recovery
//!
//! There is no background timer: the OPEN→HALF_OPEN transition happens
//! lazily on access, inside the same per-backend critical section as outcome
//! recording, so the two can never race. Circuits for different backends
//! live in separate shards of the registry map and never contend on a
//! single global lock.
//!
//! ```
//! use std::time::Duration;
//! use ringway_breaker::{BreakerConfig, CircuitState, HealthRegistry};
//! use ringway_core::BackendId;
//!
//! let config = BreakerConfig::builder()
//!     .failure_rate_threshold(0.5)
//!     .window_size(10)
//!     .cooldown(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//!
//! let health = HealthRegistry::new(config);
//! let id = BackendId::new("api-1");
//! health.track(id.clone());
//!
//! assert!(health.is_available(&id));
//! for _ in 0..5 {
//!     health.record_outcome(&id, false);
//! }
//! assert_eq!(health.state(&id), Some(CircuitState::Open));
//! assert!(!health.is_available(&id));
//! ```
//!
//! ## Feature Flags
//! - `metrics`: transition/rejection/outcome counters via the `metrics` crate
//! - `tracing`: state transitions logged via the `tracing` crate

use dashmap::DashMap;
use ringway_core::BackendId;

mod circuit;
mod config;
mod error;
mod events;

pub use circuit::{CircuitSnapshot, CircuitState};
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use error::ConfigError;
pub use events::BreakerEvent;

use circuit::Circuit;

/// Circuit breaker state for a pool of backends.
///
/// One [`Circuit`] per tracked backend, stored in a sharded map so that
/// availability checks and outcome recording for unrelated backends do not
/// serialize on each other. Per-backend transitions are linearized by the
/// map's entry lock.
///
/// Events are emitted after the entry lock is released, so a listener may
/// call back into this registry (for the same backend included) without
/// deadlocking.
#[derive(Debug)]
pub struct HealthRegistry {
    circuits: DashMap<BackendId, Circuit>,
    config: BreakerConfig,
}

impl HealthRegistry {
    /// Creates an empty registry; all circuits share `config`.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            circuits: DashMap::new(),
            config,
        }
    }

    /// Starts tracking a backend with a fresh closed circuit.
    ///
    /// Tracking an already-tracked backend keeps its existing circuit.
    pub fn track(&self, id: BackendId) {
        self.circuits.entry(id).or_insert_with(Circuit::new);
    }

    /// Stops tracking a backend, discarding its circuit.
    ///
    /// Returns false if the backend was not tracked.
    pub fn forget(&self, id: &BackendId) -> bool {
        self.circuits.remove(id).is_some()
    }

    /// True iff a call may be dispatched to this backend right now.
    ///
    /// Closed circuits always permit; half-open circuits permit while trial
    /// slots remain, and an affirmative answer consumes one slot. Callers
    /// must report the outcome of every dispatched call exactly once via
    /// [`HealthRegistry::record_outcome`]. Unknown backends are unavailable.
    pub fn is_available(&self, id: &BackendId) -> bool {
        let (permitted, pending) = match self.circuits.get_mut(id) {
            Some(mut circuit) => {
                let permitted = circuit.try_acquire(&self.config, id);
                (permitted, circuit.drain_events())
            }
            None => (false, Vec::new()),
        };
        self.emit_pending(pending);
        permitted
    }

    /// Feeds one call outcome into a backend's circuit.
    ///
    /// Outcomes for untracked backends (e.g., reported after deregistration)
    /// are dropped.
    pub fn record_outcome(&self, id: &BackendId, success: bool) {
        let pending = match self.circuits.get_mut(id) {
            Some(mut circuit) => {
                circuit.record_outcome(&self.config, id, success);
                circuit.drain_events()
            }
            None => Vec::new(),
        };
        self.emit_pending(pending);
    }

    /// Current state of a backend's circuit, applying any pending lazy
    /// timer transition.
    pub fn state(&self, id: &BackendId) -> Option<CircuitState> {
        let (state, pending) = match self.circuits.get_mut(id) {
            Some(mut circuit) => {
                let state = circuit.state(&self.config, id);
                (Some(state), circuit.drain_events())
            }
            None => (None, Vec::new()),
        };
        self.emit_pending(pending);
        state
    }

    /// Point-in-time view of one circuit.
    pub fn snapshot(&self, id: &BackendId) -> Option<CircuitSnapshot> {
        let (snapshot, pending) = match self.circuits.get_mut(id) {
            Some(mut circuit) => {
                let snapshot = circuit.snapshot(&self.config, id);
                (Some(snapshot), circuit.drain_events())
            }
            None => (None, Vec::new()),
        };
        self.emit_pending(pending);
        snapshot
    }

    /// States of every tracked circuit, for dashboards.
    pub fn states(&self) -> Vec<(BackendId, CircuitState)> {
        let mut pending = Vec::new();
        let states: Vec<_> = self
            .circuits
            .iter_mut()
            .map(|mut entry| {
                let id = entry.key().clone();
                let state = entry.value_mut().state(&self.config, &id);
                pending.extend(entry.value_mut().drain_events());
                (id, state)
            })
            .collect();
        self.emit_pending(pending);
        states
    }

    /// Forces a backend's circuit open.
    pub fn force_open(&self, id: &BackendId) {
        let pending = match self.circuits.get_mut(id) {
            Some(mut circuit) => {
                circuit.force_open(&self.config, id);
                circuit.drain_events()
            }
            None => Vec::new(),
        };
        self.emit_pending(pending);
    }

    /// Forces a backend's circuit closed.
    pub fn force_closed(&self, id: &BackendId) {
        let pending = match self.circuits.get_mut(id) {
            Some(mut circuit) => {
                circuit.force_closed(&self.config, id);
                circuit.drain_events()
            }
            None => Vec::new(),
        };
        self.emit_pending(pending);
    }

    /// Resets a backend's circuit to closed with a cleared window.
    pub fn reset(&self, id: &BackendId) {
        let pending = match self.circuits.get_mut(id) {
            Some(mut circuit) => {
                circuit.reset(&self.config, id);
                circuit.drain_events()
            }
            None => Vec::new(),
        };
        self.emit_pending(pending);
    }

    /// Emits events collected under an entry lock, which by now has been
    /// released.
    fn emit_pending(&self, events: Vec<BreakerEvent>) {
        for event in &events {
            self.config.event_listeners.emit(event);
        }
    }

    /// Number of tracked backends.
    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    /// True if no backends are tracked.
    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> HealthRegistry {
        let config = BreakerConfig::builder()
            .failure_rate_threshold(0.5)
            .window_size(10)
            .cooldown(Duration::from_millis(20))
            .required_successes(2)
            .trial_budget(2)
            .build()
            .unwrap();
        HealthRegistry::new(config)
    }

    #[test]
    fn full_recovery_cycle() {
        let health = registry();
        let id = BackendId::new("api-1");
        health.track(id.clone());

        // 5 failures over a 10-slot window trips the breaker.
        for _ in 0..5 {
            health.record_outcome(&id, false);
        }
        assert_eq!(health.state(&id), Some(CircuitState::Open));
        assert!(!health.is_available(&id));

        // After the cooldown the circuit probes recovery.
        std::thread::sleep(Duration::from_millis(30));
        assert!(health.is_available(&id));
        assert_eq!(health.state(&id), Some(CircuitState::HalfOpen));

        // Two successes close it; the window starts fresh.
        health.record_outcome(&id, true);
        assert!(health.is_available(&id));
        health.record_outcome(&id, true);
        assert_eq!(health.state(&id), Some(CircuitState::Closed));
        assert_eq!(health.snapshot(&id).unwrap().window_len, 0);
    }

    #[test]
    fn backends_are_independent() {
        let health = registry();
        let good = BackendId::new("good");
        let bad = BackendId::new("bad");
        health.track(good.clone());
        health.track(bad.clone());

        for _ in 0..10 {
            health.record_outcome(&bad, false);
            health.record_outcome(&good, true);
        }

        assert_eq!(health.state(&bad), Some(CircuitState::Open));
        assert_eq!(health.state(&good), Some(CircuitState::Closed));
        assert!(health.is_available(&good));
        assert!(!health.is_available(&bad));
    }

    #[test]
    fn unknown_backends_are_unavailable() {
        let health = registry();
        let id = BackendId::new("ghost");
        assert!(!health.is_available(&id));
        assert_eq!(health.state(&id), None);
        // Dropped silently.
        health.record_outcome(&id, true);
    }

    #[test]
    fn forget_discards_circuit_state() {
        let health = registry();
        let id = BackendId::new("api-1");
        health.track(id.clone());
        for _ in 0..10 {
            health.record_outcome(&id, false);
        }
        assert_eq!(health.state(&id), Some(CircuitState::Open));

        assert!(health.forget(&id));
        assert!(!health.forget(&id));

        // Re-tracking starts from a clean closed circuit.
        health.track(id.clone());
        assert_eq!(health.state(&id), Some(CircuitState::Closed));
        assert!(health.is_available(&id));
    }

    #[test]
    fn track_is_idempotent() {
        let health = registry();
        let id = BackendId::new("api-1");
        health.track(id.clone());
        for _ in 0..5 {
            health.record_outcome(&id, false);
        }
        health.track(id.clone());
        // Existing circuit state is preserved.
        assert_eq!(health.state(&id), Some(CircuitState::Open));
        assert_eq!(health.len(), 1);
    }

    #[test]
    fn states_reports_every_tracked_backend() {
        let health = registry();
        health.track(BackendId::new("a"));
        health.track(BackendId::new("b"));

        let mut states = health.states();
        states.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|(_, s)| *s == CircuitState::Closed));
    }

    #[test]
    fn transition_listener_fires() {
        let transitions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&transitions);
        let config = BreakerConfig::builder()
            .failure_rate_threshold(0.5)
            .window_size(4)
            .on_state_transition(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let health = HealthRegistry::new(config);
        let id = BackendId::new("api-1");
        health.track(id.clone());
        for _ in 0..2 {
            health.record_outcome(&id, false);
        }
        assert_eq!(transitions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transition_listener_may_reenter_the_registry() {
        use std::sync::{Mutex, OnceLock};

        let slot: Arc<OnceLock<Arc<HealthRegistry>>> = Arc::new(OnceLock::new());
        let reentered: Arc<Mutex<Option<CircuitState>>> = Arc::new(Mutex::new(None));

        let registry_slot = Arc::clone(&slot);
        let seen = Arc::clone(&reentered);
        let config = BreakerConfig::builder()
            .failure_rate_threshold(0.5)
            .window_size(4)
            .on_state_transition(move |backend, _, _| {
                // A dashboard-style listener looking the circuit back up.
                if let Some(health) = registry_slot.get() {
                    *seen.lock().unwrap() = health.state(&BackendId::new(backend));
                }
            })
            .build()
            .unwrap();

        let health = Arc::new(HealthRegistry::new(config));
        slot.set(Arc::clone(&health)).expect("slot is set once");

        let id = BackendId::new("api-1");
        health.track(id.clone());
        for _ in 0..2 {
            health.record_outcome(&id, false);
        }

        // record_outcome returned instead of deadlocking, and the listener
        // observed the post-transition state.
        assert_eq!(*reentered.lock().unwrap(), Some(CircuitState::Open));
    }
}
