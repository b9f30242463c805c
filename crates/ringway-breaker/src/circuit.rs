use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;
use ringway_core::BackendId;

use crate::config::BreakerConfig;
use crate::events::BreakerEvent;

/// State of one backend's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through; failures are counted in the sliding window.
    Closed = 0,
    /// Calls are rejected immediately until the cooldown elapses.
    Open = 1,
    /// A limited number of trial calls probe whether the backend recovered.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of one circuit, for health endpoints and dashboards.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    /// Outcomes currently held in the window.
    pub window_len: usize,
    /// Failures among them.
    pub failure_count: usize,
    /// Failure ratio against the full window capacity.
    pub failure_rate: f64,
    pub time_since_state_change: Duration,
}

/// Per-backend circuit breaker state machine.
///
/// All methods are called with exclusive access to the circuit (the health
/// registry holds one entry lock per backend), and every method folds the
/// lazy timer check into the same critical section, so an OPEN→HALF_OPEN
/// transition can never race an outcome being recorded.
///
/// Events are not emitted here: they accumulate in `pending` and the
/// registry emits them after releasing the entry lock, so a listener may
/// call back into the registry without deadlocking.
#[derive(Debug)]
pub(crate) struct Circuit {
    state: CircuitState,
    last_state_change: Instant,
    /// Bounded FIFO of recent outcomes; `true` marks a failure.
    window: VecDeque<bool>,
    failures: usize,
    /// Half-open trial slots handed out and not yet resolved.
    trials_in_flight: usize,
    trial_successes: usize,
    /// Events produced under the entry lock, awaiting emission.
    pending: Vec<BreakerEvent>,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            last_state_change: Instant::now(),
            window: VecDeque::new(),
            failures: 0,
            trials_in_flight: 0,
            trial_successes: 0,
            pending: Vec::new(),
        }
    }

    /// Takes the events accumulated since the last drain. The caller must
    /// emit them after dropping its exclusive access to this circuit.
    pub(crate) fn drain_events(&mut self) -> Vec<BreakerEvent> {
        std::mem::take(&mut self.pending)
    }

    fn push_event(&mut self, config: &BreakerConfig, event: BreakerEvent) {
        if !config.event_listeners.is_empty() {
            self.pending.push(event);
        }
    }

    pub(crate) fn state(&mut self, config: &BreakerConfig, id: &BackendId) -> CircuitState {
        self.tick(config, id);
        self.state
    }

    pub(crate) fn snapshot(&mut self, config: &BreakerConfig, id: &BackendId) -> CircuitSnapshot {
        self.tick(config, id);
        CircuitSnapshot {
            state: self.state,
            window_len: self.window.len(),
            failure_count: self.failures,
            failure_rate: self.failure_rate(config),
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Lazy clock: applies any transition that a timer would have made.
    fn tick(&mut self, config: &BreakerConfig, id: &BackendId) {
        match self.state {
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.cooldown {
                    self.transition_to(CircuitState::HalfOpen, config, id);
                }
            }
            CircuitState::HalfOpen => {
                // Trials that never resolve (caller crashed, outcome lost)
                // would otherwise pin the circuit half-open forever.
                if let Some(max) = config.half_open_max_duration {
                    if self.last_state_change.elapsed() >= max {
                        self.transition_to(CircuitState::Open, config, id);
                    }
                }
            }
            CircuitState::Closed => {}
        }
    }

    /// Availability check with half-open side effect.
    ///
    /// In the half-open state an affirmative answer consumes one trial slot;
    /// the caller is contractually required to report the outcome of the
    /// dispatched call exactly once via [`Circuit::record_outcome`].
    pub(crate) fn try_acquire(&mut self, config: &BreakerConfig, id: &BackendId) -> bool {
        self.tick(config, id);
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                self.emit_rejected(config, id);
                false
            }
            CircuitState::HalfOpen => {
                if self.trials_in_flight < config.trial_budget {
                    self.trials_in_flight += 1;
                    self.push_event(
                        config,
                        BreakerEvent::TrialPermitted {
                            backend: id.clone(),
                            timestamp: Instant::now(),
                        },
                    );
                    true
                } else {
                    self.emit_rejected(config, id);
                    false
                }
            }
        }
    }

    pub(crate) fn record_outcome(&mut self, config: &BreakerConfig, id: &BackendId, success: bool) {
        self.tick(config, id);

        self.push_event(
            config,
            BreakerEvent::OutcomeRecorded {
                backend: id.clone(),
                timestamp: Instant::now(),
                success,
                state: self.state,
            },
        );

        #[cfg(feature = "metrics")]
        counter!(
            "ringway_breaker_outcomes_total",
            "backend" => id.to_string(),
            "outcome" => if success { "success" } else { "failure" },
        )
        .increment(1);

        match self.state {
            CircuitState::Closed => {
                self.push_outcome(config, success);
                if self.failure_rate(config) >= config.failure_rate_threshold {
                    self.transition_to(CircuitState::Open, config, id);
                }
            }
            CircuitState::HalfOpen => {
                self.trials_in_flight = self.trials_in_flight.saturating_sub(1);
                if success {
                    self.trial_successes += 1;
                    if self.trial_successes >= config.required_successes {
                        self.transition_to(CircuitState::Closed, config, id);
                    }
                } else {
                    self.transition_to(CircuitState::Open, config, id);
                }
            }
            CircuitState::Open => {
                // A call dispatched before the circuit opened may report
                // late; the circuit is already degraded, so drop it.
            }
        }
    }

    pub(crate) fn force_open(&mut self, config: &BreakerConfig, id: &BackendId) {
        self.transition_to(CircuitState::Open, config, id);
    }

    pub(crate) fn force_closed(&mut self, config: &BreakerConfig, id: &BackendId) {
        self.transition_to(CircuitState::Closed, config, id);
    }

    pub(crate) fn reset(&mut self, config: &BreakerConfig, id: &BackendId) {
        self.transition_to(CircuitState::Closed, config, id);
    }

    /// Appends one outcome to the bounded FIFO, evicting the oldest entry
    /// once the window is at capacity.
    fn push_outcome(&mut self, config: &BreakerConfig, success: bool) {
        if self.window.len() == config.window_size {
            if self.window.pop_front() == Some(true) {
                self.failures -= 1;
            }
        }
        self.window.push_back(!success);
        if !success {
            self.failures += 1;
        }
    }

    /// Failure ratio against the full window capacity. Using the capacity
    /// rather than the fill level as the denominator keeps sparse traffic
    /// from tripping the breaker on its first few calls.
    fn failure_rate(&self, config: &BreakerConfig) -> f64 {
        self.failures as f64 / config.window_size as f64
    }

    fn emit_rejected(&mut self, config: &BreakerConfig, id: &BackendId) {
        self.push_event(
            config,
            BreakerEvent::CallRejected {
                backend: id.clone(),
                timestamp: Instant::now(),
            },
        );

        #[cfg(feature = "metrics")]
        counter!("ringway_breaker_rejections_total", "backend" => id.to_string()).increment(1);
    }

    fn transition_to(&mut self, state: CircuitState, config: &BreakerConfig, id: &BackendId) {
        if self.state == state {
            return;
        }

        let from = self.state;

        self.push_event(
            config,
            BreakerEvent::StateTransition {
                backend: id.clone(),
                timestamp: Instant::now(),
                from,
                to: state,
            },
        );

        #[cfg(feature = "tracing")]
        tracing::info!(backend = %id, from = from.as_str(), to = state.as_str(), "circuit state transition");

        #[cfg(feature = "metrics")]
        counter!(
            "ringway_breaker_transitions_total",
            "backend" => id.to_string(),
            "from" => from.as_str(),
            "to" => state.as_str(),
        )
        .increment(1);

        self.state = state;
        self.last_state_change = Instant::now();
        self.window.clear();
        self.failures = 0;
        self.trials_in_flight = 0;
        self.trial_successes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BreakerConfig {
        BreakerConfig::builder()
            .failure_rate_threshold(0.5)
            .window_size(10)
            .cooldown(Duration::from_millis(20))
            .trial_budget(2)
            .required_successes(2)
            .build()
            .unwrap()
    }

    fn id() -> BackendId {
        BackendId::new("backend-1")
    }

    #[test]
    fn opens_once_failure_ratio_reaches_threshold() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();

        // 4 failures out of a 10-slot window: 0.4 < 0.5, still closed.
        for _ in 0..4 {
            circuit.record_outcome(&config, &id, false);
        }
        assert_eq!(circuit.state(&config, &id), CircuitState::Closed);

        // The fifth failure reaches the threshold.
        circuit.record_outcome(&config, &id, false);
        assert_eq!(circuit.state(&config, &id), CircuitState::Open);
        assert!(!circuit.try_acquire(&config, &id));
    }

    #[test]
    fn sparse_failures_do_not_open_prematurely() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();

        // One failure on an otherwise idle backend is 1/10, not 1/1.
        circuit.record_outcome(&config, &id, false);
        assert_eq!(circuit.state(&config, &id), CircuitState::Closed);
    }

    #[test]
    fn window_evicts_oldest_outcomes() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();

        // 4 failures followed by 10 successes pushes the failures out.
        for _ in 0..4 {
            circuit.record_outcome(&config, &id, false);
        }
        for _ in 0..10 {
            circuit.record_outcome(&config, &id, true);
        }
        let snapshot = circuit.snapshot(&config, &id);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.window_len, 10);
    }

    #[test]
    fn cooldown_moves_open_to_half_open() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();
        for _ in 0..5 {
            circuit.record_outcome(&config, &id, false);
        }
        assert_eq!(circuit.state(&config, &id), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        assert!(circuit.try_acquire(&config, &id));
        assert_eq!(circuit.state(&config, &id), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_trial_budget_is_bounded() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();
        circuit.force_open(&config, &id);
        std::thread::sleep(Duration::from_millis(30));

        assert!(circuit.try_acquire(&config, &id));
        assert!(circuit.try_acquire(&config, &id));
        // Budget of 2 exhausted while both trials are unresolved.
        assert!(!circuit.try_acquire(&config, &id));

        // Resolving one trial frees one slot.
        circuit.record_outcome(&config, &id, true);
        assert!(circuit.try_acquire(&config, &id));
    }

    #[test]
    fn required_successes_close_the_circuit_and_reset_the_window() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();
        for _ in 0..5 {
            circuit.record_outcome(&config, &id, false);
        }
        std::thread::sleep(Duration::from_millis(30));

        assert!(circuit.try_acquire(&config, &id));
        circuit.record_outcome(&config, &id, true);
        assert_eq!(circuit.state(&config, &id), CircuitState::HalfOpen);

        assert!(circuit.try_acquire(&config, &id));
        circuit.record_outcome(&config, &id, true);
        assert_eq!(circuit.state(&config, &id), CircuitState::Closed);

        let snapshot = circuit.snapshot(&config, &id);
        assert_eq!(snapshot.window_len, 0);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();
        circuit.force_open(&config, &id);
        std::thread::sleep(Duration::from_millis(30));

        assert!(circuit.try_acquire(&config, &id));
        circuit.record_outcome(&config, &id, false);
        assert_eq!(circuit.state(&config, &id), CircuitState::Open);
        assert!(!circuit.try_acquire(&config, &id));
    }

    #[test]
    fn late_outcome_while_open_is_dropped() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();
        circuit.force_open(&config, &id);

        circuit.record_outcome(&config, &id, true);
        let snapshot = circuit.snapshot(&config, &id);
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.window_len, 0);
    }

    #[test]
    fn stale_half_open_reopens_when_bounded() {
        let config = BreakerConfig::builder()
            .cooldown(Duration::from_millis(10))
            .half_open_max_duration(Duration::from_millis(20))
            .build()
            .unwrap();
        let id = id();
        let mut circuit = Circuit::new();
        circuit.force_open(&config, &id);

        std::thread::sleep(Duration::from_millis(15));
        assert!(circuit.try_acquire(&config, &id));
        assert_eq!(circuit.state(&config, &id), CircuitState::HalfOpen);

        // The trial never resolves; the bound forces the circuit back open.
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(circuit.state(&config, &id), CircuitState::Open);
    }

    #[test]
    fn manual_controls_override_state() {
        let config = config();
        let id = id();
        let mut circuit = Circuit::new();

        circuit.force_open(&config, &id);
        assert!(!circuit.try_acquire(&config, &id));

        circuit.force_closed(&config, &id);
        assert!(circuit.try_acquire(&config, &id));

        for _ in 0..5 {
            circuit.record_outcome(&config, &id, false);
        }
        circuit.reset(&config, &id);
        assert_eq!(circuit.state(&config, &id), CircuitState::Closed);
    }
}
