use std::time::Duration;

use ringway_core::{EventListeners, FnListener};

use crate::circuit::CircuitState;
use crate::error::ConfigError;
use crate::events::BreakerEvent;

/// Configuration shared by every backend's circuit.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failure ratio (against the full window capacity) at which a closed
    /// circuit opens. In `(0.0, 1.0]`.
    pub(crate) failure_rate_threshold: f64,
    /// Capacity of the bounded outcome FIFO.
    pub(crate) window_size: usize,
    /// How long an open circuit rejects calls before probing recovery.
    pub(crate) cooldown: Duration,
    /// Concurrent trial calls permitted while half-open.
    pub(crate) trial_budget: usize,
    /// Consecutive trial successes required to close a half-open circuit.
    pub(crate) required_successes: usize,
    /// If set, a circuit that stays half-open this long without closing
    /// reopens on its next access.
    pub(crate) half_open_max_duration: Option<Duration>,
    pub(crate) event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    /// Preset: balanced configuration suitable for most pools.
    ///
    /// 50% failure threshold over a 100-call window, 30 second cooldown,
    /// 3 half-open trials with 3 required successes.
    pub fn standard() -> BreakerConfigBuilder {
        Self::builder()
            .failure_rate_threshold(0.5)
            .window_size(100)
            .cooldown(Duration::from_secs(30))
            .trial_budget(3)
            .required_successes(3)
    }

    /// Preset: opens quickly and probes cautiously.
    ///
    /// 25% failure threshold over a 20-call window, 10 second cooldown,
    /// a single half-open trial.
    pub fn fast_fail() -> BreakerConfigBuilder {
        Self::builder()
            .failure_rate_threshold(0.25)
            .window_size(20)
            .cooldown(Duration::from_secs(10))
            .trial_budget(1)
            .required_successes(1)
    }

    /// Preset: tolerates transient failures before opening.
    ///
    /// 75% failure threshold over a 200-call window, 60 second cooldown,
    /// 5 half-open trials with 5 required successes.
    pub fn tolerant() -> BreakerConfigBuilder {
        Self::builder()
            .failure_rate_threshold(0.75)
            .window_size(200)
            .cooldown(Duration::from_secs(60))
            .trial_budget(5)
            .required_successes(5)
    }
}

/// Builder for [`BreakerConfig`].
#[derive(Debug, Clone)]
pub struct BreakerConfigBuilder {
    failure_rate_threshold: f64,
    window_size: usize,
    cooldown: Duration,
    trial_budget: usize,
    required_successes: usize,
    half_open_max_duration: Option<Duration>,
    event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            window_size: 100,
            cooldown: Duration::from_secs(30),
            trial_budget: 1,
            required_successes: 1,
            half_open_max_duration: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the failure ratio at which the circuit opens.
    ///
    /// Default: 0.5 (50%)
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// Sets the capacity of the outcome window.
    ///
    /// Default: 100
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Sets how long the circuit stays open before allowing trial calls.
    ///
    /// Default: 30 seconds
    pub fn cooldown(mut self, duration: Duration) -> Self {
        self.cooldown = duration;
        self
    }

    /// Sets the number of concurrent trial calls permitted while half-open.
    ///
    /// Default: 1
    pub fn trial_budget(mut self, budget: usize) -> Self {
        self.trial_budget = budget;
        self
    }

    /// Sets the trial successes required to close a half-open circuit.
    ///
    /// Default: 1
    pub fn required_successes(mut self, count: usize) -> Self {
        self.required_successes = count;
        self
    }

    /// Bounds how long a circuit may stay half-open without closing before
    /// it reopens. Guards against trial outcomes that are never reported.
    ///
    /// Default: unbounded
    pub fn half_open_max_duration(mut self, duration: Duration) -> Self {
        self.half_open_max_duration = Some(duration);
        self
    }

    /// Registers a callback for circuit state transitions.
    ///
    /// Called with the backend id, the state transitioned from, and the
    /// state transitioned to.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if let BreakerEvent::StateTransition {
                    backend, from, to, ..
                } = event
                {
                    f(backend.as_str(), *from, *to);
                }
            }));
        self
    }

    /// Registers a callback invoked when a circuit rejects a call.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if let BreakerEvent::CallRejected { backend, .. } = event {
                    f(backend.as_str());
                }
            }));
        self
    }

    /// Registers a callback invoked for every recorded outcome.
    pub fn on_outcome<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if let BreakerEvent::OutcomeRecorded {
                    backend, success, ..
                } = event
                {
                    f(backend.as_str(), *success);
                }
            }));
        self
    }

    /// Validates the parameters and builds the configuration.
    pub fn build(self) -> Result<BreakerConfig, ConfigError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err(ConfigError::InvalidFailureRateThreshold(
                self.failure_rate_threshold,
            ));
        }
        if self.window_size == 0 {
            return Err(ConfigError::InvalidWindowSize);
        }
        if self.required_successes == 0 {
            return Err(ConfigError::InvalidRequiredSuccesses);
        }
        if self.trial_budget == 0 {
            return Err(ConfigError::InvalidTrialBudget);
        }

        Ok(BreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            window_size: self.window_size,
            cooldown: self.cooldown,
            trial_budget: self.trial_budget,
            required_successes: self.required_successes,
            half_open_max_duration: self.half_open_max_duration,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
