use thiserror::Error;

/// Errors from validating a [`BreakerConfig`](crate::BreakerConfig).
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The failure rate threshold must be in `(0.0, 1.0]`.
    #[error("failure_rate_threshold must be in (0.0, 1.0], got {0}")]
    InvalidFailureRateThreshold(f64),

    /// The outcome window must hold at least one call.
    #[error("window_size must be at least 1")]
    InvalidWindowSize,

    /// At least one trial success is required to close a half-open circuit.
    #[error("required_successes must be at least 1")]
    InvalidRequiredSuccesses,

    /// At least one trial call must be permitted in the half-open state.
    #[error("trial_budget must be at least 1")]
    InvalidTrialBudget,
}
