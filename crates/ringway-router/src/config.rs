use ringway_breaker::BreakerConfig;
use ringway_core::{EventListeners, FnListener};

use crate::error::ConfigError;
use crate::events::RouterEvent;

/// Startup configuration for a backend pool and its routers.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Ring positions per unit of backend weight.
    pub(crate) vnodes_per_backend: u32,
    /// Bound on the candidate walk per selection; caps retry fan-out.
    pub(crate) max_candidates: usize,
    /// Circuit breaker parameters shared by every backend.
    pub(crate) breaker: BreakerConfig,
    pub(crate) event_listeners: EventListeners<RouterEvent>,
}

impl RouterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::new()
    }
}

impl Default for RouterConfig {
    /// The builder defaults; infallible because they always validate.
    fn default() -> Self {
        RouterConfigBuilder::new()
            .build()
            .expect("builder defaults are valid")
    }
}

/// Builder for [`RouterConfig`].
#[derive(Debug, Clone)]
pub struct RouterConfigBuilder {
    vnodes_per_backend: u32,
    max_candidates: usize,
    breaker: Option<BreakerConfig>,
    event_listeners: EventListeners<RouterEvent>,
}

impl RouterConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            vnodes_per_backend: 128,
            max_candidates: 3,
            breaker: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the number of ring positions per unit of backend weight.
    ///
    /// More virtual nodes smooth per-backend load at the cost of a larger
    /// ring; the variance of a backend's share of the keyspace shrinks
    /// proportionally to `1/sqrt(vnodes)`.
    ///
    /// Default: 128
    pub fn vnodes_per_backend(mut self, count: u32) -> Self {
        self.vnodes_per_backend = count;
        self
    }

    /// Sets the maximum number of distinct candidates one selection may
    /// consider before giving up.
    ///
    /// Default: 3
    pub fn max_candidates(mut self, count: usize) -> Self {
        self.max_candidates = count;
        self
    }

    /// Sets the circuit breaker configuration shared by all backends.
    ///
    /// Default: [`BreakerConfig::standard`]
    pub fn breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Registers a callback invoked whenever a new ring snapshot is
    /// published, with the backend and virtual node counts.
    pub fn on_ring_rebuilt<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RouterEvent| {
                if let RouterEvent::RingRebuilt {
                    backends, vnodes, ..
                } = event
                {
                    f(*backends, *vnodes);
                }
            }));
        self
    }

    /// Registers a callback invoked when a selection exhausts its
    /// candidates, with the number of candidates tried.
    pub fn on_selection_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RouterEvent| {
                if let RouterEvent::SelectionFailed { tried, .. } = event {
                    f(*tried);
                }
            }));
        self
    }

    /// Validates the parameters and builds the configuration.
    pub fn build(self) -> Result<RouterConfig, ConfigError> {
        if self.vnodes_per_backend == 0 {
            return Err(ConfigError::InvalidVnodesPerBackend);
        }
        if self.max_candidates == 0 {
            return Err(ConfigError::InvalidMaxCandidates);
        }
        let breaker = match self.breaker {
            Some(breaker) => breaker,
            None => BreakerConfig::standard().build()?,
        };

        Ok(RouterConfig {
            vnodes_per_backend: self.vnodes_per_backend,
            max_candidates: self.max_candidates,
            breaker,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for RouterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
