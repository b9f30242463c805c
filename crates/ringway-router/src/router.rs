use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;
use ringway_breaker::CircuitState;
use ringway_core::BackendId;

use crate::error::RoutingError;
use crate::events::RouterEvent;
use crate::registry::Shared;

/// Read-side handle over a [`BackendPool`](crate::BackendPool).
///
/// Cheap to clone and safe to use from many threads at once; `select` takes
/// no locks beyond an atomic snapshot load and the chosen backend's circuit
/// entry.
#[derive(Debug, Clone)]
pub struct Router {
    shared: Arc<Shared>,
}

impl Router {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Selects a backend for a request key.
    ///
    /// Walks the ring's candidate sequence for the key in order and returns
    /// the first backend whose circuit permits a call. The walk is bounded
    /// by the configured `max_candidates`. A successful selection consumes
    /// a half-open trial slot where applicable, so the caller must report
    /// the dispatched call's outcome exactly once via
    /// [`Router::report_outcome`]; double reporting corrupts the window
    /// statistics.
    pub fn select(&self, key: &[u8]) -> Result<BackendId, RoutingError> {
        let snapshot = self.shared.ring.load();
        if snapshot.is_empty() {
            return Err(RoutingError::NoBackends);
        }

        let mut tried = 0;
        for candidate in snapshot.candidates(key, self.shared.max_candidates) {
            tried += 1;
            if self.shared.health.is_available(candidate) {
                #[cfg(feature = "metrics")]
                counter!("ringway_selections_total", "outcome" => "selected").increment(1);
                return Ok(candidate.clone());
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(tried, "selection exhausted all candidates");

        #[cfg(feature = "metrics")]
        counter!("ringway_selections_total", "outcome" => "exhausted").increment(1);

        self.shared
            .event_listeners
            .emit(&RouterEvent::SelectionFailed {
                timestamp: Instant::now(),
                tried,
            });

        Err(RoutingError::AllBackendsUnavailable { tried })
    }

    /// Reports the outcome of a dispatched call.
    ///
    /// Must be called exactly once per selection that was actually
    /// dispatched. Outcomes for backends deregistered in the meantime are
    /// dropped.
    pub fn report_outcome(&self, id: &BackendId, success: bool) {
        self.shared.health.record_outcome(id, success);
    }

    /// Current circuit state of a backend, if tracked.
    pub fn circuit_state(&self, id: &BackendId) -> Option<CircuitState> {
        self.shared.health.state(id)
    }
}
