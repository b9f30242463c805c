//! Events emitted by per-backend circuits.

use std::time::Instant;

use ringway_core::{BackendId, ObservableEvent};

use crate::circuit::CircuitState;

/// Events emitted by the health registry's circuits.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// A circuit moved between states.
    StateTransition {
        backend: BackendId,
        timestamp: Instant,
        from: CircuitState,
        to: CircuitState,
    },
    /// An availability check was answered negatively (open circuit or
    /// exhausted half-open trial budget).
    CallRejected {
        backend: BackendId,
        timestamp: Instant,
    },
    /// A half-open circuit handed out one of its trial slots.
    TrialPermitted {
        backend: BackendId,
        timestamp: Instant,
    },
    /// A call outcome was recorded against a circuit.
    OutcomeRecorded {
        backend: BackendId,
        timestamp: Instant,
        success: bool,
        state: CircuitState,
    },
}

impl ObservableEvent for BreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallRejected { .. } => "call_rejected",
            BreakerEvent::TrialPermitted { .. } => "trial_permitted",
            BreakerEvent::OutcomeRecorded { .. } => "outcome_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BreakerEvent::StateTransition { timestamp, .. }
            | BreakerEvent::CallRejected { timestamp, .. }
            | BreakerEvent::TrialPermitted { timestamp, .. }
            | BreakerEvent::OutcomeRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { backend, .. }
            | BreakerEvent::CallRejected { backend, .. }
            | BreakerEvent::TrialPermitted { backend, .. }
            | BreakerEvent::OutcomeRecorded { backend, .. } => backend.as_str(),
        }
    }
}
