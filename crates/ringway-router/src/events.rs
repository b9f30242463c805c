//! Events emitted by the pool and router.

use std::time::Instant;

use ringway_core::{BackendId, ObservableEvent};

/// Events emitted by [`BackendPool`](crate::BackendPool) and
/// [`Router`](crate::Router).
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// A backend joined the pool.
    BackendRegistered {
        id: BackendId,
        timestamp: Instant,
        /// Pool size after the change.
        backends: usize,
    },
    /// A backend left the pool.
    BackendDeregistered {
        id: BackendId,
        timestamp: Instant,
        /// Pool size after the change.
        backends: usize,
    },
    /// A new ring snapshot was published.
    RingRebuilt {
        timestamp: Instant,
        backends: usize,
        vnodes: usize,
    },
    /// A selection walked every candidate without finding an available
    /// backend.
    SelectionFailed { timestamp: Instant, tried: usize },
}

impl ObservableEvent for RouterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RouterEvent::BackendRegistered { .. } => "backend_registered",
            RouterEvent::BackendDeregistered { .. } => "backend_deregistered",
            RouterEvent::RingRebuilt { .. } => "ring_rebuilt",
            RouterEvent::SelectionFailed { .. } => "selection_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RouterEvent::BackendRegistered { timestamp, .. }
            | RouterEvent::BackendDeregistered { timestamp, .. }
            | RouterEvent::RingRebuilt { timestamp, .. }
            | RouterEvent::SelectionFailed { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RouterEvent::BackendRegistered { id, .. }
            | RouterEvent::BackendDeregistered { id, .. } => id.as_str(),
            RouterEvent::RingRebuilt { .. } | RouterEvent::SelectionFailed { .. } => "router",
        }
    }
}
