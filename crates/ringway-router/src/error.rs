use ringway_core::BackendId;
use thiserror::Error;

/// Errors from validating a [`RouterConfig`](crate::RouterConfig).
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Each backend must own at least one ring position.
    #[error("vnodes_per_backend must be at least 1")]
    InvalidVnodesPerBackend,

    /// At least one candidate must be considered per selection.
    #[error("max_candidates must be at least 1")]
    InvalidMaxCandidates,

    /// The embedded breaker configuration was invalid.
    #[error(transparent)]
    Breaker(#[from] ringway_breaker::ConfigError),
}

/// Errors from registry misuse. Returned to the caller, never retried
/// internally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The backend id is already registered.
    #[error("backend {0} is already registered")]
    DuplicateBackend(BackendId),

    /// The backend id is not registered.
    #[error("backend {0} is not registered")]
    NotFound(BackendId),

    /// A backend was registered with zero weight.
    #[error("backend {0} must have a weight of at least 1")]
    InvalidWeight(BackendId),
}

/// Errors from selecting a backend for a request key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// The ring is empty; nothing has been registered.
    #[error("no backends registered")]
    NoBackends,

    /// Every candidate produced by the ring walk was unavailable.
    #[error("all {tried} candidate backends are unavailable")]
    AllBackendsUnavailable {
        /// Number of distinct candidates that were checked.
        tried: usize,
    },
}

/// Errors returned by the [`Routed`](crate::Routed) service.
#[derive(Debug, Error)]
pub enum RouteError<E> {
    /// No backend could be selected for the request.
    #[error("routing failed: {0}")]
    Routing(#[source] RoutingError),

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> RouteError<E> {
    /// Returns true if the error came from selection rather than the inner
    /// service.
    pub fn is_routing(&self) -> bool {
        matches!(self, RouteError::Routing(_))
    }

    /// Returns the inner service error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RouteError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
