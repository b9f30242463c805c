//! Consistent-hash request router with circuit-breaker-protected backends.
//!
//! A [`BackendPool`] owns backend membership and publishes an immutable
//! consistent-hash ring snapshot on every change; [`Router`] handles select
//! a backend per request key by walking the ring's candidate order and
//! skipping backends whose circuits are open. Call outcomes feed back into
//! the per-backend circuits, so a failing backend is routed around until it
//! recovers.
//!
//! ## Direct usage
//!
//! ```
//! use ringway_router::{BackendPool, BackendRecord, RouterConfig};
//!
//! let pool = BackendPool::new(RouterConfig::default());
//! pool.register(BackendRecord::new("api-1", "10.0.0.1:8080")).unwrap();
//! pool.register(BackendRecord::new("api-2", "10.0.0.2:8080")).unwrap();
//!
//! let router = pool.router();
//! let backend = router.select(b"user:42").unwrap();
//!
//! // ... dispatch the request to `backend`, then report how it went,
//! // exactly once per selection:
//! router.report_outcome(&backend, true);
//! ```
//!
//! ## As Tower middleware
//!
//! The [`RouteLayer`] wraps a dispatch service taking `(BackendId, Req)`
//! and handles selection and exactly-once outcome reporting itself; see its
//! documentation for an example.
//!
//! ## Concurrency
//!
//! Ring snapshots are replaced with a single atomic swap, so concurrent
//! selections either see a membership change entirely or not at all.
//! Circuit state is sharded per backend; selection takes no global lock.
//!
//! ## Feature Flags
//! - `metrics`: selection counters and a ring-size gauge via the `metrics`
//!   crate (also enables the breaker's counters)
//! - `tracing`: membership changes, rebuilds, and exhausted selections
//!   logged via the `tracing` crate

mod classifier;
mod config;
mod error;
mod events;
mod layer;
mod registry;
mod router;
mod service;

pub use classifier::{DefaultClassifier, FnClassifier, OutcomeClassifier};
pub use config::{RouterConfig, RouterConfigBuilder};
pub use error::{ConfigError, RegistryError, RouteError, RoutingError};
pub use events::RouterEvent;
pub use layer::RouteLayer;
pub use registry::{BackendPool, BackendRecord};
pub use router::Router;
pub use service::Routed;

pub use ringway_breaker::{BreakerConfig, CircuitSnapshot, CircuitState, HealthRegistry};
pub use ringway_core::BackendId;
pub use ringway_hashring::{RingBackend, RingDiff, RingSnapshot};
