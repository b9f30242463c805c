//! Core infrastructure for ringway.
//!
//! This crate provides the pieces the other ringway crates agree on:
//! - [`BackendId`], the identity type shared by the ring, the breaker
//!   registry, and the router
//! - An event system for observability

pub mod backend;
pub mod events;

pub use backend::BackendId;
pub use events::{EventListener, EventListeners, FnListener, ObservableEvent};
