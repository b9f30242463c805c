//! Outcome classification for dispatched calls.
//!
//! The [`Routed`](crate::Routed) service reports every dispatched call's
//! outcome to the selected backend's circuit; a classifier decides whether a
//! given result counts as a failure.

use std::sync::Arc;

/// Trait deciding whether a call result counts as a failure.
pub trait OutcomeClassifier<Res, Err>: Send + Sync {
    /// Returns true if the result should be recorded as a failure against
    /// the backend that served it.
    fn is_failure(&self, result: &Result<Res, Err>) -> bool;
}

/// Default classifier: every `Err` is a failure, every `Ok` a success.
///
/// Implements `OutcomeClassifier` for all response and error types, so it
/// can be used without naming them at configuration time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<Res, Err> OutcomeClassifier<Res, Err> for DefaultClassifier {
    fn is_failure(&self, result: &Result<Res, Err>) -> bool {
        result.is_err()
    }
}

/// A classifier backed by a closure.
///
/// Lets the proxy apply its own policy, e.g. treating HTTP 5xx responses as
/// failures even though they arrive as `Ok`, or ignoring client-side
/// cancellations.
///
/// ```
/// use ringway_router::{FnClassifier, OutcomeClassifier};
///
/// // 5xx responses count against the backend; 4xx do not.
/// let classifier = FnClassifier::new(|result: &Result<u16, ()>| match result {
///     Ok(status) => *status >= 500,
///     Err(_) => true,
/// });
///
/// assert!(!classifier.is_failure(&Ok(404)));
/// assert!(classifier.is_failure(&Ok(503)));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Creates a new classifier from the given closure.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Res, Err> OutcomeClassifier<Res, Err> for FnClassifier<F>
where
    F: Fn(&Result<Res, Err>) -> bool + Send + Sync,
{
    fn is_failure(&self, result: &Result<Res, Err>) -> bool {
        (self.f)(result)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}
