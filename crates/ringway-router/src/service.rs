use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use ringway_core::BackendId;
use tower::Service;

use crate::classifier::OutcomeClassifier;
use crate::error::RouteError;
use crate::router::Router;

/// A Tower service that routes each request to a selected backend.
///
/// The inner service receives `(BackendId, Req)` and is expected to dispatch
/// the request to that backend. When the inner call completes, the outcome
/// is classified and reported to the backend's circuit exactly once; callers
/// never interact with [`Router::report_outcome`] directly on this path.
///
/// Selection happens when the future is built, not when it is first polled.
/// A future dropped before completion has therefore already consumed a
/// half-open trial slot where one applied, and no outcome will ever resolve
/// it; set
/// [`half_open_max_duration`](ringway_breaker::BreakerConfigBuilder::half_open_max_duration)
/// to bound how long such a slot can keep a circuit half-open.
///
/// # Type Parameters
///
/// - `S`: the inner dispatch service
/// - `K`: the key extractor, `Fn(&Req) -> Vec<u8>`
/// - `C`: the outcome classifier
pub struct Routed<S, K, C> {
    inner: S,
    router: Router,
    key_fn: Arc<K>,
    classifier: C,
}

impl<S, K, C> Routed<S, K, C> {
    pub(crate) fn new(inner: S, router: Router, key_fn: Arc<K>, classifier: C) -> Self {
        Self {
            inner,
            router,
            key_fn,
            classifier,
        }
    }

    /// The router this service selects backends from.
    pub fn router(&self) -> &Router {
        &self.router
    }
}

impl<S, K, C> Clone for Routed<S, K, C>
where
    S: Clone,
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            router: self.router.clone(),
            key_fn: Arc::clone(&self.key_fn),
            classifier: self.classifier.clone(),
        }
    }
}

impl<S, K, C, Req> Service<Req> for Routed<S, K, C>
where
    S: Service<(BackendId, Req)> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    K: Fn(&Req) -> Vec<u8> + Send + Sync + 'static,
    C: OutcomeClassifier<S::Response, S::Error> + Clone + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = RouteError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RouteError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Selection is eager: a half-open trial slot, where one applies, is
        // consumed here rather than on first poll. A future dropped before
        // completion leaves that slot unresolved; see the type docs.
        let key = (self.key_fn)(&req);
        let selection = self.router.select(&key);
        let mut inner = self.inner.clone();
        let router = self.router.clone();
        let classifier = self.classifier.clone();

        Box::pin(async move {
            let id = match selection {
                Ok(id) => id,
                Err(e) => return Err(RouteError::Routing(e)),
            };

            let result = inner.call((id.clone(), req)).await;
            router.report_outcome(&id, !classifier.is_failure(&result));
            result.map_err(RouteError::Inner)
        })
    }
}
