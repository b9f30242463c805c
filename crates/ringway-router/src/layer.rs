use std::sync::Arc;

use tower::Layer;

use crate::classifier::{DefaultClassifier, FnClassifier};
use crate::router::Router;
use crate::service::Routed;

/// A Tower layer that wraps a dispatch service with backend routing.
///
/// This is the narrow interface handed to the HTTP-facing proxy: the proxy
/// builds one layer from a pool's router and a key extractor, and every
/// wrapped call gets selection, dispatch, and exactly-once outcome
/// reporting.
///
/// ```
/// use ringway_core::BackendId;
/// use ringway_router::{BackendPool, BackendRecord, RouteLayer, RouterConfig};
/// use tower::{Layer, service_fn};
///
/// let pool = BackendPool::new(RouterConfig::default());
/// pool.register(BackendRecord::new("api-1", "10.0.0.1:8080")).unwrap();
///
/// let layer = RouteLayer::new(pool.router(), |req: &String| req.clone().into_bytes());
/// let service = layer.layer(service_fn(|(id, req): (BackendId, String)| async move {
///     Ok::<_, std::io::Error>(format!("{id} handled {req}"))
/// }));
/// ```
pub struct RouteLayer<K, C = DefaultClassifier> {
    router: Router,
    key_fn: Arc<K>,
    classifier: C,
}

impl<K> RouteLayer<K, DefaultClassifier> {
    /// Creates a layer with the default classifier (errors are failures).
    pub fn new(router: Router, key_fn: K) -> Self {
        Self {
            router,
            key_fn: Arc::new(key_fn),
            classifier: DefaultClassifier,
        }
    }
}

impl<K, C> RouteLayer<K, C> {
    /// Replaces the outcome classifier.
    pub fn with_classifier<C2>(self, classifier: C2) -> RouteLayer<K, C2> {
        RouteLayer {
            router: self.router,
            key_fn: self.key_fn,
            classifier,
        }
    }

    /// Replaces the outcome classifier with a closure.
    pub fn classify_with<F>(self, f: F) -> RouteLayer<K, FnClassifier<F>> {
        self.with_classifier(FnClassifier::new(f))
    }
}

impl<K, C: Clone> Clone for RouteLayer<K, C> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            key_fn: Arc::clone(&self.key_fn),
            classifier: self.classifier.clone(),
        }
    }
}

impl<S, K, C: Clone> Layer<S> for RouteLayer<K, C> {
    type Service = Routed<S, K, C>;

    fn layer(&self, inner: S) -> Self::Service {
        Routed::new(
            inner,
            self.router.clone(),
            Arc::clone(&self.key_fn),
            self.classifier.clone(),
        )
    }
}
