use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use arc_swap::ArcSwap;
#[cfg(feature = "metrics")]
use metrics::gauge;
use ringway_breaker::HealthRegistry;
use ringway_core::{BackendId, EventListeners};
use ringway_hashring::{RingBackend, RingSnapshot};

use crate::config::RouterConfig;
use crate::error::RegistryError;
use crate::events::RouterEvent;
use crate::router::Router;

/// A backend as the discovery collaborator registers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRecord {
    pub id: BackendId,
    /// Dial address, opaque to the router; the proxy collaborator uses it.
    pub address: String,
    /// Relative share of the keyspace. Must be at least 1.
    pub weight: u32,
}

impl BackendRecord {
    /// A record with the default weight of 1.
    pub fn new(id: impl Into<BackendId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            weight: 1,
        }
    }

    /// Sets the relative weight.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

/// State shared between the pool and its router handles.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) ring: ArcSwap<RingSnapshot>,
    pub(crate) health: HealthRegistry,
    pub(crate) max_candidates: usize,
    pub(crate) event_listeners: EventListeners<RouterEvent>,
}

/// Authoritative backend membership for one pool.
///
/// The pool is the single writer of ring membership: every registration or
/// deregistration rebuilds the ring from the full record map and publishes
/// the new snapshot with one atomic store. Router handles load whatever
/// snapshot is current when a selection starts; a selection that raced a
/// membership change simply completes against the snapshot it loaded.
#[derive(Debug)]
pub struct BackendPool {
    records: Mutex<BTreeMap<BackendId, BackendRecord>>,
    vnodes_per_backend: u32,
    shared: Arc<Shared>,
}

impl BackendPool {
    /// Creates an empty pool from a validated configuration.
    pub fn new(config: RouterConfig) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            vnodes_per_backend: config.vnodes_per_backend,
            shared: Arc::new(Shared {
                ring: ArcSwap::from_pointee(RingSnapshot::empty()),
                health: HealthRegistry::new(config.breaker),
                max_candidates: config.max_candidates,
                event_listeners: config.event_listeners,
            }),
        }
    }

    /// Adds a backend to the pool and publishes a rebuilt ring.
    ///
    /// The new backend starts with a closed circuit. Events fire after the
    /// registry's internal lock is released, so a listener may call back
    /// into the pool.
    pub fn register(&self, record: BackendRecord) -> Result<(), RegistryError> {
        if record.weight == 0 {
            return Err(RegistryError::InvalidWeight(record.id));
        }

        let id = record.id.clone();
        let (pool_size, ring_backends, ring_vnodes) = {
            let mut records = self.records.lock().expect("registry mutex poisoned");
            if records.contains_key(&record.id) {
                return Err(RegistryError::DuplicateBackend(record.id));
            }

            self.shared.health.track(id.clone());
            records.insert(id.clone(), record);
            let (backends, vnodes) = self.publish(&records);
            (records.len(), backends, vnodes)
        };

        #[cfg(feature = "tracing")]
        tracing::info!(backend = %id, backends = pool_size, "backend registered");

        self.emit_rebuilt(ring_backends, ring_vnodes);
        self.shared
            .event_listeners
            .emit(&RouterEvent::BackendRegistered {
                id,
                timestamp: Instant::now(),
                backends: pool_size,
            });
        Ok(())
    }

    /// Removes a backend from the pool and publishes a rebuilt ring.
    ///
    /// The backend's circuit state is discarded. Selections already holding
    /// the old snapshot complete against it; there is no retroactive
    /// invalidation. Events fire after the registry's internal lock is
    /// released.
    pub fn deregister(&self, id: &BackendId) -> Result<BackendRecord, RegistryError> {
        let (record, pool_size, ring_backends, ring_vnodes) = {
            let mut records = self.records.lock().expect("registry mutex poisoned");
            let record = records
                .remove(id)
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

            self.shared.health.forget(id);
            let (backends, vnodes) = self.publish(&records);
            (record, records.len(), backends, vnodes)
        };

        #[cfg(feature = "tracing")]
        tracing::info!(backend = %id, backends = pool_size, "backend deregistered");

        self.emit_rebuilt(ring_backends, ring_vnodes);
        self.shared
            .event_listeners
            .emit(&RouterEvent::BackendDeregistered {
                id: id.clone(),
                timestamp: Instant::now(),
                backends: pool_size,
            });
        Ok(record)
    }

    /// Builds a snapshot from the current record map and stores it,
    /// returning the backend and virtual node counts.
    ///
    /// Called with the record mutex held so concurrent membership changes
    /// publish in order; the caller emits [`RouterEvent::RingRebuilt`] once
    /// the lock is released.
    fn publish(&self, records: &BTreeMap<BackendId, BackendRecord>) -> (usize, usize) {
        let snapshot = if records.is_empty() {
            RingSnapshot::empty()
        } else {
            let backends: Vec<RingBackend> = records
                .values()
                .map(|r| RingBackend::weighted(r.id.clone(), r.weight))
                .collect();
            // The set is non-empty, weights and vnode count are validated
            // before anything is inserted.
            RingSnapshot::build(&backends, self.vnodes_per_backend)
                .expect("ring build is infallible for a validated backend set")
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            backends = snapshot.backend_count(),
            vnodes = snapshot.vnode_count(),
            "ring rebuilt"
        );

        #[cfg(feature = "metrics")]
        gauge!("ringway_ring_backends").set(snapshot.backend_count() as f64);

        let counts = (snapshot.backend_count(), snapshot.vnode_count());
        self.shared.ring.store(Arc::new(snapshot));
        counts
    }

    fn emit_rebuilt(&self, backends: usize, vnodes: usize) {
        self.shared.event_listeners.emit(&RouterEvent::RingRebuilt {
            timestamp: Instant::now(),
            backends,
            vnodes,
        });
    }

    /// Returns a cheap router handle over this pool.
    pub fn router(&self) -> Router {
        Router::new(Arc::clone(&self.shared))
    }

    /// The currently published ring snapshot.
    pub fn snapshot(&self) -> Arc<RingSnapshot> {
        self.shared.ring.load_full()
    }

    /// The health registry for this pool's backends.
    pub fn health(&self) -> &HealthRegistry {
        &self.shared.health
    }

    /// The registered records, ordered by id.
    pub fn records(&self) -> Vec<BackendRecord> {
        self.records
            .lock()
            .expect("registry mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// True if the backend is registered.
    pub fn contains(&self, id: &BackendId) -> bool {
        self.records
            .lock()
            .expect("registry mutex poisoned")
            .contains_key(id)
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.records.lock().expect("registry mutex poisoned").len()
    }

    /// True if no backends are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> BackendPool {
        BackendPool::new(RouterConfig::default())
    }

    #[test]
    fn register_rejects_duplicates() {
        let pool = pool();
        pool.register(BackendRecord::new("a", "10.0.0.1:80")).unwrap();
        let err = pool
            .register(BackendRecord::new("a", "10.0.0.2:80"))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateBackend(BackendId::new("a")));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn deregister_rejects_unknown_ids() {
        let pool = pool();
        let err = pool.deregister(&BackendId::new("ghost")).unwrap_err();
        assert_eq!(err, RegistryError::NotFound(BackendId::new("ghost")));
    }

    #[test]
    fn register_rejects_zero_weight() {
        let pool = pool();
        let err = pool
            .register(BackendRecord::new("a", "10.0.0.1:80").with_weight(0))
            .unwrap_err();
        assert_eq!(err, RegistryError::InvalidWeight(BackendId::new("a")));
        assert!(pool.is_empty());
    }

    #[test]
    fn membership_changes_publish_new_snapshots() {
        let pool = pool();
        assert!(pool.snapshot().is_empty());

        pool.register(BackendRecord::new("a", "10.0.0.1:80")).unwrap();
        let one = pool.snapshot();
        assert_eq!(one.backend_count(), 1);

        pool.register(BackendRecord::new("b", "10.0.0.2:80")).unwrap();
        let two = pool.snapshot();
        assert_eq!(two.backend_count(), 2);

        // The first snapshot is untouched by the rebuild.
        assert_eq!(one.backend_count(), 1);

        let removed = pool.deregister(&BackendId::new("a")).unwrap();
        assert_eq!(removed.address, "10.0.0.1:80");
        assert_eq!(pool.snapshot().backends(), &[BackendId::new("b")]);
    }

    #[test]
    fn rebuild_listener_may_reenter_the_pool() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::OnceLock;

        let slot: Arc<OnceLock<Arc<BackendPool>>> = Arc::new(OnceLock::new());
        let observed = Arc::new(AtomicUsize::new(usize::MAX));

        let pool_slot = Arc::clone(&slot);
        let seen = Arc::clone(&observed);
        let config = RouterConfig::builder()
            .vnodes_per_backend(10)
            .on_ring_rebuilt(move |_, _| {
                // A dashboard-style listener reading the pool back.
                if let Some(pool) = pool_slot.get() {
                    seen.store(pool.len(), Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();

        let pool = Arc::new(BackendPool::new(config));
        slot.set(Arc::clone(&pool)).expect("slot is set once");

        // register and deregister both return instead of deadlocking, and
        // the listener sees the post-change pool size.
        pool.register(BackendRecord::new("a", "10.0.0.1:80")).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 1);

        pool.deregister(&BackendId::new("a")).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn registration_tracks_health() {
        let pool = pool();
        let id = BackendId::new("a");
        pool.register(BackendRecord::new("a", "10.0.0.1:80")).unwrap();
        assert!(pool.health().is_available(&id));

        pool.deregister(&id).unwrap();
        assert!(!pool.health().is_available(&id));
    }
}
