use std::collections::HashSet;

use ringway_core::BackendId;
use thiserror::Error;

use crate::hash::{fnv1a_64, vnode_hash};

/// Errors from building a ring snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    /// The backend set was empty; the ring would degenerate to "no route".
    #[error("cannot build a ring from an empty backend set")]
    NoBackends,

    /// `vnodes_per_backend` was zero.
    #[error("vnodes_per_backend must be at least 1")]
    InvalidVnodeCount,

    /// A backend was given zero weight and would own no ring positions.
    #[error("backend {0} has zero weight")]
    ZeroWeight(BackendId),
}

/// Build input: one backend and its relative weight.
///
/// A backend with weight `w` contributes `w * vnodes_per_backend` virtual
/// nodes, so a weight-2 backend owns roughly twice the keyspace of a
/// weight-1 backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBackend {
    pub id: BackendId,
    pub weight: u32,
}

impl RingBackend {
    /// A backend with the default weight of 1.
    pub fn new(id: BackendId) -> Self {
        Self { id, weight: 1 }
    }

    /// A backend with an explicit weight.
    pub fn weighted(id: BackendId, weight: u32) -> Self {
        Self { id, weight }
    }
}

/// One position on the ring. Backends are referenced by index into the
/// snapshot's backend table to keep the node array compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VirtualNode {
    hash: u64,
    backend: u32,
}

/// Membership difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RingDiff {
    pub added: Vec<BackendId>,
    pub removed: Vec<BackendId>,
}

/// An immutable consistent-hash ring.
///
/// Built once from a backend set, then shared read-only. Lookup walks the
/// sorted virtual-node array clockwise from the key's hash, wrapping at the
/// end, and yields distinct backends in fallback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSnapshot {
    backends: Vec<BackendId>,
    vnodes: Vec<VirtualNode>,
}

impl RingSnapshot {
    /// A snapshot with no backends. Every lookup yields nothing.
    ///
    /// This is the state a registry publishes before any backend has been
    /// registered; [`RingSnapshot::build`] deliberately rejects an empty set
    /// so that explicit configuration cannot silently produce it.
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
            vnodes: Vec::new(),
        }
    }

    /// Deterministically builds a snapshot from a backend set.
    ///
    /// Virtual node positions are the stable hash of `"{id}:{index}"`; a
    /// hash collision is resolved by re-hashing the colliding node with an
    /// incremented salt until it is unique, so all positions in one ring are
    /// distinct. The result is independent of the input order.
    pub fn build(backends: &[RingBackend], vnodes_per_backend: u32) -> Result<Self, RingError> {
        if vnodes_per_backend == 0 {
            return Err(RingError::InvalidVnodeCount);
        }
        if backends.is_empty() {
            return Err(RingError::NoBackends);
        }

        // Sort (and dedup) by id so the snapshot does not depend on the
        // order the caller happened to list backends in.
        let mut sorted: Vec<&RingBackend> = backends.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted.dedup_by(|a, b| a.id == b.id);

        let mut ids = Vec::with_capacity(sorted.len());
        let mut vnodes = Vec::new();
        let mut taken: HashSet<u64> = HashSet::new();

        for (backend_index, backend) in sorted.iter().enumerate() {
            if backend.weight == 0 {
                return Err(RingError::ZeroWeight(backend.id.clone()));
            }
            let count = backend.weight * vnodes_per_backend;
            for index in 0..count {
                let mut salt = 0u32;
                let mut hash = vnode_hash(backend.id.as_str(), index, salt);
                while !taken.insert(hash) {
                    salt += 1;
                    hash = vnode_hash(backend.id.as_str(), index, salt);
                }
                vnodes.push(VirtualNode {
                    hash,
                    backend: backend_index as u32,
                });
            }
            ids.push(backend.id.clone());
        }

        vnodes.sort_unstable_by_key(|v| v.hash);

        Ok(Self {
            backends: ids,
            vnodes,
        })
    }

    /// The distinct backends in this snapshot, ordered by id.
    pub fn backends(&self) -> &[BackendId] {
        &self.backends
    }

    /// Number of distinct backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Total number of virtual nodes.
    pub fn vnode_count(&self) -> usize {
        self.vnodes.len()
    }

    /// True if the snapshot holds no backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// The backend a key maps to, ignoring health.
    pub fn primary(&self, key: &[u8]) -> Option<&BackendId> {
        self.candidates(key, 1).next()
    }

    /// Ordered fallback candidates for a key.
    ///
    /// Hashes the key, finds the first virtual node at or clockwise of that
    /// position (wrapping to the start of the ring), then walks forward
    /// collecting distinct backends until `max` have been yielded or every
    /// virtual node has been visited. The walk is lazy; callers that accept
    /// the first candidate never pay for the rest.
    pub fn candidates(&self, key: &[u8], max: usize) -> Candidates<'_> {
        let start = if self.vnodes.is_empty() {
            0
        } else {
            let key_hash = fnv1a_64(key);
            let at = self.vnodes.partition_point(|v| v.hash < key_hash);
            // partition_point returns len when the key hashes past the last
            // node; the ring wraps back to the smallest hash.
            at % self.vnodes.len()
        };

        Candidates {
            snapshot: self,
            position: start,
            visited: 0,
            yielded: vec![false; self.backends.len()],
            yielded_count: 0,
            max,
        }
    }

    /// Membership difference between two snapshots.
    ///
    /// Both backend tables are sorted by id, so this is a linear merge.
    pub fn diff(old: &Self, new: &Self) -> RingDiff {
        let mut diff = RingDiff::default();
        let (mut i, mut j) = (0, 0);
        while i < old.backends.len() && j < new.backends.len() {
            match old.backends[i].cmp(&new.backends[j]) {
                std::cmp::Ordering::Less => {
                    diff.removed.push(old.backends[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    diff.added.push(new.backends[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        diff.removed.extend(old.backends[i..].iter().cloned());
        diff.added.extend(new.backends[j..].iter().cloned());
        diff
    }
}

/// Lazy clockwise walk over distinct backends; see [`RingSnapshot::candidates`].
#[derive(Debug)]
pub struct Candidates<'a> {
    snapshot: &'a RingSnapshot,
    position: usize,
    visited: usize,
    yielded: Vec<bool>,
    yielded_count: usize,
    max: usize,
}

impl<'a> Iterator for Candidates<'a> {
    type Item = &'a BackendId;

    fn next(&mut self) -> Option<Self::Item> {
        let vnodes = &self.snapshot.vnodes;
        while self.visited < vnodes.len() && self.yielded_count < self.max {
            let node = vnodes[self.position];
            self.position = (self.position + 1) % vnodes.len();
            self.visited += 1;

            let backend = node.backend as usize;
            if !self.yielded[backend] {
                self.yielded[backend] = true;
                self.yielded_count += 1;
                return Some(&self.snapshot.backends[backend]);
            }
        }
        None
    }
}
