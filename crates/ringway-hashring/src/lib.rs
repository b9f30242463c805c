//! Consistent-hash ring with virtual nodes.
//!
//! A [`RingSnapshot`] is an immutable, sorted sequence of virtual nodes built
//! deterministically from a backend set. Each backend contributes
//! `weight * vnodes_per_backend` positions on the ring, which keeps
//! per-backend load variance small and bounds key relocation when membership
//! changes: adding or removing one of `B` uniformly weighted backends remaps
//! an expected `1/B` fraction of keys, and never moves a key between two
//! unrelated backends.
//!
//! Snapshots are never mutated. Membership changes build a fresh snapshot
//! which the owner publishes with a single atomic swap; readers walk
//! whatever snapshot they loaded.
//!
//! ```
//! use ringway_core::BackendId;
//! use ringway_hashring::{RingBackend, RingSnapshot};
//!
//! let backends = vec![
//!     RingBackend::new(BackendId::new("a")),
//!     RingBackend::new(BackendId::new("b")),
//!     RingBackend::new(BackendId::new("c")),
//! ];
//! let ring = RingSnapshot::build(&backends, 100).unwrap();
//!
//! // Ordered fallback candidates for a request key.
//! let order: Vec<_> = ring.candidates(b"user:42", 2).collect();
//! assert_eq!(order.len(), 2);
//! assert_ne!(order[0], order[1]);
//! ```

mod hash;
mod ring;

pub use hash::fnv1a_64;
pub use ring::{Candidates, RingBackend, RingDiff, RingError, RingSnapshot};
