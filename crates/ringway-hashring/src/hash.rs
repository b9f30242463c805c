//! Stable 64-bit hashing for ring placement.
//!
//! FNV-1a is used for both virtual-node placement and request keys. The ring
//! depends on the hash being identical across processes, platforms, and
//! releases, which rules out `std`'s randomly seeded hashers.

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over raw bytes.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Placement hash for one virtual node: `"{id}:{index}"` plus a salt.
///
/// The salt is zero for the canonical position and is only bumped to perturb
/// a colliding virtual node until its hash is unique within the ring.
pub(crate) fn vnode_hash(id: &str, index: u32, salt: u32) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in id.as_bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h ^= u64::from(b':');
    h = h.wrapping_mul(FNV_PRIME);
    for b in index.to_le_bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    for b in salt.to_le_bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}
