//! Relocation and load-spread simulations over large synthetic key sets.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ringway_core::BackendId;
use ringway_hashring::{RingBackend, RingSnapshot};

const VNODES: u32 = 128;
const KEYS: usize = 20_000;

fn backends(count: usize) -> Vec<RingBackend> {
    (0..count)
        .map(|i| RingBackend::new(BackendId::new(format!("backend-{i:02}"))))
        .collect()
}

fn random_keys(count: usize, seed: u64) -> Vec<[u8; 16]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.random()).collect()
}

#[test]
fn adding_a_backend_relocates_about_one_in_b_plus_one_keys() {
    let mut set = backends(9);
    let before = RingSnapshot::build(&set, VNODES).unwrap();
    set.push(RingBackend::new(BackendId::new("backend-new")));
    let after = RingSnapshot::build(&set, VNODES).unwrap();

    let keys = random_keys(KEYS, 7);
    let moved = keys
        .iter()
        .filter(|k| before.primary(&k[..]) != after.primary(&k[..]))
        .count();

    // Expected fraction is 1/10; allow generous slack for vnode variance.
    let fraction = moved as f64 / KEYS as f64;
    assert!(
        (0.05..0.16).contains(&fraction),
        "relocated fraction {fraction} outside expected band"
    );
}

#[test]
fn relocated_keys_only_move_to_the_new_backend() {
    let mut set = backends(5);
    let before = RingSnapshot::build(&set, VNODES).unwrap();
    set.push(RingBackend::new(BackendId::new("backend-new")));
    let after = RingSnapshot::build(&set, VNODES).unwrap();

    for key in random_keys(KEYS, 11) {
        let old_owner = before.primary(&key).unwrap();
        let new_owner = after.primary(&key).unwrap();
        if new_owner != old_owner {
            assert_eq!(new_owner.as_str(), "backend-new");
        }
    }
}

#[test]
fn removed_backends_keys_scatter_and_no_other_key_moves() {
    let set = backends(6);
    let before = RingSnapshot::build(&set, VNODES).unwrap();
    let survivors: Vec<RingBackend> = set
        .iter()
        .filter(|b| b.id.as_str() != "backend-03")
        .cloned()
        .collect();
    let after = RingSnapshot::build(&survivors, VNODES).unwrap();

    let mut orphaned = 0usize;
    for key in random_keys(KEYS, 13) {
        let old_owner = before.primary(&key).unwrap();
        let new_owner = after.primary(&key).unwrap();
        if old_owner.as_str() == "backend-03" {
            orphaned += 1;
            assert_ne!(new_owner.as_str(), "backend-03");
        } else {
            assert_eq!(new_owner, old_owner);
        }
    }
    assert!(orphaned > 0, "departed backend owned no keys at all");
}

#[test]
fn load_spreads_roughly_evenly_across_equal_weights() {
    let ring = RingSnapshot::build(&backends(4), VNODES).unwrap();

    let mut counts: HashMap<BackendId, usize> = HashMap::new();
    for key in random_keys(KEYS, 17) {
        *counts.entry(ring.primary(&key).unwrap().clone()).or_default() += 1;
    }

    // Each of the four backends should land near a quarter of the keys.
    assert_eq!(counts.len(), 4);
    for (id, count) in &counts {
        let share = *count as f64 / KEYS as f64;
        assert!(
            (0.15..0.35).contains(&share),
            "{id} owns share {share} of the keyspace"
        );
    }
}

#[test]
fn weight_shifts_keyspace_share_proportionally() {
    let set = vec![
        RingBackend::weighted(BackendId::new("heavy"), 3),
        RingBackend::weighted(BackendId::new("light"), 1),
    ];
    let ring = RingSnapshot::build(&set, VNODES).unwrap();

    let heavy = random_keys(KEYS, 19)
        .iter()
        .filter(|k| ring.primary(&k[..]).unwrap().as_str() == "heavy")
        .count();

    let share = heavy as f64 / KEYS as f64;
    assert!(
        (0.65..0.85).contains(&share),
        "weight-3 backend owns share {share}, expected near 0.75"
    );
}
