//! Benchmark fixtures for slabcache.
//!
//! - [`reference_pool`]: 16 MiB arena in 64 KiB slabs
//! - [`value_sizes`]: deterministic value lengths via seed
//! - [`fragmented_group`]: a group with every other value deleted

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slabcache::{Group, Handle, Pool, PoolConfig, PoolError};

/// Slab size used by the reference profile.
pub const REFERENCE_SLAB: usize = 64 * 1024;

/// Build the reference benchmark pool: 256 slabs of 64 KiB.
pub fn reference_pool() -> Pool {
    Pool::with_config(PoolConfig::new(256 * REFERENCE_SLAB, REFERENCE_SLAB))
        .unwrap_or_else(|e| panic!("reference profile rejected: {e}"))
}

/// Generate `n` value lengths in `min..max`, deterministic for a seed.
pub fn value_sizes(n: usize, min: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(min..max)).collect()
}

/// Fill `group` with values of the given sizes until it runs out of space,
/// then delete every other one so the free-list is maximally split.
///
/// Returns the surviving handles. Panics if the group rejects a put for
/// any reason other than running out of space, or rejects a delete.
pub fn fragmented_group(group: &Group, sizes: &[usize]) -> Vec<Handle> {
    let mut handles = Vec::with_capacity(sizes.len());
    for &len in sizes {
        match group.put(&vec![0x5A; len]) {
            Ok(h) => handles.push(h),
            Err(PoolError::NoSpareSpace { .. }) => break,
            Err(e) => panic!("fixture put of {len} bytes failed: {e}"),
        }
    }
    let mut kept = Vec::with_capacity(handles.len() / 2 + 1);
    for (i, h) in handles.into_iter().enumerate() {
        if i % 2 == 0 {
            group
                .delete(&h)
                .unwrap_or_else(|e| panic!("fixture delete of {} failed: {e}", h.id()));
        } else {
            kept.push(h);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_pool_geometry() {
        let pool = reference_pool();
        assert_eq!(pool.slab_count(), 256);
        assert_eq!(pool.slab_size(), REFERENCE_SLAB);
    }

    #[test]
    fn value_sizes_deterministic() {
        let a = value_sizes(100, 8, 256, 42);
        let b = value_sizes(100, 8, 256, 42);
        assert_eq!(a, b);
        assert!(a.iter().all(|&n| (8..256).contains(&n)));
    }

    #[test]
    fn fragmented_group_splits_free_list() {
        let pool = reference_pool();
        let group = pool.new_group().unwrap();
        let sizes = value_sizes(4096, 16, 128, 7);
        let kept = fragmented_group(&group, &sizes);
        assert!(!kept.is_empty());
        assert!(group.fragmentation() > kept.len() / 2);
        assert_eq!(group.live_count(), kept.len());
    }

    #[test]
    #[should_panic(expected = "fixture put")]
    fn fragmented_group_panics_on_retired_group() {
        let pool = reference_pool();
        let group = pool.new_group().unwrap();
        pool.delete_group(&group).unwrap();
        fragmented_group(&group, &[16, 16]);
    }
}
