//! Strongly-typed identifiers for pools, groups, and handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`PoolId`] allocation.
static POOL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Counter for unique [`HandleId`] allocation.
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a [`Pool`](crate::Pool).
///
/// Two distinct pools always have different IDs, so a group carved from
/// one pool can never be mistaken for a slab of another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    /// Allocate a fresh, unique pool ID. Thread-safe.
    pub fn next() -> Self {
        Self(POOL_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a group by its pool and slab index.
///
/// Slab `n` covers arena bytes `[n * slab_size, (n + 1) * slab_size)`.
/// A slab index is reused once its group is deleted and the slab is handed
/// out again, so `GroupId` names a slab, not a group lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId {
    /// Pool the slab belongs to.
    pub pool: PoolId,
    /// Index of the slab within the pool's arena.
    pub slab: usize,
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pool, self.slab)
    }
}

/// Process-unique identifier for a stored value.
///
/// Allocated from a monotonic atomic counter, so a deleted handle's ID is
/// never reused by a later `put`. This is what makes double-delete
/// detection reliable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Allocate a fresh handle ID. Thread-safe.
    pub fn next() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_ids_are_unique() {
        assert_ne!(PoolId::next(), PoolId::next());
    }

    #[test]
    fn handle_ids_are_monotonic() {
        let a = HandleId::next();
        let b = HandleId::next();
        assert!(b > a);
    }

    #[test]
    fn group_id_display() {
        let pool = PoolId(7);
        let id = GroupId { pool, slab: 3 };
        assert_eq!(id.to_string(), "7/3");
    }
}
