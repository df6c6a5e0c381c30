//! The pool: arena owner and slab allocator.
//!
//! [`Pool`] allocates the whole arena once and divides it into equal-size
//! slabs. Unallocated slabs sit on a [`FreeList`]; [`Pool::new_group`]
//! pops the lowest one and [`Pool::delete_group`] puts it back. Slabs are
//! uniform, so the slab list is never coalesced.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::free_list::{ByteRange, FreeList};
use crate::group::Group;
use crate::id::{GroupId, PoolId};
use crate::raw::Arena;

/// Fixed-capacity arena divided into slabs.
///
/// `Pool` is `Send + Sync`; share it across threads with `Arc` or scoped
/// borrows. Groups hold their own reference to the arena, so a group (and
/// its handles) may outlive a borrow of the pool, but its slab only
/// returns to circulation through [`delete_group`](Self::delete_group).
pub struct Pool {
    id: PoolId,
    config: PoolConfig,
    arena: Arc<Arena>,
    /// Unallocated slabs, each exactly `slab_size` bytes.
    free_slabs: Mutex<FreeList>,
}

// Compile-time assertion: pools and groups must be shareable across threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Pool>();
    assert::<Group>();
};

impl Pool {
    /// Create a pool of `total_size` bytes split into `slab_size`-byte slabs.
    ///
    /// Fails with [`PoolError::InvalidConfig`] if `slab_size` is zero or
    /// above [`PoolConfig::MAX_SLAB_SIZE`], or `total_size` is not a
    /// multiple of `slab_size`.
    pub fn new(total_size: usize, slab_size: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(total_size, slab_size))
    }

    /// Create a pool from a config value.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let mut free_slabs = FreeList::new();
        for slab in 0..config.slab_count() {
            let start = slab * config.slab_size;
            free_slabs.insert(ByteRange::new(start, start + config.slab_size));
        }

        let id = PoolId::next();
        debug!(
            pool = %id,
            total_size = config.total_size,
            slab_size = config.slab_size,
            slabs = config.slab_count(),
            "pool created"
        );
        Ok(Self {
            id,
            arena: Arc::new(Arena::new(config.total_size)),
            config,
            free_slabs: Mutex::new(free_slabs),
        })
    }

    /// Allocate one slab as a new, empty group.
    ///
    /// Fails with [`PoolError::NoSpareSpace`] when every slab is in use.
    pub fn new_group(&self) -> Result<Group> {
        let slab_size = self.config.slab_size;
        let range = self
            .free_slabs
            .lock()
            .pop_front()
            .ok_or(PoolError::NoSpareSpace {
                requested: slab_size,
                available: 0,
            })?;

        let id = GroupId {
            pool: self.id,
            slab: range.start / slab_size,
        };
        debug!(group = %id, offset = range.start, "group created");
        Ok(Group::new(id, Arc::clone(&self.arena), range.start, slab_size))
    }

    /// Return a group's slab to the pool.
    ///
    /// Waits for every outstanding lease on the group's values, then
    /// invalidates all of them: afterwards their handles report
    /// [`PoolError::HandleNotFound`] and the group itself rejects every
    /// operation with [`PoolError::GroupNotFound`].
    ///
    /// Fails with [`PoolError::GroupNotFound`] if the group belongs to a
    /// different pool, does not sit on a slab boundary, or was already
    /// deleted.
    pub fn delete_group(&self, group: &Group) -> Result<()> {
        let range = self.resolve(group)?;
        if self.free_slabs.lock().contains(&range) {
            return Err(PoolError::GroupNotFound {
                offset: group.offset(),
            });
        }

        let released = group.retire()?;
        self.free_slabs.lock().insert(range);
        debug!(group = %group.id(), released, "group deleted");
        Ok(())
    }

    /// Map a group to the slab range it occupies in this pool's arena.
    fn resolve(&self, group: &Group) -> Result<ByteRange> {
        let offset = group.offset();
        let slab_size = self.config.slab_size;
        let ours = group.id().pool == self.id && Arc::ptr_eq(group.arena(), &self.arena);
        let aligned = offset % slab_size == 0 && group.size() == slab_size;
        let in_bounds = offset
            .checked_add(slab_size)
            .is_some_and(|end| end <= self.arena.len());
        if ours && aligned && in_bounds {
            Ok(ByteRange::new(offset, offset + slab_size))
        } else {
            Err(PoolError::GroupNotFound { offset })
        }
    }

    /// Pool identity.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// The geometry this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Total arena size in bytes.
    pub fn total_size(&self) -> usize {
        self.config.total_size
    }

    /// Slab size in bytes.
    pub fn slab_size(&self) -> usize {
        self.config.slab_size
    }

    /// Number of slabs in the arena.
    pub fn slab_count(&self) -> usize {
        self.config.slab_count()
    }

    /// Number of slabs not currently owned by a group.
    pub fn free_slabs(&self) -> usize {
        self.free_slabs.lock().len()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("total_size", &self.config.total_size)
            .field("slab_size", &self.config.slab_size)
            .field("free_slabs", &self.free_slabs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_has_all_slabs_free() {
        let pool = Pool::new(1024, 256).unwrap();
        assert_eq!(pool.slab_count(), 4);
        assert_eq!(pool.free_slabs(), 4);
    }

    #[test]
    fn invalid_geometry_rejected() {
        assert!(matches!(
            Pool::new(1000, 256),
            Err(PoolError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Pool::new(1024, 0),
            Err(PoolError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn groups_come_from_lowest_slab_first() {
        let pool = Pool::new(1024, 256).unwrap();
        let g0 = pool.new_group().unwrap();
        let g1 = pool.new_group().unwrap();
        assert_eq!(g0.offset(), 0);
        assert_eq!(g1.offset(), 256);
        assert_eq!(g1.id().slab, 1);
        assert_eq!(g0.size(), 256);
    }

    #[test]
    fn exhausted_pool_reports_no_spare_space() {
        let pool = Pool::new(512, 256).unwrap();
        let _g0 = pool.new_group().unwrap();
        let _g1 = pool.new_group().unwrap();
        assert_eq!(
            pool.new_group().unwrap_err(),
            PoolError::NoSpareSpace {
                requested: 256,
                available: 0
            }
        );
    }

    #[test]
    fn deleted_slab_is_reused() {
        let pool = Pool::new(512, 256).unwrap();
        let g0 = pool.new_group().unwrap();
        let _g1 = pool.new_group().unwrap();
        pool.delete_group(&g0).unwrap();
        assert_eq!(pool.free_slabs(), 1);
        let g2 = pool.new_group().unwrap();
        assert_eq!(g2.offset(), 0);
        assert_eq!(g2.free_size(), 256);
    }

    #[test]
    fn deleting_twice_is_group_not_found() {
        let pool = Pool::new(512, 256).unwrap();
        let g = pool.new_group().unwrap();
        pool.delete_group(&g).unwrap();
        assert_eq!(
            pool.delete_group(&g),
            Err(PoolError::GroupNotFound { offset: 0 })
        );
        assert_eq!(pool.free_slabs(), 2);
    }

    #[test]
    fn foreign_group_is_not_found() {
        let a = Pool::new(512, 256).unwrap();
        let b = Pool::new(512, 256).unwrap();
        let g = a.new_group().unwrap();
        assert!(matches!(
            b.delete_group(&g),
            Err(PoolError::GroupNotFound { .. })
        ));
        assert!(!g.is_retired());
        assert_eq!(b.free_slabs(), 2);
    }

    #[test]
    fn delete_group_invalidates_handles() {
        let pool = Pool::new(256, 256).unwrap();
        let g = pool.new_group().unwrap();
        let h = g.put(b"payload").unwrap();
        pool.delete_group(&g).unwrap();
        assert!(matches!(h.dump(), Err(PoolError::HandleNotFound { .. })));

        // The slab is handed out again, and the stale handle still cannot
        // see the new owner's bytes.
        let g2 = pool.new_group().unwrap();
        let _h2 = g2.put(b"fresh").unwrap();
        assert!(h.dump().is_err());
        assert!(matches!(
            g2.delete(&h),
            Err(PoolError::HandleNotFound { .. })
        ));
    }

    #[test]
    fn zero_size_pool_has_no_groups() {
        let pool = Pool::new(0, 64).unwrap();
        assert!(matches!(
            pool.new_group(),
            Err(PoolError::NoSpareSpace { .. })
        ));
    }
}
