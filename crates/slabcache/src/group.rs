//! Groups: one slab of the pool's arena with its own byte free-list.
//!
//! A [`Group`] packs values into the free ranges of its slab first-fit
//! from the lowest offset, splitting a value across several ranges when
//! no single one is large enough. Deleting a value returns its fragments
//! to the free-list and merges neighbours, so a put followed by a delete
//! leaves the free-list exactly as it was.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::error::{PoolError, Result};
use crate::free_list::{ByteRange, FreeList, Fragments};
use crate::handle::Handle;
use crate::id::{GroupId, HandleId};
use crate::raw::Arena;

/// Mutable group bookkeeping, guarded by the group lock.
pub(crate) struct GroupState {
    /// Free ranges inside the slab, relative to its base.
    pub(crate) free: FreeList,
    /// Free bytes; always equals `free.total()`.
    pub(crate) free_size: usize,
    /// Live values. Handle ids only grow, so key order is insertion order.
    pub(crate) live: BTreeMap<HandleId, Handle>,
    /// Bumped by every put and delete. `reorder` uses it to notice that the
    /// live set changed while it was building without the lock.
    pub(crate) epoch: u64,
    /// Set once the group has been handed back to its pool.
    pub(crate) retired: bool,
}

/// One slab of a [`Pool`](crate::Pool).
///
/// All methods take `&self`; share a group between threads with `Arc`.
/// A group must be returned with [`Pool::delete_group`](crate::Pool::delete_group)
/// for its slab to become available again. Dropping it without that keeps
/// the slab allocated until the pool itself is dropped.
pub struct Group {
    id: GroupId,
    arena: Arc<Arena>,
    /// Arena offset of the first byte of the slab.
    base: usize,
    size: usize,
    pub(crate) state: Mutex<GroupState>,
}

/// Point-in-time counters for a [`Group`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupStats {
    /// Slab size in bytes.
    pub size: usize,
    /// Free bytes.
    pub free_size: usize,
    /// Number of live values.
    pub live_count: usize,
    /// Number of free ranges. 1 (or 0 when full) means no fragmentation.
    pub free_ranges: usize,
    /// Size of the largest free range.
    pub largest_free_range: usize,
}

impl Group {
    pub(crate) fn new(id: GroupId, arena: Arc<Arena>, base: usize, size: usize) -> Self {
        Self {
            id,
            arena,
            base,
            size,
            state: Mutex::new(GroupState {
                free: FreeList::with_range(ByteRange::new(0, size)),
                free_size: size,
                live: BTreeMap::new(),
                epoch: 0,
                retired: false,
            }),
        }
    }

    /// Store a copy of `value` and return its handle.
    ///
    /// Fails with [`PoolError::NoSpareSpace`] when `value` is longer than
    /// the group's free bytes. Otherwise always succeeds, splitting the
    /// value across as many free ranges as needed.
    pub fn put(&self, value: &[u8]) -> Result<Handle> {
        let mut state = self.lock_live()?;
        let len = value.len();
        if len > state.free_size {
            return Err(PoolError::NoSpareSpace {
                requested: len,
                available: state.free_size,
            });
        }
        let fragments = state
            .free
            .take_front(len)
            .ok_or(PoolError::NoSpareSpace {
                requested: len,
                available: state.free_size,
            })?;
        self.write_fragments(&fragments, value);
        state.free_size -= len;
        state.epoch += 1;

        let handle = Handle::new(self.id, Arc::clone(&self.arena), self.base, fragments, len);
        state.live.insert(handle.id(), handle.clone());
        trace!(
            group = %self.id,
            handle = %handle.id(),
            len,
            fragments = handle.fragment_count(),
            free_size = state.free_size,
            "put"
        );
        Ok(handle)
    }

    /// Free a value stored in this group.
    ///
    /// Waits until every outstanding zero-copy lease on `handle` has been
    /// released. Fails with [`PoolError::HandleNotFound`] if the handle is
    /// not live in this group.
    pub fn delete(&self, handle: &Handle) -> Result<()> {
        let mut state = self.lock_live()?;
        let id = handle.id();
        let owned = state
            .live
            .get(&id)
            .is_some_and(|live| live.same_value(handle));
        if !owned {
            return Err(PoolError::HandleNotFound { handle: id });
        }

        let mut layout = handle.layout().write();
        let len = layout.len;
        for fragment in layout.invalidate() {
            state.free.release(fragment);
        }
        drop(layout);
        state.free_size += len;
        state.live.remove(&id);
        state.epoch += 1;
        trace!(
            group = %self.id,
            handle = %id,
            len,
            free_ranges = state.free.len(),
            free_size = state.free_size,
            "delete"
        );
        Ok(())
    }

    /// Whether `handle` is a live value of this group.
    pub fn contains(&self, handle: &Handle) -> bool {
        self.state
            .lock()
            .live
            .get(&handle.id())
            .is_some_and(|live| live.same_value(handle))
    }

    /// Slab identity.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Byte offset of the slab within the pool's arena.
    pub fn offset(&self) -> usize {
        self.base
    }

    /// Slab size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Free bytes.
    pub fn free_size(&self) -> usize {
        self.state.lock().free_size
    }

    /// Number of live values.
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Snapshot of the free-list, relative to the slab start.
    pub fn free_ranges(&self) -> Vec<ByteRange> {
        self.state.lock().free.iter().collect()
    }

    /// Number of free ranges.
    pub fn fragmentation(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Handles of all live values, in insertion order.
    pub fn handles(&self) -> Vec<Handle> {
        self.state.lock().live.values().cloned().collect()
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> GroupStats {
        let state = self.state.lock();
        GroupStats {
            size: self.size,
            free_size: state.free_size,
            live_count: state.live.len(),
            free_ranges: state.free.len(),
            largest_free_range: state
                .free
                .iter()
                .map(|r| r.len())
                .max()
                .unwrap_or(0),
        }
    }

    /// Whether the group has been returned to its pool.
    pub fn is_retired(&self) -> bool {
        self.state.lock().retired
    }

    pub(crate) fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    /// Take the group lock, failing if the group was already retired.
    pub(crate) fn lock_live(&self) -> Result<MutexGuard<'_, GroupState>> {
        let state = self.state.lock();
        if state.retired {
            return Err(PoolError::GroupNotFound { offset: self.base });
        }
        Ok(state)
    }

    /// Invalidate every live value and mark the group retired.
    ///
    /// Blocks until all outstanding leases on this group's values are
    /// released. Returns the number of values that were dropped.
    pub(crate) fn retire(&self) -> Result<usize> {
        let mut state = self.lock_live()?;
        let released = state.live.len();
        {
            let mut layouts: Vec<_> = state.live.values().map(|h| h.layout().write()).collect();
            for layout in &mut layouts {
                layout.invalidate();
            }
        }
        state.live.clear();
        state.free = FreeList::with_range(ByteRange::new(0, self.size));
        state.free_size = self.size;
        state.retired = true;
        state.epoch += 1;
        Ok(released)
    }

    /// Copy `value` into the arena, fragment by fragment.
    ///
    /// Caller holds the group lock and the fragments were just taken from
    /// the free-list.
    #[allow(unsafe_code)]
    fn write_fragments(&self, fragments: &Fragments, value: &[u8]) {
        let mut cursor = 0;
        for fragment in fragments {
            let end = cursor + fragment.len();
            // SAFETY: the fragment was free until this call and the group
            // lock is held, so no lease can observe it and no other put can
            // be handed the same bytes.
            unsafe {
                self.arena
                    .write(fragment.offset_by(self.base), &value[cursor..end]);
            }
            cursor = end;
        }
    }

    /// Overwrite the first `image.len()` bytes of the slab.
    ///
    /// Caller holds the group lock and the write lock of every live value.
    #[allow(unsafe_code)]
    pub(crate) fn write_image(&self, image: &[u8]) {
        let range = ByteRange::new(self.base, self.base + image.len());
        // SAFETY: every live value of this group is write-locked, so no
        // lease exists over any byte of the slab; free bytes are never
        // leased.
        unsafe { self.arena.write(range, image) };
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("offset", &self.base)
            .field("size", &self.size)
            .field("free_size", &stats.free_size)
            .field("live_count", &stats.live_count)
            .finish()
    }
}
