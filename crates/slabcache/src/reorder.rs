//! Group compaction.
//!
//! [`Group::reorder`] rewrites every live value of a group into one
//! contiguous run starting at offset 0, in live-set order, leaving a single
//! free range at the end of the slab. Handles keep their identity: their
//! fragment lists are overwritten in place.
//!
//! The work is split so the group lock is held as briefly as possible:
//!
//! 1. **Build**, without the group lock: dump each value in turn into a
//!    scratch image of the slab, allocating from a scratch free-list that
//!    starts fully free. Nothing about the live group changes here.
//! 2. **Commit**, under the group lock and every value's write lock: copy
//!    the image over the slab, swap in the scratch free-list and the new
//!    fragment lists.
//!
//! If a `put` or `delete` slipped in between the two phases, the build is
//! redone while the group lock is held, which cannot be interrupted.

use parking_lot::MutexGuard;
use tracing::{debug, warn};

use crate::error::{PoolError, Result};
use crate::free_list::{ByteRange, FreeList, Fragments};
use crate::group::{Group, GroupState};
use crate::handle::Handle;

/// Output of the build phase.
struct Plan {
    /// New slab contents; only the first `used` bytes are meaningful.
    image: Vec<u8>,
    /// Free-list after repacking.
    free: FreeList,
    /// New fragments for each handle, in live-set order.
    moves: Vec<(Handle, Fragments)>,
}

impl Plan {
    fn used(&self) -> usize {
        self.image.len() - self.free.total()
    }
}

/// Copy every value of `handles` into a fresh scratch image.
fn build(size: usize, handles: Vec<Handle>) -> Result<Plan> {
    let mut image = vec![0u8; size];
    let mut free = FreeList::with_range(ByteRange::new(0, size));
    let mut moves = Vec::with_capacity(handles.len());

    for handle in handles {
        let lease = handle.dump()?;
        let fragments = free
            .take_front(lease.len())
            .ok_or(PoolError::NoSpareSpace {
                requested: lease.len(),
                available: free.total(),
            })?;
        let mut cursor = 0;
        for fragment in &fragments {
            let end = cursor + fragment.len();
            image[fragment.start..fragment.end].copy_from_slice(&lease[cursor..end]);
            cursor = end;
        }
        lease.release();
        moves.push((handle, fragments));
    }

    Ok(Plan { image, free, moves })
}

/// Apply `plan` to the group. Caller holds the group lock.
fn commit(group: &Group, state: &mut GroupState, plan: Plan) {
    debug_assert_eq!(plan.free.total(), state.free_size);
    let used = plan.used();
    let (handles, layouts): (Vec<Handle>, Vec<Fragments>) = plan.moves.into_iter().unzip();

    // Live-set order; every reorder of this group takes the locks the same way.
    let mut guards: Vec<_> = handles.iter().map(|h| h.layout().write()).collect();
    group.write_image(&plan.image[..used]);
    for (guard, fragments) in guards.iter_mut().zip(layouts) {
        guard.fragments = fragments;
    }
    drop(guards);

    state.free = plan.free;
}

impl Group {
    /// Compact the group so all free bytes form one range.
    ///
    /// Live values are repacked from offset 0 in insertion order and each
    /// ends up in a single fragment. Handles stay valid and keep their
    /// identity. Blocks until outstanding leases on this group's values
    /// are released; a caller holding a lease on one of them must drop it
    /// before calling this.
    pub fn reorder(&self) -> Result<()> {
        let (handles, epoch) = {
            let state = self.lock_live()?;
            (state.live.values().cloned().collect::<Vec<_>>(), state.epoch)
        };
        let count = handles.len();
        let attempt = build(self.size(), handles);

        let mut state = self.lock_live()?;
        let plan = match attempt {
            Ok(plan) if state.epoch == epoch => plan,
            Ok(_) | Err(PoolError::HandleNotFound { .. }) => {
                warn!(group = %self.id(), "live set changed during reorder, rebuilding under lock");
                rebuild_locked(self, &state)?
            }
            Err(e) => return Err(e),
        };

        let before = state.free.len();
        commit(self, &mut state, plan);
        debug!(
            group = %self.id(),
            values = count,
            free_ranges_before = before,
            free_ranges_after = state.free.len(),
            "reorder"
        );
        Ok(())
    }
}

/// Build again with the group lock held. No put or delete can run, so
/// every handle stays live for the whole build.
fn rebuild_locked(group: &Group, state: &MutexGuard<'_, GroupState>) -> Result<Plan> {
    let handles = state.live.values().cloned().collect();
    build(group.size(), handles)
}
