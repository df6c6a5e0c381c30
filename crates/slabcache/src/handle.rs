//! Object handles.
//!
//! A [`Handle`] is the record of one stored value: which group owns it,
//! the byte fragments that hold it, and its logical length. All clones of
//! a handle share one record, so when `reorder` rewrites the fragment list
//! every clone observes the new layout.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{PoolError, Result};
use crate::free_list::{ByteRange, Fragments};
use crate::id::{GroupId, HandleId};
use crate::lease::Lease;
use crate::raw::Arena;

/// Where a value's bytes live, relative to its group's slab.
///
/// Guarded by the handle's reader/writer lock: readers hold it for the
/// duration of a zero-copy [`Lease`], writers (`delete`, `reorder`,
/// group deletion) hold it while they move or free the bytes.
#[derive(Debug)]
pub(crate) struct Layout {
    /// Fragments in allocation order. Their concatenation is the value.
    pub(crate) fragments: Fragments,
    /// Logical length in bytes.
    pub(crate) len: usize,
    /// Cleared when the value is deleted or its group is destroyed.
    pub(crate) live: bool,
}

impl Layout {
    /// Drop the fragments and mark the value as gone.
    pub(crate) fn invalidate(&mut self) -> Fragments {
        self.live = false;
        std::mem::take(&mut self.fragments)
    }
}

struct HandleInner {
    id: HandleId,
    group: GroupId,
    arena: Arc<Arena>,
    /// Arena offset of the owning group's slab.
    base: usize,
    layout: Arc<RwLock<Layout>>,
}

/// Opaque reference to a value stored in a [`Group`](crate::Group).
///
/// Cloning is cheap and every clone refers to the same value. A handle
/// stays valid until it is passed to [`Group::delete`](crate::Group::delete)
/// or its group is passed to [`Pool::delete_group`](crate::Pool::delete_group);
/// after that [`dump`](Self::dump) reports [`PoolError::HandleNotFound`].
#[derive(Clone)]
#[must_use]
pub struct Handle {
    inner: Arc<HandleInner>,
}

impl Handle {
    pub(crate) fn new(
        group: GroupId,
        arena: Arc<Arena>,
        base: usize,
        fragments: Fragments,
        len: usize,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: HandleId::next(),
                group,
                arena,
                base,
                layout: Arc::new(RwLock::new(Layout {
                    fragments,
                    len,
                    live: true,
                })),
            }),
        }
    }

    /// Read the stored bytes.
    ///
    /// A value held in one fragment is returned zero-copy: the lease keeps
    /// this handle's read lock until it is dropped or
    /// [`released`](Lease::release), and `delete`/`reorder` of this handle
    /// wait for it. A value split across several fragments is copied into
    /// an owned buffer and the read lock is dropped before returning.
    ///
    /// Any number of leases on the same handle may be held at once.
    pub fn dump(&self) -> Result<Lease> {
        let layout = self.inner.layout.read_arc();
        if !layout.live {
            return Err(PoolError::HandleNotFound {
                handle: self.inner.id,
            });
        }
        match layout.fragments.len() {
            0 => Ok(Lease::owned(Vec::new())),
            1 => {
                let range = layout.fragments[0].offset_by(self.inner.base);
                Ok(Lease::shared(layout, Arc::clone(&self.inner.arena), range))
            }
            _ => {
                let mut buf = Vec::with_capacity(layout.len);
                for fragment in layout.fragments.iter() {
                    self.copy_fragment(*fragment, &mut buf);
                }
                drop(layout);
                Ok(Lease::owned(buf))
            }
        }
    }

    /// Append one fragment's bytes to `buf`.
    ///
    /// Caller holds this handle's read lock.
    #[allow(unsafe_code)]
    fn copy_fragment(&self, fragment: ByteRange, buf: &mut Vec<u8>) {
        // SAFETY: the fragment belongs to this live handle and the caller
        // holds its read lock, so no writer can touch these bytes until the
        // copy has finished.
        let bytes = unsafe { self.inner.arena.read(fragment.offset_by(self.inner.base)) };
        buf.extend_from_slice(bytes);
    }

    /// Unique identifier of this value.
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Group (slab) this value was stored in.
    pub fn group(&self) -> GroupId {
        self.inner.group
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.inner.layout.read().len
    }

    /// Whether the stored value is zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the value is still stored (not deleted, group not destroyed).
    pub fn is_live(&self) -> bool {
        self.inner.layout.read().live
    }

    /// Number of fragments backing the value.
    pub fn fragment_count(&self) -> usize {
        self.inner.layout.read().fragments.len()
    }

    /// Fragments backing the value, as offsets within the group's slab.
    pub fn fragments(&self) -> Vec<ByteRange> {
        self.inner.layout.read().fragments.to_vec()
    }

    /// Whether two handles refer to the same stored value.
    pub fn same_value(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn layout(&self) -> &RwLock<Layout> {
        &self.inner.layout
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = self.inner.layout.read();
        f.debug_struct("Handle")
            .field("id", &self.inner.id)
            .field("group", &self.inner.group)
            .field("len", &layout.len)
            .field("fragments", &layout.fragments.as_slice())
            .field("live", &layout.live)
            .finish()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}, group={})", self.inner.id, self.inner.group)
    }
}
