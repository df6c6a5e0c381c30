//! Read leases returned by [`Handle::dump`](crate::Handle::dump).
//!
//! A [`Lease`] is the read window on one stored value. In the zero-copy
//! case it owns the handle's read guard, so the bytes it points at cannot
//! be freed or moved until the lease is gone. In the copied case it owns a
//! private buffer and holds no lock at all. Either way, releasing is just
//! dropping the lease; [`Lease::release`] spells that out at call sites.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::ArcRwLockReadGuard;
use parking_lot::RawRwLock;

use crate::free_list::ByteRange;
use crate::handle::Layout;
use crate::raw::Arena;

enum LeaseBody {
    /// Borrow of one arena range, pinned by the handle's read lock.
    Shared {
        _guard: ArcRwLockReadGuard<RawRwLock, Layout>,
        arena: Arc<Arena>,
        range: ByteRange,
    },
    /// Copy of a multi-fragment (or empty) value.
    Owned(Vec<u8>),
}

/// A read view of a stored value.
///
/// Dereferences to `[u8]`. While a zero-copy lease is alive, `delete`,
/// `reorder` and group deletion touching its handle block; holding one
/// forever stalls those operations forever.
#[must_use = "dropping a lease immediately releases it"]
pub struct Lease {
    body: LeaseBody,
}

impl Lease {
    pub(crate) fn shared(
        guard: ArcRwLockReadGuard<RawRwLock, Layout>,
        arena: Arc<Arena>,
        range: ByteRange,
    ) -> Self {
        Self {
            body: LeaseBody::Shared {
                _guard: guard,
                arena,
                range,
            },
        }
    }

    pub(crate) fn owned(buf: Vec<u8>) -> Self {
        Self {
            body: LeaseBody::Owned(buf),
        }
    }

    /// The value's bytes.
    #[allow(unsafe_code)]
    pub fn as_slice(&self) -> &[u8] {
        match &self.body {
            LeaseBody::Shared { arena, range, .. } => {
                // SAFETY: `_guard` is a read lock on the owning handle and
                // lives as long as `self`; every writer of these bytes
                // (delete, reorder commit, group retirement) takes that
                // handle's write lock first.
                unsafe { arena.read(*range) }
            }
            LeaseBody::Owned(buf) => buf,
        }
    }

    /// Whether this lease borrows the arena directly (and holds a lock).
    pub fn is_zero_copy(&self) -> bool {
        matches!(self.body, LeaseBody::Shared { .. })
    }

    /// Copy the bytes out, releasing the lease.
    pub fn to_vec(self) -> Vec<u8> {
        if let LeaseBody::Owned(buf) = self.body {
            return buf;
        }
        self.as_slice().to_vec()
    }

    /// End the lease. Equivalent to dropping it.
    pub fn release(self) {}
}

impl Deref for Lease {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Lease {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("len", &self.len())
            .field("zero_copy", &self.is_zero_copy())
            .finish()
    }
}
