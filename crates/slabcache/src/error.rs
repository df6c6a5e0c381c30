//! Pool error types.

use thiserror::Error;

use crate::id::HandleId;

/// Errors that can occur during pool, group, and handle operations.
///
/// None of these are fatal: the pool stays usable after any of them.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Pool geometry rejected at construction.
    #[error("invalid pool config (total {total_size} bytes, slab {slab_size} bytes): {reason}")]
    InvalidConfig {
        /// Requested total arena size in bytes.
        total_size: usize,
        /// Requested slab size in bytes.
        slab_size: usize,
        /// Which constraint was violated.
        reason: &'static str,
    },
    /// Not enough free capacity: the pool has no spare slab, or the group
    /// has fewer free bytes than requested.
    #[error("no spare space: requested {requested} bytes, {available} bytes available")]
    NoSpareSpace {
        /// Number of bytes requested.
        requested: usize,
        /// Free bytes at the time of the request.
        available: usize,
    },
    /// The handle is not live in this group (double delete, cross-group
    /// handle, or the owning group was deleted).
    #[error("handle {handle} not found")]
    HandleNotFound {
        /// The handle that was not found.
        handle: HandleId,
    },
    /// The group does not map to an allocated slab of this pool.
    #[error("group at offset {offset} not found")]
    GroupNotFound {
        /// The group's base offset within its arena.
        offset: usize,
    },
    /// A value could not be converted to or from bytes.
    #[error("codec error: {reason}")]
    Codec {
        /// Description from the underlying codec.
        reason: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PoolError>;
