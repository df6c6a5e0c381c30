//! Fixed-capacity slab object store.
//!
//! A single contiguous byte arena is divided into equal-size slabs
//! ("groups"). Values are packed into a group's free byte ranges,
//! read back through a [`Handle`], and reclaimed on demand. Nothing is
//! heap-allocated per stored value except the handle record itself.
//!
//! # Architecture
//!
//! ```text
//! Pool (arena owner)
//! ├── Arena: Box<[UnsafeCell<u8>]>, total_size bytes, shared via Arc
//! ├── FreeList of unallocated slab ranges (pool lock)
//! └── Group × N (one slab each)
//!     ├── FreeList of free byte ranges inside the slab (group lock)
//!     ├── free_size counter
//!     └── BTreeMap<HandleId, Handle> (live set, insertion order)
//!         └── Handle → RwLock<Layout> (fragments + len)
//! ```
//!
//! # Locking
//!
//! Lock order is pool → group → handle. [`Handle::dump`] only ever takes
//! the handle's read lock, so readers never contend with the group lock.
//! A [`Lease`] owns that read lock (zero-copy case) until it is dropped.
//!
//! # Safety
//!
//! The arena's raw read/write primitives live in `raw.rs`. Their few call
//! sites (value writes in `group`, fragment copies in `handle`, the
//! zero-copy view in `lease`) opt back in with `#[allow(unsafe_code)]`.
//! A byte is written only while it is free or while its owner is
//! write-locked, and read only under its owner's read lock.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod free_list;
pub mod group;
pub mod handle;
pub mod id;
pub mod lease;
pub mod pool;
mod raw;
mod reorder;

// Public re-exports for the primary API surface.
pub use codec::{BincodeCodec, BytesCodec, Codec};
pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use free_list::{ByteRange, FreeList};
pub use group::{Group, GroupStats};
pub use handle::Handle;
pub use id::{GroupId, HandleId, PoolId};
pub use lease::Lease;
pub use pool::Pool;
