//! The shared byte arena.
//!
//! This module defines the crate's only `unsafe` operations. [`Arena`] is a
//! fixed-size `Box<[UnsafeCell<u8>]>` shared by every group of a pool.
//! Groups write into disjoint slabs and, inside a slab, into ranges the
//! group's free-list (or a write-locked handle) owns exclusively; readers
//! only look at ranges protected by a handle read lock. Those protocols
//! live in `group.rs`, `handle.rs` and `reorder.rs`; this module just
//! exposes the two primitive accesses with their obligations spelled out.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;

use crate::free_list::ByteRange;

/// Contiguous, fixed-size byte storage shared across threads.
pub(crate) struct Arena {
    cells: Box<[UnsafeCell<u8>]>,
}

// SAFETY: the arena hands out `&[u8]` views and performs writes only
// through `read`/`write`, whose callers guarantee that no byte is written
// while any view of it is alive. With that guarantee, sharing the buffer
// between threads is no different from sharing disjoint `&mut [u8]` and
// `&[u8]` slices.
unsafe impl Sync for Arena {}

impl Arena {
    /// Allocate a zeroed arena of `len` bytes.
    pub(crate) fn new(len: usize) -> Self {
        let cells = (0..len).map(|_| UnsafeCell::new(0u8)).collect();
        Self { cells }
    }

    /// Arena size in bytes.
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Borrow the bytes of `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    ///
    /// # Safety
    ///
    /// No call to [`write`](Self::write) may target any byte of `range`
    /// while the returned slice is alive.
    pub(crate) unsafe fn read(&self, range: ByteRange) -> &[u8] {
        let cells = &self.cells[range.start..range.end];
        // SAFETY: `UnsafeCell<u8>` has the same layout as `u8`, the slice
        // bounds were checked by the index above, and the caller promises
        // there is no concurrent writer for these bytes.
        unsafe { std::slice::from_raw_parts(UnsafeCell::raw_get(cells.as_ptr()), cells.len()) }
    }

    /// Copy `src` into the arena starting at `range.start`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds or `src.len() != range.len()`.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive ownership of every byte in `range`:
    /// no slice returned by [`read`](Self::read) may overlap it and no other
    /// thread may write it concurrently.
    pub(crate) unsafe fn write(&self, range: ByteRange, src: &[u8]) {
        assert_eq!(src.len(), range.len(), "write length mismatch");
        let cells = &self.cells[range.start..range.end];
        // SAFETY: bounds checked above; writes go through `UnsafeCell`, and
        // the caller guarantees exclusive access to these bytes. `src`
        // cannot alias the destination because the destination is not
        // borrowed as `&[u8]` by anyone.
        unsafe {
            std::ptr::copy_nonoverlapping(
                src.as_ptr(),
                UnsafeCell::raw_get(cells.as_ptr()),
                src.len(),
            );
        }
    }
}
