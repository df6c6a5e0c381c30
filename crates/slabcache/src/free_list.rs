//! Ordered free-lists of byte ranges.
//!
//! [`FreeList`] backs both the pool's list of unallocated slabs and each
//! group's list of free bytes inside its slab. Ranges live in a
//! `BTreeMap` keyed by start offset: allocation pops from the head, and a
//! freed range merges with at most its two neighbours, so neither ever
//! scans the whole list.

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

/// A half-open byte range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    /// First byte of the range.
    pub start: usize,
    /// One past the last byte of the range.
    pub end: usize,
}

impl ByteRange {
    /// Create a range. `start` must not exceed `end`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted range {start}..{end}");
        Self { start, end }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the two ranges share at least one byte.
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The same range shifted by `base` bytes.
    pub(crate) fn offset_by(self, base: usize) -> Self {
        Self::new(self.start + base, self.end + base)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Fragment list produced by a single allocation. Most values fit in one
/// or two free ranges, so the common case stays inline.
pub(crate) type Fragments = SmallVec<[ByteRange; 2]>;

/// A set of disjoint free ranges ordered by start offset.
///
/// Keyed by start, so the head range, a range's neighbours and an insertion
/// point are all one tree lookup away. The byte total is cached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreeList {
    /// `start -> end` of every free range.
    ranges: BTreeMap<usize, usize>,
    total: usize,
}

impl FreeList {
    /// Create an empty free-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a free-list holding one range. An empty range yields an
    /// empty list.
    pub fn with_range(range: ByteRange) -> Self {
        let mut list = Self::new();
        list.insert(range);
        list
    }

    /// Insert a free range, keeping start order. Touching neighbours stay
    /// separate; see [`release`](Self::release) for the merging variant.
    pub fn insert(&mut self, range: ByteRange) {
        if range.is_empty() {
            return;
        }
        debug_assert!(
            self.predecessor(range.start).is_none_or(|p| p.end <= range.start),
            "free range {range} overlaps its predecessor"
        );
        debug_assert!(
            self.successor(range.start).is_none_or(|n| range.end <= n.start),
            "free range {range} overlaps its successor"
        );
        self.ranges.insert(range.start, range.end);
        self.total += range.len();
    }

    /// Insert a free range and merge it with the neighbours it touches.
    ///
    /// Only the ranges directly before and after `range` are examined, so
    /// a list that was coalesced before stays coalesced.
    pub fn release(&mut self, range: ByteRange) {
        if range.is_empty() {
            return;
        }
        let mut merged = range;
        if let Some(prev) = self.predecessor(range.start) {
            debug_assert!(prev.end <= range.start, "free range {range} overlaps {prev}");
            if prev.end == range.start {
                self.ranges.remove(&prev.start);
                merged.start = prev.start;
            }
        }
        if let Some(next) = self.successor(range.start) {
            debug_assert!(range.end <= next.start, "free range {range} overlaps {next}");
            if next.start == range.end {
                self.ranges.remove(&next.start);
                merged.end = next.end;
            }
        }
        self.ranges.insert(merged.start, merged.end);
        self.total += range.len();
    }

    /// Remove and return the head range.
    pub fn pop_front(&mut self) -> Option<ByteRange> {
        let (start, end) = self.ranges.pop_first()?;
        self.total -= end - start;
        Some(ByteRange::new(start, end))
    }

    /// Consume `len` bytes first-fit from the head of the list.
    ///
    /// Walks from the lowest range: a range that covers the remaining bytes
    /// is split (its start advances) and the walk stops; a smaller range is
    /// consumed whole as one fragment and the walk continues. Returns the
    /// fragments in allocation order, or `None` without touching the list
    /// if the total free bytes are less than `len`. Only the ranges that
    /// end up as fragments are visited.
    pub fn take_front(&mut self, len: usize) -> Option<Fragments> {
        if self.total < len {
            return None;
        }
        let mut fragments = Fragments::new();
        let mut remaining = len;
        while remaining > 0 {
            let (start, end) = self.ranges.pop_first()?;
            let available = end - start;
            if available > remaining {
                let split = start + remaining;
                fragments.push(ByteRange::new(start, split));
                self.ranges.insert(split, end);
                remaining = 0;
            } else {
                fragments.push(ByteRange::new(start, end));
                remaining -= available;
            }
        }
        self.total -= len;
        Some(fragments)
    }

    /// Total free bytes across all ranges.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of ranges in the list.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the list holds no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether `range` lies entirely inside one free range.
    pub fn contains(&self, range: &ByteRange) -> bool {
        self.ranges
            .range(..=range.start)
            .next_back()
            .is_some_and(|(&start, &end)| start <= range.start && range.end <= end)
    }

    /// The ranges, in start order.
    pub fn iter(&self) -> impl Iterator<Item = ByteRange> + '_ {
        self.ranges
            .iter()
            .map(|(&start, &end)| ByteRange::new(start, end))
    }

    /// The last range starting strictly before `offset`.
    fn predecessor(&self, offset: usize) -> Option<ByteRange> {
        self.ranges
            .range(..offset)
            .next_back()
            .map(|(&start, &end)| ByteRange::new(start, end))
    }

    /// The first range starting at or after `offset`.
    fn successor(&self, offset: usize) -> Option<ByteRange> {
        self.ranges
            .range(offset..)
            .next()
            .map(|(&start, &end)| ByteRange::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ranges: &[(usize, usize)]) -> FreeList {
        let mut l = FreeList::new();
        for &(s, e) in ranges {
            l.insert(ByteRange::new(s, e));
        }
        l
    }

    fn spans(l: &FreeList) -> Vec<(usize, usize)> {
        l.iter().map(|r| (r.start, r.end)).collect()
    }

    #[test]
    fn insert_keeps_start_order() {
        let l = list(&[(50, 60), (0, 10), (20, 30)]);
        assert_eq!(spans(&l), vec![(0, 10), (20, 30), (50, 60)]);
    }

    #[test]
    fn insert_ignores_empty_range() {
        let l = list(&[(5, 5)]);
        assert!(l.is_empty());
    }

    #[test]
    fn insert_keeps_touching_ranges_apart() {
        let l = list(&[(0, 256), (256, 512)]);
        assert_eq!(spans(&l), vec![(0, 256), (256, 512)]);
        assert_eq!(l.total(), 512);
    }

    #[test]
    fn release_merges_both_neighbours() {
        let mut l = list(&[(0, 10), (20, 30), (50, 60)]);
        l.release(ByteRange::new(10, 20));
        assert_eq!(spans(&l), vec![(0, 30), (50, 60)]);
        l.release(ByteRange::new(40, 50));
        assert_eq!(spans(&l), vec![(0, 30), (40, 60)]);
        l.release(ByteRange::new(35, 38));
        assert_eq!(spans(&l), vec![(0, 30), (35, 38), (40, 60)]);
        assert_eq!(l.total(), 53);
    }

    #[test]
    fn release_rebuilds_long_chain() {
        let mut l = FreeList::new();
        for start in [3, 1, 0, 2] {
            l.release(ByteRange::new(start, start + 1));
        }
        assert_eq!(spans(&l), vec![(0, 4)]);
    }

    #[test]
    fn take_front_splits_head() {
        let mut l = list(&[(0, 100)]);
        let frags = l.take_front(30).unwrap();
        assert_eq!(frags.as_slice(), &[ByteRange::new(0, 30)]);
        assert_eq!(spans(&l), vec![(30, 100)]);
    }

    #[test]
    fn take_front_exact_fit_removes_range() {
        let mut l = list(&[(0, 10), (20, 30)]);
        let frags = l.take_front(10).unwrap();
        assert_eq!(frags.as_slice(), &[ByteRange::new(0, 10)]);
        assert_eq!(spans(&l), vec![(20, 30)]);
    }

    #[test]
    fn take_front_spans_multiple_ranges() {
        let mut l = list(&[(0, 4), (10, 14), (20, 40)]);
        let frags = l.take_front(12).unwrap();
        assert_eq!(
            frags.as_slice(),
            &[
                ByteRange::new(0, 4),
                ByteRange::new(10, 14),
                ByteRange::new(20, 24)
            ]
        );
        assert_eq!(spans(&l), vec![(24, 40)]);
    }

    #[test]
    fn take_front_insufficient_leaves_list_untouched() {
        let mut l = list(&[(0, 4), (10, 14)]);
        assert!(l.take_front(9).is_none());
        assert_eq!(spans(&l), vec![(0, 4), (10, 14)]);
    }

    #[test]
    fn take_front_zero_is_empty() {
        let mut l = list(&[(0, 4)]);
        assert!(l.take_front(0).unwrap().is_empty());
        assert_eq!(l.total(), 4);
    }

    #[test]
    fn head_operations_scale_with_fragments_not_list_size() {
        // 200k one-byte holes. Each take touches only the head range and
        // each release only its two neighbours.
        const HOLES: usize = 200_000;
        let mut l = FreeList::new();
        for i in 0..HOLES {
            l.insert(ByteRange::new(2 * i, 2 * i + 1));
        }
        assert_eq!(l.len(), HOLES);

        let mut taken = Vec::new();
        for i in 0..HOLES / 2 {
            let frags = l.take_front(1).unwrap();
            assert_eq!(frags.as_slice(), &[ByteRange::new(2 * i, 2 * i + 1)]);
            taken.push(frags[0]);
        }
        assert_eq!(l.len(), HOLES / 2);
        assert_eq!(l.total(), HOLES / 2);

        for r in taken.into_iter().rev() {
            l.release(r);
        }
        assert_eq!(l.len(), HOLES);
        assert_eq!(l.iter().next(), Some(ByteRange::new(0, 1)));
    }

    #[test]
    fn pop_front_returns_lowest() {
        let mut l = list(&[(256, 512), (0, 256)]);
        assert_eq!(l.pop_front(), Some(ByteRange::new(0, 256)));
        assert_eq!(l.pop_front(), Some(ByteRange::new(256, 512)));
        assert_eq!(l.pop_front(), None);
    }

    #[test]
    fn contains_checks_whole_range() {
        let l = list(&[(0, 10), (20, 30)]);
        assert!(l.contains(&ByteRange::new(2, 8)));
        assert!(l.contains(&ByteRange::new(20, 30)));
        assert!(!l.contains(&ByteRange::new(8, 12)));
        assert!(!l.contains(&ByteRange::new(10, 20)));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn take_then_return_restores_single_range(
                lens in proptest::collection::vec(1usize..64, 1..16),
            ) {
                let size = 1024;
                let mut l = FreeList::with_range(ByteRange::new(0, size));
                let mut taken = Vec::new();
                for len in lens {
                    if let Some(frags) = l.take_front(len) {
                        taken.extend(frags);
                    }
                }
                for r in taken {
                    l.release(r);
                }
                prop_assert_eq!(spans(&l), vec![(0, size)]);
            }

            #[test]
            fn released_ranges_never_touch(
                cuts in proptest::collection::btree_set(1usize..200, 0..20),
                order in proptest::collection::vec(any::<prop::sample::Index>(), 21),
            ) {
                let mut bounds: Vec<usize> = vec![0];
                bounds.extend(cuts);
                bounds.push(200);
                let mut segments: Vec<ByteRange> = bounds
                    .windows(2)
                    .enumerate()
                    // Skip every third segment so some neighbours touch and some don't.
                    .filter(|(i, _)| i % 3 != 2)
                    .map(|(_, w)| ByteRange::new(w[0], w[1]))
                    .collect();
                let expected: usize = segments.iter().map(ByteRange::len).sum();

                let mut l = FreeList::new();
                for idx in &order {
                    if segments.is_empty() {
                        break;
                    }
                    let r = segments.swap_remove(idx.index(segments.len()));
                    l.release(r);
                }
                for r in segments {
                    l.release(r);
                }

                prop_assert_eq!(l.total(), expected);
                let ranges: Vec<ByteRange> = l.iter().collect();
                for w in ranges.windows(2) {
                    prop_assert!(w[0].end < w[1].start);
                }
            }
        }
    }
}
