use crate::error::{Result, SimFsError};
use log::{debug, warn};
use std::ops::Range;

/// Index of a block ranging from 0 (the first block) to n - 1 (the last block)
/// where n is the number of blocks on the disk.
pub type BlockId = u64;

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// Tracks which blocks of the disk are in use as a sorted list of occupied
/// sectors.
///
/// The ledger is stored flat: for any sector index `i`, `bounds[2 * i]` is the
/// first used block of the sector and `bounds[2 * i + 1]` is one past its last
/// used block. Sectors are sorted, disjoint, and never adjacent; two sectors
/// that come to touch are merged.
///
/// ## Allocation Policy
///
/// Allocation only ever looks at two places: the space in front of the first
/// sector and the gap directly behind it. Since the first sector always grows
/// into (and merges across) that gap, blocks are handed out lowest address
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLedger {
    bounds: Vec<BlockId>,
    /// The total number of blocks available.
    capacity: u64,
}

impl BlockLedger {
    pub fn new(capacity: u64) -> Self {
        Self {
            bounds: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of occupied sectors.
    pub fn sector_count(&self) -> usize {
        self.bounds.len() / 2
    }

    /// A copy of the occupied sectors in address order.
    pub fn sectors(&self) -> Vec<Range<BlockId>> {
        self.bounds
            .chunks_exact(2)
            .map(|pair| pair[0]..pair[1])
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Takes a single block off the disk.
    ///
    /// # Errors
    ///
    /// Returns `AllocatorExhausted` once the first sector covers the whole disk.
    pub fn allocate(&mut self) -> Result<BlockId> {
        if self.bounds.is_empty() {
            if self.capacity == 0 {
                return Err(SimFsError::AllocatorExhausted);
            }
            self.bounds.extend_from_slice(&[0, 1]);
            debug!("allocated block 0 into empty ledger");
            return Ok(0);
        }

        let front = self.bounds[0];
        if front == 0 {
            // Nothing free in front, grow the first sector into the gap behind it.
            let gap_start = self.bounds[1];
            let gap_end = if self.sector_count() == 1 {
                self.capacity
            } else {
                self.bounds[2]
            };

            if gap_start == gap_end {
                return Err(SimFsError::AllocatorExhausted);
            }
            if gap_start + 1 == gap_end && self.sector_count() > 1 {
                // The gap closes, fuse the first two sectors.
                self.bounds.drain(1..3);
            } else {
                self.bounds[1] += 1;
            }
            debug!("allocated block {}", gap_start);
            Ok(gap_start)
        } else {
            if front == 1 {
                self.bounds[0] = 0;
            } else {
                self.bounds.insert(0, 1);
                self.bounds.insert(0, 0);
            }
            debug!("allocated block 0");
            Ok(0)
        }
    }

    /// Returns a block to the disk. Freeing a block that is not allocated does
    /// nothing; the return value reports whether anything was released.
    pub fn free(&mut self, block: BlockId) -> bool {
        let i = match self.sector_of(block) {
            Some(i) => i,
            None => {
                warn!("ignoring free of unallocated block {}", block);
                return false;
            }
        };
        let (lo, hi) = (self.bounds[2 * i], self.bounds[2 * i + 1]);

        if lo + 1 == hi {
            self.bounds.drain(2 * i..2 * i + 2);
        } else if block == lo {
            self.bounds[2 * i] += 1;
        } else if block == hi - 1 {
            self.bounds[2 * i + 1] -= 1;
        } else {
            // [lo, hi) becomes [lo, block) and [block + 1, hi).
            self.bounds.insert(2 * i + 1, block);
            self.bounds.insert(2 * i + 2, block + 1);
        }
        debug!("freed block {}", block);
        true
    }

    /// Whether `n` more blocks can be taken from the disk.
    pub fn enough_for(&self, n: u64) -> bool {
        n <= self.free_count()
    }

    /// Allocates `n` blocks or none at all.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientSpace` without touching the ledger when fewer than
    /// `n` blocks are free.
    pub fn reserve(&mut self, n: u64) -> Result<Vec<BlockId>> {
        if !self.enough_for(n) {
            return Err(SimFsError::InsufficientSpace {
                needed: n,
                available: self.free_count(),
            });
        }
        (0..n).map(|_| self.allocate()).collect()
    }

    /// Number of blocks currently in use.
    pub fn allocated_count(&self) -> u64 {
        self.bounds
            .chunks_exact(2)
            .map(|pair| pair[1] - pair[0])
            .sum()
    }

    /// Number of blocks not in use, counting every gap in the ledger.
    pub fn free_count(&self) -> u64 {
        let mut free = 0;
        let mut cursor = 0;
        for pair in self.bounds.chunks_exact(2) {
            free += pair[0] - cursor;
            cursor = pair[1];
        }
        free + (self.capacity - cursor)
    }

    /// The block the next call to `allocate` hands out.
    pub fn next_allocatable(&self) -> BlockId {
        match self.bounds.as_slice() {
            [0, end, ..] => *end,
            _ => 0,
        }
    }

    pub fn state(&self, block: BlockId) -> State {
        match self.sector_of(block) {
            Some(_) => State::Used,
            None => State::Free,
        }
    }

    /// Drops every sector, leaving the whole disk free.
    pub fn clear(&mut self) {
        self.bounds.clear();
    }

    /// Binary searches for the sector containing `block`.
    fn sector_of(&self, block: BlockId) -> Option<usize> {
        let (mut lo, mut hi) = (0, self.sector_count());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.bounds[2 * mid] <= block {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        // `lo` is now the number of sectors starting at or before `block`.
        let i = lo.checked_sub(1)?;
        if block < self.bounds[2 * i + 1] {
            Some(i)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.bounds.len() % 2, 0, "ledger holds an unpaired bound");
        for pair in self.bounds.chunks_exact(2) {
            assert!(pair[0] < pair[1], "empty or inverted sector {:?}", pair);
            assert!(pair[1] <= self.capacity, "sector {:?} beyond disk", pair);
        }
        for w in self.bounds.windows(2).skip(1).step_by(2) {
            assert!(w[0] < w[1], "sectors overlap or touch at {:?}", w);
        }
    }
}
