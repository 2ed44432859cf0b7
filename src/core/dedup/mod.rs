// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Dedup Buffer
//!
//! Fixed-capacity, insertion-ordered ring of the most recently accepted tags,
//! plus the set of every EPC accepted since the last clear.
//!
//! ## Locking
//!
//! The set and the ring live behind one mutex. `offer` and `clear` are
//! therefore mutually exclusive, and no caller can observe an EPC that is in
//! the set but missing from the ring because of a half-finished clear (or the
//! reverse). Nothing inside the lock performs I/O.
//!
//! ## Eviction
//!
//! Eviction only trims the ring. The EPC stays in the seen set, so a tag that
//! falls off the end of the ring is still a duplicate until the next `clear`.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::core::error::{InventoryError, InventoryResult};
use crate::core::event::TagRecord;

/// Default number of records retained for reference
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Result of [`DedupBuffer::offer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// First sighting since the last clear; the record was buffered
    Accepted,
    /// EPC already seen since the last clear; nothing changed
    Duplicate,
}

impl OfferOutcome {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, OfferOutcome::Accepted)
    }
}

/// Consistent copy of the buffer's contents, taken under the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupView {
    /// Seen EPCs, sorted
    pub seen: Vec<String>,
    /// Buffered records, oldest first
    pub records: Vec<TagRecord>,
}

#[derive(Debug, Default)]
struct DedupState {
    seen: HashSet<String>,
    recent: VecDeque<TagRecord>,
    accepted_total: u64,
    evicted_total: u64,
}

#[derive(Debug)]
pub struct DedupBuffer {
    capacity: usize,
    state: Mutex<DedupState>,
}

impl DedupBuffer {
    /// Create a buffer holding at most `capacity` records
    pub fn new(capacity: usize) -> InventoryResult<Self> {
        if capacity == 0 {
            return Err(InventoryError::configuration_with_key(
                "dedup buffer capacity must be at least 1",
                "pipeline.buffer_capacity",
            ));
        }
        Ok(Self::with_valid_capacity(capacity))
    }

    pub fn with_default_capacity() -> Self {
        Self::with_valid_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// `capacity` must be non-zero
    fn with_valid_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(DedupState {
                recent: VecDeque::with_capacity(capacity),
                ..DedupState::default()
            }),
        }
    }

    // A panic while holding the lock cannot leave the set and ring out of step
    // (every mutation is a single insert/push/pop), so a poisoned lock is reused.
    fn lock(&self) -> MutexGuard<'_, DedupState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accept `record` unless its EPC was already seen since the last clear
    pub fn offer(&self, record: TagRecord) -> OfferOutcome {
        let mut state = self.lock();
        if state.seen.contains(record.epc()) {
            return OfferOutcome::Duplicate;
        }

        state.seen.insert(record.epc().to_string());
        if state.recent.len() == self.capacity {
            state.recent.pop_front();
            state.evicted_total += 1;
        }
        state.recent.push_back(record);
        state.accepted_total += 1;
        OfferOutcome::Accepted
    }

    /// Empty the seen set and the ring in one step
    ///
    /// Returns the number of buffered records dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.recent.len();
        state.seen.clear();
        state.recent.clear();
        dropped
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().recent.is_empty()
    }

    /// Whether `epc` counts as seen (and would be rejected by `offer`)
    pub fn contains(&self, epc: &str) -> bool {
        self.lock().seen.contains(epc)
    }

    /// Buffered records, oldest first
    pub fn snapshot(&self) -> Vec<TagRecord> {
        self.lock().recent.iter().cloned().collect()
    }

    pub fn view(&self) -> DedupView {
        let state = self.lock();
        let mut seen: Vec<String> = state.seen.iter().cloned().collect();
        seen.sort();
        DedupView {
            seen,
            records: state.recent.iter().cloned().collect(),
        }
    }

    /// Records accepted over the buffer's lifetime, across clears
    pub fn accepted_total(&self) -> u64 {
        self.lock().accepted_total
    }

    /// Records pushed out of the ring by capacity over the buffer's lifetime
    pub fn evicted_total(&self) -> u64 {
        self.lock().evicted_total
    }
}

impl Default for DedupBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
