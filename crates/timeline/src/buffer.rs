//! Capacity-bounded, insertion-ordered entry storage.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::entry::{PerformanceEntry, PerformanceEntryType};

#[derive(Debug, Default)]
struct BufferState {
    entries: VecDeque<PerformanceEntry>,
    dropped: u64,
}

/// Storage for a single entry type.
///
/// Entries are kept in insertion order. When a bounded buffer is full the
/// oldest entry is evicted to make room and the drop counter grows; the
/// counter never decreases except through [`EntryBuffer::reset_dropped_count`].
#[derive(Debug)]
pub struct EntryBuffer {
    entry_type: PerformanceEntryType,
    capacity: Option<usize>,
    state: Mutex<BufferState>,
}

impl EntryBuffer {
    /// Create an empty buffer. `None` capacity means unbounded.
    pub fn new(entry_type: PerformanceEntryType, capacity: Option<usize>) -> Self {
        Self {
            entry_type,
            capacity,
            state: Mutex::new(BufferState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry type stored in this buffer.
    pub fn entry_type(&self) -> PerformanceEntryType {
        self.entry_type
    }

    /// Configured capacity.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Append an entry at the tail, evicting the oldest one if full.
    ///
    /// The entry's insertion sequence is drawn from `sequence` while the
    /// buffer lock is held, so buffer order and sequence order agree.
    /// Returns the entry as stored.
    pub fn append(&self, entry: PerformanceEntry, sequence: &AtomicU64) -> PerformanceEntry {
        let mut state = self.state();
        let entry = entry.with_sequence(sequence.fetch_add(1, Ordering::Relaxed) + 1);

        match self.capacity {
            Some(0) => {
                state.dropped += 1;
                return entry;
            }
            Some(capacity) => {
                while state.entries.len() >= capacity {
                    if let Some(evicted) = state.entries.pop_front() {
                        state.dropped += 1;
                        tracing::trace!(
                            target: "timeline::buffer",
                            entry_type = %self.entry_type,
                            name = %evicted.name,
                            dropped = state.dropped,
                            "evicted oldest entry"
                        );
                    }
                }
            }
            None => {}
        }

        state.entries.push_back(entry.clone());
        entry
    }

    /// Append every entry whose name matches (all entries if `name` is `None`)
    /// to `out`, in buffer order.
    pub fn get_entries(&self, out: &mut Vec<PerformanceEntry>, name: Option<&str>) {
        let state = self.state();
        match name {
            Some(name) => out.extend(state.entries.iter().filter(|e| e.name == name).cloned()),
            None => out.extend(state.entries.iter().cloned()),
        }
    }

    /// The most recently appended entry with the given name.
    pub fn find_last(&self, name: &str) -> Option<PerformanceEntry> {
        self.state()
            .entries
            .iter()
            .rev()
            .find(|e| e.name == name)
            .cloned()
    }

    /// Remove entries with the given name, or everything if `name` is `None`.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, name: Option<&str>) -> usize {
        let mut state = self.state();
        let before = state.entries.len();
        match name {
            Some(name) => state.entries.retain(|e| e.name != name),
            None => state.entries.clear(),
        }
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    /// Number of entries discarded because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.state().dropped
    }

    /// Reset the drop counter. Intended for tests.
    pub fn reset_dropped_count(&self) {
        self.state().dropped = 0;
    }
}
