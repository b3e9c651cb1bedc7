//! Per-subscriber observer state machine.
//!
//! An observer buffers entries that match its filter and asks for its
//! dispatch callback to be run once per drain cycle:
//!
//! ```text
//!   Idle --push--> Pending --take_records--> Idle
//!     \               |
//!      +--disconnect--+--> Disconnected (terminal)
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::config::ObserverConfig;
use crate::entry::{sort_entries, HighResDuration, PerformanceEntry, PerformanceEntryType};
use crate::reporter::PerformanceEntryReporter;

/// Callback that asks the host to dispatch an observer's records later.
pub type ObserverCallback = Arc<dyn Fn() + Send + Sync>;

/// Options for single-type observation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObserveOptions {
    /// Back-fill pending records from entries already in the timeline
    pub buffered: bool,
    /// Ignore entries shorter than this; `None` accepts every duration
    pub duration_threshold: Option<HighResDuration>,
}

/// The active subscription of an observer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ObserverFilter {
    /// Not observing anything
    #[default]
    None,
    /// A single entry type
    Single {
        entry_type: PerformanceEntryType,
        buffered: bool,
        duration_threshold: Option<HighResDuration>,
    },
    /// Any of a set of entry types
    Multiple(HashSet<PerformanceEntryType>),
}

impl ObserverFilter {
    /// Check whether an entry passes this filter.
    pub fn matches(&self, entry: &PerformanceEntry) -> bool {
        match self {
            ObserverFilter::None => false,
            ObserverFilter::Single {
                entry_type,
                duration_threshold,
                ..
            } => entry.entry_type() == *entry_type && meets_threshold(entry, *duration_threshold),
            ObserverFilter::Multiple(types) => types.contains(&entry.entry_type()),
        }
    }

    /// Check whether this filter covers an entry type at all.
    pub fn includes(&self, entry_type: PerformanceEntryType) -> bool {
        match self {
            ObserverFilter::None => false,
            ObserverFilter::Single { entry_type: t, .. } => *t == entry_type,
            ObserverFilter::Multiple(types) => types.contains(&entry_type),
        }
    }
}

/// An unset threshold accepts every entry, including negative durations.
fn meets_threshold(entry: &PerformanceEntry, threshold: Option<HighResDuration>) -> bool {
    threshold.map_or(true, |threshold| entry.duration >= threshold)
}

/// Where an observer is in its drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverStatus {
    /// No pending records, no dispatch requested
    Idle,
    /// Records are pending and a dispatch has been requested
    Pending,
    /// Disconnected; ignores everything
    Disconnected,
}

#[derive(Debug)]
struct ObserverState {
    filter: ObserverFilter,
    buffer: Vec<PerformanceEntry>,
    dropped: u64,
    status: ObserverStatus,
    /// Highest sequence already copied in by a buffered back-fill. Pushes at
    /// or below it are duplicates of back-filled entries.
    backfill_watermark: Option<u64>,
}

impl ObserverState {
    /// Queue an entry, or count it as dropped when the queue is full.
    fn enqueue(&mut self, entry: PerformanceEntry, max_buffer_size: usize) -> bool {
        if self.buffer.len() >= max_buffer_size {
            self.dropped += 1;
            tracing::trace!(
                target: "timeline::observer",
                name = %entry.name,
                dropped = self.dropped,
                "observer buffer full, entry dropped"
            );
            return false;
        }
        self.buffer.push(entry);
        true
    }

    /// Move to `Pending`, returning true if this is the first record since
    /// the last drain.
    fn mark_pending(&mut self) -> bool {
        if self.status == ObserverStatus::Idle && !self.buffer.is_empty() {
            self.status = ObserverStatus::Pending;
            true
        } else {
            false
        }
    }
}

/// A subscriber that collects matching entries for deferred delivery.
pub struct PerformanceObserver {
    reporter: Weak<PerformanceEntryReporter>,
    callback: ObserverCallback,
    config: ObserverConfig,
    state: Mutex<ObserverState>,
}

impl fmt::Debug for PerformanceObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceObserver")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PerformanceObserver {
    /// Create an idle observer attached to `reporter`.
    ///
    /// The observer is not registered until [`observe_type`](Self::observe_type)
    /// or [`observe_types`](Self::observe_types) is called. Only a weak
    /// reference to the reporter is kept.
    pub fn create(
        reporter: &Arc<PerformanceEntryReporter>,
        callback: ObserverCallback,
        config: ObserverConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            reporter: Arc::downgrade(reporter),
            callback,
            config,
            state: Mutex::new(ObserverState {
                filter: ObserverFilter::None,
                buffer: Vec::new(),
                dropped: 0,
                status: ObserverStatus::Idle,
                backfill_watermark: None,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_dispatch(&self) {
        tracing::trace!(target: "timeline::observer", "dispatch requested");
        (self.callback)();
    }

    /// Observe a single entry type, replacing any previous filter.
    ///
    /// With `buffered` set, entries already recorded for that type (and at
    /// least `duration_threshold` long) are copied into the pending records.
    pub fn observe_type(
        self: &Arc<Self>,
        entry_type: PerformanceEntryType,
        options: ObserveOptions,
    ) {
        let reporter = self.reporter.upgrade();

        let should_dispatch = {
            let mut state = self.state();
            if state.status == ObserverStatus::Disconnected {
                return;
            }
            // Registered under the state lock so a concurrent disconnect
            // either sees the registration or runs before it.
            if let Some(reporter) = &reporter {
                reporter.observer_registry().register_observer(self);
            }
            state.filter = ObserverFilter::Single {
                entry_type,
                buffered: options.buffered,
                duration_threshold: options.duration_threshold,
            };
            state.backfill_watermark = None;

            if options.buffered {
                if let Some(reporter) = &reporter {
                    let mut existing = Vec::new();
                    reporter.get_entries(&mut existing, entry_type, None);
                    state.backfill_watermark =
                        existing.iter().map(PerformanceEntry::sequence).max();
                    for entry in existing {
                        if meets_threshold(&entry, options.duration_threshold) {
                            state.enqueue(entry, self.config.max_buffer_size);
                        }
                    }
                }
            }
            state.mark_pending()
        };

        tracing::debug!(
            target: "timeline::observer",
            entry_type = %entry_type,
            buffered = options.buffered,
            "observing single entry type"
        );

        if should_dispatch {
            self.request_dispatch();
        }
    }

    /// Observe a set of entry types, replacing any previous filter.
    pub fn observe_types(self: &Arc<Self>, entry_types: HashSet<PerformanceEntryType>) {
        let mut state = self.state();
        if state.status == ObserverStatus::Disconnected {
            return;
        }
        if let Some(reporter) = self.reporter.upgrade() {
            reporter.observer_registry().register_observer(self);
        }
        tracing::debug!(
            target: "timeline::observer",
            types = entry_types.len(),
            "observing multiple entry types"
        );
        state.filter = ObserverFilter::Multiple(entry_types);
        state.backfill_watermark = None;
    }

    /// Check whether the observer would accept `entry`.
    pub fn matches(&self, entry: &PerformanceEntry) -> bool {
        let state = self.state();
        state.status != ObserverStatus::Disconnected && state.filter.matches(entry)
    }

    /// Check whether the current filter covers `entry_type`.
    pub fn is_observing(&self, entry_type: PerformanceEntryType) -> bool {
        let state = self.state();
        state.status != ObserverStatus::Disconnected && state.filter.includes(entry_type)
    }

    /// Offer a new entry to this observer.
    ///
    /// Returns true if the entry was queued. The dispatch callback runs on
    /// the first queued record since the last drain, never more than once
    /// per cycle.
    pub fn push(&self, entry: &PerformanceEntry) -> bool {
        let should_dispatch = {
            let mut state = self.state();
            if state.status == ObserverStatus::Disconnected || !state.filter.matches(entry) {
                return false;
            }
            if let Some(watermark) = state.backfill_watermark {
                if entry.sequence() != 0 && entry.sequence() <= watermark {
                    return false;
                }
            }
            if !state.enqueue(entry.clone(), self.config.max_buffer_size) {
                return false;
            }
            state.mark_pending()
        };

        if should_dispatch {
            self.request_dispatch();
        }
        true
    }

    /// Drain the pending records, optionally sorted by start time.
    ///
    /// Resets the observer to `Idle` so the next push requests a new
    /// dispatch. Always empty once disconnected.
    pub fn take_records(&self, sort: bool) -> Vec<PerformanceEntry> {
        let mut records = {
            let mut state = self.state();
            if state.status == ObserverStatus::Pending {
                state.status = ObserverStatus::Idle;
            }
            std::mem::take(&mut state.buffer)
        };
        if sort {
            sort_entries(&mut records);
        }
        records
    }

    /// Entries that matched but were dropped because the pending queue was full.
    pub fn dropped_entries_count(&self) -> u64 {
        self.state().dropped
    }

    /// Stop observing. Idempotent; the observer cannot be reused.
    pub fn disconnect(&self) {
        {
            let mut state = self.state();
            if state.status == ObserverStatus::Disconnected {
                return;
            }
            state.status = ObserverStatus::Disconnected;
            state.filter = ObserverFilter::None;
            state.buffer.clear();
            state.dropped = 0;
            state.backfill_watermark = None;
        }
        if let Some(reporter) = self.reporter.upgrade() {
            reporter.observer_registry().unregister_observer(self);
        }
        tracing::debug!(target: "timeline::observer", "observer disconnected");
    }

    pub fn status(&self) -> ObserverStatus {
        self.state().status
    }

    pub fn is_disconnected(&self) -> bool {
        self.status() == ObserverStatus::Disconnected
    }

    /// Current filter.
    pub fn filter(&self) -> ObserverFilter {
        self.state().filter.clone()
    }

    /// Number of pending records.
    pub fn pending_count(&self) -> usize {
        self.state().buffer.len()
    }
}
