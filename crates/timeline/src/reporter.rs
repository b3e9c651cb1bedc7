//! Process-wide entry reporter.
//!
//! The reporter owns one [`EntryBuffer`] per entry type and the shared
//! [`PerformanceObserverRegistry`]. Every `report_*` call appends to the
//! relevant buffer and then fans the stored entry out to observers on the
//! calling thread.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::buffer::EntryBuffer;
use crate::config::ReporterConfig;
use crate::entry::{
    sort_entries, EventTiming, HighResDuration, HighResTimeStamp, PerformanceEntry,
    PerformanceEntryType, ResourceTiming,
};
use crate::registry::PerformanceObserverRegistry;

/// Global reporter instance
static GLOBAL_REPORTER: OnceLock<Arc<PerformanceEntryReporter>> = OnceLock::new();

/// Records performance entries and notifies observers about them.
#[derive(Debug)]
pub struct PerformanceEntryReporter {
    config: ReporterConfig,
    /// Created on first report for each type, indexed by entry type
    buffers: [OnceLock<EntryBuffer>; PerformanceEntryType::COUNT],
    sequence: AtomicU64,
    event_counts: Mutex<HashMap<String, u32>>,
    registry: PerformanceObserverRegistry,
}

impl PerformanceEntryReporter {
    /// Create a standalone reporter.
    ///
    /// Most callers want [`PerformanceEntryReporter::instance`]; separate
    /// instances are useful for embedding and tests.
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            buffers: std::array::from_fn(|_| OnceLock::new()),
            sequence: AtomicU64::new(0),
            event_counts: Mutex::new(HashMap::new()),
            registry: PerformanceObserverRegistry::new(),
        }
    }

    /// Get the process-wide reporter.
    ///
    /// Created with the default configuration on first use and never torn down.
    pub fn instance() -> &'static Arc<PerformanceEntryReporter> {
        GLOBAL_REPORTER
            .get_or_init(|| Arc::new(PerformanceEntryReporter::new(ReporterConfig::default())))
    }

    /// Entry types this reporter can record.
    pub fn supported_entry_types() -> &'static [PerformanceEntryType] {
        &PerformanceEntryType::ALL
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Registry of observers notified about new entries.
    pub fn observer_registry(&self) -> &PerformanceObserverRegistry {
        &self.registry
    }

    fn buffer(&self, entry_type: PerformanceEntryType) -> &EntryBuffer {
        self.buffers[entry_type.index()]
            .get_or_init(|| EntryBuffer::new(entry_type, self.config.capacity(entry_type)))
    }

    fn existing_buffer(&self, entry_type: PerformanceEntryType) -> Option<&EntryBuffer> {
        self.buffers[entry_type.index()].get()
    }

    fn event_counts(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.event_counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer an entry and notify observers. Returns the stored entry.
    pub fn report(&self, entry: PerformanceEntry) -> PerformanceEntry {
        let stored = self.buffer(entry.entry_type()).append(entry, &self.sequence);
        tracing::trace!(
            target: "timeline::reporter",
            entry_type = %stored.entry_type(),
            name = %stored.name,
            start_time = stored.start_time.as_millis(),
            duration = stored.duration.as_millis(),
            "entry reported"
        );
        self.registry.for_each_observer(&stored);
        stored
    }

    /// Record a mark.
    pub fn report_mark(&self, name: &str, start_time: HighResTimeStamp) -> PerformanceEntry {
        self.report(PerformanceEntry::mark(name, start_time))
    }

    /// Record a measure spanning `start_time..end_time`.
    ///
    /// The duration is not clamped; resolving mark names and validating the
    /// interval is the caller's job.
    pub fn report_measure(
        &self,
        name: &str,
        start_time: HighResTimeStamp,
        end_time: HighResTimeStamp,
    ) -> PerformanceEntry {
        self.report(PerformanceEntry::measure(name, start_time, end_time - start_time))
    }

    /// Record an input event and bump its occurrence count.
    pub fn report_event(
        &self,
        name: &str,
        start_time: HighResTimeStamp,
        duration: HighResDuration,
        processing_start: HighResTimeStamp,
        processing_end: HighResTimeStamp,
        interaction_id: u32,
    ) -> PerformanceEntry {
        *self.event_counts().entry(name.to_string()).or_insert(0) += 1;

        self.report(PerformanceEntry::event(
            name,
            start_time,
            duration,
            EventTiming {
                processing_start,
                processing_end,
                interaction_id,
            },
        ))
    }

    /// Record a long task.
    pub fn report_long_task(
        &self,
        name: &str,
        start_time: HighResTimeStamp,
        duration: HighResDuration,
    ) -> PerformanceEntry {
        self.report(PerformanceEntry::long_task(name, start_time, duration))
    }

    /// Record a resource fetch.
    pub fn report_resource_timing(
        &self,
        name: &str,
        start_time: HighResTimeStamp,
        timing: ResourceTiming,
    ) -> PerformanceEntry {
        self.report(PerformanceEntry::resource(name, start_time, timing))
    }

    /// Start time of the most recent mark with this name.
    pub fn get_mark_time(&self, name: &str) -> Option<HighResTimeStamp> {
        self.existing_buffer(PerformanceEntryType::Mark)?
            .find_last(name)
            .map(|entry| entry.start_time)
    }

    /// Append entries of one type (optionally filtered by name) to `out`,
    /// in insertion order.
    pub fn get_entries(
        &self,
        out: &mut Vec<PerformanceEntry>,
        entry_type: PerformanceEntryType,
        name: Option<&str>,
    ) {
        if let Some(buffer) = self.existing_buffer(entry_type) {
            buffer.get_entries(out, name);
        }
    }

    /// Entries of several types, sorted by start time then insertion order.
    pub fn get_entries_of_types(
        &self,
        entry_types: &[PerformanceEntryType],
        name: Option<&str>,
    ) -> Vec<PerformanceEntry> {
        let mut entries = Vec::new();
        for entry_type in entry_types {
            self.get_entries(&mut entries, *entry_type, name);
        }
        sort_entries(&mut entries);
        entries
    }

    /// Remove entries of one type, optionally only those with `name`.
    pub fn clear_entries(&self, entry_type: PerformanceEntryType, name: Option<&str>) {
        if let Some(buffer) = self.existing_buffer(entry_type) {
            let removed = buffer.clear(name);
            tracing::debug!(
                target: "timeline::reporter",
                entry_type = %entry_type,
                name = name.unwrap_or("*"),
                removed,
                "entries cleared"
            );
        }
    }

    /// Remove every buffered entry of every type.
    pub fn clear_all_entries(&self) {
        for entry_type in PerformanceEntryType::ALL {
            self.clear_entries(entry_type, None);
        }
    }

    /// Number of entries of a type evicted because its buffer was full.
    pub fn dropped_entries_count(&self, entry_type: PerformanceEntryType) -> u64 {
        self.existing_buffer(entry_type)
            .map(EntryBuffer::dropped_count)
            .unwrap_or(0)
    }

    /// Number of buffered entries of a type.
    pub fn entry_count(&self, entry_type: PerformanceEntryType) -> usize {
        self.existing_buffer(entry_type).map(EntryBuffer::len).unwrap_or(0)
    }

    /// Occurrences of each event name, sorted by name.
    pub fn get_event_counts(&self) -> Vec<(String, u32)> {
        let mut counts: Vec<_> = self
            .event_counts()
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        counts.sort();
        counts
    }

    /// Reset event counts. Intended for tests.
    pub fn clear_event_counts(&self) {
        self.event_counts().clear();
    }

    /// Reset every buffer's drop counter. Intended for tests.
    pub fn reset_dropped_counts(&self) {
        for buffer in self.buffers.iter().filter_map(OnceLock::get) {
            buffer.reset_dropped_count();
        }
    }
}

impl Default for PerformanceEntryReporter {
    fn default() -> Self {
        Self::new(ReporterConfig::default())
    }
}
