//! Performance entry model.
//!
//! Every recorded event shares a common header (name, start time, duration and
//! an insertion sequence) and carries a closed [`EntryDetails`] payload that
//! identifies its entry type.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::time_origin;
use crate::error::{TimelineError, TimelineResult};

// =============================================================================
// Time
// =============================================================================

/// A high resolution timestamp in milliseconds relative to the time origin.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighResTimeStamp(f64);

impl HighResTimeStamp {
    /// The time origin itself.
    pub const ZERO: Self = Self(0.0);

    /// Create a timestamp from milliseconds since the time origin.
    #[inline]
    pub const fn from_millis(ms: f64) -> Self {
        Self(ms)
    }

    /// Read the monotonic clock.
    #[inline]
    pub fn now() -> Self {
        Self(time_origin().elapsed().as_secs_f64() * 1000.0)
    }

    /// Milliseconds since the time origin.
    #[inline]
    pub const fn as_millis(self) -> f64 {
        self.0
    }
}

impl PartialEq for HighResTimeStamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HighResTimeStamp {}

impl PartialOrd for HighResTimeStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HighResTimeStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<HighResDuration> for HighResTimeStamp {
    type Output = HighResTimeStamp;

    fn add(self, rhs: HighResDuration) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for HighResTimeStamp {
    type Output = HighResDuration;

    fn sub(self, rhs: Self) -> Self::Output {
        HighResDuration(self.0 - rhs.0)
    }
}

/// A time delta in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighResDuration(f64);

impl HighResDuration {
    /// Zero-length duration.
    pub const ZERO: Self = Self(0.0);

    /// Create a duration from milliseconds.
    #[inline]
    pub const fn from_millis(ms: f64) -> Self {
        Self(ms)
    }

    /// Length in milliseconds.
    #[inline]
    pub const fn as_millis(self) -> f64 {
        self.0
    }
}

impl PartialEq for HighResDuration {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HighResDuration {}

impl PartialOrd for HighResDuration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HighResDuration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

// =============================================================================
// Entry Type
// =============================================================================

/// Category of a performance entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceEntryType {
    /// Named point in time
    Mark,
    /// Named interval
    Measure,
    /// Input event timing
    Event,
    /// Main-thread task that exceeded the long task threshold
    #[serde(rename = "longtask")]
    LongTask,
    /// Network resource fetch timing
    Resource,
}

impl PerformanceEntryType {
    /// Number of entry types.
    pub const COUNT: usize = 5;

    /// Every entry type, in code order.
    pub const ALL: [PerformanceEntryType; Self::COUNT] = [
        PerformanceEntryType::Mark,
        PerformanceEntryType::Measure,
        PerformanceEntryType::Event,
        PerformanceEntryType::LongTask,
        PerformanceEntryType::Resource,
    ];

    /// Wire name of this entry type.
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceEntryType::Mark => "mark",
            PerformanceEntryType::Measure => "measure",
            PerformanceEntryType::Event => "event",
            PerformanceEntryType::LongTask => "longtask",
            PerformanceEntryType::Resource => "resource",
        }
    }

    /// Numeric code used by the binding layer.
    pub fn code(self) -> u8 {
        match self {
            PerformanceEntryType::Mark => 1,
            PerformanceEntryType::Measure => 2,
            PerformanceEntryType::Event => 3,
            PerformanceEntryType::LongTask => 4,
            PerformanceEntryType::Resource => 5,
        }
    }

    /// Look up an entry type by its numeric code.
    pub fn from_code(code: u8) -> TimelineResult<Self> {
        Self::ALL
            .into_iter()
            .find(|entry_type| entry_type.code() == code)
            .ok_or_else(|| TimelineError::InvalidEntryType(code.to_string()))
    }

    /// Dense index for per-type storage.
    pub(crate) fn index(self) -> usize {
        usize::from(self.code() - 1)
    }
}

impl fmt::Display for PerformanceEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceEntryType {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|entry_type| entry_type.as_str() == s)
            .ok_or_else(|| TimelineError::InvalidEntryType(s.to_string()))
    }
}

// =============================================================================
// Entry
// =============================================================================

/// Processing timestamps of an input event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTiming {
    pub processing_start: HighResTimeStamp,
    pub processing_end: HighResTimeStamp,
    pub interaction_id: u32,
}

/// Fetch timeline of a network resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTiming {
    pub fetch_start: HighResTimeStamp,
    pub request_start: HighResTimeStamp,
    pub connect_start: Option<HighResTimeStamp>,
    pub connect_end: Option<HighResTimeStamp>,
    pub response_start: Option<HighResTimeStamp>,
    pub response_end: HighResTimeStamp,
    pub response_status: Option<u16>,
}

/// Type-specific payload of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "lowercase")]
pub enum EntryDetails {
    Mark,
    Measure,
    Event(EventTiming),
    #[serde(rename = "longtask")]
    LongTask,
    Resource(ResourceTiming),
}

/// A single recorded performance entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub name: String,
    pub start_time: HighResTimeStamp,
    pub duration: HighResDuration,
    #[serde(flatten)]
    pub details: EntryDetails,
    /// Global insertion order, assigned when the entry is buffered.
    #[serde(skip)]
    sequence: u64,
}

impl PerformanceEntry {
    fn new(
        name: impl Into<String>,
        start_time: HighResTimeStamp,
        duration: HighResDuration,
        details: EntryDetails,
    ) -> Self {
        Self {
            name: name.into(),
            start_time,
            duration,
            details,
            sequence: 0,
        }
    }

    /// A mark has no duration.
    pub fn mark(name: impl Into<String>, start_time: HighResTimeStamp) -> Self {
        Self::new(name, start_time, HighResDuration::ZERO, EntryDetails::Mark)
    }

    pub fn measure(
        name: impl Into<String>,
        start_time: HighResTimeStamp,
        duration: HighResDuration,
    ) -> Self {
        Self::new(name, start_time, duration, EntryDetails::Measure)
    }

    pub fn event(
        name: impl Into<String>,
        start_time: HighResTimeStamp,
        duration: HighResDuration,
        timing: EventTiming,
    ) -> Self {
        Self::new(name, start_time, duration, EntryDetails::Event(timing))
    }

    pub fn long_task(
        name: impl Into<String>,
        start_time: HighResTimeStamp,
        duration: HighResDuration,
    ) -> Self {
        Self::new(name, start_time, duration, EntryDetails::LongTask)
    }

    /// Resource entries span from `start_time` to the end of the response.
    pub fn resource(
        name: impl Into<String>,
        start_time: HighResTimeStamp,
        timing: ResourceTiming,
    ) -> Self {
        let duration = timing.response_end - start_time;
        Self::new(name, start_time, duration, EntryDetails::Resource(timing))
    }

    /// The category this entry is stored under.
    pub fn entry_type(&self) -> PerformanceEntryType {
        match self.details {
            EntryDetails::Mark => PerformanceEntryType::Mark,
            EntryDetails::Measure => PerformanceEntryType::Measure,
            EntryDetails::Event(_) => PerformanceEntryType::Event,
            EntryDetails::LongTask => PerformanceEntryType::LongTask,
            EntryDetails::Resource(_) => PerformanceEntryType::Resource,
        }
    }

    /// End of the entry's interval.
    pub fn end_time(&self) -> HighResTimeStamp {
        self.start_time + self.duration
    }

    /// Insertion sequence; zero until the entry has been buffered.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Stable sort by start time, ties broken by insertion order.
pub fn sort_entries(entries: &mut [PerformanceEntry]) {
    entries.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}
