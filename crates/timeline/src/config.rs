//! Buffer sizing configuration.

use serde::{Deserialize, Serialize};

use crate::entry::PerformanceEntryType;
use crate::error::TimelineResult;

/// Default capacity of the event timing buffer.
pub const EVENT_BUFFER_SIZE: usize = 150;
/// Default capacity of the long task buffer.
pub const LONG_TASK_BUFFER_SIZE: usize = 200;
/// Default capacity of the resource timing buffer.
pub const RESOURCE_TIMING_BUFFER_SIZE: usize = 250;
/// Default capacity of an observer's pending queue.
pub const OBSERVER_BUFFER_SIZE: usize = 1000;

/// Configuration for a [`PerformanceEntryReporter`](crate::PerformanceEntryReporter).
///
/// `None` capacities mean the buffer is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReporterConfig {
    /// Capacity of the mark buffer
    pub mark_capacity: Option<usize>,
    /// Capacity of the measure buffer
    pub measure_capacity: Option<usize>,
    /// Capacity of the event timing buffer
    pub event_capacity: Option<usize>,
    /// Capacity of the long task buffer
    pub long_task_capacity: Option<usize>,
    /// Capacity of the resource timing buffer
    pub resource_capacity: Option<usize>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            mark_capacity: None,
            measure_capacity: None,
            event_capacity: Some(EVENT_BUFFER_SIZE),
            long_task_capacity: Some(LONG_TASK_BUFFER_SIZE),
            resource_capacity: Some(RESOURCE_TIMING_BUFFER_SIZE),
        }
    }
}

impl ReporterConfig {
    /// Create a config with the default capacities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> TimelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the capacity of one category's buffer.
    pub fn with_capacity(
        mut self,
        entry_type: PerformanceEntryType,
        capacity: Option<usize>,
    ) -> Self {
        *self.capacity_mut(entry_type) = capacity;
        self
    }

    /// Capacity of one category's buffer.
    pub fn capacity(&self, entry_type: PerformanceEntryType) -> Option<usize> {
        match entry_type {
            PerformanceEntryType::Mark => self.mark_capacity,
            PerformanceEntryType::Measure => self.measure_capacity,
            PerformanceEntryType::Event => self.event_capacity,
            PerformanceEntryType::LongTask => self.long_task_capacity,
            PerformanceEntryType::Resource => self.resource_capacity,
        }
    }

    fn capacity_mut(&mut self, entry_type: PerformanceEntryType) -> &mut Option<usize> {
        match entry_type {
            PerformanceEntryType::Mark => &mut self.mark_capacity,
            PerformanceEntryType::Measure => &mut self.measure_capacity,
            PerformanceEntryType::Event => &mut self.event_capacity,
            PerformanceEntryType::LongTask => &mut self.long_task_capacity,
            PerformanceEntryType::Resource => &mut self.resource_capacity,
        }
    }
}

/// Configuration for a [`PerformanceObserver`](crate::PerformanceObserver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObserverConfig {
    /// Maximum number of pending records before new ones are dropped
    pub max_buffer_size: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: OBSERVER_BUFFER_SIZE,
        }
    }
}

impl ObserverConfig {
    /// Set the pending queue capacity.
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }
}
