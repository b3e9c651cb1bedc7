//! Flat entry records handed across the binding boundary.

use serde::{Deserialize, Serialize};
use timeline::{EntryDetails, PerformanceEntry, PerformanceEntryType};

use crate::error::PerformanceResult;

/// A performance entry flattened into plain numbers for the scripting side.
///
/// Type-specific fields are only present for the entry types that carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativePerformanceEntry {
    pub name: String,
    pub entry_type: PerformanceEntryType,
    pub start_time: f64,
    pub duration: f64,

    // Event timing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<u32>,

    // Resource timing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
}

impl From<&PerformanceEntry> for NativePerformanceEntry {
    fn from(entry: &PerformanceEntry) -> Self {
        let mut native = Self {
            name: entry.name.clone(),
            entry_type: entry.entry_type(),
            start_time: entry.start_time.as_millis(),
            duration: entry.duration.as_millis(),
            processing_start: None,
            processing_end: None,
            interaction_id: None,
            fetch_start: None,
            request_start: None,
            connect_start: None,
            connect_end: None,
            response_start: None,
            response_end: None,
            response_status: None,
        };

        match &entry.details {
            EntryDetails::Mark | EntryDetails::Measure | EntryDetails::LongTask => {}
            EntryDetails::Event(timing) => {
                native.processing_start = Some(timing.processing_start.as_millis());
                native.processing_end = Some(timing.processing_end.as_millis());
                native.interaction_id = Some(timing.interaction_id);
            }
            EntryDetails::Resource(timing) => {
                native.fetch_start = Some(timing.fetch_start.as_millis());
                native.request_start = Some(timing.request_start.as_millis());
                native.connect_start = timing.connect_start.map(|ts| ts.as_millis());
                native.connect_end = timing.connect_end.map(|ts| ts.as_millis());
                native.response_start = timing.response_start.map(|ts| ts.as_millis());
                native.response_end = Some(timing.response_end.as_millis());
                native.response_status = timing.response_status;
            }
        }

        native
    }
}

/// Convert a batch of entries, preserving order.
pub fn to_native_entries(entries: &[PerformanceEntry]) -> Vec<NativePerformanceEntry> {
    entries.iter().map(NativePerformanceEntry::from).collect()
}

/// Serialize a batch of records as a JSON array.
pub fn to_json(entries: &[NativePerformanceEntry]) -> PerformanceResult<String> {
    Ok(serde_json::to_string(entries)?)
}
