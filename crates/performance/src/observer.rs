//! Observer handles and observe requests.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use timeline::{HighResDuration, ObserveOptions, PerformanceEntryType, PerformanceObserver};

use crate::error::PerformanceResult;

/// Handle owned by a scripting-side observer object.
///
/// Dropping the last handle destroys the observer; the reporter's registry
/// only holds a weak reference to it. A detached handle (one whose observer
/// was never created) turns every observer operation into a no-op.
#[derive(Debug, Clone, Default)]
pub struct ObserverHandle {
    observer: Option<Arc<PerformanceObserver>>,
}

impl ObserverHandle {
    pub(crate) fn new(observer: Arc<PerformanceObserver>) -> Self {
        Self {
            observer: Some(observer),
        }
    }

    /// A handle without an observer behind it.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.observer.is_some()
    }

    /// The observer behind this handle, if any.
    pub fn observer(&self) -> Option<&Arc<PerformanceObserver>> {
        self.observer.as_ref()
    }
}

/// Arguments of an `observe()` call.
///
/// `entry_types` selects multi-type mode and wins over `entry_type`;
/// `buffered` and `duration_threshold` only apply to single-type mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserveRequest {
    #[serde(default)]
    pub entry_types: Option<Vec<PerformanceEntryType>>,
    #[serde(default, rename = "type")]
    pub entry_type: Option<PerformanceEntryType>,
    #[serde(default)]
    pub buffered: Option<bool>,
    #[serde(default)]
    pub duration_threshold: Option<HighResDuration>,
}

impl ObserveRequest {
    /// Observe one entry type.
    pub fn single(entry_type: PerformanceEntryType) -> Self {
        Self {
            entry_type: Some(entry_type),
            ..Default::default()
        }
    }

    /// Observe several entry types.
    pub fn multiple(entry_types: impl IntoIterator<Item = PerformanceEntryType>) -> Self {
        Self {
            entry_types: Some(entry_types.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Request back-fill from already recorded entries.
    pub fn with_buffered(mut self, buffered: bool) -> Self {
        self.buffered = Some(buffered);
        self
    }

    /// Ignore entries shorter than `threshold`.
    pub fn with_duration_threshold(mut self, threshold: HighResDuration) -> Self {
        self.duration_threshold = Some(threshold);
        self
    }

    /// Decode a request from its JSON form.
    pub fn from_json(json: &str) -> PerformanceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply this request to an observer, replacing its current filter.
    pub(crate) fn apply(&self, observer: &Arc<PerformanceObserver>) {
        if let Some(entry_types) = &self.entry_types {
            let types: HashSet<PerformanceEntryType> = entry_types.iter().copied().collect();
            observer.observe_types(types);
        } else if let Some(entry_type) = self.entry_type {
            observer.observe_type(
                entry_type,
                ObserveOptions {
                    buffered: self.buffered.unwrap_or(false),
                    duration_threshold: self.duration_threshold,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_single() {
        let json = r#"{"type": "event", "buffered": true, "durationThreshold": 16}"#;
        let request = ObserveRequest::from_json(json).unwrap();
        assert_eq!(
            request,
            ObserveRequest::single(PerformanceEntryType::Event)
                .with_buffered(true)
                .with_duration_threshold(HighResDuration::from_millis(16.0))
        );
    }

    #[test]
    fn test_from_json_multiple() {
        let request = ObserveRequest::from_json(r#"{"entryTypes": ["mark", "longtask"]}"#).unwrap();
        assert_eq!(
            request.entry_types,
            Some(vec![PerformanceEntryType::Mark, PerformanceEntryType::LongTask])
        );
        assert!(request.entry_type.is_none());
    }

    #[test]
    fn test_from_json_rejects_unknown_type() {
        assert!(ObserveRequest::from_json(r#"{"type": "paint"}"#).is_err());
    }

    #[test]
    fn test_apply_without_threshold_keeps_negative_measures() {
        use timeline::{HighResTimeStamp, ObserverConfig, PerformanceEntryReporter, ReporterConfig};

        let reporter = Arc::new(PerformanceEntryReporter::new(ReporterConfig::default()));
        reporter.report_measure(
            "before",
            HighResTimeStamp::from_millis(8.0),
            HighResTimeStamp::from_millis(2.0),
        );
        let observer =
            PerformanceObserver::create(&reporter, Arc::new(|| {}), ObserverConfig::default());

        ObserveRequest::from_json(r#"{"type": "measure", "buffered": true}"#)
            .unwrap()
            .apply(&observer);
        reporter.report_measure(
            "after",
            HighResTimeStamp::from_millis(9.0),
            HighResTimeStamp::from_millis(4.0),
        );

        let names: Vec<_> = observer.take_records(true).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["before", "after"]);
    }

    #[test]
    fn test_detached_handle() {
        let handle = ObserverHandle::detached();
        assert!(!handle.is_attached());
        assert!(handle.observer().is_none());
    }
}
