//! Error types for the performance timeline.

use thiserror::Error;

/// Errors that can occur in the timeline core.
///
/// Buffer overflow is deliberately absent: eviction and observer drops are
/// counted, never reported as failures.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Unknown entry type name or code
    #[error("Invalid entry type: {0}")]
    InvalidEntryType(String),

    /// Failed to parse timeline configuration
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimelineError::InvalidEntryType("paint".to_string());
        assert_eq!(err.to_string(), "Invalid entry type: paint");
    }

    #[test]
    fn test_config_error_conversion() {
        let json_err: Result<(), serde_json::Error> = serde_json::from_str::<()>("not json");
        let err: TimelineError = json_err.unwrap_err().into();
        assert!(matches!(err, TimelineError::Config(_)));
    }
}
