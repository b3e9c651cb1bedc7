//! Error types for the performance API.

use thiserror::Error;

/// Errors surfaced to callers of the performance API.
///
/// Only a missing mark reference is a hard failure. Overflowing buffers and
/// operations on detached or disconnected observers degrade to no-ops.
#[derive(Debug, Error)]
pub enum PerformanceError {
    /// A measure referenced a mark that was never recorded
    #[error("The mark '{0}' does not exist.")]
    MarkNotFound(String),

    /// Failed to decode or encode a binding payload
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for performance API operations.
pub type PerformanceResult<T> = Result<T, PerformanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PerformanceError::MarkNotFound("start".to_string());
        assert_eq!(err.to_string(), "The mark 'start' does not exist.");
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err: Result<(), serde_json::Error> = serde_json::from_str::<()>("invalid json");
        let err: PerformanceError = json_err.unwrap_err().into();
        assert!(matches!(err, PerformanceError::Serialization(_)));
    }
}
