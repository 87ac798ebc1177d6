//! Error types for the rate engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {

    // =============================
    // Calculation Errors
    // =============================

    #[error("Insufficient data for {operation}: need at least {required} points, got {actual}")]
    InsufficientData {
        operation: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Validation rejected result: {0}")]
    ValidationRejected(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // =============================
    // Advisory Path Errors
    // =============================

    #[error("Advisory service unavailable: {0}")]
    AdvisoryUnavailable(String),

    #[error("Advisory service timed out after {0} ms")]
    AdvisoryTimeout(u64),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Advisory extraction error: {0}")]
    ExtractionError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl EngineError {
    /// Whether this error means the advisory client will never succeed in
    /// this process, so later calls should skip it instead of retrying.
    pub fn is_fatal_for_advisory(&self) -> bool {
        match self {
            EngineError::AdvisoryUnavailable(_) => true,
            EngineError::HttpError(e) => matches!(
                e.status().map(|s| s.as_u16()),
                Some(401) | Some(403)
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::AdvisoryUnavailable("no key".into()).is_fatal_for_advisory());
        assert!(!EngineError::AdvisoryTimeout(100).is_fatal_for_advisory());
        assert!(!EngineError::LlmError("bad".into()).is_fatal_for_advisory());
        assert!(!EngineError::ExtractionError("empty".into()).is_fatal_for_advisory());
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = EngineError::InsufficientData {
            operation: "anomaly detection",
            required: 3,
            actual: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("anomaly detection"));
        assert!(msg.contains("at least 3"));
    }
}
