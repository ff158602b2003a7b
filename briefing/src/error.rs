//! Error types for the briefing pipeline.
//!
//! Uses thiserror for ergonomic error definition, one enum per subsystem.

use std::time::Duration;
use textgen::GenerationError;

/// Errors from signal feeds.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP fetch failed.
    #[error("Feed fetch failed for {url}: {reason}")]
    Fetch {
        /// Feed URL that failed.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// No feed URLs configured.
    #[error("No signal feeds configured")]
    NotConfigured,
}

/// Errors from persistence sinks.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Storage backend rejected the document.
    #[error("Storage error: {reason}")]
    Storage {
        /// Backend failure description.
        reason: String,
    },

    /// Document could not be serialized for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors terminating a pipeline run.
///
/// Stage-precondition failures (no signals, no candidates, no selections)
/// are *not* here: they end the run early but are recorded as non-fatal
/// entries in the run summary's error list.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Every fanned-out topic task failed.
    #[error("All {count} topic tasks failed")]
    AllTopicsFailed {
        /// Number of topic tasks that were attempted.
        count: usize,
    },

    /// The run exceeded its wall-clock ceiling.
    #[error("Run exceeded wall-clock ceiling of {ceiling:?}")]
    DeadlineExceeded {
        /// The configured ceiling.
        ceiling: Duration,
    },

    /// Generation service error that escaped task-level recovery.
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Feed error that escaped task-level recovery.
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Sink error that escaped task-level recovery.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::AllTopicsFailed { count: 3 };
        assert_eq!(err.to_string(), "All 3 topic tasks failed");
    }

    #[test]
    fn test_error_conversion() {
        let gen_err = GenerationError::Network("connection refused".to_string());
        let err: PipelineError = gen_err.into();
        assert!(matches!(err, PipelineError::Generation(_)));
    }
}
