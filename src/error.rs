use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RlError>;

#[derive(Debug, Error)]
pub enum RlError {
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Expected {expected} agents, got {actual}")]
    AgentCountMismatch { expected: usize, actual: usize },

    #[error("Agent {agent}: expected observation of length {expected}, got {actual}")]
    DimensionMismatch {
        agent: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Expected global state of length {expected}, got {actual}")]
    StateDimensionMismatch { expected: usize, actual: usize },

    #[error("Agent {agent}: action {action} is out of range for {action_dim} actions")]
    ActionOutOfRange {
        agent: usize,
        action: usize,
        action_dim: usize,
    },

    #[error("Batch field `{field}` has {actual} rows, expected {expected}")]
    BatchSizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot train on an empty batch")]
    EmptyBatch,

    #[error("Requested {requested} samples but the buffer holds {available}")]
    InsufficientSamples { requested: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_display() {
        let e = RlError::DimensionMismatch {
            agent: 1,
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            e.to_string(),
            "Agent 1: expected observation of length 4, got 3"
        );
    }

    #[test]
    fn agent_count_mismatch_display() {
        let e = RlError::AgentCountMismatch {
            expected: 2,
            actual: 3,
        };
        assert_eq!(e.to_string(), "Expected 2 agents, got 3");
    }

    #[test]
    fn insufficient_samples_display() {
        let e = RlError::InsufficientSamples {
            requested: 32,
            available: 0,
        };
        assert!(e.to_string().contains("32"));
    }

    #[test]
    fn empty_batch_display() {
        assert_eq!(
            RlError::EmptyBatch.to_string(),
            "Cannot train on an empty batch"
        );
    }

    #[test]
    fn json_error_converts() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let e: RlError = err.into();
        assert!(matches!(e, RlError::Json(_)));
    }
}
