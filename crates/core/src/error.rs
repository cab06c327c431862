//! Error types for the adpilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all adpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model transport errors (fatal to a loop run) ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Decision store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Transcript protocol errors ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by model API, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Model client not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Duplicate tool in catalog: {0}")]
    DuplicateTool(String),

    #[error("Tool {tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Decision not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Reply batch is missing results for invocations: {missing:?}")]
    IncompleteBatch { missing: Vec<String> },

    #[error("Reply batch contains a result for unknown invocation '{0}'")]
    OrphanResult(String),

    #[error("Reply batch results are out of invocation order at position {position}")]
    OutOfOrder { position: usize },

    #[error("Reply turn must be authored by the caller")]
    WrongAuthor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn protocol_error_lists_missing_ids() {
        let err = Error::Protocol(ProtocolError::IncompleteBatch {
            missing: vec!["toolu_2".into()],
        });
        assert!(err.to_string().contains("toolu_2"));
    }

    #[test]
    fn tool_error_names_the_tool() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "query_metrics".into(),
            reason: "warehouse unavailable".into(),
        });
        assert!(err.to_string().contains("query_metrics"));
        assert!(err.to_string().contains("warehouse"));
    }
}
