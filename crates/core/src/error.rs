//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the engine decides per call
//! site whether an error is reported to the model, logged, or fatal for the
//! message being processed.

use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Endpoint errors ---
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    // --- History errors ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Structured output ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Lookups ---
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum EndpointError {
    #[error("Endpoint not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed on {endpoint}: {reason}")]
    DeliveryFailed { endpoint: String, reason: String },

    #[error("Reaction failed on {endpoint}: {reason}")]
    ReactionFailed { endpoint: String, reason: String },

    #[error("All {attempted} endpoint(s) failed for channel {channel_id}")]
    AllEndpointsFailed { channel_id: String, attempted: usize },

    #[error("Endpoint connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid inbound payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// The model's final payload did not match the reply schema.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Reply is not valid JSON for the reply schema: {0}")]
    Malformed(String),

    #[error("Reply violates the reply schema at {path}: {reason}")]
    Schema { path: String, reason: String },
}

/// A metadata or abbreviation lookup failed.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("Lookup request failed: {0}")]
    Network(String),

    #[error("Lookup response could not be decoded: {0}")]
    Decode(String),

    #[error("Lookup not supported: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn all_endpoints_failed_names_channel() {
        let err = Error::Endpoint(EndpointError::AllEndpointsFailed {
            channel_id: "general".into(),
            attempted: 2,
        });
        assert!(err.to_string().contains("general"));
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn validation_error_carries_path() {
        let err = ValidationError::Schema {
            path: "groups[0].segments".into(),
            reason: "must not be empty".into(),
        };
        assert!(err.to_string().contains("groups[0].segments"));
    }
}
