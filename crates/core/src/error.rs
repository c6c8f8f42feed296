//! Error types for the Planmind memory subsystem.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Planmind operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request validation ---
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Embedding errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- LLM errors ---
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // --- Job submission errors ---
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// --- Bounded context errors ---

/// Errors from the embedding store (vector persistence).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Errors from the embedding provider.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding generation failed: {0}")]
    Failed(String),

    #[error("Embedding batch mismatch: sent {sent} texts, got {got} vectors")]
    BatchMismatch { sent: usize, got: usize },

    #[error("Rate limited by embedding provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Errors from the summarization LLM.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Empty completion from model")]
    EmptyCompletion,
}

/// Errors from background job submission.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("Job submission failed: {0}")]
    SubmitFailed(String),

    #[error("Job queue unavailable: {0}")]
    QueueUnavailable(String),
}
