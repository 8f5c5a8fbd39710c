//! Typed errors for the recall ingestion library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

use crate::types::state::{ParseEvent, ParseState};

/// Errors raised by the fetch collaborator.
///
/// All fetch failures are recoverable per record: the batch logs and
/// continues, and the record stays in its prior state for retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success HTTP status
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Connection or read timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },
}

/// Errors raised by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage temporarily unreachable. This is the only error class the
    /// extraction pipeline boundary swallows; the record stays in its prior
    /// state and is retried on the next batch.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Unique-constraint conflict (find-or-create callers retry on this)
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// Referenced row does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other backend failure
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// An event was applied to a record in a state that does not permit it.
///
/// The record's state is left unchanged.
#[derive(Debug, Error)]
#[error("event {event} not allowed from state {state}")]
pub struct StateTransitionError {
    /// The attempted lifecycle event
    pub event: ParseEvent,

    /// The record's state at the time of the attempt
    pub state: ParseState,
}

/// Errors raised while extracting structured fields from a retrieved record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A date string matched the recall-date pattern but failed calendar
    /// parsing. Hard failure: extraction aborts and the record remains
    /// `retrieved` for manual review.
    #[error("invalid date string '{matched}'")]
    InvalidDate { matched: String },

    /// Reference-entity resolution failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level errors for ingestion operations.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetch failed (retryable, batch continues)
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Invalid lifecycle transition (programming/data error, not retried)
    #[error(transparent)]
    State(#[from] StateTransitionError),

    /// Field extraction failed
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// Storage operation failed outside of extraction
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    /// Batch was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
