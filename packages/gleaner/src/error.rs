//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to keep failure
//! domains separate: transient page errors are retried, fetch errors are
//! skipped, persistence errors abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a listing page. Transient and retryable up to the
/// configured bound; after that the seed is treated as exhausted.
#[derive(Debug, Error)]
pub enum PageError {
    /// HTTP request or page navigation failed
    #[error("page load failed: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Page load timed out
    #[error("timeout loading page {page} for seed {seed}")]
    Timeout { seed: String, page: u32 },

    /// Listing URL could not be constructed
    #[error("invalid listing URL: {url}")]
    InvalidUrl { url: String },
}

/// Errors while fetching a record's detail page.
///
/// These are recorded and skipped; a failed detail fetch is never retried
/// or re-enqueued within the same run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Detail request failed
    #[error("detail fetch failed for {key}: {source}")]
    Http {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Detail fetch timed out
    #[error("timeout fetching detail for {key}")]
    Timeout { key: String },

    /// A field the output schema requires was absent
    #[error("missing required field '{field}' for {key}")]
    MissingField { key: String, field: String },

    /// Detail page markup was unusable
    #[error("malformed detail page for {key}: {reason}")]
    Malformed { key: String, reason: String },
}

/// Cache or sink durability failures. Always fatal: silently losing the
/// durability guarantees is worse than stopping.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// File could not be read or written
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache state could not be serialized
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Output row could not be written
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Top-level pipeline errors. Per-record and per-page failures never
/// surface here; only run-terminating conditions do.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Cache or sink unwritable
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    /// Seed input unreadable
    #[error("seed file error: {0}")]
    SeedFile(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Run was interrupted via the cancellation token
    #[error("run cancelled")]
    Cancelled,
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for listing-page operations.
pub type PageResult<T> = std::result::Result<T, PageError>;

/// Result type alias for detail-fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
