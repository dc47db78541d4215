//! Capability traits at the pipeline's seams.
//!
//! The pipeline depends only on these surfaces, never on a concrete
//! browser or HTTP client. A pre-authenticated browser session is
//! injected as a [`ListingSource`]/[`DetailSource`] implementation rather
//! than constructed here.

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::{FetchResult, PageResult, PersistenceError};
use crate::types::{ListingPage, Record, RecordStub, SeedRecord};

/// Supplies listing pages for a seed, one page at a time.
///
/// Page numbers start at 1. Implementations signal the terminal condition
/// by returning a page with `has_next = false` (or no stubs at all); the
/// walker handles retries and filtering.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Load one page of listing results for a seed.
    async fn fetch_page(&self, seed: &SeedRecord, page: u32) -> PageResult<ListingPage>;

    /// Source name for logging.
    fn name(&self) -> &str {
        "listing"
    }
}

/// Retrieves the full field set for a record stub.
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Fetch detail fields for a stub's `detail_ref`.
    ///
    /// Returns only the newly fetched fields; the pipeline merges them
    /// with the stub's inline fields.
    async fn fetch_detail(&self, stub: &RecordStub) -> FetchResult<IndexMap<String, String>>;

    /// Source name for logging.
    fn name(&self) -> &str {
        "detail"
    }
}

/// Append-only destination for completed records.
///
/// Implementations must make each append durable before returning, so an
/// interruption loses at most the in-flight record. Rows are never
/// rewritten in place; re-running after a crash may append duplicates.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one record and flush it.
    async fn append(&self, record: &Record) -> Result<(), PersistenceError>;

    /// Flush any buffered state to durable storage.
    async fn flush(&self) -> Result<(), PersistenceError>;
}
