//! Core data types flowing through the pipeline.
//!
//! Lifecycle: [`SeedRecord`] → walker → [`RecordStub`]s → cache filter →
//! detail fetch → [`Record`] → sink. Only the dedup cache outlives a run.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An initial search input driving one pagination walk.
///
/// Immutable once read from the seed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedRecord {
    /// Free-text search query (e.g. "Automobile Accidents near Los Angeles, CA")
    Query(String),

    /// Geographic probe for fan-out searches against a locator
    PostalCode { code: String, country: String },

    /// External document identifier (e.g. a public-records API key)
    DocumentId(String),
}

impl SeedRecord {
    /// Short human-readable form for logs.
    pub fn label(&self) -> String {
        match self {
            SeedRecord::Query(q) => q.clone(),
            SeedRecord::PostalCode { code, country } => format!("{code} ({country})"),
            SeedRecord::DocumentId(id) => id.clone(),
        }
    }

    /// The value substituted into listing URL templates.
    pub fn term(&self) -> &str {
        match self {
            SeedRecord::Query(q) => q,
            SeedRecord::PostalCode { code, .. } => code,
            SeedRecord::DocumentId(id) => id,
        }
    }
}

/// How a listing entry was placed on the page.
///
/// Assigned by the listing parser from the entry's raw markup (e.g. a
/// `sponsored-label` element). Sponsored entries are filtered by the
/// walker and never reach the cache or the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    Organic,
    Sponsored,
}

/// A lightweight reference to a listing record, pending detail retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStub {
    /// Dedup identity (usually the detail URL or an external ID)
    pub key: String,

    /// URL or ID to fetch the full record from
    pub detail_ref: String,

    /// Fields already visible on the listing page
    #[serde(default)]
    pub inline_fields: IndexMap<String, String>,

    /// Organic vs. sponsored classification
    pub placement: Placement,
}

impl RecordStub {
    /// Create an organic stub whose key doubles as its detail reference.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            detail_ref: key.clone(),
            key,
            inline_fields: IndexMap::new(),
            placement: Placement::Organic,
        }
    }

    /// Set a distinct detail reference.
    pub fn with_detail_ref(mut self, detail_ref: impl Into<String>) -> Self {
        self.detail_ref = detail_ref.into();
        self
    }

    /// Add an inline field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inline_fields.insert(name.into(), value.into());
        self
    }

    /// Mark the stub as sponsored placement.
    pub fn sponsored(mut self) -> Self {
        self.placement = Placement::Sponsored;
        self
    }

    pub fn is_sponsored(&self) -> bool {
        self.placement == Placement::Sponsored
    }
}

/// One page of listing results, as returned by a [`crate::traits::ListingSource`].
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Record stubs extracted from the page, in page order
    pub stubs: Vec<RecordStub>,

    /// Whether the page advertises a "next" control
    pub has_next: bool,
}

impl ListingPage {
    /// A terminal page: no stubs, no next control.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(stubs: Vec<RecordStub>, has_next: bool) -> Self {
        Self { stubs, has_next }
    }
}

/// A fully fetched, flattened output row. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Dedup identity carried over from the stub
    pub key: String,

    /// All output fields, in insertion order
    pub fields: IndexMap<String, String>,

    /// When the detail fetch completed
    pub fetched_at: DateTime<Utc>,
}

impl Record {
    /// Merge a stub's inline fields with freshly fetched detail fields.
    ///
    /// Detail fields win on name collisions, matching the second-stage
    /// fetch being the more authoritative source.
    pub fn merge(stub: &RecordStub, detail_fields: IndexMap<String, String>) -> Self {
        let mut fields = stub.inline_fields.clone();
        for (name, value) in detail_fields {
            fields.insert(name, value);
        }
        Self {
            key: stub.key.clone(),
            fields,
            fetched_at: Utc::now(),
        }
    }

    /// Field lookup by column name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Seeds walked to completion
    pub seeds_processed: usize,

    /// Seeds abandoned after exhausting page retries
    pub seeds_failed: usize,

    /// Listing pages fetched successfully
    pub pages_walked: usize,

    /// Stubs yielded by the walker (post-filter)
    pub stubs_discovered: usize,

    /// Stubs skipped because their key was already cached
    pub stubs_skipped_cached: usize,

    /// Stubs dropped for sponsored placement
    pub stubs_sponsored_skipped: usize,

    /// Stubs dropped for unusable listing markup
    pub stubs_parse_skipped: usize,

    /// Records appended to the sink
    pub records_written: usize,

    /// Detail fetches that failed and were skipped
    pub fetches_failed: usize,

    /// Keys of stubs whose detail fetch failed
    pub failed_keys: Vec<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every dispatched detail fetch produced a row.
    pub fn is_success(&self) -> bool {
        self.fetches_failed == 0 && self.seeds_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_builder() {
        let stub = RecordStub::new("https://example.com/d/1")
            .with_field("Name", "Acme Plows")
            .with_field("Phone", "555-0100");

        assert_eq!(stub.key, "https://example.com/d/1");
        assert_eq!(stub.detail_ref, "https://example.com/d/1");
        assert_eq!(stub.inline_fields.get("Name").unwrap(), "Acme Plows");
        assert!(!stub.is_sponsored());

        let ad = RecordStub::new("https://example.com/d/2").sponsored();
        assert!(ad.is_sponsored());
    }

    #[test]
    fn test_merge_detail_fields_win() {
        let stub = RecordStub::new("k1")
            .with_field("Name", "Listing Name")
            .with_field("Location", "Newburgh, NY");

        let mut detail = IndexMap::new();
        detail.insert("Name".to_string(), "Detail Name".to_string());
        detail.insert("Phone".to_string(), "555-0101".to_string());

        let record = Record::merge(&stub, detail);

        assert_eq!(record.key, "k1");
        assert_eq!(record.get("Name"), Some("Detail Name"));
        assert_eq!(record.get("Location"), Some("Newburgh, NY"));
        assert_eq!(record.get("Phone"), Some("555-0101"));
    }

    #[test]
    fn test_seed_labels() {
        let seed = SeedRecord::PostalCode {
            code: "12550".to_string(),
            country: "US".to_string(),
        };
        assert_eq!(seed.label(), "12550 (US)");
        assert_eq!(seed.term(), "12550");

        assert_eq!(SeedRecord::Query("plows".into()).term(), "plows");
    }
}
