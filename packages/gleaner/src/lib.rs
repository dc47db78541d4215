//! Paginated extraction pipeline with a resumable dedup cache.
//!
//! Gleaner generalizes the directory-scraping pattern: walk a paginated
//! listing per seed, filter already-discovered records through a
//! persisted dedup cache, fetch full details on a bounded worker pool,
//! and append rows incrementally to a tabular sink.
//!
//! # Pipeline stages
//!
//! 1. **Seed source** — search inputs from a tabular file or a single
//!    search URL ([`seeds`]).
//! 2. **Listing walker** — paginates one seed at a time, yielding record
//!    stubs lazily ([`walker`]).
//! 3. **Dedup cache** — persisted set of discovered keys; survives
//!    restarts so a crashed run resumes without redundant detail fetches
//!    ([`cache`]).
//! 4. **Detail fetcher + sink** — bounded workers fetch full records and
//!    append them durably ([`pipeline`], [`sink`]).
//!
//! The cache is a "seen" set, not a "completed" set: delivery to the
//! detail stage is at-least-once, and re-running after a crash may
//! append duplicate rows.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gleaner::{CsvSink, DedupCache, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new()
//!     .with_seed_file("postal_codes_us_ca.csv")
//!     .with_output_file("dealers.csv")
//!     .with_workers(4);
//!
//! let cache = Arc::new(DedupCache::load(&config.cache_file)?);
//! let sink = Arc::new(CsvSink::create(&config.output_file, columns)?);
//! let pipeline = Pipeline::new(listing, detail, cache, sink, config);
//! let summary = pipeline.run_from_config().await?;
//! ```
//!
//! Site-specific selectors and browser sessions are injected through the
//! [`traits`] surface; the core never constructs them.

pub mod cache;
pub mod config;
pub mod delay;
pub mod error;
pub mod pipeline;
pub mod seeds;
pub mod sink;
pub mod sources;
pub mod testing;
pub mod traits;
pub mod types;
pub mod walker;

// Re-export core types at crate root
pub use cache::DedupCache;
pub use config::PipelineConfig;
pub use delay::JitterDelay;
pub use error::{FetchError, PageError, PersistenceError, PipelineError, Result};
pub use pipeline::Pipeline;
pub use seeds::{load_seeds, search_url_seed};
pub use sink::{CsvSink, MemorySink};
pub use sources::{
    DetailParser, HttpDetailSource, ListingParser, PagedListingSource, RegexDetailParser,
};
pub use testing::{MockDetailSource, MockListingSource};
pub use traits::{DetailSource, ListingSource, RecordSink};
pub use types::{ListingPage, Placement, Record, RecordStub, RunSummary, SeedRecord};
pub use walker::{ListingWalker, PageStats, WalkEvent};
