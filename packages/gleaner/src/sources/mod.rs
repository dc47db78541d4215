//! Bundled source implementations.
//!
//! The pipeline core only depends on the traits in [`crate::traits`];
//! this module provides plain-HTTP implementations for directories that
//! do not need a scripted browser. Browser-backed sources (including
//! pre-authenticated sessions) are injected by the caller.

mod http;

pub use http::{
    DetailParser, HttpDetailSource, ListingParser, PagedListingSource, RegexDetailParser,
};
