//! Mock sources for testing.
//!
//! Scripted implementations of [`ListingSource`] and [`DetailSource`]
//! with call tracking, so tests can assert exactly which pages and
//! details were requested.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult, PageError, PageResult};
use crate::traits::{DetailSource, ListingSource};
use crate::types::{ListingPage, RecordStub, SeedRecord};

/// Mock listing source with scripted pages per seed.
///
/// Pages beyond the scripted sequence come back empty and terminal.
/// Failures can be injected globally (first N attempts) or per seed
/// (every attempt from a given page number onward).
#[derive(Default)]
pub struct MockListingSource {
    pages: Arc<RwLock<HashMap<String, Vec<ListingPage>>>>,
    fail_from_page: Arc<RwLock<HashMap<String, u32>>>,
    fail_first_attempts: Arc<RwLock<u32>>,
    calls: Arc<RwLock<Vec<(String, u32)>>>,
}

impl MockListingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the page sequence for a seed (builder pattern).
    pub fn with_pages(self, seed: SeedRecord, pages: Vec<ListingPage>) -> Self {
        self.pages.write().unwrap().insert(seed.label(), pages);
        self
    }

    /// Make every fetch for `seed` fail from `page` onward.
    pub fn failing_from_page(self, seed: SeedRecord, page: u32) -> Self {
        self.fail_from_page.write().unwrap().insert(seed.label(), page);
        self
    }

    /// Fail the first `n` fetch attempts (any seed), then succeed.
    pub fn fail_first_attempts(self, n: u32) -> Self {
        *self.fail_first_attempts.write().unwrap() = n;
        self
    }

    /// All `(seed label, page)` pairs requested so far.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

impl Clone for MockListingSource {
    fn clone(&self) -> Self {
        Self {
            pages: Arc::clone(&self.pages),
            fail_from_page: Arc::clone(&self.fail_from_page),
            fail_first_attempts: Arc::clone(&self.fail_first_attempts),
            calls: Arc::clone(&self.calls),
        }
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    async fn fetch_page(&self, seed: &SeedRecord, page: u32) -> PageResult<ListingPage> {
        let label = seed.label();
        self.calls.write().unwrap().push((label.clone(), page));

        {
            let mut remaining = self.fail_first_attempts.write().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PageError::Timeout { seed: label, page });
            }
        }

        if let Some(&fail_from) = self.fail_from_page.read().unwrap().get(&label) {
            if page >= fail_from {
                return Err(PageError::Timeout { seed: label, page });
            }
        }

        let pages = self.pages.read().unwrap();
        let scripted = pages
            .get(&label)
            .and_then(|seq| seq.get((page - 1) as usize))
            .cloned()
            .unwrap_or_else(ListingPage::empty);
        Ok(scripted)
    }

    fn name(&self) -> &str {
        "mock-listing"
    }
}

/// Mock detail source with canned fields and scripted failures.
#[derive(Default)]
pub struct MockDetailSource {
    fields: Arc<RwLock<HashMap<String, IndexMap<String, String>>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockDetailSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Can detail fields for a stub key (builder pattern).
    pub fn with_fields(self, key: impl Into<String>, fields: Vec<(&str, &str)>) -> Self {
        let map: IndexMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.fields.write().unwrap().insert(key.into(), map);
        self
    }

    /// Make every fetch for `key` fail.
    pub fn failing(self, key: impl Into<String>) -> Self {
        self.failures.write().unwrap().insert(key.into());
        self
    }

    /// Keys fetched so far, in dispatch-completion order.
    pub fn fetch_calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn fetch_call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

impl Clone for MockDetailSource {
    fn clone(&self) -> Self {
        Self {
            fields: Arc::clone(&self.fields),
            failures: Arc::clone(&self.failures),
            calls: Arc::clone(&self.calls),
        }
    }
}

#[async_trait]
impl DetailSource for MockDetailSource {
    async fn fetch_detail(&self, stub: &RecordStub) -> FetchResult<IndexMap<String, String>> {
        self.calls.write().unwrap().push(stub.key.clone());

        if self.failures.read().unwrap().contains(&stub.key) {
            return Err(FetchError::Malformed {
                key: stub.key.clone(),
                reason: "scripted failure".to_string(),
            });
        }

        Ok(self
            .fields
            .read()
            .unwrap()
            .get(&stub.key)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock-detail"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_listing_scripted_pages() {
        let seed = SeedRecord::Query("q".to_string());
        let mock = MockListingSource::new().with_pages(
            seed.clone(),
            vec![ListingPage::new(vec![RecordStub::new("a")], true)],
        );

        let page1 = mock.fetch_page(&seed, 1).await.unwrap();
        assert_eq!(page1.stubs.len(), 1);
        assert!(page1.has_next);

        // Beyond the script: empty and terminal.
        let page2 = mock.fetch_page(&seed, 2).await.unwrap();
        assert!(page2.stubs.is_empty());
        assert!(!page2.has_next);

        assert_eq!(mock.calls(), vec![("q".to_string(), 1), ("q".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_mock_detail_failure_and_tracking() {
        let mock = MockDetailSource::new()
            .with_fields("k1", vec![("Phone", "555-0100")])
            .failing("k2");

        let ok = mock.fetch_detail(&RecordStub::new("k1")).await.unwrap();
        assert_eq!(ok.get("Phone").unwrap(), "555-0100");

        let err = mock.fetch_detail(&RecordStub::new("k2")).await;
        assert!(matches!(err, Err(FetchError::Malformed { .. })));

        assert_eq!(mock.fetch_calls(), vec!["k1".to_string(), "k2".to_string()]);
    }
}
