//! Listing Walker: paginates through a seed's results and yields stubs.
//!
//! The walker is restartable from page 1 only. An interrupted run re-walks
//! pagination for its seeds from the start and relies on the dedup cache
//! to avoid redundant detail fetches.

use async_stream::stream;
use futures::Stream;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::delay::JitterDelay;
use crate::error::PageError;
use crate::traits::ListingSource;
use crate::types::{RecordStub, SeedRecord};

/// Per-page statistics emitted alongside the stubs.
#[derive(Debug, Clone, Copy)]
pub struct PageStats {
    /// 1-based page number
    pub number: u32,

    /// Stubs yielded from this page
    pub new_stubs: usize,

    /// Stubs dropped for sponsored placement
    pub sponsored_skipped: usize,

    /// Stubs dropped for unusable markup (empty key)
    pub parse_skipped: usize,

    /// Stubs dropped as repeats of already-yielded keys
    pub duplicate_skipped: usize,
}

/// Events produced while walking one seed.
#[derive(Debug)]
pub enum WalkEvent {
    /// An organic, usable, not-yet-seen stub
    Stub(RecordStub),

    /// A listing page finished processing
    PageOk(PageStats),

    /// The seed was abandoned after exhausting page retries.
    ///
    /// Recorded, non-fatal: the stream ends and the run moves to the
    /// next seed.
    Failed(PageError),
}

/// Walks listing pagination for one seed at a time.
pub struct ListingWalker {
    source: Arc<dyn ListingSource>,
    max_retries: u32,
    retry_backoff: Duration,
    jitter: JitterDelay,
}

impl ListingWalker {
    pub fn new(source: Arc<dyn ListingSource>) -> Self {
        Self {
            source,
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
            jitter: JitterDelay::none(),
        }
    }

    /// Set the transient-failure retry bound and base backoff.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Space out page loads with a jitter delay.
    pub fn with_jitter(mut self, jitter: JitterDelay) -> Self {
        self.jitter = jitter;
        self
    }

    /// Walk a seed's pagination from page 1, lazily yielding stubs.
    ///
    /// Terminates when a page yields zero new stubs, when no next control
    /// exists, or after retries are exhausted (a [`WalkEvent::Failed`] is
    /// the final event in that case).
    pub fn walk(&self, seed: SeedRecord) -> impl Stream<Item = WalkEvent> + Send + 'static {
        let source = Arc::clone(&self.source);
        let max_retries = self.max_retries;
        let retry_backoff = self.retry_backoff;
        let jitter = self.jitter;

        stream! {
            let mut seen: HashSet<String> = HashSet::new();
            let mut page_no: u32 = 1;

            loop {
                if page_no > 1 {
                    jitter.wait().await;
                }

                // Bounded retries with linear backoff for transient failures.
                let page = {
                    let mut attempt: u32 = 0;
                    loop {
                        match source.fetch_page(&seed, page_no).await {
                            Ok(page) => break Some(page),
                            Err(e) => {
                                attempt += 1;
                                if attempt > max_retries {
                                    warn!(
                                        seed = %seed.label(),
                                        page = page_no,
                                        error = %e,
                                        "Retries exhausted; abandoning seed"
                                    );
                                    yield WalkEvent::Failed(e);
                                    break None;
                                }
                                warn!(
                                    seed = %seed.label(),
                                    page = page_no,
                                    attempt,
                                    error = %e,
                                    "Page load failed; retrying"
                                );
                                tokio::time::sleep(retry_backoff * attempt).await;
                            }
                        }
                    }
                };

                let Some(page) = page else { return };

                let mut stats = PageStats {
                    number: page_no,
                    new_stubs: 0,
                    sponsored_skipped: 0,
                    parse_skipped: 0,
                    duplicate_skipped: 0,
                };
                let has_next = page.has_next;

                for stub in page.stubs {
                    if stub.is_sponsored() {
                        stats.sponsored_skipped += 1;
                        debug!(seed = %seed.label(), key = %stub.key, "Skipping sponsored listing");
                        continue;
                    }
                    if stub.key.trim().is_empty() {
                        stats.parse_skipped += 1;
                        continue;
                    }
                    if !seen.insert(stub.key.clone()) {
                        stats.duplicate_skipped += 1;
                        continue;
                    }
                    stats.new_stubs += 1;
                    yield WalkEvent::Stub(stub);
                }

                debug!(
                    seed = %seed.label(),
                    page = page_no,
                    new_stubs = stats.new_stubs,
                    has_next,
                    "Listing page processed"
                );
                yield WalkEvent::PageOk(stats);

                // Terminal conditions: nothing new on this page, or no
                // next control.
                if stats.new_stubs == 0 || !has_next {
                    info!(
                        seed = %seed.label(),
                        pages = page_no,
                        stubs = seen.len(),
                        "Pagination exhausted"
                    );
                    return;
                }

                page_no += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockListingSource;
    use crate::types::ListingPage;
    use futures::StreamExt;

    fn seed() -> SeedRecord {
        SeedRecord::Query("test".to_string())
    }

    async fn collect(walker: &ListingWalker, seed: SeedRecord) -> (Vec<RecordStub>, Vec<PageStats>, bool) {
        let mut stubs = Vec::new();
        let mut pages = Vec::new();
        let mut failed = false;
        let mut stream = Box::pin(walker.walk(seed));
        while let Some(event) = stream.next().await {
            match event {
                WalkEvent::Stub(s) => stubs.push(s),
                WalkEvent::PageOk(p) => pages.push(p),
                WalkEvent::Failed(_) => failed = true,
            }
        }
        (stubs, pages, failed)
    }

    #[tokio::test]
    async fn test_walk_terminates_on_no_next() {
        let source = MockListingSource::new().with_pages(
            seed(),
            vec![
                ListingPage::new(vec![RecordStub::new("a"), RecordStub::new("b")], true),
                ListingPage::new(vec![RecordStub::new("c")], false),
            ],
        );
        let walker = ListingWalker::new(Arc::new(source));

        let (stubs, pages, failed) = collect(&walker, seed()).await;
        assert!(!failed);
        assert_eq!(pages.len(), 2);
        let keys: Vec<&str> = stubs.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(stubs.iter().all(|s| !s.key.is_empty()));
    }

    #[tokio::test]
    async fn test_walk_terminates_on_empty_page() {
        // Page 3 exists but yields nothing new, so the walk must stop
        // there even though it advertises a next control.
        let source = MockListingSource::new().with_pages(
            seed(),
            vec![
                ListingPage::new(vec![RecordStub::new("a")], true),
                ListingPage::new(vec![RecordStub::new("a")], true),
                ListingPage::new(vec![RecordStub::new("never-reached")], true),
            ],
        );
        let walker = ListingWalker::new(Arc::new(source));

        let (stubs, pages, _) = collect(&walker, seed()).await;
        assert_eq!(stubs.len(), 1);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].duplicate_skipped, 1);
    }

    #[tokio::test]
    async fn test_sponsored_filtered() {
        let source = MockListingSource::new().with_pages(
            seed(),
            vec![ListingPage::new(
                vec![
                    RecordStub::new("organic-1"),
                    RecordStub::new("ad-1").sponsored(),
                    RecordStub::new("organic-2"),
                    RecordStub::new("ad-2").sponsored(),
                    RecordStub::new("organic-3"),
                ],
                false,
            )],
        );
        let walker = ListingWalker::new(Arc::new(source));

        let (stubs, pages, _) = collect(&walker, seed()).await;
        assert_eq!(stubs.len(), 3);
        assert!(stubs.iter().all(|s| s.key.starts_with("organic")));
        assert_eq!(pages[0].sponsored_skipped, 2);
    }

    #[tokio::test]
    async fn test_empty_keys_skipped_and_no_dup_within_page() {
        let source = MockListingSource::new().with_pages(
            seed(),
            vec![ListingPage::new(
                vec![
                    RecordStub::new("a"),
                    RecordStub::new("  "),
                    RecordStub::new("a"),
                    RecordStub::new("b"),
                ],
                false,
            )],
        );
        let walker = ListingWalker::new(Arc::new(source));

        let (stubs, pages, _) = collect(&walker, seed()).await;
        let keys: Vec<&str> = stubs.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(pages[0].parse_skipped, 1);
        assert_eq!(pages[0].duplicate_skipped, 1);
    }

    #[tokio::test]
    async fn test_retries_then_abandon() {
        let source = MockListingSource::new()
            .with_pages(seed(), vec![ListingPage::new(vec![RecordStub::new("a")], true)])
            .failing_from_page(seed(), 2);
        let walker =
            ListingWalker::new(Arc::new(source)).with_retries(2, Duration::from_millis(1));

        let (stubs, pages, failed) = collect(&walker, seed()).await;
        assert_eq!(stubs.len(), 1);
        assert_eq!(pages.len(), 1);
        assert!(failed);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let source = MockListingSource::new()
            .with_pages(seed(), vec![ListingPage::new(vec![RecordStub::new("a")], false)])
            .fail_first_attempts(1);
        let walker =
            ListingWalker::new(Arc::new(source)).with_retries(3, Duration::from_millis(1));

        let (stubs, _, failed) = collect(&walker, seed()).await;
        assert!(!failed);
        assert_eq!(stubs.len(), 1);
    }
}
