//! Pipeline orchestration: seeds → walker → cache filter → detail workers → sink.
//!
//! The [`Pipeline`] is the one context object owning the automation
//! session handles, the cache, and the sink for the duration of a run.
//! A single driving task walks listings seed by seed; detail fetches run
//! on a bounded worker pool.

use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::DedupCache;
use crate::config::PipelineConfig;
use crate::delay::JitterDelay;
use crate::error::{PersistenceError, PipelineError, Result};
use crate::seeds;
use crate::traits::{DetailSource, ListingSource, RecordSink};
use crate::types::{Record, RecordStub, RunSummary, SeedRecord};
use crate::walker::{ListingWalker, WalkEvent};

/// Shared mutable state the detail workers report into.
struct RunState {
    summary: Mutex<RunSummary>,
    /// First persistence failure seen by any worker; aborts the run.
    persistence_failure: Mutex<Option<PersistenceError>>,
}

/// The paginated extraction pipeline.
pub struct Pipeline {
    listing: Arc<dyn ListingSource>,
    detail: Arc<dyn DetailSource>,
    cache: Arc<DedupCache>,
    sink: Arc<dyn RecordSink>,
    config: PipelineConfig,
    cancel: CancellationToken,
    run_id: Uuid,
}

impl Pipeline {
    pub fn new(
        listing: Arc<dyn ListingSource>,
        detail: Arc<dyn DetailSource>,
        cache: Arc<DedupCache>,
        sink: Arc<dyn RecordSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            listing,
            detail,
            cache,
            sink,
            config,
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Use an externally owned cancellation token (e.g. wired to SIGINT).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that interrupts the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Identifier for this run, attached to the run logs.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Load seeds per the configuration and run the pipeline.
    ///
    /// The seed file wins over the single search URL when both are set.
    pub async fn run_from_config(&self) -> Result<RunSummary> {
        let seeds = match (&self.config.seed_file, &self.config.search_url) {
            (Some(path), _) => seeds::load_seeds(path, self.config.limit)?,
            (None, Some(url)) => seeds::search_url_seed(url.clone()),
            (None, None) => {
                return Err(PipelineError::SeedFile(
                    "no seed_file or search_url configured".into(),
                ))
            }
        };
        self.run(seeds).await
    }

    /// Run the pipeline over the given seeds.
    ///
    /// Per-page and per-record failures are recorded in the returned
    /// [`RunSummary`]; only persistence failures and cancellation
    /// terminate the run with an error. On either, in-flight workers are
    /// drained first so no partial record is left half-written.
    pub async fn run(&self, seeds: Vec<SeedRecord>) -> Result<RunSummary> {
        let seed_cap = self.config.limit.unwrap_or(usize::MAX);
        // The config field is public; a zero from a hand-built config
        // would leave dispatch waiting on a permit forever.
        let worker_count = self.config.worker_count.max(1);
        let jitter = JitterDelay::new(self.config.min_delay, self.config.max_delay);
        let walker = ListingWalker::new(Arc::clone(&self.listing))
            .with_retries(self.config.max_page_retries, self.config.retry_backoff)
            .with_jitter(jitter);

        let state = Arc::new(RunState {
            summary: Mutex::new(RunSummary::new()),
            persistence_failure: Mutex::new(None),
        });
        let semaphore = Arc::new(Semaphore::new(worker_count));
        let mut workers: JoinSet<()> = JoinSet::new();

        info!(
            run_id = %self.run_id,
            seeds = seeds.len().min(seed_cap),
            workers = worker_count,
            cached_keys = self.cache.len(),
            "Pipeline run starting"
        );

        'seeds: for seed in seeds.into_iter().take(seed_cap) {
            if self.cancel.is_cancelled() {
                break;
            }

            info!(run_id = %self.run_id, seed = %seed.label(), "Walking seed");
            let mut stream = Box::pin(walker.walk(seed.clone()));
            let mut seed_failed = false;

            while let Some(event) = stream.next().await {
                match event {
                    WalkEvent::Stub(stub) => {
                        if self.cancel.is_cancelled() {
                            break 'seeds;
                        }
                        if let Err(e) = self.dispatch(stub, &state, &semaphore, &mut workers, jitter).await {
                            // Cache unwritable: abort, drain below.
                            *state.persistence_failure.lock().unwrap() = Some(e);
                            self.cancel.cancel();
                            break 'seeds;
                        }
                    }
                    WalkEvent::PageOk(stats) => {
                        let mut summary = state.summary.lock().unwrap();
                        summary.pages_walked += 1;
                        summary.stubs_sponsored_skipped += stats.sponsored_skipped;
                        summary.stubs_parse_skipped += stats.parse_skipped;
                    }
                    WalkEvent::Failed(_) => {
                        seed_failed = true;
                    }
                }
            }

            let mut summary = state.summary.lock().unwrap();
            if seed_failed {
                summary.seeds_failed += 1;
            } else {
                summary.seeds_processed += 1;
            }
        }

        // Drain in-flight workers before reporting anything.
        while workers.join_next().await.is_some() {}
        self.sink.flush().await?;

        if let Some(e) = state.persistence_failure.lock().unwrap().take() {
            return Err(PipelineError::Persistence(e));
        }
        if self.cancel.is_cancelled() {
            warn!(run_id = %self.run_id, "Run cancelled; cache and output remain valid for resume");
            return Err(PipelineError::Cancelled);
        }

        let summary = state.summary.lock().unwrap().clone();
        info!(
            run_id = %self.run_id,
            seeds_processed = summary.seeds_processed,
            seeds_failed = summary.seeds_failed,
            pages_walked = summary.pages_walked,
            records_written = summary.records_written,
            skipped_cached = summary.stubs_skipped_cached,
            skipped_sponsored = summary.stubs_sponsored_skipped,
            fetches_failed = summary.fetches_failed,
            "Pipeline run complete"
        );
        Ok(summary)
    }

    /// Cache-filter a stub and hand it to a detail worker.
    ///
    /// The key is persisted before dispatch, so a crash between the two
    /// re-fetches at most this one record on the next run.
    async fn dispatch(
        &self,
        stub: RecordStub,
        state: &Arc<RunState>,
        semaphore: &Arc<Semaphore>,
        workers: &mut JoinSet<()>,
        jitter: JitterDelay,
    ) -> std::result::Result<(), PersistenceError> {
        // Reap finished workers so the set stays bounded by in-flight
        // work instead of growing per dispatched record.
        while workers.try_join_next().is_some() {}

        if self.cache.contains(&stub.key) {
            state.summary.lock().unwrap().stubs_skipped_cached += 1;
            return Ok(());
        }
        if !self.cache.insert(stub.key.clone())? {
            // Another worker won the race within this run.
            state.summary.lock().unwrap().stubs_skipped_cached += 1;
            return Ok(());
        }
        state.summary.lock().unwrap().stubs_discovered += 1;

        let permit = Arc::clone(semaphore)
            .acquire_owned()
            .await
            .expect("semaphore closed");
        let detail = Arc::clone(&self.detail);
        let sink = Arc::clone(&self.sink);
        let state = Arc::clone(state);
        let cancel = self.cancel.clone();

        workers.spawn(async move {
            let _permit = permit;
            if cancel.is_cancelled() {
                // Interrupted before the fetch started; the cached key
                // makes the next run pick this record up again.
                return;
            }
            jitter.wait().await;

            match detail.fetch_detail(&stub).await {
                Ok(fields) => {
                    let record = Record::merge(&stub, fields);
                    match sink.append(&record).await {
                        Ok(()) => {
                            state.summary.lock().unwrap().records_written += 1;
                        }
                        Err(e) => {
                            warn!(key = %record.key, error = %e, "Sink append failed; aborting run");
                            *state.persistence_failure.lock().unwrap() = Some(e);
                            cancel.cancel();
                        }
                    }
                }
                Err(e) => {
                    // Recorded and skipped; not re-enqueued this run.
                    warn!(key = %stub.key, error = %e, "Detail fetch failed; skipping record");
                    let mut summary = state.summary.lock().unwrap();
                    summary.fetches_failed += 1;
                    summary.failed_keys.push(stub.key.clone());
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::testing::{MockDetailSource, MockListingSource};
    use crate::types::ListingPage;
    use std::path::PathBuf;

    fn temp_cache() -> PathBuf {
        std::env::temp_dir().join(format!("gleaner-pipe-{}.json", uuid::Uuid::new_v4()))
    }

    fn seed() -> SeedRecord {
        SeedRecord::Query("q".to_string())
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig::new().without_delays().with_workers(2)
    }

    fn pipeline(
        listing: MockListingSource,
        detail: MockDetailSource,
        cache_path: &PathBuf,
    ) -> (Pipeline, Arc<MemorySink>, Arc<MockDetailSource>) {
        let detail = Arc::new(detail);
        let sink = Arc::new(MemorySink::new());
        let cache = Arc::new(DedupCache::load(cache_path).unwrap());
        let pipeline = Pipeline::new(
            Arc::new(listing),
            Arc::clone(&detail) as Arc<dyn DetailSource>,
            cache,
            Arc::clone(&sink) as Arc<dyn RecordSink>,
            test_config(),
        );
        (pipeline, sink, detail)
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped_not_fatal() {
        let listing = MockListingSource::new().with_pages(
            seed(),
            vec![ListingPage::new(
                vec![RecordStub::new("good"), RecordStub::new("bad")],
                false,
            )],
        );
        let detail = MockDetailSource::new().failing("bad");
        let cache_path = temp_cache();
        let (pipeline, sink, _) = pipeline(listing, detail, &cache_path);

        let summary = pipeline.run(vec![seed()]).await.unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.fetches_failed, 1);
        assert_eq!(summary.failed_keys, vec!["bad".to_string()]);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].key, "good");

        std::fs::remove_file(&cache_path).ok();
    }

    #[tokio::test]
    async fn test_abandoned_seed_recorded_and_run_continues() {
        let good_seed = SeedRecord::Query("good".to_string());
        let bad_seed = SeedRecord::Query("bad".to_string());
        let listing = MockListingSource::new()
            .with_pages(
                good_seed.clone(),
                vec![ListingPage::new(vec![RecordStub::new("a")], false)],
            )
            .failing_from_page(bad_seed.clone(), 1);
        let cache_path = temp_cache();
        let (pipeline, sink, _) = pipeline(listing, MockDetailSource::new(), &cache_path);

        let summary = pipeline.run(vec![bad_seed, good_seed]).await.unwrap();

        assert_eq!(summary.seeds_failed, 1);
        assert_eq!(summary.seeds_processed, 1);
        assert_eq!(sink.len(), 1);

        std::fs::remove_file(&cache_path).ok();
    }

    #[tokio::test]
    async fn test_limit_caps_seeds() {
        let s1 = SeedRecord::Query("one".to_string());
        let s2 = SeedRecord::Query("two".to_string());
        let listing = MockListingSource::new()
            .with_pages(s1.clone(), vec![ListingPage::new(vec![RecordStub::new("a")], false)])
            .with_pages(s2.clone(), vec![ListingPage::new(vec![RecordStub::new("b")], false)]);
        let cache_path = temp_cache();

        let detail = Arc::new(MockDetailSource::new());
        let sink = Arc::new(MemorySink::new());
        let cache = Arc::new(DedupCache::load(&cache_path).unwrap());
        let pipeline = Pipeline::new(
            Arc::new(listing),
            Arc::clone(&detail) as Arc<dyn DetailSource>,
            cache,
            Arc::clone(&sink) as Arc<dyn RecordSink>,
            test_config().with_limit(1),
        );

        let summary = pipeline.run(vec![s1, s2]).await.unwrap();
        assert_eq!(summary.seeds_processed, 1);
        assert_eq!(sink.len(), 1);

        std::fs::remove_file(&cache_path).ok();
    }

    #[tokio::test]
    async fn test_zero_worker_config_completes() {
        let listing = MockListingSource::new().with_pages(
            seed(),
            vec![ListingPage::new(vec![RecordStub::new("a")], false)],
        );
        let cache_path = temp_cache();
        let detail = Arc::new(MockDetailSource::new());
        let sink = Arc::new(MemorySink::new());
        let cache = Arc::new(DedupCache::load(&cache_path).unwrap());

        // A deserialized config can carry zero directly, bypassing the
        // builder clamp.
        let mut config = test_config();
        config.worker_count = 0;

        let pipeline = Pipeline::new(
            Arc::new(listing),
            Arc::clone(&detail) as Arc<dyn DetailSource>,
            cache,
            Arc::clone(&sink) as Arc<dyn RecordSink>,
            config,
        );

        let summary = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            pipeline.run(vec![seed()]),
        )
        .await
        .expect("run must not hang on zero workers")
        .unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(sink.len(), 1);

        std::fs::remove_file(&cache_path).ok();
    }

    #[tokio::test]
    async fn test_cancellation_before_run() {
        let listing = MockListingSource::new().with_pages(
            seed(),
            vec![ListingPage::new(vec![RecordStub::new("a")], false)],
        );
        let cache_path = temp_cache();
        let (pipeline, sink, _) = pipeline(listing, MockDetailSource::new(), &cache_path);

        pipeline.cancellation_token().cancel();
        let result = pipeline.run(vec![seed()]).await;

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(sink.is_empty());

        std::fs::remove_file(&cache_path).ok();
    }
}
