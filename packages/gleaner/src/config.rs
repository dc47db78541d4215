//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a pipeline run.
///
/// Either `seed_file` or `search_url` supplies the seeds; when both are
/// set the seed file wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tabular seed file (one seed per row)
    pub seed_file: Option<PathBuf>,

    /// Single search URL used as the only seed
    pub search_url: Option<String>,

    /// Output CSV path (created with headers, or appended to on resume)
    pub output_file: PathBuf,

    /// Persisted dedup-cache path
    pub cache_file: PathBuf,

    /// Run the injected browser session headless.
    ///
    /// The pipeline only carries this for the session constructor; it
    /// never interprets it.
    pub headless: bool,

    /// Maximum concurrent detail-fetch workers
    pub worker_count: usize,

    /// Minimum jitter delay between requests
    pub min_delay: Duration,

    /// Maximum jitter delay between requests
    pub max_delay: Duration,

    /// Cap the number of seeds processed (testing)
    pub limit: Option<usize>,

    /// Transient page-load retries per listing page before the seed is
    /// treated as exhausted
    pub max_page_retries: u32,

    /// Base backoff between page retries (scaled linearly per attempt)
    pub retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed_file: None,
            search_url: None,
            output_file: PathBuf::from("results.csv"),
            cache_file: PathBuf::from("discovered_keys.json"),
            headless: true,
            worker_count: 4,
            min_delay: Duration::from_millis(800),
            max_delay: Duration::from_millis(1800),
            limit: None,
            max_page_retries: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl PipelineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seed file path.
    pub fn with_seed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_file = Some(path.into());
        self
    }

    /// Use a single search URL as the only seed.
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = Some(url.into());
        self
    }

    /// Set the output file path.
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = path.into();
        self
    }

    /// Set the cache file path.
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = path.into();
        self
    }

    /// Set the worker pool size.
    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Set the jitter delay bounds.
    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }

    /// Disable jitter delays entirely (tests).
    pub fn without_delays(self) -> Self {
        self.with_delays(Duration::ZERO, Duration::ZERO)
    }

    /// Cap the number of seeds processed.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set headless mode for the injected session.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the per-page retry bound.
    pub fn with_page_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.max_page_retries = retries;
        self.retry_backoff = backoff;
        self
    }
}
