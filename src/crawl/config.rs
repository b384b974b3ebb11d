//! Configuration for the crawl module.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.bilibili.com/x/web-interface/search/type";
/// Default detail endpoint.
pub const DEFAULT_DETAIL_URL: &str = "https://api.bilibili.com/x/web-interface/view";

/// Accept header sent on most requests.
pub const JSON_ACCEPT: &str = "application/json, text/plain, */*";
/// Browser-like Accept header used on a fraction of requests.
pub const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Bounds for the task-level worker pool.
pub const TASK_WORKERS_RANGE: (usize, usize) = (1, 8);
/// Bounds for the detail-fetch worker pool.
pub const DETAIL_WORKERS_RANGE: (usize, usize) = (1, 10);

/// Configuration for the crawler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Search endpoint URL.
    pub search_url: String,
    /// Detail endpoint URL.
    pub detail_url: String,
    /// Referer sent with every request.
    pub referer: String,
    /// Per-request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Attempts per fetch before giving up.
    pub max_attempts: u32,
    /// Retry and throttling policy.
    pub retry: RetryPolicy,
    /// Worker pool sizes.
    pub workers: WorkerConfig,
    /// User agents to rotate.
    pub user_agents: Vec<String>,
    /// Probability of sending the browser-like Accept header.
    pub accept_variation: f64,
    /// Optional cookie header value for platform requests.
    pub cookie: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            detail_url: DEFAULT_DETAIL_URL.to_string(),
            referer: "https://www.bilibili.com/".to_string(),
            request_timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(5),
            max_attempts: 3,
            retry: RetryPolicy::default(),
            workers: WorkerConfig::default(),
            user_agents: default_user_agents(),
            accept_variation: 0.2,
            cookie: None,
        }
    }
}

impl CrawlConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set worker pool sizes (clamped to their allowed ranges).
    #[must_use]
    pub const fn with_workers(mut self, task_workers: usize, detail_workers: usize) -> Self {
        self.workers = WorkerConfig::new(task_workers, detail_workers);
        self
    }

    /// Set the cookie header sent to the platform.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        self.cookie = if cookie.trim().is_empty() {
            None
        } else {
            Some(cookie.trim().to_string())
        };
        self
    }

    /// Get a random user agent from the rotation list.
    #[must_use]
    pub fn random_user_agent(&self) -> String {
        if self.user_agents.is_empty() {
            return default_user_agents()[0].clone();
        }
        let mut rng = rand::thread_rng();
        let idx = rng.gen_range(0..self.user_agents.len());
        self.user_agents[idx].clone()
    }

    /// Pick the Accept header for one attempt.
    #[must_use]
    pub fn random_accept(&self) -> &'static str {
        let p = self.accept_variation.clamp(0.0, 1.0);
        if rand::thread_rng().gen_bool(p) {
            HTML_ACCEPT
        } else {
            JSON_ACCEPT
        }
    }
}

/// Sizes of the two nested bounded pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent (keyword, page) tasks.
    pub task_workers: usize,
    /// Concurrent detail fetches inside one task.
    pub detail_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            task_workers: 3,
            detail_workers: 5,
        }
    }
}

impl WorkerConfig {
    /// Build a worker config, clamping each pool to its allowed range.
    #[must_use]
    pub const fn new(task_workers: usize, detail_workers: usize) -> Self {
        Self {
            task_workers: clamp_usize(task_workers, TASK_WORKERS_RANGE),
            detail_workers: clamp_usize(detail_workers, DETAIL_WORKERS_RANGE),
        }
    }

    /// Return a copy with both pools forced into range.
    #[must_use]
    pub const fn clamped(self) -> Self {
        Self::new(self.task_workers, self.detail_workers)
    }

    /// Worst-case number of concurrent platform connections.
    #[must_use]
    pub const fn max_connections(&self) -> usize {
        let c = self.clamped();
        c.task_workers * c.detail_workers
    }
}

/// Clamp a worker count into `(min, max)`.
#[must_use]
pub const fn clamp_usize(value: usize, range: (usize, usize)) -> usize {
    if value < range.0 {
        range.0
    } else if value > range.1 {
        range.1
    } else {
        value
    }
}

/// Backoff and throttling parameters for the fetch layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Lower bound of the post-response jitter (milliseconds).
    pub jitter_min_ms: u64,
    /// Upper bound of the post-response jitter (milliseconds).
    pub jitter_max_ms: u64,
    /// Exponential base for block (412) backoff, in seconds.
    pub block_backoff_base: f64,
    /// Maximum random seconds added to block backoff.
    pub block_backoff_jitter_secs: f64,
    /// Linear backoff step for other failures (milliseconds).
    pub linear_step_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            jitter_min_ms: 200,
            jitter_max_ms: 800,
            block_backoff_base: 2.0,
            block_backoff_jitter_secs: 2.0,
            linear_step_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Random throttle delay applied after every completed round-trip.
    #[must_use]
    pub fn throttle_delay(&self) -> Duration {
        let lo = self.jitter_min_ms.min(self.jitter_max_ms);
        let hi = self.jitter_min_ms.max(self.jitter_max_ms);
        if lo == hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Delay after a 412 on zero-based attempt `attempt`, given a unit jitter sample.
    #[must_use]
    pub fn block_delay(&self, attempt: u32, unit_jitter: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.block_backoff_base.max(1.0).powi(exponent);
        let jitter = unit_jitter.clamp(0.0, 1.0) * self.block_backoff_jitter_secs.max(0.0);
        Duration::try_from_secs_f64(base + jitter).unwrap_or(Duration::MAX)
    }

    /// Delay after a generic failure on zero-based attempt `attempt`.
    #[must_use]
    pub const fn linear_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.linear_step_ms.saturating_mul(attempt as u64 + 1))
    }
}

/// Default user agents for rotation.
fn default_user_agents() -> Vec<String> {
    vec![
        // Chrome on Windows
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36".to_string(),
        // Firefox on Windows
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:115.0) Gecko/20100101 Firefox/115.0".to_string(),
        // Safari on macOS
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.1 Safari/605.1.15".to_string(),
        // Safari on iPhone
        "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148".to_string(),
    ]
}

/// Serde module for Duration serialization.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
