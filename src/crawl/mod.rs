//! Crawling the platform's public search API.
//!
//! This module provides:
//! - Rate-limited, retried JSON fetching with user-agent rotation
//! - A health-tracked proxy pool and proxy-list ingestion
//! - The platform API adapter (search variants, item detail)
//! - Scan orchestration over bounded task and detail pools

pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod platform;
pub mod proxy;
pub mod proxy_source;
pub mod types;

pub use config::{CrawlConfig, RetryPolicy, WorkerConfig};
pub use error::{FetchError, ScanError};
pub use fetch::{FetchContext, HttpFetcher, LastResponse};
pub use orchestrator::{Crawler, PublishWindow, ScanReport, ScanRequest, ScanState, StopSignal, TaskOutcome};
pub use platform::{PlatformApi, VideoSource};
pub use proxy::{ProxyHealth, ProxyPool};
pub use types::{DetailRecord, Owner, SearchHit, VideoRecord, VideoStat};
