//! Proxy pool with health tracking.
//!
//! Selection favors the least-failed addresses but picks randomly among the best
//! few so one address is not hammered. Every request reports its outcome; an
//! address that accumulates [`EVICT_AFTER_FAILURES`] failures leaves the pool until
//! it is re-added with [`ProxyPool::set_pool`].

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::crawl::config::{CrawlConfig, JSON_ACCEPT};

/// Failures after which an address is evicted.
pub const EVICT_AFTER_FAILURES: u32 = 3;
/// Number of healthiest candidates to choose among.
pub const SELECTION_WINDOW: usize = 3;

/// Health counters for one proxy address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProxyHealth {
    /// Proxy URL, e.g. `http://10.0.0.1:8080`.
    pub address: String,
    /// Current failure score (decremented on success).
    pub fail_count: u32,
    /// Total successes.
    pub success_count: u32,
}

impl ProxyHealth {
    fn new(address: String) -> Self {
        Self {
            address,
            fail_count: 0,
            success_count: 0,
        }
    }
}

/// Thread-safe proxy pool shared by all in-flight requests.
#[derive(Debug, Default)]
pub struct ProxyPool {
    entries: Mutex<Vec<ProxyHealth>>,
}

impl ProxyPool {
    /// Create an empty pool (direct connections).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool from a list of addresses.
    #[must_use]
    pub fn with_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = Self::new();
        pool.set_pool(addresses);
        pool
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProxyHealth>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the pool wholesale and reset all statistics.
    pub fn set_pool<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fresh: Vec<ProxyHealth> = Vec::new();
        for address in addresses {
            let address = address.into().trim().to_string();
            if address.is_empty() || fresh.iter().any(|e| e.address == address) {
                continue;
            }
            fresh.push(ProxyHealth::new(address));
        }
        tracing::info!("Proxy pool set with {} addresses", fresh.len());
        *self.lock() = fresh;
    }

    /// Choose a proxy for the next request, or `None` for a direct connection.
    #[must_use]
    pub fn choose(&self) -> Option<String> {
        let mut candidates: Vec<(u32, String)> = self
            .lock()
            .iter()
            .map(|e| (e.fail_count, e.address.clone()))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        // Stable sort keeps pool order among equally healthy addresses.
        candidates.sort_by_key(|(fails, _)| *fails);
        let window = candidates.len().min(SELECTION_WINDOW);
        let idx = rand::thread_rng().gen_range(0..window);
        Some(candidates.swap_remove(idx).1)
    }

    /// Record the outcome of a request that went through `address`.
    pub fn report(&self, address: &str, success: bool) {
        let mut entries = self.lock();
        let Some(pos) = entries.iter().position(|e| e.address == address) else {
            return;
        };

        if success {
            let entry = &mut entries[pos];
            entry.success_count = entry.success_count.saturating_add(1);
            entry.fail_count = entry.fail_count.saturating_sub(1);
            return;
        }

        entries[pos].fail_count += 1;
        if entries[pos].fail_count >= EVICT_AFTER_FAILURES {
            let evicted = entries.remove(pos);
            tracing::warn!(
                "Evicting proxy {} after {} failures",
                evicted.address,
                evicted.fail_count
            );
        }
    }

    /// Snapshot of current health counters.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProxyHealth> {
        self.lock().clone()
    }

    /// Number of addresses currently in rotation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no proxy is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Probe `address` against the search endpoint.
    ///
    /// Used to pre-qualify addresses before they are added to the pool; the
    /// probe never touches pool statistics.
    pub async fn test(&self, address: &str, config: &CrawlConfig, timeout: Duration) -> bool {
        probe_proxy(address, config, timeout).await
    }
}

/// Issue one search request through `address` and report whether it returned 200.
pub async fn probe_proxy(address: &str, config: &CrawlConfig, timeout: Duration) -> bool {
    let proxy = match reqwest::Proxy::all(address) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Invalid proxy address {address}: {e}");
            return false;
        }
    };

    let client = match reqwest::Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("Failed to build probe client for {address}: {e}");
            return false;
        }
    };

    let result = client
        .get(&config.search_url)
        .query(&[("search_type", "video"), ("keyword", "崩坏3"), ("page", "1")])
        .header(reqwest::header::USER_AGENT, config.random_user_agent())
        .header(reqwest::header::ACCEPT, JSON_ACCEPT)
        .header(reqwest::header::REFERER, config.referer.as_str())
        .send()
        .await;

    match result {
        Ok(resp) => resp.status() == reqwest::StatusCode::OK,
        Err(e) => {
            tracing::debug!("Proxy probe {address} failed: {e}");
            false
        }
    }
}
