//! Rate-limited, retried, proxy-rotated JSON fetching.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde_json::Value;

use crate::crawl::config::CrawlConfig;
use crate::crawl::error::{BLOCK_STATUS, FetchError};
use crate::crawl::proxy::ProxyPool;

/// Maximum number of body characters kept in the diagnostic record.
const DIAGNOSTIC_BODY_CHARS: usize = 512;

/// The most recent raw response seen by a fetcher, kept for diagnosis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LastResponse {
    /// A 200 with a JSON body.
    Success {
        /// Status code.
        status: u16,
    },
    /// A non-success status or an undecodable body.
    Failure {
        /// Status code.
        status: u16,
        /// Truncated body text.
        body: String,
    },
    /// The request failed before a response arrived.
    NetworkError {
        /// Error text.
        message: String,
    },
}

impl LastResponse {
    /// Status code, if a response arrived.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status } | Self::Failure { status, .. } => Some(*status),
            Self::NetworkError { .. } => None,
        }
    }
}

/// Shared state for one crawler: the proxy pool and the diagnostic record.
///
/// Owned explicitly and passed to the fetcher and orchestrator so concurrent
/// scans on different contexts never see each other's state.
#[derive(Debug, Default)]
pub struct FetchContext {
    proxies: ProxyPool,
    last_response: Mutex<Option<LastResponse>>,
}

impl FetchContext {
    /// Create a context with an empty proxy pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with the given proxy pool.
    #[must_use]
    pub fn with_proxies(proxies: ProxyPool) -> Self {
        Self {
            proxies,
            last_response: Mutex::new(None),
        }
    }

    /// The proxy pool.
    #[must_use]
    pub const fn proxies(&self) -> &ProxyPool {
        &self.proxies
    }

    /// Overwrite the diagnostic record. Last writer wins.
    pub fn record(&self, response: LastResponse) {
        *self
            .last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(response);
    }

    /// The most recent raw response.
    #[must_use]
    pub fn last_response(&self) -> Option<LastResponse> {
        self.last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the most recent response was the platform's block status.
    #[must_use]
    pub fn last_was_block(&self) -> bool {
        self.last_response()
            .and_then(|r| r.status())
            .is_some_and(|s| s == BLOCK_STATUS)
    }

    /// Forget the diagnostic record (start of a new scan).
    pub fn clear_last_response(&self) {
        *self
            .last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// HTTP fetcher with user-agent rotation, jittered throttling and backoff.
pub struct HttpFetcher {
    config: CrawlConfig,
    context: Arc<FetchContext>,
    direct: reqwest::Client,
    proxied: DashMap<String, reqwest::Client>,
}

impl HttpFetcher {
    /// Create a fetcher bound to `context`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: CrawlConfig, context: Arc<FetchContext>) -> Result<Self, FetchError> {
        let direct = Self::build_client(&config, None)?;
        Ok(Self {
            config,
            context,
            direct,
            proxied: DashMap::new(),
        })
    }

    /// Crawl configuration in use.
    #[must_use]
    pub const fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Shared context.
    #[must_use]
    pub const fn context(&self) -> &Arc<FetchContext> {
        &self.context
    }

    /// Build an HTTP client with the static headers, optionally through a proxy.
    fn build_client(config: &CrawlConfig, proxy: Option<&str>) -> Result<reqwest::Client, FetchError> {
        let mut headers = HeaderMap::new();

        if let Ok(lang) = HeaderValue::from_str("zh-CN,zh;q=0.9") {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }
        if let Ok(referer) = HeaderValue::from_str(&config.referer) {
            headers.insert(REFERER, referer);
        }
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        if let Some(cookie) = &config.cookie {
            match HeaderValue::from_str(cookie) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(e) => tracing::warn!("Ignoring cookie that is not a valid header value: {e}"),
            }
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(address) = proxy {
            let proxy = reqwest::Proxy::all(address)
                .map_err(|e| FetchError::HttpClient(format!("invalid proxy {address}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| FetchError::HttpClient(e.to_string()))
    }

    /// Client for `proxy`, built once per address.
    fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, FetchError> {
        let Some(address) = proxy else {
            return Ok(self.direct.clone());
        };
        if let Some(client) = self.proxied.get(address) {
            return Ok(client.clone());
        }
        let client = Self::build_client(&self.config, Some(address))?;
        self.proxied.insert(address.to_string(), client.clone());
        Ok(client)
    }

    /// Fetch JSON with the configured timeout and attempt budget.
    ///
    /// # Errors
    /// Returns the last failure once every attempt has failed.
    pub async fn fetch_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        self.fetch(url, params, self.config.request_timeout, self.config.max_attempts)
            .await
    }

    /// Fetch JSON from `url`, retrying up to `max_attempts` times.
    ///
    /// # Errors
    /// Returns the last failure once every attempt has failed.
    pub async fn fetch(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Value, FetchError> {
        let attempts = max_attempts.max(1);
        let mut last_error = FetchError::HttpClient("no attempt made".to_string());

        for attempt in 0..attempts {
            let is_last = attempt + 1 == attempts;
            let proxy = self.context.proxies().choose();
            let client = match self.client_for(proxy.as_deref()) {
                Ok(c) => c,
                Err(e) => {
                    if let Some(address) = &proxy {
                        self.context.proxies().report(address, false);
                    }
                    last_error = e;
                    continue;
                }
            };

            let response = client
                .get(url)
                .query(params)
                .timeout(timeout)
                .header(USER_AGENT, self.config.random_user_agent())
                .header(ACCEPT, self.config.random_accept())
                .send()
                .await;

            let outcome = match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await;
                    // Throttle after every completed round-trip, whatever the outcome.
                    tokio::time::sleep(self.config.retry.throttle_delay()).await;
                    match body {
                        Ok(text) => {
                            let classified = classify_response(url, status, &text);
                            self.context.record(match &classified {
                                Ok(_) => LastResponse::Success { status },
                                Err(_) => LastResponse::Failure {
                                    status,
                                    body: truncate(&text),
                                },
                            });
                            classified
                        }
                        Err(e) => {
                            self.context.record(LastResponse::Failure {
                                status,
                                body: truncate(&e.to_string()),
                            });
                            Err(FetchError::Network(e))
                        }
                    }
                }
                Err(e) => {
                    self.context.record(LastResponse::NetworkError {
                        message: truncate(&e.to_string()),
                    });
                    Err(FetchError::Network(e))
                }
            };

            match outcome {
                Ok(json) => {
                    if let Some(address) = &proxy {
                        self.context.proxies().report(address, true);
                    }
                    return Ok(json);
                }
                Err(err) => {
                    if let Some(address) = &proxy {
                        self.context.proxies().report(address, false);
                    }
                    tracing::debug!(
                        "Attempt {}/{} for {url} failed ({}): {err}",
                        attempt + 1,
                        attempts,
                        err.kind()
                    );

                    if !is_last {
                        let delay = if err.is_block() {
                            let unit = rand::thread_rng().gen_range(0.0..1.0);
                            self.config.retry.block_delay(attempt, unit)
                        } else {
                            self.config.retry.linear_delay(attempt)
                        };
                        tokio::time::sleep(delay).await;
                    }
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }
}

/// Classify a completed response.
///
/// # Errors
/// Returns `HttpStatus` for any non-200 status and `InvalidBody` when a 200 body
/// is not JSON.
pub fn classify_response(url: &str, status: u16, body: &str) -> Result<Value, FetchError> {
    if status != 200 {
        return Err(FetchError::HttpStatus {
            status,
            url: url.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| FetchError::InvalidBody {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn truncate(text: &str) -> String {
    text.chars().take(DIAGNOSTIC_BODY_CHARS).collect()
}
