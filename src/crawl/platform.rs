//! Platform API adapter: search with parameter-shape variants and item detail.

use std::sync::Arc;

use async_trait::async_trait;

use crate::crawl::config::CrawlConfig;
use crate::crawl::error::FetchError;
use crate::crawl::fetch::{FetchContext, HttpFetcher};
use crate::crawl::types::{
    DetailPayload, DetailRecord, SearchHit, SearchPayload, parse_detail_payload,
    parse_search_payload,
};

/// Page size requested by the variants that accept one.
const PAGE_SIZE: u32 = 20;

/// Source of search hits and item details.
///
/// The orchestrator only talks to this trait, so tests can drive it with a fake.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Search one page for `keyword`.
    ///
    /// `Ok(vec![])` means the platform answered but had nothing for this page.
    async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchHit>, FetchError>;

    /// Fetch detail for one item.
    async fn detail(&self, identifier: &str) -> Result<DetailRecord, FetchError>;
}

/// Search parameter shapes, tried in order.
///
/// Deployments disagree on `page` vs `pn` and on whether `ps` is accepted.
#[must_use]
pub fn search_param_variants(keyword: &str, page: u32) -> Vec<Vec<(&'static str, String)>> {
    vec![
        vec![
            ("search_type", "video".to_string()),
            ("keyword", keyword.to_string()),
            ("page", page.to_string()),
        ],
        vec![
            ("search_type", "video".to_string()),
            ("keyword", keyword.to_string()),
            ("pn", page.to_string()),
            ("ps", PAGE_SIZE.to_string()),
        ],
        vec![
            ("search_type", "video".to_string()),
            ("keyword", keyword.to_string()),
            ("page", page.to_string()),
            ("ps", PAGE_SIZE.to_string()),
        ],
    ]
}

/// [`VideoSource`] backed by the platform's public HTTP API.
pub struct PlatformApi {
    fetcher: HttpFetcher,
}

impl PlatformApi {
    /// Create an API adapter sharing `context` with the orchestrator.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: CrawlConfig, context: Arc<FetchContext>) -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: HttpFetcher::new(config, context)?,
        })
    }

    /// Underlying fetcher.
    #[must_use]
    pub const fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }
}

#[async_trait]
impl VideoSource for PlatformApi {
    async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchHit>, FetchError> {
        let url = self.fetcher.config().search_url.clone();
        let mut last_error = None;
        let mut answered = false;

        for (variant, params) in search_param_variants(keyword, page).into_iter().enumerate() {
            let body = match self.fetcher.fetch_json(&url, &params).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("Search variant {variant} for '{keyword}' page {page} failed: {e}");
                    last_error = Some(e);
                    continue;
                }
            };

            match parse_search_payload(&body) {
                SearchPayload::Hits(hits) => {
                    tracing::debug!(
                        "Search variant {variant} for '{keyword}' page {page} returned {} hits",
                        hits.len()
                    );
                    return Ok(hits);
                }
                SearchPayload::Empty => answered = true,
                SearchPayload::Rejected { code, message } => {
                    tracing::debug!(
                        "Search variant {variant} for '{keyword}' page {page} rejected: {code} {message}"
                    );
                    last_error = Some(FetchError::Rejected { code, message });
                }
            }
        }

        match last_error {
            Some(err) if !answered => Err(err),
            _ => Ok(Vec::new()),
        }
    }

    async fn detail(&self, identifier: &str) -> Result<DetailRecord, FetchError> {
        let url = self.fetcher.config().detail_url.clone();
        let params = [("bvid", identifier.to_string())];
        let body = self.fetcher.fetch_json(&url, &params).await?;

        match parse_detail_payload(&body) {
            DetailPayload::Found(detail) => Ok(detail),
            DetailPayload::Missing => Ok(DetailRecord::default()),
            DetailPayload::Rejected { code, message } => Err(FetchError::Rejected { code, message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_variants() {
        let variants = search_param_variants("崩坏3 深渊", 2);
        assert_eq!(variants.len(), 3);
        assert!(variants[0].iter().any(|(k, v)| *k == "page" && v == "2"));
        assert!(variants[1].iter().any(|(k, v)| *k == "pn" && v == "2"));
        assert!(variants[1].iter().any(|(k, v)| *k == "ps" && v == "20"));
        assert!(variants
            .iter()
            .all(|v| v.iter().any(|(k, val)| *k == "keyword" && val == "崩坏3 深渊")));
    }

    #[test]
    fn test_api_creation() {
        let api = PlatformApi::new(CrawlConfig::default(), Arc::new(FetchContext::new()));
        assert!(api.is_ok());
    }
}
