//! Proxy-list ingestion: literal lists and pool-service discovery.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use url::Url;

/// Paths probed on each pool-service base URL, in order.
pub const DISCOVERY_PATHS: [&str; 6] = ["", "/get", "/api/get", "/proxies", "/api/proxies", "/get_proxy"];

/// Per-request timeout during discovery.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(4);

const DISCOVERY_USER_AGENT: &str = "proxy-fetcher/1.0";

/// Parse a comma- or newline-separated literal list.
#[must_use]
pub fn parse_proxy_list(literal: &str) -> Vec<String> {
    normalize_proxies(
        literal
            .split([',', '\n', '\r'])
            .map(str::trim)
            .filter(|s| !s.is_empty()),
    )
}

/// Prefix `http://` where no scheme is given, drop invalid entries, and dedupe
/// keeping first occurrence.
#[must_use]
pub fn normalize_proxies<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.as_ref().trim();
        if entry.is_empty() {
            continue;
        }
        let address = if entry.contains("://") {
            entry.to_string()
        } else {
            format!("http://{entry}")
        };
        if Url::parse(&address).map_or(true, |u| u.host_str().is_none()) {
            tracing::debug!("Skipping invalid proxy entry '{entry}'");
            continue;
        }
        if seen.insert(address.clone()) {
            out.push(address);
        }
    }
    out
}

/// Extract raw `ip:port` entries from a pool-service response body.
///
/// Accepts a JSON list of strings, `{proxy: ..}` objects, `{data: [..]}`,
/// `{proxies: [..]}`, a single `{proxy: ..}`, or newline-delimited plaintext.
#[must_use]
pub fn extract_proxies(body: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => extract_from_json(&json),
        Err(_) => body
            .lines()
            .map(str::trim)
            .filter(|line| line.contains(':') && line.len() > 6)
            .map(str::to_string)
            .collect(),
    }
}

fn extract_from_json(json: &Value) -> Vec<String> {
    match json {
        Value::Array(items) => items.iter().filter_map(entry_address).collect(),
        Value::Object(map) => {
            for key in ["data", "proxies"] {
                if let Some(inner) = map.get(key) {
                    let found = extract_from_json(inner);
                    if !found.is_empty() {
                        return found;
                    }
                }
            }
            entry_address(json).into_iter().collect()
        }
        Value::String(_) => entry_address(json).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn entry_address(item: &Value) -> Option<String> {
    let text = match item {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("proxy")?.as_str()?,
        _ => return None,
    };
    let text = text.trim();
    text.contains(':').then(|| text.to_string())
}

/// Probe each pool-service base URL with the discovery paths and collect every
/// address found. Unreachable endpoints are skipped.
pub async fn discover_from_pools(endpoints: &[String]) -> Vec<String> {
    let client = match reqwest::Client::builder()
        .timeout(DISCOVERY_TIMEOUT)
        .user_agent(DISCOVERY_USER_AGENT)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to build proxy discovery client: {e}");
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for endpoint in endpoints {
        let base = endpoint.trim().trim_end_matches('/');
        if base.is_empty() {
            continue;
        }
        for path in DISCOVERY_PATHS {
            let url = format!("{base}{path}");
            let body = match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::debug!("Unreadable body from {url}: {e}");
                        continue;
                    }
                },
                Ok(resp) => {
                    tracing::debug!("Proxy pool {url} answered {}", resp.status());
                    continue;
                }
                Err(e) => {
                    tracing::debug!("Proxy pool {url} unreachable: {e}");
                    continue;
                }
            };
            let entries = extract_proxies(&body);
            if !entries.is_empty() {
                tracing::info!("Discovered {} proxies from {url}", entries.len());
                found.extend(entries);
            }
        }
    }

    normalize_proxies(found)
}
