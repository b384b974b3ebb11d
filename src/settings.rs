//! Persisted run settings.
//!
//! Settings live in a flat JSON document. Loading is lenient: a missing file
//! yields defaults, and a field that fails to parse keeps its default with a
//! warning instead of discarding the whole document.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::crawl::config::{CrawlConfig, WorkerConfig};
use crate::crawl::proxy_source::parse_proxy_list;
use crate::llm::config::{LlmConfig, LlmProvider};
use crate::ranking::category::MarkerClassifier;
use crate::ranking::weights::{PresetSet, RuleMarkers, WeightRules};

/// Environment variable naming the settings file.
pub const CONFIG_PATH_ENV: &str = "VIDRANK_CONFIG";
/// Environment variable overriding the LLM API key.
pub const API_KEY_ENV: &str = "VIDRANK_LLM_API_KEY";
/// Settings file used when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "vidrank.json";

/// Errors reading or writing the settings document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("settings file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a JSON object.
    #[error("settings file {path} is not a JSON object: {reason}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// Settings could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything an operator can persist between runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Search keywords.
    pub keywords: Vec<String>,
    /// Pages per keyword.
    pub pages: u32,
    /// Judgement provider name (`openai`, `ollama`, `none`).
    pub provider: String,
    /// Judgement service credential.
    pub api_key: String,
    /// Judgement service endpoint.
    pub api_url: String,
    /// Judgement model.
    pub llm_model: String,
    /// Whether judgements are requested.
    pub use_llm: bool,
    /// Blend weight of the judged score (0-1).
    pub llm_weight: f64,
    /// Judgement workers (1-10).
    pub llm_threads: usize,
    /// Cookie header for platform requests.
    pub bili_cookie: String,
    /// Comma-separated proxies, or pool-service endpoints when `use_proxypool` is set.
    pub proxies: String,
    /// Route requests through `proxies`.
    pub use_proxy: bool,
    /// Treat `proxies` as pool-service endpoints to discover from.
    pub use_proxypool: bool,
    /// Task-level workers (1-8).
    pub task_workers: usize,
    /// Detail-fetch workers (1-10).
    pub detail_workers: usize,
    /// Outlier threshold in standard deviations; no filtering when absent.
    pub outlier_sigma: Option<f64>,
    /// Creator ids or display names excluded from every board.
    pub blacklist: Vec<String>,
    /// Weight presets.
    pub presets: PresetSet,
    /// Preset selection markers.
    pub rule_markers: RuleMarkers,
    /// Category markers.
    pub categories: MarkerClassifier,
}

impl Default for Settings {
    fn default() -> Self {
        let workers = WorkerConfig::default();
        Self {
            keywords: vec!["崩坏3 深渊".to_string(), "崩坏3 记忆战场".to_string()],
            pages: 3,
            provider: "openai".to_string(),
            api_key: String::new(),
            api_url: String::new(),
            llm_model: crate::llm::config::DEFAULT_OPENAI_MODEL.to_string(),
            use_llm: false,
            llm_weight: 0.4,
            llm_threads: 4,
            bili_cookie: String::new(),
            proxies: String::new(),
            use_proxy: false,
            use_proxypool: false,
            task_workers: workers.task_workers,
            detail_workers: workers.detail_workers,
            outlier_sigma: None,
            blacklist: Vec::new(),
            presets: PresetSet::default(),
            rule_markers: RuleMarkers::default(),
            categories: MarkerClassifier::default(),
        }
    }
}

impl Settings {
    /// Settings path from [`CONFIG_PATH_ENV`], else [`DEFAULT_CONFIG_FILE`].
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
    }

    /// Load settings, falling back to defaults for anything unusable.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Using default settings: {e}");
                Self::default()
            }
        }
    }

    /// Load settings. A missing file yields defaults; bad fields keep their
    /// defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or is not a JSON object.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let parse_error = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let value: Value = serde_json::from_str(&text).map_err(|e| parse_error(e.to_string()))?;
        let Value::Object(doc) = value else {
            return Err(parse_error("top-level value is not an object".to_string()));
        };

        Ok(Self::from_document(&doc))
    }

    /// Build settings from a JSON object, field by field.
    #[must_use]
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        let mut s = Self::default();
        read_field(doc, "keywords", &mut s.keywords);
        read_field(doc, "pages", &mut s.pages);
        read_field(doc, "provider", &mut s.provider);
        read_field(doc, "api_key", &mut s.api_key);
        read_field(doc, "api_url", &mut s.api_url);
        read_field(doc, "llm_model", &mut s.llm_model);
        read_field(doc, "use_llm", &mut s.use_llm);
        read_field(doc, "llm_weight", &mut s.llm_weight);
        read_field(doc, "llm_threads", &mut s.llm_threads);
        read_field(doc, "bili_cookie", &mut s.bili_cookie);
        read_field(doc, "proxies", &mut s.proxies);
        read_field(doc, "use_proxy", &mut s.use_proxy);
        read_field(doc, "use_proxypool", &mut s.use_proxypool);
        read_field(doc, "task_workers", &mut s.task_workers);
        read_field(doc, "detail_workers", &mut s.detail_workers);
        read_field(doc, "outlier_sigma", &mut s.outlier_sigma);
        read_field(doc, "blacklist", &mut s.blacklist);
        read_field(doc, "presets", &mut s.presets);
        read_field(doc, "rule_markers", &mut s.rule_markers);
        read_field(doc, "categories", &mut s.categories);

        if !(0.0..=1.0).contains(&s.llm_weight) {
            tracing::warn!("llm_weight {} out of range, clamping to 0-1", s.llm_weight);
            s.llm_weight = if s.llm_weight.is_finite() {
                s.llm_weight.clamp(0.0, 1.0)
            } else {
                Self::default().llm_weight
            };
        }
        s.pages = s.pages.max(1);
        s
    }

    /// Apply environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = key.trim().to_string();
            }
        }
        self
    }

    /// Write settings as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Crawler configuration.
    #[must_use]
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig::new()
            .with_workers(self.task_workers, self.detail_workers)
            .with_cookie(self.bili_cookie.clone())
    }

    /// Judgement configuration, or `None` when judgements are disabled.
    #[must_use]
    pub fn llm_config(&self) -> Option<LlmConfig> {
        if !self.use_llm {
            return None;
        }
        let provider = LlmProvider::parse(&self.provider).unwrap_or_else(|| {
            tracing::warn!("Unknown LLM provider '{}', judgements disabled", self.provider);
            LlmProvider::None
        });
        if provider == LlmProvider::None {
            return None;
        }
        Some(
            LlmConfig::new(provider)
                .with_api_key(self.api_key.clone())
                .with_api_url(self.api_url.clone())
                .with_model(self.llm_model.clone()),
        )
    }

    /// Weight rules.
    #[must_use]
    pub fn weight_rules(&self) -> WeightRules {
        WeightRules::new(self.presets.clone(), self.rule_markers.clone())
    }

    /// Entries of the `proxies` field.
    #[must_use]
    pub fn proxy_entries(&self) -> Vec<String> {
        if self.use_proxypool {
            self.proxies
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            parse_proxy_list(&self.proxies)
        }
    }
}

fn read_field<T: DeserializeOwned>(doc: &Map<String, Value>, key: &str, target: &mut T) {
    let Some(raw) = doc.get(key) else {
        return;
    };
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(value) => *target = value,
        Err(e) => tracing::warn!("Ignoring settings field '{key}': {e}"),
    }
}
