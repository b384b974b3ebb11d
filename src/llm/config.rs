//! Configuration for the judgement providers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434/api/generate";
/// Default OpenAI-compatible model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama2";

/// Bounds for the judgement worker pool.
pub const JUDGE_THREADS_RANGE: (usize, usize) = (1, 10);
/// Creators judged per bucket, by raw composite.
pub const JUDGE_TOP_N: usize = 50;

/// Which judgement service to call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions.
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    /// Local Ollama server.
    Ollama,
    /// No provider.
    None,
}

impl LlmProvider {
    /// Parse a provider name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            "none" | "" => Some(Self::None),
            _ => None,
        }
    }
}

/// Settings for a judgement provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider to call.
    pub provider: LlmProvider,
    /// Bearer credential for OpenAI-compatible services.
    pub api_key: Option<String>,
    /// Endpoint or base URL; provider default when absent.
    pub api_url: Option<String>,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Per-request timeout.
    #[serde(with = "crate::crawl::config::duration_serde")]
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: None,
            api_url: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 300,
            timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    /// Create a config for `provider` with its default model.
    #[must_use]
    pub fn new(provider: LlmProvider) -> Self {
        let model = match provider {
            LlmProvider::Ollama => DEFAULT_OLLAMA_MODEL,
            LlmProvider::OpenAi | LlmProvider::None => DEFAULT_OPENAI_MODEL,
        };
        Self {
            provider,
            model: model.to_string(),
            ..Self::default()
        }
    }

    /// Set the API key. Blank keys are ignored.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = non_blank(key.into());
        self
    }

    /// Set the endpoint. Blank values are ignored.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = non_blank(url.into());
        self
    }

    /// Set the model. Blank names keep the current model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        if let Some(model) = non_blank(model.into()) {
            self.model = model;
        }
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
