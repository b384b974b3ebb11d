//! OpenAI-compatible chat completions judge.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};
use url::Url;

use crate::llm::Judge;
use crate::llm::config::{DEFAULT_OPENAI_ENDPOINT, LlmConfig};
use crate::llm::error::JudgementError;
use crate::llm::types::{JudgeRequest, Judgement, parse_judgement};

const ERROR_BODY_CHARS: usize = 200;

/// Resolve a configured endpoint to a chat completions URL.
///
/// A URL already naming `chat/completions` (or `chat.completions`) is used as is;
/// a base ending in `/v1` gets `/chat/completions`; any other base gets
/// `/v1/chat/completions`.
#[must_use]
pub fn resolve_endpoint(api_url: Option<&str>) -> String {
    let Some(raw) = api_url.map(str::trim).filter(|u| !u.is_empty()) else {
        return DEFAULT_OPENAI_ENDPOINT.to_string();
    };
    let base = raw.trim_end_matches('/');
    if base.contains("chat.completions") || base.contains("chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// Judge backed by an OpenAI-compatible service.
pub struct OpenAiJudge {
    client: reqwest::Client,
    endpoint: String,
    config: LlmConfig,
}

impl OpenAiJudge {
    /// Create a judge.
    ///
    /// # Errors
    /// Returns an error if neither a key nor an endpoint is configured, the
    /// endpoint is not a URL, or the HTTP client cannot be created.
    pub fn new(config: LlmConfig) -> Result<Self, JudgementError> {
        if config.api_key.is_none() && config.api_url.is_none() {
            return Err(JudgementError::MissingCredentials("openai"));
        }
        let endpoint = resolve_endpoint(config.api_url.as_deref());
        Url::parse(&endpoint).map_err(|e| JudgementError::InvalidEndpoint {
            url: endpoint.clone(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Resolved endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn chat(&self, prompt: &str, max_tokens: u32) -> Result<String, JudgementError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": self.config.temperature,
        });

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(JudgementError::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| JudgementError::Malformed(format!("response is not JSON: {e}")))?;
        completion_text(&json)
            .ok_or_else(|| JudgementError::Malformed("no completion text in response".to_string()))
    }
}

/// Completion text from a chat response, tolerating a few other shapes.
fn completion_text(json: &Value) -> Option<String> {
    if let Some(content) = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    match json.get("output").or_else(|| json.get("text"))? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .map(|p| match p {
                    Value::String(s) => s.clone(),
                    other => other
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

#[async_trait]
impl Judge for OpenAiJudge {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn judge(&self, request: &JudgeRequest) -> Result<Judgement, JudgementError> {
        let text = self.chat(&request.prompt(), self.config.max_tokens).await?;
        Ok(parse_judgement(&text))
    }

    async fn test_connection(&self) -> Result<(), JudgementError> {
        self.chat("测试连接", 1).await.map(|_| ())
    }
}
