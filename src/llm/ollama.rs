//! Ollama judge through Rig.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use url::Url;

use crate::llm::Judge;
use crate::llm::config::{DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL, LlmConfig};
use crate::llm::error::JudgementError;
use crate::llm::types::{JudgeRequest, Judgement, parse_judgement};

const PREAMBLE: &str = "你是一名视频内容分析助手。只输出一个 JSON 对象。";

/// Server origin for a configured endpoint, dropping any API path such as
/// `/api/generate`.
///
/// # Errors
/// Returns an error if the endpoint is not an absolute URL.
pub fn server_base(api_url: Option<&str>) -> Result<String, JudgementError> {
    let raw = api_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_OLLAMA_ENDPOINT);
    let url = Url::parse(raw).map_err(|e| JudgementError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(JudgementError::InvalidEndpoint {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url.origin().ascii_serialization())
}

/// Judge backed by a local Ollama server.
pub struct OllamaJudge {
    model: ollama::CompletionModel,
    config: LlmConfig,
}

impl OllamaJudge {
    /// Create a judge.
    ///
    /// # Errors
    /// Returns an error if the endpoint is invalid or the Ollama client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, JudgementError> {
        let base_url = server_base(config.api_url.as_deref())?;
        let client = ollama::Client::<ReqwestClient>::builder()
            .api_key(rig::client::Nothing)
            .base_url(&base_url)
            .build()?;
        let model_name = if config.model.trim().is_empty() {
            DEFAULT_OLLAMA_MODEL.to_string()
        } else {
            config.model.clone()
        };
        let model = client.completion_model(model_name);
        Ok(Self { model, config })
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String, JudgementError> {
        let request = self
            .model
            .completion_request(prompt)
            .preamble(PREAMBLE.to_string())
            .temperature(self.config.temperature)
            .max_tokens(u64::from(max_tokens))
            .build();

        let response = self.model.completion(request).await?;
        let text = extract_text(&response.choice);
        if text.trim().is_empty() {
            return Err(JudgementError::Malformed("empty completion".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Judge for OllamaJudge {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn judge(&self, request: &JudgeRequest) -> Result<Judgement, JudgementError> {
        let text = self.complete(request.prompt(), self.config.max_tokens).await?;
        Ok(parse_judgement(&text))
    }

    async fn test_connection(&self) -> Result<(), JudgementError> {
        self.complete("测试连接".to_string(), 1).await.map(|_| ())
    }
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::config::LlmProvider;

    #[test]
    fn test_server_base() {
        assert_eq!(
            server_base(None).unwrap_or_default(),
            "http://127.0.0.1:11434"
        );
        assert_eq!(
            server_base(Some("http://gpu-box:11434/api/generate")).unwrap_or_default(),
            "http://gpu-box:11434"
        );
        assert!(server_base(Some("not a url")).is_err());
    }

    #[test]
    fn test_judge_creation() {
        let judge = OllamaJudge::new(LlmConfig::new(LlmProvider::Ollama));
        assert!(judge.is_ok());
    }
}
