//! Qualitative creator judgements from a language model.
//!
//! This module provides:
//! - The [`Judge`] seam and its OpenAI-compatible and Ollama providers
//! - Tolerant parsing of model output into a [`Judgement`]
//! - A bounded judgement pool with a per-run cache

pub mod config;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod types;

pub use config::{LlmConfig, LlmProvider};
pub use error::JudgementError;
pub use ollama::OllamaJudge;
pub use openai::OpenAiJudge;
pub use types::{JudgeRequest, Judgement, SampleVideo, parse_judgement};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};

use crate::crawl::config::clamp_usize;
use crate::llm::config::JUDGE_THREADS_RANGE;

/// External qualitative judgement service.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Provider name for log lines.
    fn name(&self) -> &'static str;

    /// Judge one creator.
    async fn judge(&self, request: &JudgeRequest) -> Result<Judgement, JudgementError>;

    /// Check that the service answers.
    async fn test_connection(&self) -> Result<(), JudgementError>;
}

/// Build the judge for `config`, or `None` for [`LlmProvider::None`].
///
/// # Errors
/// Returns an error if the provider cannot be configured.
pub fn build_judge(config: &LlmConfig) -> Result<Option<Arc<dyn Judge>>, JudgementError> {
    match config.provider {
        LlmProvider::OpenAi => Ok(Some(Arc::new(OpenAiJudge::new(config.clone())?))),
        LlmProvider::Ollama => Ok(Some(Arc::new(OllamaJudge::new(config.clone())?))),
        LlmProvider::None => Ok(None),
    }
}

/// Judgements made during one run, keyed by creator id.
#[derive(Debug, Default)]
pub struct JudgementCache {
    entries: DashMap<String, Judgement>,
}

impl JudgementCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached judgement for `creator_id`.
    #[must_use]
    pub fn get(&self, creator_id: &str) -> Option<Judgement> {
        self.entries.get(creator_id).map(|j| j.clone())
    }

    /// Store a judgement.
    pub fn insert(&self, creator_id: String, judgement: Judgement) {
        self.entries.insert(creator_id, judgement);
    }

    /// Number of cached judgements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Judge `requests` on a pool of `threads` workers (clamped to 1-10).
///
/// Creators already in `cache` are not re-judged. Failures degrade to a
/// neutral judgement and are logged. Returns a judgement for every request.
pub async fn judge_all(
    judge: &dyn Judge,
    requests: Vec<JudgeRequest>,
    threads: usize,
    cache: &JudgementCache,
) -> HashMap<String, Judgement> {
    let threads = clamp_usize(threads, JUDGE_THREADS_RANGE);
    let mut out = HashMap::new();
    let mut pending = Vec::new();
    for request in requests {
        match cache.get(&request.creator_id) {
            Some(judgement) => {
                out.insert(request.creator_id, judgement);
            }
            None => pending.push(request),
        }
    }

    if !pending.is_empty() {
        tracing::info!(
            "Requesting {} judgements from {} ({} cached, {} workers)",
            pending.len(),
            judge.name(),
            out.len(),
            threads
        );
    }

    let fresh: Vec<(String, Judgement)> = stream::iter(pending)
        .map(|request| async move {
            let judgement = match judge.judge(&request).await {
                Ok(j) => {
                    tracing::debug!(
                        "Judged {} ({}): score={:?}",
                        request.display_name,
                        request.creator_id,
                        j.score
                    );
                    j
                }
                Err(e) => {
                    tracing::warn!(
                        "Judgement for {} ({}) failed: {e}",
                        request.display_name,
                        request.creator_id
                    );
                    Judgement::neutral(format!("LLM error: {e}"))
                }
            };
            (request.creator_id, judgement)
        })
        .buffer_unordered(threads)
        .collect()
        .await;

    for (creator_id, judgement) in fresh {
        cache.insert(creator_id.clone(), judgement.clone());
        out.insert(creator_id, judgement);
    }
    out
}
