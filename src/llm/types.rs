//! Judgement requests, results and model-output parsing.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ranking::aggregate::{CreatorAggregate, Stats};

/// Score used when a judgement is unusable.
pub const NEUTRAL_SCORE: f64 = 5.0;
/// Sample videos sent per creator.
pub const SAMPLE_VIDEOS: usize = 3;
/// Characters of unparseable model output kept as the summary.
const RAW_SUMMARY_CHARS: usize = 400;

static JSON_BLOCK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").ok());

/// One video shown to the judge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleVideo {
    /// Title.
    pub title: String,
    /// Views.
    pub views: u64,
    /// Likes.
    pub likes: u64,
}

/// Creator summary sent to the judge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeRequest {
    /// Creator identifier.
    pub creator_id: String,
    /// Display name.
    pub display_name: String,
    /// Overall counters.
    pub stats: Stats,
    /// Up to [`SAMPLE_VIDEOS`] most viewed videos.
    pub samples: Vec<SampleVideo>,
}

impl JudgeRequest {
    /// Build a request from a creator's overall aggregate.
    #[must_use]
    pub fn from_aggregate(aggregate: &CreatorAggregate) -> Self {
        let mut videos: Vec<_> = aggregate.videos.iter().collect();
        videos.sort_by(|a, b| b.stat_or_default().views.cmp(&a.stat_or_default().views));
        Self {
            creator_id: aggregate.creator_id.clone(),
            display_name: aggregate.display_name.clone(),
            stats: aggregate.overall,
            samples: videos
                .into_iter()
                .take(SAMPLE_VIDEOS)
                .map(|v| SampleVideo {
                    title: v.title.clone(),
                    views: v.stat_or_default().views,
                    likes: v.stat_or_default().likes,
                })
                .collect(),
        }
    }

    /// Prompt text for the judge.
    #[must_use]
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "请基于以下信息对UP主 '{}' 做一个简短的评价（中文），并给出1到10的评分，最后输出一个一句话的推荐标签。\n信息：\n",
            self.display_name
        );
        let _ = writeln!(prompt, "mid: {}", self.creator_id);
        let _ = writeln!(prompt, "视频数: {}", self.stats.count);
        let _ = writeln!(prompt, "总播放: {}", self.stats.views);
        let _ = writeln!(prompt, "总点赞: {}", self.stats.likes);
        let _ = writeln!(prompt, "总收藏: {}", self.stats.favorites);
        for (i, sample) in self.samples.iter().enumerate() {
            let _ = writeln!(
                prompt,
                "代表作{}: {} (播放 {}, 点赞 {})",
                i + 1,
                sample.title,
                sample.views,
                sample.likes
            );
        }
        prompt.push_str("\n请返回 JSON 格式：{\"score\": number, \"summary\": string, \"tag\": string}");
        prompt
    }
}

/// Qualitative assessment of one creator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    /// Score on 1-10 before clamping; `None` when the judge declined to score.
    pub score: Option<f64>,
    /// Free-text summary.
    pub summary: String,
    /// Short recommendation tag.
    pub tag: Option<String>,
}

impl Judgement {
    /// Neutral judgement used when the service fails.
    #[must_use]
    pub fn neutral(summary: impl Into<String>) -> Self {
        Self {
            score: Some(NEUTRAL_SCORE),
            summary: summary.into(),
            tag: None,
        }
    }
}

/// Parse model output into a judgement.
///
/// The first `{...}` block is read as JSON. An explicit `"score": null` yields no
/// score; a missing or non-numeric score yields [`NEUTRAL_SCORE`]. Output without
/// a parseable block becomes the summary with a neutral score.
#[must_use]
pub fn parse_judgement(text: &str) -> Judgement {
    let text = text.trim();
    let block = JSON_BLOCK
        .as_ref()
        .and_then(|re| re.find(text))
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .filter(Value::is_object);

    let Some(json) = block else {
        return Judgement::neutral(text.chars().take(RAW_SUMMARY_CHARS).collect::<String>());
    };

    let score = match json.get("score") {
        Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_f64().unwrap_or(NEUTRAL_SCORE)),
        Some(Value::String(s)) => Some(s.trim().parse().unwrap_or(NEUTRAL_SCORE)),
        _ => Some(NEUTRAL_SCORE),
    };
    let summary = json
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let tag = json
        .get("tag")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "无")
        .map(str::to_string);

    Judgement {
        score,
        summary,
        tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::types::{Owner, VideoRecord, VideoStat};
    use crate::ranking::aggregate::aggregate;
    use crate::ranking::category::MarkerClassifier;

    #[test]
    fn test_parse_fenced_json() {
        let text = "好的：\n```json\n{\"score\": 8, \"summary\": \"稳定输出\", \"tag\": \"宝藏UP\"}\n```";
        let j = parse_judgement(text);
        assert_eq!(j.score, Some(8.0));
        assert_eq!(j.summary, "稳定输出");
        assert_eq!(j.tag.as_deref(), Some("宝藏UP"));
    }

    #[test]
    fn test_parse_null_and_missing_score() {
        assert_eq!(parse_judgement(r#"{"score": null, "summary": "x"}"#).score, None);
        assert_eq!(
            parse_judgement(r#"{"summary": "x"}"#).score,
            Some(NEUTRAL_SCORE)
        );
        assert_eq!(
            parse_judgement(r#"{"score": "high"}"#).score,
            Some(NEUTRAL_SCORE)
        );
        assert_eq!(parse_judgement(r#"{"score": "7.5"}"#).score, Some(7.5));
    }

    #[test]
    fn test_parse_plain_text() {
        let j = parse_judgement("这个UP主很不错");
        assert_eq!(j.score, Some(NEUTRAL_SCORE));
        assert_eq!(j.summary, "这个UP主很不错");
        assert!(j.tag.is_none());

        let broken = parse_judgement("{not json}");
        assert_eq!(broken.score, Some(NEUTRAL_SCORE));
        assert_eq!(broken.summary, "{not json}");
    }

    #[test]
    fn test_request_samples_most_viewed() {
        let records: Vec<VideoRecord> = [5_u64, 50, 500, 5000]
            .iter()
            .map(|views| VideoRecord {
                identifier: format!("v{views}"),
                title: format!("t{views}"),
                description: String::new(),
                published_at: None,
                owner: Some(Owner {
                    creator_id: "1".to_string(),
                    display_name: "舰长".to_string(),
                }),
                stat: Some(VideoStat {
                    views: *views,
                    likes: 1,
                    favorites: 0,
                }),
                source_keyword: "kw".to_string(),
                category: None,
            })
            .collect();
        let agg = aggregate(records, &MarkerClassifier::default());
        let creator = agg.get("1").unwrap_or_else(|| panic!("missing creator"));
        let request = JudgeRequest::from_aggregate(creator);

        assert_eq!(request.samples.len(), SAMPLE_VIDEOS);
        assert_eq!(request.samples[0].views, 5000);
        assert_eq!(request.stats.count, 4);
        let prompt = request.prompt();
        assert!(prompt.contains("舰长"));
        assert!(prompt.contains("t5000"));
        assert!(!prompt.contains("t5 "));
    }
}
