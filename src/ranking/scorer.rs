//! Weighted composite scoring, judgement blending and ranking.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::llm::Judgement;
use crate::ranking::aggregate::BucketEntry;
use crate::ranking::weights::{Metric, PresetResolver, RuleVariant};

/// Score given to every member when a metric has no spread.
pub const FLAT_SCORE: f64 = 5.0;
/// Upper end of the normalized scale.
pub const SCALE_MAX: f64 = 10.0;
/// Judged scores are clamped into this range.
pub const JUDGED_RANGE: (f64, f64) = (1.0, 10.0);

/// Qualitative tier of a composite score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// >= 8.5
    Top,
    /// >= 7.0
    High,
    /// >= 5.5
    Mid,
    /// >= 3.5
    Low,
    /// Everything below.
    Bottom,
}

impl Tier {
    /// Tier for a 0-10 score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 8.5 {
            Self::Top
        } else if score >= 7.0 {
            Self::High
        } else if score >= 5.5 {
            Self::Mid
        } else if score >= 3.5 {
            Self::Low
        } else {
            Self::Bottom
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Top => "夯",
            Self::High => "顶级",
            Self::Mid => "人上人",
            Self::Low => "NPC",
            Self::Bottom => "拉完了",
        }
    }
}

/// A bucket entry with its scores.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedEntry {
    /// The scored entry.
    pub entry: BucketEntry,
    /// Preset variant used.
    pub variant: RuleVariant,
    /// Min-max normalized value per metric (0-10).
    pub metric_scores: BTreeMap<Metric, f64>,
    /// Weighted composite of the metric scores (0-10).
    pub weighted_score: f64,
    /// Composite after a second min-max over the bucket (0-10).
    pub normalized_score: f64,
    /// Clamped judged score, when a judgement produced one.
    pub external_score: Option<f64>,
    /// Judgement summary.
    pub summary: Option<String>,
    /// Judgement tag.
    pub tag: Option<String>,
    /// Score used for ordering.
    pub final_score: f64,
    /// 1-based position.
    pub rank: usize,
    /// Index in the bucket as given to [`score`]; breaks final-score ties.
    pub position: usize,
}

impl RankedEntry {
    /// Qualitative label: the judgement tag when present, else the tier of the composite.
    #[must_use]
    pub fn label(&self) -> String {
        self.tag
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Tier::from_score(self.weighted_score).label().to_string())
    }
}

/// Min-max normalize to 0-10. All-equal input maps to [`FLAT_SCORE`].
#[must_use]
pub fn min_max(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = max - min;
    if !span.is_finite() || span <= 0.0 {
        return vec![FLAT_SCORE; values.len()];
    }
    values.iter().map(|v| (v - min) / span * SCALE_MAX).collect()
}

/// Score a bucket: normalize metrics, apply resolved weights, normalize the
/// composite, then sort and rank. Deterministic for the same input.
#[must_use]
pub fn score(entries: Vec<BucketEntry>, resolver: &dyn PresetResolver) -> Vec<RankedEntry> {
    let normalized: BTreeMap<Metric, Vec<f64>> = Metric::ALL
        .iter()
        .map(|m| {
            let raw: Vec<f64> = entries.iter().map(|e| e.stats.metric(*m) as f64).collect();
            (*m, min_max(&raw))
        })
        .collect();

    let mut ranked: Vec<RankedEntry> = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let (variant, weights) = resolver.resolve(&entry);
            let metric_scores: BTreeMap<Metric, f64> =
                normalized.iter().map(|(m, col)| (*m, col[i])).collect();
            let weighted_score: f64 = metric_scores
                .iter()
                .map(|(m, s)| s * weights.weight(*m))
                .sum();
            RankedEntry {
                entry,
                variant,
                metric_scores,
                weighted_score,
                normalized_score: 0.0,
                external_score: None,
                summary: None,
                tag: None,
                final_score: 0.0,
                rank: 0,
                position: i,
            }
        })
        .collect();

    let composites: Vec<f64> = ranked.iter().map(|r| r.weighted_score).collect();
    for (r, n) in ranked.iter_mut().zip(min_max(&composites)) {
        r.normalized_score = n;
        r.final_score = n;
    }

    sort_and_rank(&mut ranked);
    ranked
}

/// Creator ids of the `limit` highest raw composites, in that order.
#[must_use]
pub fn judge_candidates(ranked: &[RankedEntry], limit: usize) -> Vec<String> {
    let mut by_composite: Vec<&RankedEntry> = ranked.iter().collect();
    by_composite.sort_by(|a, b| desc(a.weighted_score, b.weighted_score));
    by_composite
        .into_iter()
        .take(limit)
        .map(|r| r.entry.creator_id.clone())
        .collect()
}

/// Blend judgements into final scores and re-rank.
///
/// `final = (1 - weight) * normalized + weight * clamp(judged)`. Entries with no
/// judgement, or a judgement without a score, keep the normalized composite.
#[must_use]
pub fn blend(
    mut ranked: Vec<RankedEntry>,
    judgements: &HashMap<String, Judgement>,
    weight: f64,
) -> Vec<RankedEntry> {
    let weight = if weight.is_finite() { weight.clamp(0.0, 1.0) } else { 0.0 };

    for r in &mut ranked {
        let Some(judgement) = judgements.get(&r.entry.creator_id) else {
            continue;
        };
        r.summary = Some(judgement.summary.clone()).filter(|s| !s.is_empty());
        r.tag = judgement.tag.clone();
        r.external_score = judgement
            .score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(JUDGED_RANGE.0, JUDGED_RANGE.1));
        r.final_score = match r.external_score {
            Some(external) => (1.0 - weight) * r.normalized_score + weight * external,
            None => r.normalized_score,
        };
    }

    sort_and_rank(&mut ranked);
    ranked
}

/// Sort descending by final score, ties by bucket position, then assign 1-based ranks.
fn sort_and_rank(ranked: &mut [RankedEntry]) {
    ranked.sort_by(|a, b| {
        desc(a.final_score, b.final_score).then_with(|| a.position.cmp(&b.position))
    });
    for (i, r) in ranked.iter_mut().enumerate() {
        r.rank = i + 1;
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
