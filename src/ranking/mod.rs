//! Aggregation, filtering and scoring of crawled records.
//!
//! This module provides:
//! - Pluggable category classification
//! - Per-creator aggregation into overall and per-category buckets
//! - A sigma-based outlier filter
//! - Weight presets selected by title markers
//! - Composite scoring, judgement blending and export rows

pub mod aggregate;
pub mod category;
pub mod export;
pub mod outlier;
pub mod scorer;
pub mod weights;

pub use aggregate::{Aggregates, Bucket, BucketEntry, CreatorAggregate, Stats, aggregate};
pub use category::{Category, Classifier, MarkerClassifier};
pub use export::{ExportRow, ExportedBoard, Leaderboard};
pub use outlier::filter_outliers;
pub use scorer::{RankedEntry, Tier, blend, judge_candidates, score};
pub use weights::{Metric, PresetResolver, PresetSet, RuleMarkers, RuleVariant, WeightPreset, WeightRules};
