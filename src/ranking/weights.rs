//! Metric weights and rule-based preset selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ranking::aggregate::BucketEntry;

/// A scored metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Number of videos.
    Count,
    /// Total views.
    Views,
    /// Total description length in characters.
    DescriptionChars,
    /// Total favorites.
    Favorites,
    /// Total likes.
    Likes,
}

impl Metric {
    /// Every metric.
    pub const ALL: [Self; 5] = [
        Self::Count,
        Self::Views,
        Self::DescriptionChars,
        Self::Favorites,
        Self::Likes,
    ];
}

/// Weight per metric. Stored as configured; use [`WeightPreset::normalized`]
/// before scoring.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightPreset(BTreeMap<Metric, f64>);

impl WeightPreset {
    /// Build a preset from metric/weight pairs.
    #[must_use]
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Metric, f64)>,
    {
        Self(pairs.into_iter().collect())
    }

    /// Raw weight for `metric` (0 when absent).
    #[must_use]
    pub fn weight(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(0.0)
    }

    /// Metrics with a configured weight.
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.0.keys().copied()
    }

    /// Sum of raw weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// Weights rescaled to sum to 1.
    ///
    /// Negative and non-finite weights count as 0. When nothing positive
    /// remains, the weight is split equally over the configured metrics, or
    /// over every metric if none is configured.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let cleaned: BTreeMap<Metric, f64> = self
            .0
            .iter()
            .map(|(m, w)| (*m, if w.is_finite() && *w > 0.0 { *w } else { 0.0 }))
            .collect();
        let total: f64 = cleaned.values().sum();

        if total > 0.0 {
            return Self(cleaned.into_iter().map(|(m, w)| (m, w / total)).collect());
        }

        let keys: Vec<Metric> = if cleaned.is_empty() {
            Metric::ALL.to_vec()
        } else {
            cleaned.into_keys().collect()
        };
        let share = 1.0 / keys.len() as f64;
        Self(keys.into_iter().map(|m| (m, share)).collect())
    }
}

/// Which preset applies to a creator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleVariant {
    /// No marker found.
    Normal,
    /// A title contains a "jm" marker.
    Jm,
    /// A title contains a "top1" marker.
    Top1,
}

/// The three presets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetSet {
    /// Default preset.
    pub normal: WeightPreset,
    /// Preset for creators with a jm marker.
    pub jm: WeightPreset,
    /// Preset for creators with a top1 marker.
    pub top1: WeightPreset,
}

impl Default for PresetSet {
    fn default() -> Self {
        use Metric::{Count, DescriptionChars, Favorites, Likes, Views};
        Self {
            normal: WeightPreset::new([
                (Count, 0.3),
                (Views, 0.3),
                (DescriptionChars, 0.1),
                (Favorites, 0.15),
                (Likes, 0.15),
            ]),
            jm: WeightPreset::new([
                (Count, 0.5),
                (Views, 0.2),
                (DescriptionChars, 0.1),
                (Favorites, 0.1),
                (Likes, 0.1),
            ]),
            top1: WeightPreset::new([
                (Count, 0.4),
                (Views, 0.3),
                (DescriptionChars, 0.05),
                (Favorites, 0.1),
                (Likes, 0.15),
            ]),
        }
    }
}

impl PresetSet {
    /// Preset for `variant`.
    #[must_use]
    pub const fn get(&self, variant: RuleVariant) -> &WeightPreset {
        match variant {
            RuleVariant::Normal => &self.normal,
            RuleVariant::Jm => &self.jm,
            RuleVariant::Top1 => &self.top1,
        }
    }
}

/// Title markers selecting the non-default presets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleMarkers {
    /// Markers selecting the jm preset.
    pub jm: Vec<String>,
    /// Markers selecting the top1 preset.
    pub top1: Vec<String>,
}

impl Default for RuleMarkers {
    fn default() -> Self {
        Self {
            jm: vec!["寂灭".to_string()],
            top1: vec!["榜一".to_string()],
        }
    }
}

/// Chooses the weight preset for a bucket entry.
pub trait PresetResolver: Send + Sync {
    /// Variant and normalized weights for `entry`.
    fn resolve(&self, entry: &BucketEntry) -> (RuleVariant, WeightPreset);
}

/// Marker-based resolver: top1 beats jm beats normal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightRules {
    /// Presets.
    pub presets: PresetSet,
    /// Markers.
    pub markers: RuleMarkers,
}

impl WeightRules {
    /// Create rules from presets and markers.
    #[must_use]
    pub const fn new(presets: PresetSet, markers: RuleMarkers) -> Self {
        Self { presets, markers }
    }

    /// Variant selected by the titles of `entry`'s videos in this bucket.
    #[must_use]
    pub fn variant_for(&self, entry: &BucketEntry) -> RuleVariant {
        let any_title = |markers: &[String]| {
            entry.videos.iter().any(|v| {
                markers
                    .iter()
                    .filter(|m| !m.is_empty())
                    .any(|m| v.title.contains(m.as_str()))
            })
        };
        if any_title(&self.markers.top1) {
            RuleVariant::Top1
        } else if any_title(&self.markers.jm) {
            RuleVariant::Jm
        } else {
            RuleVariant::Normal
        }
    }
}

impl PresetResolver for WeightRules {
    fn resolve(&self, entry: &BucketEntry) -> (RuleVariant, WeightPreset) {
        let variant = self.variant_for(entry);
        (variant, self.presets.get(variant).normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::aggregate::Stats;
    use crate::crawl::types::VideoRecord;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn entry_with_titles(titles: &[&str]) -> BucketEntry {
        BucketEntry {
            creator_id: "1".to_string(),
            display_name: "up".to_string(),
            stats: Stats::default(),
            videos: titles
                .iter()
                .map(|t| VideoRecord {
                    identifier: (*t).to_string(),
                    title: (*t).to_string(),
                    description: String::new(),
                    published_at: None,
                    owner: None,
                    stat: None,
                    source_keyword: "kw".to_string(),
                    category: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_normalized_sums_to_one() {
        let presets = [
            PresetSet::default().normal,
            WeightPreset::new([(Metric::Count, 3.0), (Metric::Views, 1.0)]),
            WeightPreset::new([(Metric::Count, 0.0), (Metric::Likes, 0.0)]),
            WeightPreset::new([(Metric::Count, -1.0), (Metric::Views, f64::NAN)]),
            WeightPreset::default(),
        ];
        for preset in presets {
            assert!(close(preset.normalized().sum(), 1.0), "{preset:?}");
        }
    }

    #[test]
    fn test_zero_sum_splits_over_present_metrics() {
        let preset = WeightPreset::new([(Metric::Count, 0.0), (Metric::Likes, 0.0)]).normalized();
        assert!(close(preset.weight(Metric::Count), 0.5));
        assert!(close(preset.weight(Metric::Likes), 0.5));
        assert!(close(preset.weight(Metric::Views), 0.0));

        let empty = WeightPreset::default().normalized();
        assert!(close(empty.weight(Metric::Views), 0.2));
    }

    #[test]
    fn test_negative_weights_count_as_zero() {
        let preset = WeightPreset::new([(Metric::Count, -5.0), (Metric::Views, 2.0)]).normalized();
        assert!(close(preset.weight(Metric::Count), 0.0));
        assert!(close(preset.weight(Metric::Views), 1.0));
    }

    #[test]
    fn test_variant_selection() {
        let rules = WeightRules::default();
        assert_eq!(rules.variant_for(&entry_with_titles(&["普通"])), RuleVariant::Normal);
        assert_eq!(rules.variant_for(&entry_with_titles(&["a", "寂灭 打法"])), RuleVariant::Jm);
        assert_eq!(
            rules.variant_for(&entry_with_titles(&["寂灭", "榜一 实录"])),
            RuleVariant::Top1
        );
    }

    #[test]
    fn test_preset_serde_uses_metric_names() {
        let json = serde_json::to_value(&PresetSet::default().normal).unwrap_or_default();
        assert!(json.get("views").is_some());
        assert!(json.get("description_chars").is_some());
    }
}
