//! Per-creator aggregation and bucket extraction.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::crawl::types::VideoRecord;
use crate::ranking::category::{Category, Classifier};
use crate::ranking::weights::Metric;

/// Summed counters over a set of videos.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of videos.
    pub count: u64,
    /// Total views.
    pub views: u64,
    /// Total likes.
    pub likes: u64,
    /// Total favorites.
    pub favorites: u64,
    /// Total description length in characters.
    pub description_chars: u64,
}

impl Stats {
    /// Fold one record in. Missing counters read as zero.
    pub fn add_record(&mut self, record: &VideoRecord) {
        let stat = record.stat_or_default();
        self.count += 1;
        self.views = self.views.saturating_add(stat.views);
        self.likes = self.likes.saturating_add(stat.likes);
        self.favorites = self.favorites.saturating_add(stat.favorites);
        self.description_chars = self
            .description_chars
            .saturating_add(record.description_chars());
    }

    /// Value of `metric`.
    #[must_use]
    pub const fn metric(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Count => self.count,
            Metric::Views => self.views,
            Metric::DescriptionChars => self.description_chars,
            Metric::Favorites => self.favorites,
            Metric::Likes => self.likes,
        }
    }
}

/// Stats and videos of one creator within one category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySlice {
    /// Counters.
    pub stats: Stats,
    /// Videos in fold order.
    pub videos: Vec<VideoRecord>,
}

/// Everything collected about one creator during a scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorAggregate {
    /// Aggregation key.
    pub creator_id: String,
    /// Display name from the first record seen.
    pub display_name: String,
    /// Every video, classified, in fold order.
    pub videos: Vec<VideoRecord>,
    /// Totals over every category.
    pub overall: Stats,
    /// Totals per category with at least one video.
    pub per_category: BTreeMap<Category, CategorySlice>,
}

impl CreatorAggregate {
    fn new(creator_id: String, display_name: String) -> Self {
        Self {
            creator_id,
            display_name,
            videos: Vec::new(),
            overall: Stats::default(),
            per_category: BTreeMap::new(),
        }
    }

    fn fold(&mut self, record: VideoRecord, category: Category) {
        let record = record.with_category(category);
        self.overall.add_record(&record);
        let slice = self.per_category.entry(category).or_default();
        slice.stats.add_record(&record);
        slice.videos.push(record.clone());
        self.videos.push(record);
    }

    /// This creator's view in `bucket`, or `None` if it has no video there.
    #[must_use]
    pub fn bucket_entry(&self, bucket: Bucket) -> Option<BucketEntry> {
        let (stats, videos) = match bucket {
            Bucket::Overall => (self.overall, &self.videos),
            Bucket::Category(category) => {
                let slice = self.per_category.get(&category)?;
                (slice.stats, &slice.videos)
            }
        };
        if stats.count == 0 {
            return None;
        }
        Some(BucketEntry {
            creator_id: self.creator_id.clone(),
            display_name: self.display_name.clone(),
            stats,
            videos: videos.clone(),
        })
    }
}

/// One ranking list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Every creator over every video.
    Overall,
    /// Creators with videos in one category.
    Category(Category),
}

impl Bucket {
    /// The leaderboards produced by a run.
    pub const LEADERBOARDS: [Self; 3] = [
        Self::Overall,
        Self::Category(Category::CategoryA),
        Self::Category(Category::CategoryB),
    ];

    /// Leaderboard title.
    #[must_use]
    pub const fn board_name(&self) -> &'static str {
        match self {
            Self::Overall => "总榜",
            Self::Category(Category::CategoryA) => "深渊榜",
            Self::Category(Category::CategoryB) => "战场榜",
            Self::Category(Category::Other) => "其他榜",
        }
    }
}

/// A creator's stats and videos restricted to one bucket. Owned copy, so
/// filtering and scoring never touch the aggregate it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// Creator identifier.
    pub creator_id: String,
    /// Display name.
    pub display_name: String,
    /// Counters within the bucket.
    pub stats: Stats,
    /// Videos within the bucket.
    pub videos: Vec<VideoRecord>,
}

/// Result of an aggregation pass, in first-seen creator order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregates {
    creators: Vec<CreatorAggregate>,
    index: HashMap<String, usize>,
    dropped_without_owner: usize,
}

impl Aggregates {
    /// Look up a creator.
    #[must_use]
    pub fn get(&self, creator_id: &str) -> Option<&CreatorAggregate> {
        self.index.get(creator_id).map(|&i| &self.creators[i])
    }

    /// Creators in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &CreatorAggregate> {
        self.creators.iter()
    }

    /// Number of creators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    /// Whether no creator was seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    /// Records dropped for lacking an owner identifier.
    #[must_use]
    pub const fn dropped_without_owner(&self) -> usize {
        self.dropped_without_owner
    }

    /// Entries for `bucket`, in first-seen creator order.
    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> Vec<BucketEntry> {
        self.creators
            .iter()
            .filter_map(|c| c.bucket_entry(bucket))
            .collect()
    }
}

/// Group records by creator and classify each into a category.
#[must_use]
pub fn aggregate<I>(records: I, classifier: &dyn Classifier) -> Aggregates
where
    I: IntoIterator<Item = VideoRecord>,
{
    let mut out = Aggregates::default();

    for record in records {
        let Some(owner) = record.owner.clone().filter(|o| !o.creator_id.is_empty()) else {
            out.dropped_without_owner += 1;
            continue;
        };
        let category = classifier.classify(&record.source_keyword, &record.title);

        let idx = match out.index.get(&owner.creator_id) {
            Some(&i) => i,
            None => {
                out.creators
                    .push(CreatorAggregate::new(owner.creator_id.clone(), owner.display_name));
                out.index.insert(owner.creator_id, out.creators.len() - 1);
                out.creators.len() - 1
            }
        };
        out.creators[idx].fold(record, category);
    }

    if out.dropped_without_owner > 0 {
        tracing::debug!(
            "Dropped {} records without an owner identifier",
            out.dropped_without_owner
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::types::{Owner, VideoStat};
    use crate::ranking::category::MarkerClassifier;

    fn record(id: &str, owner: Option<&str>, keyword: &str, title: &str, views: u64) -> VideoRecord {
        VideoRecord {
            identifier: id.to_string(),
            title: title.to_string(),
            description: "四个字符".to_string(),
            published_at: None,
            owner: owner.map(|o| Owner {
                creator_id: o.to_string(),
                display_name: format!("name-{o}"),
            }),
            stat: Some(VideoStat {
                views,
                likes: views / 10,
                favorites: 1,
            }),
            source_keyword: keyword.to_string(),
            category: None,
        }
    }

    fn sample() -> Vec<VideoRecord> {
        vec![
            record("v1", Some("a"), "崩坏3 深渊", "t1", 100),
            record("v2", Some("a"), "崩坏3", "记忆战场 t2", 200),
            record("v3", Some("b"), "崩坏3", "日常", 50),
            record("v4", None, "崩坏3 深渊", "orphan", 999),
            record("v5", Some("a"), "崩坏3", "闲聊", 10),
        ]
    }

    #[test]
    fn test_groups_by_creator_and_drops_orphans() {
        let agg = aggregate(sample(), &MarkerClassifier::default());
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.dropped_without_owner(), 1);
        let a = agg.get("a").unwrap_or_else(|| panic!("missing a"));
        assert_eq!(a.overall.count, 3);
        assert_eq!(a.overall.views, 310);
        assert_eq!(a.overall.description_chars, 12);
        assert_eq!(a.videos.len(), 3);
        assert!(a.videos.iter().all(|v| v.category.is_some()));
    }

    #[test]
    fn test_category_stats_sum_to_overall() {
        let agg = aggregate(sample(), &MarkerClassifier::default());
        for creator in agg.iter() {
            let mut total = Stats::default();
            for slice in creator.per_category.values() {
                for video in &slice.videos {
                    total.add_record(video);
                }
                assert_eq!(slice.stats.count, slice.videos.len() as u64);
            }
            assert_eq!(total, creator.overall, "{}", creator.creator_id);
        }
    }

    #[test]
    fn test_buckets_contain_only_members() {
        let agg = aggregate(sample(), &MarkerClassifier::default());
        let overall = agg.bucket(Bucket::Overall);
        assert_eq!(overall.len(), 2);
        assert_eq!(overall[0].creator_id, "a");

        let abyss = agg.bucket(Bucket::Category(Category::CategoryA));
        assert_eq!(abyss.len(), 1);
        assert_eq!(abyss[0].stats.views, 100);

        let battle = agg.bucket(Bucket::Category(Category::CategoryB));
        assert_eq!(battle.len(), 1);
        assert_eq!(battle[0].videos[0].identifier, "v2");
    }

    #[test]
    fn test_missing_stats_default_to_zero() {
        let mut r = record("v1", Some("a"), "kw", "t", 0);
        r.stat = None;
        let agg = aggregate([r], &MarkerClassifier::default());
        let a = agg.get("a").unwrap_or_else(|| panic!("missing a"));
        assert_eq!(a.overall.count, 1);
        assert_eq!(a.overall.views, 0);
    }

    #[test]
    fn test_board_names() {
        let names: Vec<&str> = Bucket::LEADERBOARDS.iter().map(Bucket::board_name).collect();
        assert_eq!(names, vec!["总榜", "深渊榜", "战场榜"]);
    }
}
