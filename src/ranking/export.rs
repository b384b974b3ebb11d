//! Leaderboard rows for export.

use serde::{Deserialize, Serialize};

use crate::ranking::aggregate::Bucket;
use crate::ranking::scorer::RankedEntry;

/// One exported leaderboard row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    /// 1-based rank.
    pub rank: usize,
    /// Creator display name.
    pub display_name: String,
    /// Creator identifier.
    pub creator_id: String,
    /// Qualitative label.
    pub label: String,
    /// Videos in the bucket.
    pub videos: u64,
    /// Views in the bucket.
    pub views: u64,
    /// Likes in the bucket.
    pub likes: u64,
    /// Final score, rounded to two decimals.
    pub score: f64,
    /// Judgement summary, empty when not judged.
    pub summary: String,
}

impl From<&RankedEntry> for ExportRow {
    fn from(r: &RankedEntry) -> Self {
        Self {
            rank: r.rank,
            display_name: r.entry.display_name.clone(),
            creator_id: r.entry.creator_id.clone(),
            label: r.label(),
            videos: r.entry.stats.count,
            views: r.entry.stats.views,
            likes: r.entry.stats.likes,
            score: (r.final_score * 100.0).round() / 100.0,
            summary: r.summary.clone().unwrap_or_default(),
        }
    }
}

/// A named, ranked bucket.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Leaderboard {
    /// Board title.
    pub name: String,
    /// Bucket it was built from.
    pub bucket: Bucket,
    /// Ranked entries.
    pub entries: Vec<RankedEntry>,
}

impl Leaderboard {
    /// Create a board for `bucket`.
    #[must_use]
    pub fn new(bucket: Bucket, entries: Vec<RankedEntry>) -> Self {
        Self {
            name: bucket.board_name().to_string(),
            bucket,
            entries,
        }
    }

    /// Export rows in rank order.
    #[must_use]
    pub fn rows(&self) -> Vec<ExportRow> {
        self.entries.iter().map(ExportRow::from).collect()
    }
}

/// Serialized form of a leaderboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedBoard {
    /// Board title.
    pub name: String,
    /// Rows in rank order.
    pub rows: Vec<ExportRow>,
}

impl From<&Leaderboard> for ExportedBoard {
    fn from(board: &Leaderboard) -> Self {
        Self {
            name: board.name.clone(),
            rows: board.rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::aggregate::{BucketEntry, Stats};
    use crate::ranking::scorer::score;
    use crate::ranking::weights::WeightRules;

    #[test]
    fn test_rows_follow_rank_order() {
        let entries = vec![
            BucketEntry {
                creator_id: "1".to_string(),
                display_name: "small".to_string(),
                stats: Stats {
                    count: 1,
                    views: 10,
                    likes: 1,
                    ..Stats::default()
                },
                videos: Vec::new(),
            },
            BucketEntry {
                creator_id: "2".to_string(),
                display_name: "big".to_string(),
                stats: Stats {
                    count: 4,
                    views: 900,
                    likes: 50,
                    ..Stats::default()
                },
                videos: Vec::new(),
            },
        ];
        let board = Leaderboard::new(Bucket::Overall, score(entries, &WeightRules::default()));
        let exported = ExportedBoard::from(&board);

        assert_eq!(exported.name, "总榜");
        assert_eq!(exported.rows[0].display_name, "big");
        assert_eq!(exported.rows[0].rank, 1);
        assert_eq!(exported.rows[0].views, 900);
        assert_eq!(exported.rows[1].summary, "");

        let json = serde_json::to_string(&exported).unwrap_or_default();
        assert!(json.contains("\"display_name\":\"big\""));
    }
}
