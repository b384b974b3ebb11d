//! Category classification by marker substrings.

use serde::{Deserialize, Serialize};

/// Category a video record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// First marker group (abyss content by default).
    CategoryA,
    /// Second marker group (memorial arena content by default).
    CategoryB,
    /// Anything else.
    Other,
}

impl Category {
    /// Every category, in classification priority order.
    pub const ALL: [Self; 3] = [Self::CategoryA, Self::CategoryB, Self::Other];

    /// Stable string tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryA => "category_A",
            Self::CategoryB => "category_B",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assigns a category to a record from its source keyword and title.
pub trait Classifier: Send + Sync {
    /// Classify one record.
    fn classify(&self, keyword: &str, title: &str) -> Category;
}

/// Classifier matching configured substrings. Category A markers are tested
/// first, then category B; the first match wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerClassifier {
    /// Markers for category A.
    pub category_a: Vec<String>,
    /// Markers for category B.
    pub category_b: Vec<String>,
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self {
            category_a: vec!["深渊".to_string()],
            category_b: vec!["记忆战场".to_string(), "战场".to_string()],
        }
    }
}

impl MarkerClassifier {
    /// Create a classifier from marker lists. Blank markers are ignored.
    #[must_use]
    pub fn new(category_a: Vec<String>, category_b: Vec<String>) -> Self {
        let clean = |markers: Vec<String>| {
            markers
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect()
        };
        Self {
            category_a: clean(category_a),
            category_b: clean(category_b),
        }
    }
}

fn matches_any(markers: &[String], keyword: &str, title: &str) -> bool {
    markers
        .iter()
        .any(|m| keyword.contains(m.as_str()) || title.contains(m.as_str()))
}

impl Classifier for MarkerClassifier {
    fn classify(&self, keyword: &str, title: &str) -> Category {
        if matches_any(&self.category_a, keyword, title) {
            Category::CategoryA
        } else if matches_any(&self.category_b, keyword, title) {
            Category::CategoryB
        } else {
            Category::Other
        }
    }
}
