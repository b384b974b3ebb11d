//! Core types for crawled items and tolerant parsing of platform payloads.
//!
//! The platform's JSON is inconsistent across deployments: result lists move
//! between `data.result`, `data.items` and `data.list`, numbers arrive as strings,
//! and whole objects go missing. Everything here parses into explicit variants
//! with typed defaults instead of failing.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ranking::category::Category;

/// Keys that may hold the search result list under `data`.
const RESULT_LIST_KEYS: [&str; 3] = ["result", "items", "list"];

static HIGHLIGHT_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").ok());

/// The uploading account of a video.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Stable creator identifier (aggregation key).
    pub creator_id: String,
    /// Display name at crawl time.
    pub display_name: String,
}

/// Engagement counters of a video.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStat {
    /// View count.
    pub views: u64,
    /// Like count.
    pub likes: u64,
    /// Favorite count.
    pub favorites: u64,
}

/// One hit from a search page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Item identifier; hits without one are dropped.
    pub identifier: Option<String>,
    /// Title with highlight markup removed.
    pub title: String,
    /// Short description, if the search payload carries one.
    pub description: Option<String>,
    /// Publish time in seconds since the epoch.
    pub published_at: Option<i64>,
    /// Owner as reported by search.
    pub owner: Option<Owner>,
    /// Counters as reported by search.
    pub stat: Option<VideoStat>,
}

/// Detail object for a single item. Every field is optional: a failed fetch is
/// represented by [`DetailRecord::default`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    /// Title from the detail endpoint.
    pub title: Option<String>,
    /// Full description.
    pub description: Option<String>,
    /// Publish time in seconds since the epoch.
    pub published_at: Option<i64>,
    /// Owner.
    pub owner: Option<Owner>,
    /// Counters.
    pub stat: Option<VideoStat>,
}

impl DetailRecord {
    /// Whether the detail fetch produced nothing usable.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.published_at.is_none()
            && self.owner.is_none()
            && self.stat.is_none()
    }
}

/// A normalized video record, built once from a search hit and its detail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Item identifier.
    pub identifier: String,
    /// Title.
    pub title: String,
    /// Description (empty when unknown).
    pub description: String,
    /// Publish time.
    pub published_at: Option<DateTime<Utc>>,
    /// Owner, absent when neither search nor detail reported one.
    pub owner: Option<Owner>,
    /// Counters, absent when neither search nor detail reported them.
    pub stat: Option<VideoStat>,
    /// Keyword whose search produced this record.
    pub source_keyword: String,
    /// Category assigned during aggregation.
    pub category: Option<Category>,
}

impl VideoRecord {
    /// Merge a search hit with its detail. Detail fields win when both are present.
    ///
    /// Returns `None` when the hit has no identifier.
    #[must_use]
    pub fn merge(hit: &SearchHit, detail: &DetailRecord, keyword: &str) -> Option<Self> {
        let identifier = hit.identifier.clone()?;
        let title = detail
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| hit.title.clone());
        let description = detail
            .description
            .clone()
            .or_else(|| hit.description.clone())
            .unwrap_or_default();
        let published_at = detail
            .published_at
            .or(hit.published_at)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        Some(Self {
            identifier,
            title,
            description,
            published_at,
            owner: detail.owner.clone().or_else(|| hit.owner.clone()),
            stat: detail.stat.or(hit.stat),
            source_keyword: keyword.to_string(),
            category: None,
        })
    }

    /// Return a copy tagged with `category`.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Counters with missing values read as zero.
    #[must_use]
    pub fn stat_or_default(&self) -> VideoStat {
        self.stat.unwrap_or_default()
    }

    /// Description length in characters.
    #[must_use]
    pub fn description_chars(&self) -> u64 {
        self.description.chars().count() as u64
    }
}

/// Parsed search response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchPayload {
    /// Success code with a non-empty result list.
    Hits(Vec<SearchHit>),
    /// Success code but no usable list.
    Empty,
    /// Non-zero application code.
    Rejected {
        /// Application code.
        code: i64,
        /// Message, if any.
        message: String,
    },
}

/// Parsed detail response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetailPayload {
    /// Success code with a data object.
    Found(DetailRecord),
    /// Success code without data.
    Missing,
    /// Non-zero application code.
    Rejected {
        /// Application code.
        code: i64,
        /// Message, if any.
        message: String,
    },
}

/// Parse a search endpoint body.
#[must_use]
pub fn parse_search_payload(body: &Value) -> SearchPayload {
    let code = response_code(body);
    if code != 0 {
        return SearchPayload::Rejected {
            code,
            message: response_message(body),
        };
    }

    let Some(data) = body.get("data").filter(|d| d.is_object()) else {
        return SearchPayload::Empty;
    };

    for key in RESULT_LIST_KEYS {
        if let Some(list) = data.get(key).and_then(Value::as_array) {
            if !list.is_empty() {
                return SearchPayload::Hits(list.iter().map(parse_search_hit).collect());
            }
        }
    }

    SearchPayload::Empty
}

/// Parse a detail endpoint body.
#[must_use]
pub fn parse_detail_payload(body: &Value) -> DetailPayload {
    let code = response_code(body);
    if code != 0 {
        return DetailPayload::Rejected {
            code,
            message: response_message(body),
        };
    }

    match body.get("data").filter(|d| d.is_object()) {
        Some(data) => DetailPayload::Found(parse_detail_record(data)),
        None => DetailPayload::Missing,
    }
}

/// Parse one search hit.
fn parse_search_hit(item: &Value) -> SearchHit {
    let identifier = string_field(item, "bvid").filter(|id| !id.trim().is_empty());
    let title = string_field(item, "title")
        .map(|t| strip_markup(&t))
        .unwrap_or_default();

    let owner = item.get("owner").and_then(parse_owner).or_else(|| {
        let creator_id = id_field(item, "mid")?;
        let display_name = string_field(item, "author").unwrap_or_else(|| creator_id.clone());
        Some(Owner {
            creator_id,
            display_name,
        })
    });

    let stat = item.get("stat").and_then(parse_stat).or_else(|| {
        let views = lenient_u64(item.get("play"));
        let likes = lenient_u64(item.get("like"));
        let favorites = lenient_u64(item.get("favorites"));
        if views.is_none() && likes.is_none() && favorites.is_none() {
            return None;
        }
        Some(VideoStat {
            views: views.unwrap_or(0),
            likes: likes.unwrap_or(0),
            favorites: favorites.unwrap_or(0),
        })
    });

    SearchHit {
        identifier,
        title,
        description: string_field(item, "description"),
        published_at: lenient_i64(item.get("pubdate")),
        owner,
        stat,
    }
}

/// Parse the `data` object of a detail response.
fn parse_detail_record(data: &Value) -> DetailRecord {
    DetailRecord {
        title: string_field(data, "title"),
        description: string_field(data, "desc"),
        published_at: lenient_i64(data.get("pubdate")),
        owner: data.get("owner").and_then(parse_owner),
        stat: data.get("stat").and_then(parse_stat),
    }
}

fn parse_owner(owner: &Value) -> Option<Owner> {
    let creator_id = id_field(owner, "mid")?;
    let display_name = string_field(owner, "name")
        .or_else(|| string_field(owner, "uname"))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| creator_id.clone());
    Some(Owner {
        creator_id,
        display_name,
    })
}

fn parse_stat(stat: &Value) -> Option<VideoStat> {
    if !stat.is_object() {
        return None;
    }
    Some(VideoStat {
        views: lenient_u64(stat.get("view")).unwrap_or(0),
        likes: lenient_u64(stat.get("like")).unwrap_or(0),
        favorites: lenient_u64(stat.get("favorite")).unwrap_or(0),
    })
}

fn response_code(body: &Value) -> i64 {
    // A body without a code field is treated as a rejection, not a success.
    lenient_i64(body.get("code")).unwrap_or(-1)
}

fn response_message(body: &Value) -> String {
    string_field(body, "message").unwrap_or_default()
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Identifier fields arrive as numbers or strings; zero and empty mean absent.
fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64().filter(|v| *v != 0).map(|v| v.to_string()),
        Value::String(s) if !s.trim().is_empty() && s.trim() != "0" => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Read a non-negative count that may be a number, a float or a numeric string.
fn lenient_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Remove inline tags such as `<em class="keyword">` from search titles.
///
/// Only well-formed tags are removed; a bare `<` (as in `伤害<3000`) is kept.
#[must_use]
pub fn strip_markup(text: &str) -> String {
    match HIGHLIGHT_TAG.as_ref() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search_payload_result_list() {
        let body = json!({
            "code": 0,
            "data": {
                "result": [
                    {
                        "bvid": "BV1xx",
                        "title": "崩坏3 <em class=\"keyword\">深渊</em> 攻略",
                        "mid": 42,
                        "author": "舰长",
                        "play": "1200",
                        "like": 30,
                        "favorites": 7,
                        "pubdate": 1_700_000_000
                    },
                    { "title": "no id" }
                ]
            }
        });

        let SearchPayload::Hits(hits) = parse_search_payload(&body) else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].identifier.as_deref(), Some("BV1xx"));
        assert_eq!(hits[0].title, "崩坏3 深渊 攻略");
        assert_eq!(
            hits[0].owner,
            Some(Owner {
                creator_id: "42".to_string(),
                display_name: "舰长".to_string()
            })
        );
        assert_eq!(
            hits[0].stat,
            Some(VideoStat {
                views: 1200,
                likes: 30,
                favorites: 7
            })
        );
        assert!(hits[1].identifier.is_none());
    }

    #[test]
    fn test_parse_search_payload_alternate_nesting() {
        let body = json!({"code": 0, "data": {"result": [], "items": [{"bvid": "BV2"}]}});
        let SearchPayload::Hits(hits) = parse_search_payload(&body) else {
            panic!("expected hits");
        };
        assert_eq!(hits[0].identifier.as_deref(), Some("BV2"));
    }

    #[test]
    fn test_parse_search_payload_empty_and_rejected() {
        assert_eq!(
            parse_search_payload(&json!({"code": 0, "data": {"result": []}})),
            SearchPayload::Empty
        );
        assert_eq!(
            parse_search_payload(&json!({"code": 0, "data": null})),
            SearchPayload::Empty
        );
        assert_eq!(
            parse_search_payload(&json!({"code": -412, "message": "请求被拦截"})),
            SearchPayload::Rejected {
                code: -412,
                message: "请求被拦截".to_string()
            }
        );
        assert!(matches!(
            parse_search_payload(&json!({"data": {}})),
            SearchPayload::Rejected { code: -1, .. }
        ));
    }

    #[test]
    fn test_parse_detail_payload() {
        let body = json!({
            "code": 0,
            "data": {
                "title": "full title",
                "desc": "简介",
                "pubdate": 1_700_000_100,
                "owner": {"mid": "7", "name": "up"},
                "stat": {"view": 10, "like": "3", "favorite": 1}
            }
        });
        let DetailPayload::Found(detail) = parse_detail_payload(&body) else {
            panic!("expected detail");
        };
        assert_eq!(detail.title.as_deref(), Some("full title"));
        assert_eq!(detail.owner.as_ref().map(|o| o.creator_id.as_str()), Some("7"));
        assert_eq!(detail.stat.map(|s| s.likes), Some(3));
        assert_eq!(parse_detail_payload(&json!({"code": 0})), DetailPayload::Missing);
    }

    #[test]
    fn test_merge_prefers_detail() {
        let hit = SearchHit {
            identifier: Some("BV1".to_string()),
            title: "search title".to_string(),
            description: Some("short".to_string()),
            published_at: Some(100),
            owner: Some(Owner {
                creator_id: "1".to_string(),
                display_name: "old".to_string(),
            }),
            stat: Some(VideoStat {
                views: 1,
                likes: 1,
                favorites: 1,
            }),
        };
        let detail = DetailRecord {
            title: None,
            description: Some("long description".to_string()),
            published_at: Some(200),
            owner: Some(Owner {
                creator_id: "1".to_string(),
                display_name: "new".to_string(),
            }),
            stat: Some(VideoStat {
                views: 50,
                likes: 5,
                favorites: 2,
            }),
        };

        let record = VideoRecord::merge(&hit, &detail, "kw").unwrap_or_else(|| panic!("merge"));
        assert_eq!(record.title, "search title");
        assert_eq!(record.description, "long description");
        assert_eq!(record.published_at.map(|d| d.timestamp()), Some(200));
        assert_eq!(record.owner.map(|o| o.display_name), Some("new".to_string()));
        assert_eq!(record.stat.map(|s| s.views), Some(50));
        assert_eq!(record.source_keyword, "kw");
        assert!(record.category.is_none());
    }

    #[test]
    fn test_merge_with_empty_detail_keeps_hit() {
        let hit = SearchHit {
            identifier: Some("BV9".to_string()),
            title: "t".to_string(),
            ..SearchHit::default()
        };
        let record = VideoRecord::merge(&hit, &DetailRecord::default(), "kw")
            .unwrap_or_else(|| panic!("merge"));
        assert!(record.owner.is_none());
        assert!(record.stat.is_none());
        assert_eq!(record.stat_or_default(), VideoStat::default());

        let no_id = SearchHit::default();
        assert!(VideoRecord::merge(&no_id, &DetailRecord::default(), "kw").is_none());
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<em class=\"keyword\">A</em>B"), "AB");
        assert_eq!(strip_markup("plain"), "plain");
    }

    #[test]
    fn test_strip_markup_keeps_bare_angle_bracket() {
        assert_eq!(
            strip_markup("<em class=\"keyword\">深渊</em> 伤害<3000 寂灭 打法"),
            "深渊 伤害<3000 寂灭 打法"
        );
        assert_eq!(strip_markup("a < b > c"), "a < b > c");
    }
}
