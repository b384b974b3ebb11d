//! End-to-end run: scan, aggregate, filter, score, judge and rank.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::crawl::error::{FetchError, ScanError};
use crate::crawl::fetch::FetchContext;
use crate::crawl::orchestrator::{Crawler, ScanReport, ScanRequest, StopSignal};
use crate::crawl::platform::{PlatformApi, VideoSource};
use crate::crawl::proxy::ProxyPool;
use crate::crawl::proxy_source::discover_from_pools;
use crate::crawl::types::VideoRecord;
use crate::llm::config::JUDGE_TOP_N;
use crate::llm::error::JudgementError;
use crate::llm::{Judge, JudgeRequest, JudgementCache, build_judge, judge_all};
use crate::ranking::aggregate::{Aggregates, Bucket, BucketEntry, aggregate};
use crate::ranking::category::Classifier;
use crate::ranking::export::Leaderboard;
use crate::ranking::outlier::filter_outliers;
use crate::ranking::scorer::{blend, judge_candidates, score};
use crate::ranking::weights::PresetResolver;
use crate::settings::Settings;

/// Errors building or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The platform client could not be built.
    #[error("fetch setup failed: {0}")]
    Fetch(#[from] FetchError),

    /// The judgement provider could not be built.
    #[error("judgement setup failed: {0}")]
    Judgement(#[from] JudgementError),

    /// The scan could not start.
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
}

/// Ranking options.
#[derive(Clone, Debug, PartialEq)]
pub struct RankOptions {
    /// Outlier threshold; no filtering when absent.
    pub outlier_sigma: Option<f64>,
    /// Creator ids or display names to drop.
    pub blacklist: Vec<String>,
    /// Blend weight of judged scores.
    pub llm_weight: f64,
    /// Judgement workers.
    pub llm_threads: usize,
    /// Creators judged per board.
    pub judge_top_n: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            outlier_sigma: None,
            blacklist: Vec::new(),
            llm_weight: 0.4,
            llm_threads: 4,
            judge_top_n: JUDGE_TOP_N,
        }
    }
}

impl RankOptions {
    fn is_blacklisted(&self, entry: &BucketEntry) -> bool {
        self.blacklist.iter().map(|b| b.trim()).any(|b| {
            !b.is_empty() && (b == entry.creator_id || b == entry.display_name)
        })
    }
}

/// Result of a full run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// Scan outcome (records included).
    pub scan: ScanReport,
    /// Distinct creators aggregated.
    pub creators: usize,
    /// The leaderboards, overall first.
    pub boards: Vec<Leaderboard>,
}

/// Scan-to-leaderboard pipeline.
pub struct Pipeline {
    crawler: Crawler,
    classifier: Arc<dyn Classifier>,
    rules: Arc<dyn PresetResolver>,
    judge: Option<Arc<dyn Judge>>,
    options: RankOptions,
}

impl Pipeline {
    /// Assemble a pipeline from parts.
    #[must_use]
    pub fn new(
        crawler: Crawler,
        classifier: Arc<dyn Classifier>,
        rules: Arc<dyn PresetResolver>,
        judge: Option<Arc<dyn Judge>>,
        options: RankOptions,
    ) -> Self {
        Self {
            crawler,
            classifier,
            rules,
            judge,
            options,
        }
    }

    /// Build a pipeline against the live platform from persisted settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client or the judgement provider cannot be built.
    pub async fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let addresses = if settings.use_proxypool {
            let endpoints = settings.proxy_entries();
            let discovered = discover_from_pools(&endpoints).await;
            if discovered.is_empty() {
                tracing::warn!("No proxies discovered from {} pool endpoints; connecting directly", endpoints.len());
            }
            discovered
        } else if settings.use_proxy {
            settings.proxy_entries()
        } else {
            Vec::new()
        };
        let proxies = ProxyPool::with_addresses(addresses);

        let config = settings.crawl_config();
        let workers = config.workers;
        let context = Arc::new(FetchContext::with_proxies(proxies));
        let source: Arc<dyn VideoSource> = Arc::new(PlatformApi::new(config, Arc::clone(&context))?);
        let crawler = Crawler::new(source, context, workers);

        let judge = match settings.llm_config() {
            Some(llm) => build_judge(&llm)?,
            None => None,
        };

        let options = RankOptions {
            outlier_sigma: settings.outlier_sigma,
            blacklist: settings.blacklist.clone(),
            llm_weight: settings.llm_weight,
            llm_threads: settings.llm_threads,
            judge_top_n: JUDGE_TOP_N,
        };

        Ok(Self::new(
            crawler,
            Arc::new(settings.categories.clone()),
            Arc::new(settings.weight_rules()),
            judge,
            options,
        ))
    }

    /// The crawler.
    #[must_use]
    pub const fn crawler(&self) -> &Crawler {
        &self.crawler
    }

    /// The judge, if judgements are enabled.
    #[must_use]
    pub fn judge(&self) -> Option<&Arc<dyn Judge>> {
        self.judge.as_ref()
    }

    /// Scan and rank. Partial scans are still ranked.
    ///
    /// # Errors
    /// Returns an error if the scan cannot start.
    pub async fn run<F>(
        &self,
        request: &ScanRequest,
        stop: &StopSignal,
        progress: F,
    ) -> Result<RunReport, PipelineError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let scan = self
            .crawler
            .scan_with_progress(request, stop, progress)
            .await?;
        if scan.state.is_partial() {
            tracing::warn!(
                "Ranking partial results ({:?} after {}/{} tasks)",
                scan.state,
                scan.tasks_completed,
                scan.tasks_total
            );
        }
        let aggregates = self.aggregate(scan.records.clone());
        let boards = self.rank(&aggregates).await;
        Ok(RunReport {
            scan,
            creators: aggregates.len(),
            boards,
        })
    }

    /// Aggregate records with the configured classifier.
    #[must_use]
    pub fn aggregate(&self, records: Vec<VideoRecord>) -> Aggregates {
        aggregate(records, self.classifier.as_ref())
    }

    /// Build every leaderboard from `aggregates`. The aggregates are not modified,
    /// so ranking can be repeated with other options.
    pub async fn rank(&self, aggregates: &Aggregates) -> Vec<Leaderboard> {
        let cache = JudgementCache::new();
        let mut boards = Vec::with_capacity(Bucket::LEADERBOARDS.len());
        for bucket in Bucket::LEADERBOARDS {
            boards.push(self.rank_bucket(aggregates, bucket, &cache).await);
        }
        boards
    }

    async fn rank_bucket(
        &self,
        aggregates: &Aggregates,
        bucket: Bucket,
        cache: &JudgementCache,
    ) -> Leaderboard {
        let mut entries = aggregates.bucket(bucket);
        let before = entries.len();
        entries.retain(|e| !self.options.is_blacklisted(e));
        if entries.len() < before {
            tracing::info!(
                "{}: removed {} blacklisted creators",
                bucket.board_name(),
                before - entries.len()
            );
        }

        if let Some(sigma) = self.options.outlier_sigma {
            entries = filter_outliers(entries, sigma);
        }

        let mut ranked = score(entries, self.rules.as_ref());

        if let Some(judge) = &self.judge {
            let requests: Vec<JudgeRequest> = judge_candidates(&ranked, self.options.judge_top_n)
                .iter()
                .filter_map(|id| aggregates.get(id))
                .map(JudgeRequest::from_aggregate)
                .collect();
            let judgements =
                judge_all(judge.as_ref(), requests, self.options.llm_threads, cache).await;
            ranked = blend(ranked, &judgements, self.options.llm_weight);
        }

        tracing::info!("{}: {} creators ranked", bucket.board_name(), ranked.len());
        Leaderboard::new(bucket, ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::crawl::config::WorkerConfig;
    use crate::crawl::fetch::LastResponse;
    use crate::crawl::orchestrator::ScanState;
    use crate::crawl::types::{DetailRecord, Owner, SearchHit, VideoStat};
    use crate::llm::Judgement;
    use crate::ranking::category::{Category, MarkerClassifier};
    use crate::ranking::weights::WeightRules;

    /// Search returns one hit per (keyword, page); the owner is derived from
    /// the page so creators get different counts.
    struct FakeSource {
        context: Arc<FetchContext>,
    }

    #[async_trait]
    impl VideoSource for FakeSource {
        async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchHit>, FetchError> {
            self.context.record(LastResponse::Success { status: 200 });
            Ok(vec![SearchHit {
                identifier: Some(format!("{keyword}-{page}")),
                title: format!("{keyword} 第{page}期"),
                ..SearchHit::default()
            }])
        }

        async fn detail(&self, identifier: &str) -> Result<DetailRecord, FetchError> {
            let page: u64 = identifier
                .rsplit('-')
                .next()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1);
            let creator = if page == 1 { "1" } else { "2" };
            Ok(DetailRecord {
                owner: Some(Owner {
                    creator_id: creator.to_string(),
                    display_name: format!("up{creator}"),
                }),
                stat: Some(VideoStat {
                    views: 100 * page,
                    likes: 10 * page,
                    favorites: page,
                }),
                description: Some("desc".to_string()),
                ..DetailRecord::default()
            })
        }
    }

    struct FixedJudge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Judge for FixedJudge {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn judge(&self, request: &JudgeRequest) -> Result<Judgement, JudgementError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let score = if request.creator_id == "1" { Some(10.0) } else { None };
            Ok(Judgement {
                score,
                summary: format!("about {}", request.display_name),
                tag: Some("稳".to_string()),
            })
        }

        async fn test_connection(&self) -> Result<(), JudgementError> {
            Ok(())
        }
    }

    fn pipeline(judge: Option<Arc<dyn Judge>>, options: RankOptions) -> Pipeline {
        let context = Arc::new(FetchContext::new());
        let source: Arc<dyn VideoSource> = Arc::new(FakeSource {
            context: Arc::clone(&context),
        });
        Pipeline::new(
            Crawler::new(source, context, WorkerConfig::new(2, 2)),
            Arc::new(MarkerClassifier::default()),
            Arc::new(WeightRules::default()),
            judge,
            options,
        )
    }

    #[tokio::test]
    async fn test_run_builds_three_boards() {
        let p = pipeline(None, RankOptions::default());
        let request = ScanRequest::new(["崩坏3 深渊", "崩坏3 战场"], 3);
        let report = p
            .run(&request, &StopSignal::new(), |_, _| {})
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(report.scan.state, ScanState::Completed);
        assert_eq!(report.scan.records.len(), 6);
        assert_eq!(report.creators, 2);

        let names: Vec<&str> = report.boards.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["总榜", "深渊榜", "战场榜"]);

        // Creator 2 owns pages 2 and 3 of both keywords.
        let overall = &report.boards[0];
        assert_eq!(overall.entries[0].entry.creator_id, "2");
        assert_eq!(overall.entries[0].entry.stats.count, 4);
        assert_eq!(report.boards[1].bucket, Bucket::Category(Category::CategoryA));
        assert_eq!(report.boards[1].entries.len(), 2);
    }

    #[tokio::test]
    async fn test_blacklist_and_judgement_cache() {
        let judge = Arc::new(FixedJudge {
            calls: AtomicUsize::new(0),
        });
        let options = RankOptions {
            blacklist: vec!["up2".to_string()],
            ..RankOptions::default()
        };
        let p = pipeline(Some(Arc::clone(&judge) as Arc<dyn Judge>), options);
        let report = p
            .run(
                &ScanRequest::new(["崩坏3 深渊", "崩坏3 战场"], 2),
                &StopSignal::new(),
                |_, _| {},
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        for board in &report.boards {
            assert!(board.entries.iter().all(|e| e.entry.creator_id != "2"));
        }
        // Creator 1 appears on all three boards but is judged once.
        assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
        let top = &report.boards[0].entries[0];
        assert_eq!(top.external_score, Some(10.0));
        assert_eq!(top.label(), "稳");
        assert_eq!(top.summary.as_deref(), Some("about up1"));
    }

    #[tokio::test]
    async fn test_null_score_keeps_composite() {
        let judge: Arc<dyn Judge> = Arc::new(FixedJudge {
            calls: AtomicUsize::new(0),
        });
        let p = pipeline(Some(judge), RankOptions::default());
        let records = p
            .crawler()
            .collect("崩坏3", 3)
            .await;
        let aggregates = p.aggregate(records);
        let boards = p.rank(&aggregates).await;
        let creator2 = boards[0]
            .entries
            .iter()
            .find(|e| e.entry.creator_id == "2")
            .unwrap_or_else(|| panic!("missing creator 2"));
        assert!(creator2.external_score.is_none());
        assert!((creator2.final_score - creator2.normalized_score).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ranking_is_repeatable() {
        let p = pipeline(None, RankOptions::default());
        let records = p.crawler().collect("崩坏3 深渊", 3).await;
        let aggregates = p.aggregate(records);
        let first = p.rank(&aggregates).await;
        let second = p.rank(&aggregates).await;
        assert_eq!(first, second);
    }
}
