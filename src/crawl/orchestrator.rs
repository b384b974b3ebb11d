//! Crawl orchestration over (keyword, page) tasks.
//!
//! Two bounded pools are nested here: tasks run on a pool of
//! `workers.task_workers`, and each task fetches item details on its own pool of
//! `workers.detail_workers`. The worst-case number of concurrent requests is the
//! product of the two.
//!
//! A task never fails. Search and detail errors degrade to fewer records and a
//! log line. The one exception is the fleet block: an empty search page whose
//! last raw response was a 412 stops the whole scan.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::crawl::config::WorkerConfig;
use crate::crawl::error::ScanError;
use crate::crawl::fetch::FetchContext;
use crate::crawl::platform::VideoSource;
use crate::crawl::types::{DetailRecord, SearchHit, VideoRecord};

/// Message logged when the platform blocks the crawler.
pub const BLOCK_ADVICE: &str = "The platform is blocking requests (HTTP 412). Configure a valid cookie or a proxy pool, then start a new scan.";

/// Cooperative cancellation flag, checked before each task starts.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that no new task starts.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// No scan has run yet.
    #[default]
    Idle,
    /// A scan is in progress.
    Running,
    /// Every task ran.
    Completed,
    /// Cancelled by the operator before every task ran.
    Stopped,
    /// Stopped because the platform blocked the crawler.
    Blocked,
}

impl ScanState {
    /// Whether the scan ended early and its records are partial.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Stopped | Self::Blocked)
    }
}

/// Inclusive publish-time window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishWindow {
    /// Earliest accepted publish time.
    pub start: DateTime<Utc>,
    /// Latest accepted publish time.
    pub end: DateTime<Utc>,
}

impl PublishWindow {
    /// Whether `record` passes the window. Records without a timestamp pass.
    #[must_use]
    pub fn admits(&self, record: &VideoRecord) -> bool {
        record
            .published_at
            .is_none_or(|ts| self.start <= ts && ts <= self.end)
    }
}

/// What to crawl.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Search keywords.
    pub keywords: Vec<String>,
    /// Pages per keyword.
    pub pages: u32,
    /// Optional publish-time filter.
    pub window: Option<PublishWindow>,
}

impl ScanRequest {
    /// Create a request for `keywords`, `pages` pages each.
    ///
    /// Keywords are trimmed; blanks and repeats are dropped, first occurrence wins.
    #[must_use]
    pub fn new<I, S>(keywords: I, pages: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        Self {
            keywords: keywords
                .into_iter()
                .map(Into::into)
                .map(|k: String| k.trim().to_string())
                .filter(|k| !k.is_empty() && seen.insert(k.clone()))
                .collect(),
            pages: pages.max(1),
            window: None,
        }
    }

    /// Restrict records to a publish window.
    #[must_use]
    pub const fn with_window(mut self, window: PublishWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// All (keyword, page) tasks in keyword-major order.
    #[must_use]
    pub fn tasks(&self) -> Vec<(String, u32)> {
        self.keywords
            .iter()
            .flat_map(|k| (1..=self.pages.max(1)).map(move |p| (k.clone(), p)))
            .collect()
    }
}

/// Result of one (keyword, page) task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Records collected (possibly none).
    Records(Vec<VideoRecord>),
    /// The page was empty and the platform is blocking.
    Blocked,
}

/// Result of a scan.
#[derive(Clone, Debug, Serialize)]
pub struct ScanReport {
    /// Scan identifier used in log lines.
    pub scan_id: Uuid,
    /// Terminal state.
    pub state: ScanState,
    /// Collected records (partial when the scan ended early).
    pub records: Vec<VideoRecord>,
    /// Tasks planned.
    pub tasks_total: usize,
    /// Tasks that ran.
    pub tasks_completed: usize,
    /// Records discarded by the publish window.
    pub filtered_by_window: usize,
}

enum TaskRun {
    Done(TaskOutcome),
    Skipped,
}

/// Resets a scan left `Running` because its future was dropped.
struct RunningGuard<'a>(&'a Mutex<ScanState>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == ScanState::Running {
            *state = ScanState::Stopped;
        }
    }
}

/// Runs scans against a [`VideoSource`].
pub struct Crawler {
    source: Arc<dyn VideoSource>,
    context: Arc<FetchContext>,
    workers: WorkerConfig,
    state: Mutex<ScanState>,
}

impl Crawler {
    /// Create a crawler. `context` must be the one the source's fetcher writes to.
    #[must_use]
    pub fn new(source: Arc<dyn VideoSource>, context: Arc<FetchContext>, workers: WorkerConfig) -> Self {
        Self {
            source,
            context,
            workers: workers.clamped(),
            state: Mutex::new(ScanState::Idle),
        }
    }

    /// State of the current or most recent scan.
    #[must_use]
    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Worker pool sizes in use.
    #[must_use]
    pub const fn workers(&self) -> WorkerConfig {
        self.workers
    }

    /// Collect every page of `keyword`. Never fails; failed pages contribute nothing.
    pub async fn collect(&self, keyword: &str, page_count: u32) -> Vec<VideoRecord> {
        let request = ScanRequest::new([keyword], page_count);
        let stop = StopSignal::new();
        let (records, _, _) = self.run_tasks(request.tasks(), &stop, &|_: usize, _: usize| {}).await;
        records
    }

    /// Run a full scan.
    ///
    /// # Errors
    /// Returns an error if another scan is running on this crawler or the request
    /// has no keywords. Task failures never surface here.
    pub async fn scan(&self, request: &ScanRequest, stop: &StopSignal) -> Result<ScanReport, ScanError> {
        self.scan_with_progress(request, stop, |_, _| {}).await
    }

    /// Run a full scan, calling `progress(done, total)` after each task.
    ///
    /// # Errors
    /// Returns an error if another scan is running on this crawler or the request
    /// has no keywords.
    pub async fn scan_with_progress<F>(
        &self,
        request: &ScanRequest,
        stop: &StopSignal,
        progress: F,
    ) -> Result<ScanReport, ScanError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        if request.keywords.is_empty() {
            return Err(ScanError::NoKeywords);
        }
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == ScanState::Running {
                return Err(ScanError::AlreadyRunning);
            }
            *state = ScanState::Running;
        }
        let _running = RunningGuard(&self.state);

        let scan_id = Uuid::new_v4();
        let span = tracing::info_span!("scan", %scan_id);
        let tasks = request.tasks();
        let tasks_total = tasks.len();

        let report = async {
            tracing::info!(
                "Scanning {} keywords x {} pages ({} tasks, {} task workers, {} detail workers, up to {} connections)",
                request.keywords.len(),
                request.pages,
                tasks_total,
                self.workers.task_workers,
                self.workers.detail_workers,
                self.workers.max_connections()
            );
            self.context.clear_last_response();

            let (mut records, tasks_completed, blocked) =
                self.run_tasks(tasks, stop, &progress).await;

            let before = records.len();
            if let Some(window) = &request.window {
                records.retain(|r| window.admits(r));
            }
            let filtered_by_window = before - records.len();

            let state = if blocked {
                ScanState::Blocked
            } else if tasks_completed < tasks_total {
                ScanState::Stopped
            } else {
                ScanState::Completed
            };

            match state {
                ScanState::Blocked => tracing::error!("{BLOCK_ADVICE}"),
                ScanState::Stopped => tracing::warn!(
                    "Scan stopped after {tasks_completed}/{tasks_total} tasks; keeping partial results"
                ),
                _ => {}
            }
            tracing::info!(
                "Scan finished: {:?}, {} records ({} outside publish window)",
                state,
                records.len(),
                filtered_by_window
            );
            for health in self.context.proxies().snapshot() {
                tracing::debug!(
                    "Proxy {}: {} ok, fail score {}",
                    health.address,
                    health.success_count,
                    health.fail_count
                );
            }

            ScanReport {
                scan_id,
                state,
                records,
                tasks_total,
                tasks_completed,
                filtered_by_window,
            }
        }
        .instrument(span)
        .await;

        self.set_state(report.state);
        Ok(report)
    }

    /// Run tasks on the task pool. Returns records, tasks run, and whether a
    /// block was detected.
    async fn run_tasks(
        &self,
        tasks: Vec<(String, u32)>,
        stop: &StopSignal,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> (Vec<VideoRecord>, usize, bool) {
        let total = tasks.len();
        let done = AtomicUsize::new(0);
        let blocked = AtomicBool::new(false);

        let runs: Vec<TaskRun> = stream::iter(tasks)
            .map(|(keyword, page)| {
                let done = &done;
                let blocked = &blocked;
                async move {
                    if stop.is_stopped() {
                        return TaskRun::Skipped;
                    }
                    let outcome = self.collect_page(&keyword, page).await;
                    if outcome == TaskOutcome::Blocked {
                        blocked.store(true, Ordering::SeqCst);
                        stop.stop();
                    }
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(finished, total);
                    TaskRun::Done(outcome)
                }
            })
            .buffer_unordered(self.workers.task_workers)
            .collect()
            .await;

        let mut records = Vec::new();
        let mut completed = 0;
        for run in runs {
            match run {
                TaskRun::Done(TaskOutcome::Records(mut batch)) => {
                    completed += 1;
                    records.append(&mut batch);
                }
                TaskRun::Done(TaskOutcome::Blocked) => completed += 1,
                TaskRun::Skipped => {}
            }
        }

        (records, completed, blocked.load(Ordering::SeqCst))
    }

    /// Run one (keyword, page) task.
    pub async fn collect_page(&self, keyword: &str, page: u32) -> TaskOutcome {
        let hits = match self.source.search(keyword, page).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Search for '{keyword}' page {page} failed ({}): {e}", e.kind());
                Vec::new()
            }
        };

        if hits.is_empty() {
            if self.context.last_was_block() {
                tracing::error!("Search for '{keyword}' page {page} was blocked by the platform");
                return TaskOutcome::Blocked;
            }
            tracing::info!("Search for '{keyword}' page {page} returned no results");
            return TaskOutcome::Records(Vec::new());
        }

        let (order, by_id) = dedupe_hits(hits);
        let details = self.fetch_details(keyword, page, &order).await;

        let records: Vec<VideoRecord> = order
            .iter()
            .filter_map(|id| {
                let hit = by_id.get(id)?;
                let detail = details.get(id).cloned().unwrap_or_default();
                VideoRecord::merge(hit, &detail, keyword)
            })
            .collect();

        tracing::info!(
            "Search for '{keyword}' page {page} produced {} records",
            records.len()
        );
        TaskOutcome::Records(records)
    }

    /// Fetch details on the detail pool; failures become empty details.
    async fn fetch_details(
        &self,
        keyword: &str,
        page: u32,
        ids: &[String],
    ) -> HashMap<String, DetailRecord> {
        let details: HashMap<String, DetailRecord> = stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let detail = match self.source.detail(&id).await {
                    Ok(detail) => detail,
                    Err(e) => {
                        tracing::warn!(
                            "Detail for {id} ('{keyword}' page {page}) failed ({}): {e}",
                            e.kind()
                        );
                        DetailRecord::default()
                    }
                };
                (id, detail)
            })
            .buffer_unordered(self.workers.detail_workers)
            .collect()
            .await;

        let empty = details.values().filter(|d| d.is_empty()).count();
        if empty > 0 {
            tracing::debug!(
                "'{keyword}' page {page}: {empty}/{} items kept with empty details",
                details.len()
            );
        }
        details
    }
}

/// Drop hits without identifiers and keep the first hit per identifier, in
/// original order.
fn dedupe_hits(hits: Vec<SearchHit>) -> (Vec<String>, HashMap<String, SearchHit>) {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut by_id = HashMap::new();
    for hit in hits {
        let Some(id) = hit.identifier.clone() else {
            continue;
        };
        if seen.insert(id.clone()) {
            order.push(id.clone());
            by_id.insert(id, hit);
        }
    }
    (order, by_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::crawl::error::FetchError;
    use crate::crawl::fetch::LastResponse;
    use crate::crawl::types::{Owner, VideoStat};

    fn hit(id: Option<&str>, title: &str) -> SearchHit {
        SearchHit {
            identifier: id.map(str::to_string),
            title: title.to_string(),
            ..SearchHit::default()
        }
    }

    fn detail_for(id: &str) -> DetailRecord {
        DetailRecord {
            title: None,
            description: Some(format!("desc of {id}")),
            published_at: Some(1_700_000_000),
            owner: Some(Owner {
                creator_id: format!("owner-{id}"),
                display_name: format!("Owner {id}"),
            }),
            stat: Some(VideoStat {
                views: 100,
                likes: 10,
                favorites: 1,
            }),
        }
    }

    /// Fake source: fixed hits per page, optional failing details, optional block.
    struct FakeSource {
        hits: Vec<SearchHit>,
        failing_details: HashSet<String>,
        block: bool,
        hang: bool,
        context: Arc<FetchContext>,
        detail_calls: AtomicU32,
        searches: AtomicU32,
    }

    impl FakeSource {
        fn new(hits: Vec<SearchHit>, context: Arc<FetchContext>) -> Self {
            Self {
                hits,
                failing_details: HashSet::new(),
                block: false,
                hang: false,
                context,
                detail_calls: AtomicU32::new(0),
                searches: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VideoSource for FakeSource {
        async fn search(&self, _keyword: &str, _page: u32) -> Result<Vec<SearchHit>, FetchError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.block {
                self.context.record(LastResponse::Failure {
                    status: 412,
                    body: String::new(),
                });
                return Err(FetchError::HttpStatus {
                    status: 412,
                    url: "search".to_string(),
                });
            }
            self.context.record(LastResponse::Success { status: 200 });
            Ok(self.hits.clone())
        }

        async fn detail(&self, identifier: &str) -> Result<DetailRecord, FetchError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_details.contains(identifier) {
                return Err(FetchError::HttpStatus {
                    status: 500,
                    url: "detail".to_string(),
                });
            }
            Ok(detail_for(identifier))
        }
    }

    fn crawler(source: FakeSource, context: Arc<FetchContext>) -> (Crawler, Arc<FakeSource>) {
        let source = Arc::new(source);
        let dyn_source: Arc<dyn VideoSource> = Arc::clone(&source) as Arc<dyn VideoSource>;
        (
            Crawler::new(dyn_source, context, WorkerConfig::new(2, 3)),
            source,
        )
    }

    #[tokio::test]
    async fn test_duplicate_hits_emit_one_record() {
        let ctx = Arc::new(FetchContext::new());
        let source = FakeSource::new(
            vec![
                hit(Some("BV1"), "first"),
                hit(None, "no id"),
                hit(Some("BV2"), "second"),
                hit(Some("BV1"), "dup"),
            ],
            Arc::clone(&ctx),
        );
        let (crawler, source) = crawler(source, ctx);

        let TaskOutcome::Records(records) = crawler.collect_page("kw", 1).await else {
            panic!("expected records");
        };
        let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["BV1", "BV2"]);
        assert_eq!(records[0].title, "first");
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_detail_keeps_item_with_empty_fields() {
        let ctx = Arc::new(FetchContext::new());
        let mut source = FakeSource::new(
            vec![hit(Some("BV1"), "ok"), hit(Some("BV2"), "broken")],
            Arc::clone(&ctx),
        );
        source.failing_details.insert("BV2".to_string());
        let (crawler, _) = crawler(source, ctx);

        let records = crawler.collect("kw", 1).await;
        assert_eq!(records.len(), 2);
        let broken = records
            .iter()
            .find(|r| r.identifier == "BV2")
            .unwrap_or_else(|| panic!("missing BV2"));
        assert!(broken.owner.is_none());
        assert!(broken.stat.is_none());
        assert_eq!(broken.title, "broken");

        let ok = records
            .iter()
            .find(|r| r.identifier == "BV1")
            .unwrap_or_else(|| panic!("missing BV1"));
        assert_eq!(ok.owner.as_ref().map(|o| o.creator_id.as_str()), Some("owner-BV1"));

        assert!(DetailRecord::default().is_empty());
        assert!(!detail_for("BV1").is_empty());
    }

    #[tokio::test]
    async fn test_scan_completes_all_tasks() {
        let ctx = Arc::new(FetchContext::new());
        let source = FakeSource::new(vec![hit(Some("BV1"), "a")], Arc::clone(&ctx));
        let (crawler, source) = crawler(source, ctx);
        assert_eq!(crawler.state(), ScanState::Idle);

        let request = ScanRequest::new(["k1", "k2"], 2);
        let progress_calls = AtomicUsize::new(0);
        let report = crawler
            .scan_with_progress(&request, &StopSignal::new(), |_, total| {
                assert_eq!(total, 4);
                progress_calls.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(report.state, ScanState::Completed);
        assert_eq!(report.tasks_total, 4);
        assert_eq!(report.tasks_completed, 4);
        assert_eq!(report.records.len(), 4);
        assert_eq!(progress_calls.load(Ordering::SeqCst), 4);
        assert_eq!(source.searches.load(Ordering::SeqCst), 4);
        assert_eq!(crawler.state(), ScanState::Completed);
    }

    #[tokio::test]
    async fn test_stopped_scan_runs_no_tasks_and_returns() {
        let ctx = Arc::new(FetchContext::new());
        let source = FakeSource::new(vec![hit(Some("BV1"), "a")], Arc::clone(&ctx));
        let (crawler, source) = crawler(source, ctx);

        let stop = StopSignal::new();
        stop.stop();
        let report = crawler
            .scan(&ScanRequest::new(["k1"], 3), &stop)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(report.state, ScanState::Stopped);
        assert!(report.records.is_empty());
        assert_eq!(source.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_block_stops_scan() {
        let ctx = Arc::new(FetchContext::new());
        let mut source = FakeSource::new(vec![hit(Some("BV1"), "a")], Arc::clone(&ctx));
        source.block = true;
        let source = Arc::new(source);
        let dyn_source: Arc<dyn VideoSource> = Arc::clone(&source) as Arc<dyn VideoSource>;
        // A single task worker makes the stop observable before the next task.
        let crawler = Crawler::new(dyn_source, ctx, WorkerConfig::new(1, 1));

        let stop = StopSignal::new();
        let report = crawler
            .scan(&ScanRequest::new(["k1", "k2", "k3"], 2), &stop)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(report.state, ScanState::Blocked);
        assert!(report.state.is_partial());
        assert!(stop.is_stopped());
        assert_eq!(report.tasks_completed, 1);
        assert_eq!(source.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_page_without_block_is_not_fatal() {
        let ctx = Arc::new(FetchContext::new());
        let source = FakeSource::new(Vec::new(), Arc::clone(&ctx));
        let (crawler, _) = crawler(source, ctx);
        let report = crawler
            .scan(&ScanRequest::new(["k1"], 2), &StopSignal::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(report.state, ScanState::Completed);
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn test_publish_window_filters_records() {
        let ctx = Arc::new(FetchContext::new());
        let source = FakeSource::new(vec![hit(Some("BV1"), "a")], Arc::clone(&ctx));
        let (crawler, _) = crawler(source, ctx);

        let window = PublishWindow {
            start: Utc.timestamp_opt(1_800_000_000, 0).single().unwrap_or_default(),
            end: Utc.timestamp_opt(1_900_000_000, 0).single().unwrap_or_default(),
        };
        let request = ScanRequest::new(["k1"], 1).with_window(window);
        let report = crawler
            .scan(&request, &StopSignal::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(report.records.is_empty());
        assert_eq!(report.filtered_by_window, 1);
    }

    #[tokio::test]
    async fn test_scan_rejects_empty_keywords() {
        let ctx = Arc::new(FetchContext::new());
        let source = FakeSource::new(Vec::new(), Arc::clone(&ctx));
        let (crawler, _) = crawler(source, ctx);
        let result = crawler
            .scan(&ScanRequest::new(["  "], 1), &StopSignal::new())
            .await;
        assert!(matches!(result, Err(ScanError::NoKeywords)));
        assert_eq!(crawler.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_dropped_scan_releases_crawler() {
        let ctx = Arc::new(FetchContext::new());
        let mut source = FakeSource::new(vec![hit(Some("BV1"), "t")], Arc::clone(&ctx));
        source.hang = true;
        let (crawler, _) = crawler(source, ctx);
        let request = ScanRequest::new(["k"], 1);
        let stop = StopSignal::new();

        let first =
            tokio::time::timeout(Duration::from_millis(50), crawler.scan(&request, &stop)).await;
        assert!(first.is_err());
        assert_eq!(crawler.state(), ScanState::Stopped);

        // A new scan starts instead of being rejected as already running.
        let second =
            tokio::time::timeout(Duration::from_millis(50), crawler.scan(&request, &stop)).await;
        assert!(second.is_err());
    }

    #[test]
    fn test_request_dedupes_keywords() {
        let request = ScanRequest::new(["深渊", " 战场 ", "深渊", "", "战场"], 1);
        assert_eq!(request.keywords, vec!["深渊".to_string(), "战场".to_string()]);
        assert_eq!(request.tasks().len(), 2);
    }

    #[test]
    fn test_request_tasks_order() {
        let request = ScanRequest::new(["a", "b"], 2);
        assert_eq!(
            request.tasks(),
            vec![
                ("a".to_string(), 1),
                ("a".to_string(), 2),
                ("b".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
        assert_eq!(ScanRequest::new(["a"], 0).pages, 1);
    }
}
