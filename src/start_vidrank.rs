//! Command-line entry for vidrank.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::crawl::orchestrator::{PublishWindow, ScanRequest, ScanState, StopSignal};
use crate::crawl::proxy::probe_proxy;
use crate::crawl::proxy_source::discover_from_pools;
use crate::llm::build_judge;
use crate::pipeline::{Pipeline, RunReport};
use crate::ranking::export::ExportedBoard;
use crate::settings::Settings;

/// Keyword crawler and creator leaderboards.
#[derive(Debug, Parser)]
#[command(name = "vidrank", version, about)]
pub struct Cli {
    /// Settings file (defaults to $VIDRANK_CONFIG or ./vidrank.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl, rank and write the leaderboards as JSON.
    Scan {
        /// Search keyword (repeatable); settings keywords when omitted.
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
        /// Pages per keyword.
        #[arg(short, long)]
        pages: Option<u32>,
        /// Earliest publish date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Latest publish date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Outlier threshold in standard deviations.
        #[arg(long)]
        sigma: Option<f64>,
        /// Skip judgements even if enabled in settings.
        #[arg(long)]
        no_llm: bool,
        /// Output file.
        #[arg(short, long, default_value = "vidrank-ranking.json")]
        output: PathBuf,
    },
    /// Test proxies from the settings or the given list.
    Proxies {
        /// Comma-separated proxies (or pool endpoints with --pool).
        #[arg(long)]
        list: Option<String>,
        /// Treat entries as pool-service endpoints to discover from.
        #[arg(long)]
        pool: bool,
        /// Probe timeout in seconds.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
    /// Check that the configured judgement service answers.
    TestLlm,
    /// Write a settings file with default values.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Parse arguments and run.
///
/// # Returns
/// `ExitCode::SUCCESS` on success, `1` on failure, `2` when the platform blocked the scan.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("vidrank v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match rt.block_on(execute(cli)) {
        Ok(ScanState::Blocked) => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Run one command. Returns the scan state for `scan`, `Completed` otherwise.
///
/// # Errors
/// Returns an error if the command fails.
pub async fn execute(cli: Cli) -> anyhow::Result<ScanState> {
    let path = cli.config.unwrap_or_else(Settings::default_path);

    match cli.command {
        Command::InitConfig { force } => {
            init_config(&path, force)?;
            Ok(ScanState::Completed)
        }
        Command::TestLlm => {
            test_llm(&Settings::load(&path).with_env_overrides()).await?;
            Ok(ScanState::Completed)
        }
        Command::Proxies {
            list,
            pool,
            timeout,
        } => {
            let mut settings = Settings::load(&path);
            if let Some(list) = list {
                settings.proxies = list;
            }
            settings.use_proxypool = settings.use_proxypool || pool;
            test_proxies(&settings, Duration::from_secs(timeout)).await?;
            Ok(ScanState::Completed)
        }
        Command::Scan {
            keywords,
            pages,
            since,
            until,
            sigma,
            no_llm,
            output,
        } => {
            let mut settings = Settings::load(&path).with_env_overrides();
            if !keywords.is_empty() {
                settings.keywords = keywords;
            }
            if let Some(pages) = pages {
                settings.pages = pages;
            }
            if sigma.is_some() {
                settings.outlier_sigma = sigma;
            }
            if no_llm {
                settings.use_llm = false;
            }
            let window = publish_window(since, until)?;
            scan(&settings, window, &output).await
        }
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Settings::default()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Wrote default settings to {}", path.display());
    Ok(())
}

async fn test_llm(settings: &Settings) -> anyhow::Result<()> {
    let Some(config) = settings.llm_config() else {
        bail!("judgements are disabled (set use_llm and provider in the settings file)");
    };
    let Some(judge) = build_judge(&config)? else {
        bail!("no judgement provider configured");
    };
    judge
        .test_connection()
        .await
        .with_context(|| format!("{} connection test failed", judge.name()))?;
    tracing::info!("{} connection OK", judge.name());
    Ok(())
}

async fn test_proxies(settings: &Settings, timeout: Duration) -> anyhow::Result<()> {
    let mut candidates = settings.proxy_entries();
    if candidates.is_empty() {
        bail!("no proxies configured");
    }
    if settings.use_proxypool {
        tracing::info!("Discovering proxies from {} pool endpoints", candidates.len());
        candidates = discover_from_pools(&candidates).await;
        if candidates.is_empty() {
            bail!("no proxies discovered from the pool endpoints");
        }
    }

    let config = settings.crawl_config();
    let mut reachable = 0;
    for address in &candidates {
        if probe_proxy(address, &config, timeout).await {
            reachable += 1;
            tracing::info!("{address} OK");
        } else {
            tracing::warn!("{address} unreachable");
        }
    }
    tracing::info!("{reachable}/{} proxies reachable", candidates.len());
    Ok(())
}

/// Turn optional dates into an inclusive UTC window.
fn publish_window(
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> anyhow::Result<Option<PublishWindow>> {
    if since.is_none() && until.is_none() {
        return Ok(None);
    }
    let start = since
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    let end = until
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
    if start > end {
        bail!("--since is after --until");
    }
    Ok(Some(PublishWindow { start, end }))
}

#[derive(Serialize)]
struct RankingOutput {
    scan_id: Uuid,
    state: ScanState,
    tasks_total: usize,
    tasks_completed: usize,
    records: usize,
    creators: usize,
    boards: Vec<ExportedBoard>,
}

impl From<&RunReport> for RankingOutput {
    fn from(report: &RunReport) -> Self {
        Self {
            scan_id: report.scan.scan_id,
            state: report.scan.state,
            tasks_total: report.scan.tasks_total,
            tasks_completed: report.scan.tasks_completed,
            records: report.scan.records.len(),
            creators: report.creators,
            boards: report.boards.iter().map(ExportedBoard::from).collect(),
        }
    }
}

async fn scan(
    settings: &Settings,
    window: Option<PublishWindow>,
    output: &Path,
) -> anyhow::Result<ScanState> {
    let pipeline = Pipeline::from_settings(settings)
        .await
        .context("building pipeline")?;

    let mut request = ScanRequest::new(settings.keywords.clone(), settings.pages);
    if let Some(window) = window {
        request = request.with_window(window);
    }

    let stop = StopSignal::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight tasks");
            ctrl_c_stop.stop();
        }
    });

    let report = pipeline
        .run(&request, &stop, |done, total| {
            tracing::info!("Progress: {done}/{total} tasks");
        })
        .await?;

    let text = serde_json::to_string_pretty(&RankingOutput::from(&report))?;
    std::fs::write(output, text).with_context(|| format!("writing {}", output.display()))?;
    tracing::info!("Wrote leaderboards to {}", output.display());

    Ok(report.scan.state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_scan() {
        let cli = Cli::try_parse_from([
            "vidrank", "scan", "-k", "崩坏3 深渊", "-k", "崩坏3 战场", "--pages", "2", "--since",
            "2024-01-01", "--no-llm",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        let Command::Scan {
            keywords,
            pages,
            since,
            no_llm,
            ..
        } = cli.command
        else {
            panic!("expected scan");
        };
        assert_eq!(keywords.len(), 2);
        assert_eq!(pages, Some(2));
        assert_eq!(since, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(no_llm);
    }

    #[test]
    fn test_publish_window() {
        assert!(matches!(publish_window(None, None), Ok(None)));
        let day = NaiveDate::from_ymd_opt(2024, 5, 1);
        let window = publish_window(day, day)
            .unwrap_or_else(|e| panic!("{e}"))
            .unwrap_or_else(|| panic!("expected window"));
        assert_eq!((window.end - window.start).num_seconds(), 86_399);
        assert!(publish_window(NaiveDate::from_ymd_opt(2024, 6, 1), day).is_err());
    }

    #[tokio::test]
    async fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("vidrank.json");
        let cli = || Cli {
            config: Some(path.clone()),
            command: Command::InitConfig { force: false },
        };
        assert!(execute(cli()).await.is_ok());
        assert!(path.exists());
        assert!(execute(cli()).await.is_err());
    }
}
