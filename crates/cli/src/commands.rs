//! Command handlers.

use crate::cached::CachedApi;
use crate::members::{MemberOptions, MembersScraper};
use crate::orchestrator::{ScrapeOptions, Scraper};
use crate::scheduler::Scheduler;
use crate::stats::RunStats;
use crate::storage::OutputTree;
use anyhow::{Context as _, Result};
use bytes::Bytes;
use sejmbot_client::{ClientConfig, ContentPipeline, Endpoint, Notifier, SejmClient, Term, guess_meeting_number};
use sejmbot_core::cache::JsonFileBackend;
use sejmbot_core::{AppConfig, CacheScope, CacheStore, SystemClock};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Exit code for runs that finished with counted failures.
const PARTIAL_FAILURE: u8 = 2;

/// Shared state for every command.
pub struct Context {
    pub config: AppConfig,
    pub no_cache: bool,
}

impl Context {
    pub fn new(config: AppConfig, no_cache: bool) -> Self {
        Self { config, no_cache }
    }

    fn term(&self, term: Option<u32>) -> u32 {
        term.unwrap_or(self.config.default_term)
    }

    fn client(&self) -> Result<SejmClient> {
        SejmClient::new(ClientConfig::from(&self.config)).context("failed to build API client")
    }

    fn store(&self) -> CacheStore {
        CacheStore::open(Box::new(JsonFileBackend::new(self.config.cache_dir())), Arc::new(SystemClock))
    }

    fn tree(&self) -> OutputTree {
        OutputTree::new(&self.config.output_dir)
    }

    fn cached<'a>(&self, client: &'a SejmClient) -> CachedApi<'a> {
        CachedApi::new(client, self.config.api_cache_ttl()).bypassing(self.no_cache)
    }

    /// State file path; relative paths live under the output directory.
    fn state_file(&self) -> PathBuf {
        if self.config.state_file.is_absolute() {
            self.config.state_file.clone()
        } else {
            self.config.output_dir.join(&self.config.state_file)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(stats: &RunStats) -> ExitCode {
    if stats.has_errors() { ExitCode::from(PARTIAL_FAILURE) } else { ExitCode::SUCCESS }
}

pub async fn scrape(
    ctx: &Context, term: Option<u32>, proceeding: Option<u32>, force: bool, no_statements: bool, pdf: bool,
) -> Result<ExitCode> {
    let client = ctx.client()?;
    let mut store = ctx.store();
    let tree = ctx.tree();
    let options = ScrapeOptions {
        proceeding,
        force,
        fetch_full_statements: ctx.config.fetch_full_statements && !no_statements,
        fetch_pdf: pdf,
        retention: ctx.config.cache_retention(),
        ..ScrapeOptions::new(ctx.term(term))
    };

    let mut scraper = Scraper::new(ctx.cached(&client), &mut store, &tree);
    let stats = scraper.scrape_term(&options).await?.clone();
    print_json(&stats)?;
    Ok(exit_code(&stats))
}

pub async fn members(ctx: &Context, term: Option<u32>, no_photos: bool, no_voting_stats: bool) -> Result<ExitCode> {
    let client = ctx.client()?;
    let mut store = ctx.store();
    let tree = ctx.tree();
    let options = MemberOptions { photos: !no_photos, voting_stats: !no_voting_stats };

    let mut scraper = MembersScraper::new(ctx.cached(&client), &mut store, &tree);
    let result = scraper.scrape_members(ctx.term(term), options).await.map(|_| ());
    let stats = scraper.into_stats();
    store.flush()?;
    result?;
    print_json(&stats)?;
    Ok(exit_code(&stats))
}

pub async fn clubs(ctx: &Context, term: Option<u32>) -> Result<ExitCode> {
    let client = ctx.client()?;
    let mut store = ctx.store();
    let tree = ctx.tree();

    let mut scraper = MembersScraper::new(ctx.cached(&client), &mut store, &tree);
    let result = scraper.scrape_clubs(ctx.term(term)).await.map(|_| ());
    let stats = scraper.into_stats();
    store.flush()?;
    result?;
    print_json(&stats)?;
    Ok(exit_code(&stats))
}

/// What `schedule` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Once,
    Continuous,
    Status,
    Health,
    Cleanup(i64),
}

pub async fn schedule(ctx: &Context, term: Option<u32>, mode: ScheduleMode, interval: Option<u64>) -> Result<ExitCode> {
    let client = ctx.client()?;
    let mut store = ctx.store();
    let tree = ctx.tree();
    let term = ctx.term(term);

    let notifier = match ctx.config.notification_webhook()? {
        Some(webhook) => Some(Notifier::new(webhook, term, ctx.config.timeout())?),
        None => None,
    };

    let mut scheduler =
        Scheduler::new(&client, &mut store, &tree, &ctx.config, term, ctx.state_file()).with_notifier(notifier);

    match mode {
        ScheduleMode::Once => {
            let report = scheduler.run_once().await?;
            print_json(&report)?;
            Ok(exit_code(&report.stats))
        }
        ScheduleMode::Continuous => {
            let interval = match interval {
                Some(minutes) => std::time::Duration::from_secs(minutes.max(1) * 60),
                None => ctx.config.scheduler.interval(),
            };
            let stats = scheduler.run_continuous(interval).await?;
            print_json(&stats)?;
            Ok(exit_code(&stats))
        }
        ScheduleMode::Status => {
            print_json(&scheduler.status())?;
            Ok(ExitCode::SUCCESS)
        }
        ScheduleMode::Health => {
            print_json(&scheduler.health())?;
            Ok(ExitCode::SUCCESS)
        }
        ScheduleMode::Cleanup(days) => {
            let removed = scheduler.cleanup_old_state(days)?;
            print_json(&json!({ "removed_dates": removed }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

pub fn cache_stats(ctx: &Context) -> Result<ExitCode> {
    let store = ctx.store();
    let stats = store.stats();
    print_json(&json!({
        "path": ctx.config.cache_dir(),
        "stats": stats,
        "last_flush": store.metadata().last_flush,
        "last_cleanup": store.metadata().last_cleanup,
    }))?;
    Ok(ExitCode::SUCCESS)
}

pub fn cache_clean(ctx: &Context) -> Result<ExitCode> {
    let mut store = ctx.store();
    let expired = store.evict_expired();
    let old = store.evict_older_than(ctx.config.cache_retention());
    let missing = store.evict_missing_files();
    store.flush()?;
    tracing::info!(expired, old, missing, "Cache cleaned");
    print_json(&json!({ "expired": expired, "old": old, "missing_files": missing }))?;
    Ok(ExitCode::SUCCESS)
}

pub fn cache_reset(ctx: &Context, scope: &str) -> Result<ExitCode> {
    let scope: CacheScope = scope.parse()?;
    let mut store = ctx.store();
    store.reset(scope)?;
    tracing::info!(?scope, "Cache reset");
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Serialize)]
struct ExtractReport<'a> {
    file: &'a Path,
    detected_type: sejmbot_client::DocumentType,
    low_confidence: bool,
    validation: &'a sejmbot_client::ValidationReport,
    meeting: sejmbot_client::MeetingNumber,
    text: &'a str,
}

pub fn extract(file: &Path, url: Option<&str>, as_json: bool) -> Result<ExitCode> {
    let raw = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let name = file.to_string_lossy();
    let hint = url.unwrap_or(&name);

    let document = ContentPipeline::default().process(Bytes::from(raw), Some(hint), None);
    let meeting = guess_meeting_number(document.text(), Some(hint));

    if as_json {
        print_json(&ExtractReport {
            file,
            detected_type: document.detected_type(),
            low_confidence: document.is_low_confidence(),
            validation: document.validation(),
            meeting,
            text: document.text(),
        })?;
    } else {
        println!("{}", document.text());
    }
    Ok(if document.is_low_confidence() { ExitCode::from(PARTIAL_FAILURE) } else { ExitCode::SUCCESS })
}

pub async fn terms(ctx: &Context) -> Result<ExitCode> {
    let client = ctx.client()?;
    let mut store = ctx.store();
    let response = ctx.cached(&client).fetch(&mut store, &Endpoint::terms()).await?;
    store.flush()?;
    let terms: Vec<Term> = response.into_json()?.unwrap_or_default();
    print_json(&terms)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_resolution() {
        let mut config = AppConfig { output_dir: PathBuf::from("/data/sejm"), ..AppConfig::default() };
        config.state_file = PathBuf::from("scheduler_state.json");
        assert_eq!(Context::new(config.clone(), false).state_file(), PathBuf::from("/data/sejm/scheduler_state.json"));

        config.state_file = PathBuf::from("/var/lib/sejmbot/state.json");
        assert_eq!(Context::new(config, false).state_file(), PathBuf::from("/var/lib/sejmbot/state.json"));
    }

    #[test]
    fn test_extract_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42_posiedzenie.html");
        std::fs::write(&path, "<html><body><p>Posiedzenie Sejmu</p></body></html>").unwrap();

        // short text fails validation
        assert_eq!(extract(&path, None, true).unwrap(), ExitCode::from(PARTIAL_FAILURE));
    }

    #[test]
    fn test_exit_code_reflects_errors() {
        assert_eq!(exit_code(&RunStats::default()), ExitCode::SUCCESS);
        assert_eq!(exit_code(&RunStats { errors: 3, ..Default::default() }), ExitCode::from(PARTIAL_FAILURE));
    }
}
