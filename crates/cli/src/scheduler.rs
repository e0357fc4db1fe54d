//! Polling for new transcript days of current proceedings.
//!
//! The scheduler keeps its own state file with the days it has already
//! downloaded. Each cycle lists the term's proceedings, picks the current
//! ones and fetches every past day that is not in the state yet.

use crate::cached::CachedApi;
use crate::orchestrator::{DayOutcome, ScrapeOptions, Scraper};
use crate::stats::RunStats;
use crate::storage::OutputTree;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sejmbot_client::{Notifier, Proceeding, SejmApi};
use sejmbot_core::cache::CacheStats;
use sejmbot_core::config::SchedulerSettings;
use sejmbot_core::refresh::parse_dates;
use sejmbot_core::{AppConfig, CacheStore, Error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted scheduler progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Downloaded days per proceeding number.
    #[serde(default)]
    pub processed_dates: BTreeMap<u32, BTreeSet<String>>,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub term: Option<u32>,
}

impl SchedulerState {
    /// Read the state file. A missing or unreadable file yields an empty state.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read scheduler state, starting fresh");
                return Self::default();
            }
        };
        match serde_json::from_slice::<Self>(&raw) {
            Ok(state) => {
                tracing::info!(path = %path.display(), dates = state.total_dates(), "Loaded scheduler state");
                state
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt scheduler state, starting fresh");
                Self::default()
            }
        }
    }

    pub fn is_processed(&self, proceeding: u32, date: &str) -> bool {
        self.processed_dates.get(&proceeding).is_some_and(|dates| dates.contains(date))
    }

    pub fn mark_processed(&mut self, proceeding: u32, date: &str) {
        self.processed_dates.entry(proceeding).or_default().insert(date.to_string());
    }

    pub fn total_dates(&self) -> usize {
        self.processed_dates.values().map(BTreeSet::len).sum()
    }

    /// Drop days older than `cutoff`. Unparseable dates are kept.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> usize {
        let mut removed = 0;
        for dates in self.processed_dates.values_mut() {
            let before = dates.len();
            dates.retain(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").map_or(true, |day| day >= cutoff));
            removed += before - dates.len();
        }
        self.processed_dates.retain(|_, dates| !dates.is_empty());
        removed
    }
}

/// Whether a proceeding is worth polling.
///
/// Flagged `current` by the API, or any day between tomorrow and
/// `max_age_days` ago.
pub fn is_current(proceeding: &Proceeding, today: NaiveDate, max_age_days: i64) -> bool {
    if proceeding.dates.is_empty() {
        return false;
    }
    if proceeding.current {
        return true;
    }
    parse_dates(&proceeding.dates).iter().any(|day| (-1..=max_age_days).contains(&(today - *day).num_days()))
}

/// Days of `proceeding` up to today that the state does not know yet.
pub fn new_dates(proceeding: &Proceeding, state: &SchedulerState, today: NaiveDate) -> Vec<String> {
    let mut days: Vec<NaiveDate> = parse_dates(&proceeding.dates).into_iter().filter(|d| *d <= today).collect();
    days.sort();
    days.dedup();
    days.into_iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .filter(|d| !state.is_processed(proceeding.number, d))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Stale,
    Unknown,
}

pub fn health_of(last_check: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> Health {
    match last_check {
        Some(checked) if interval.checked_mul(2).is_none_or(|limit| now - checked < limit) => Health::Healthy,
        Some(_) => Health::Stale,
        None => Health::Unknown,
    }
}

/// Days downloaded for one proceeding in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDownloads {
    pub proceeding: u32,
    pub title: String,
    pub dates: Vec<String>,
}

/// Result of one polling cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub current_proceedings: usize,
    pub downloads: Vec<NewDownloads>,
    pub stats: RunStats,
}

impl CycleReport {
    pub fn downloaded_days(&self) -> usize {
        self.downloads.iter().map(|d| d.dates.len()).sum()
    }
}

pub fn notification_message(term: u32, downloads: &[NewDownloads], now: DateTime<Utc>) -> String {
    let total: usize = downloads.iter().map(|d| d.dates.len()).sum();
    let mut message = format!("Nowe stenogramy z Sejmu RP (kadencja {term})\n\nPobrano łącznie: {total} transkryptów\n");
    for download in downloads {
        let title = if download.title.chars().count() > 50 {
            format!("{}...", download.title.chars().take(50).collect::<String>())
        } else {
            download.title.clone()
        };
        message.push_str(&format!("• Posiedzenie {}: {}\n  {title}\n", download.proceeding, download.dates.join(", ")));
    }
    message.push_str(&format!("\nCzas: {}", now.format("%Y-%m-%d %H:%M:%S")));
    message
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub term: u32,
    pub last_check: Option<DateTime<Utc>>,
    pub processed_proceedings: usize,
    pub total_processed_dates: usize,
    pub state_file: PathBuf,
    pub state_file_exists: bool,
    pub cache: CacheStats,
    pub config: SchedulerSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: Health,
    pub term: u32,
    pub last_check: Option<DateTime<Utc>>,
    pub hours_since_check: Option<f64>,
    pub processed_proceedings: usize,
    pub total_processed_dates: usize,
}

pub struct Scheduler<'a> {
    api: &'a dyn SejmApi,
    store: &'a mut CacheStore,
    tree: &'a OutputTree,
    term: u32,
    settings: SchedulerSettings,
    api_cache_ttl: Duration,
    retention: Duration,
    fetch_full_statements: bool,
    notifier: Option<Notifier>,
    state_path: PathBuf,
    state: SchedulerState,
}

impl<'a> Scheduler<'a> {
    /// Load the state file and build a scheduler for `term`.
    pub fn new(
        api: &'a dyn SejmApi, store: &'a mut CacheStore, tree: &'a OutputTree, config: &AppConfig, term: u32,
        state_path: PathBuf,
    ) -> Self {
        let mut state = SchedulerState::load(&state_path);
        if state.term.is_some_and(|t| t != term) {
            tracing::warn!(previous = ?state.term, term, "State file belongs to another term, starting fresh");
            state = SchedulerState::default();
        }
        state.term = Some(term);
        tracing::info!(term, interval_minutes = config.scheduler.interval_minutes, "Scheduler ready");

        Self {
            api,
            store,
            tree,
            term,
            settings: config.scheduler.clone(),
            api_cache_ttl: config.api_cache_ttl(),
            retention: config.cache_retention(),
            fetch_full_statements: config.fetch_full_statements,
            notifier: None,
            state_path,
            state,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn save_state(&self) -> Result<(), Error> {
        self.tree.write_json(&self.state_path, &self.state)
    }

    async fn notify(&self, text: &str) {
        if let Some(notifier) = &self.notifier
            && let Err(e) = notifier.send(text).await
        {
            tracing::warn!(error = %e, "Notification failed");
        }
    }

    /// Run one polling cycle.
    pub async fn run_once(&mut self) -> Result<CycleReport, Error> {
        tracing::info!(term = self.term, "Checking for new transcripts");
        match self.check().await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(term = self.term, error = %e, "Scheduler cycle failed");
                self.notify(&format!("Błąd schedulera kadencji {}: {e}", self.term)).await;
                Err(e)
            }
        }
    }

    async fn check(&mut self) -> Result<CycleReport, Error> {
        let term = self.term;
        let today = self.store.clock().today();
        let now = self.store.clock().now();
        let options = ScrapeOptions {
            fetch_full_statements: self.fetch_full_statements,
            retention: self.retention,
            ..ScrapeOptions::new(term)
        };

        let mut report = CycleReport::default();
        let api = CachedApi::new(self.api, self.api_cache_ttl);
        let mut scraper = Scraper::new(api, self.store, self.tree);
        scraper.store().evict_expired();

        let proceedings = scraper.proceedings(term, true).await?;
        let current: Vec<Proceeding> = proceedings
            .into_iter()
            .filter(|p| is_current(p, today, self.settings.max_proceeding_age_days))
            .collect();
        report.current_proceedings = current.len();
        tracing::info!(term, current = current.len(), "Current proceedings");

        for proceeding in &current {
            let dates = new_dates(proceeding, &self.state, today);
            if dates.is_empty() {
                tracing::debug!(proceeding = proceeding.number, "No new days");
                continue;
            }
            tracing::info!(proceeding = proceeding.number, dates = ?dates, "New days to fetch");

            let mut downloaded = Vec::new();
            for date in dates {
                match scraper.process_day(term, proceeding, &date, &options).await {
                    Ok(DayOutcome::Saved { .. }) => {
                        self.state.mark_processed(proceeding.number, &date);
                        downloaded.push(date);
                    }
                    Ok(DayOutcome::Unavailable) => {}
                    Err(e) => scraper.record_day_failure(proceeding.number, &date, &e),
                }
            }

            if !downloaded.is_empty() {
                report.downloads.push(NewDownloads {
                    proceeding: proceeding.number,
                    title: proceeding.title.clone(),
                    dates: downloaded,
                });
            }
        }

        scraper.finish(term, self.retention)?;
        report.stats = scraper.take_stats();

        if report.downloads.is_empty() {
            tracing::info!(term, "No new transcripts");
        } else {
            tracing::info!(term, days = report.downloaded_days(), "Downloaded new transcripts");
            self.notify(&notification_message(term, &report.downloads, now)).await;
        }

        self.state.last_check = Some(now);
        self.save_state()?;
        Ok(report)
    }

    /// Poll every `interval` until Ctrl-C.
    pub async fn run_continuous(&mut self, interval: std::time::Duration) -> Result<RunStats, Error> {
        self.run_until(interval, tokio::signal::ctrl_c()).await
    }

    /// Poll every `interval` until `shutdown` completes, either mid-cycle or
    /// while sleeping.
    pub async fn run_until<F: Future>(
        &mut self, interval: std::time::Duration, shutdown: F,
    ) -> Result<RunStats, Error> {
        tracing::info!(term = self.term, minutes = interval.as_secs() / 60, "Scheduler running");
        let mut total = RunStats::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.run_once() => match result {
                    Ok(report) => total.merge(&report.stats),
                    Err(_) => total.errors += 1,
                },
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("Scheduler stopped");
        Ok(total)
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            term: self.term,
            last_check: self.state.last_check,
            processed_proceedings: self.state.processed_dates.len(),
            total_processed_dates: self.state.total_dates(),
            state_file: self.state_path.clone(),
            state_file_exists: self.state_path.exists(),
            cache: self.store.stats(),
            config: self.settings.clone(),
        }
    }

    pub fn health(&self) -> HealthReport {
        let now = self.store.clock().now();
        let interval = Duration::from_std(self.settings.interval()).unwrap_or(Duration::MAX);
        HealthReport {
            status: health_of(self.state.last_check, now, interval),
            term: self.term,
            last_check: self.state.last_check,
            hours_since_check: self.state.last_check.map(|checked| (now - checked).num_seconds() as f64 / 3600.0),
            processed_proceedings: self.state.processed_dates.len(),
            total_processed_dates: self.state.total_dates(),
        }
    }

    /// Forget downloaded days older than `days` and drop expired cache entries.
    pub fn cleanup_old_state(&mut self, days: i64) -> Result<usize, Error> {
        let expired = self.store.evict_expired();
        let cutoff = self.store.clock().today() - Duration::days(days);
        let removed = self.state.prune_before(cutoff);
        tracing::info!(removed, expired, %cutoff, "Cleaned scheduler state");
        if removed > 0 {
            self.save_state()?;
        }
        if expired > 0 {
            self.store.flush()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sejmbot_client::MockSejmApi;
    use sejmbot_core::ManualClock;
    use serde_json::json;
    use std::sync::Arc;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn proceeding(value: serde_json::Value) -> Proceeding {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_is_current() {
        let today = day("2024-05-10");
        assert!(is_current(&proceeding(json!({"number": 1, "dates": ["2024-05-11"]})), today, 7));
        assert!(is_current(&proceeding(json!({"number": 1, "dates": ["2024-05-03"]})), today, 7));
        assert!(!is_current(&proceeding(json!({"number": 1, "dates": ["2024-05-02"]})), today, 7));
        assert!(!is_current(&proceeding(json!({"number": 1, "dates": ["2024-05-20"]})), today, 7));
        assert!(is_current(&proceeding(json!({"number": 1, "dates": ["2023-01-01"], "current": true})), today, 7));
        assert!(!is_current(&proceeding(json!({"number": 1, "dates": [], "current": true})), today, 7));
    }

    #[test]
    fn test_new_dates_skip_processed_and_future() {
        let mut state = SchedulerState::default();
        state.mark_processed(4, "2024-05-08");
        let p = proceeding(json!({"number": 4, "dates": ["2024-05-11", "2024-05-09", "2024-05-08", "zla"]}));
        assert_eq!(new_dates(&p, &state, day("2024-05-10")), vec!["2024-05-09"]);
    }

    #[test]
    fn test_health() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let interval = Duration::minutes(30);
        assert_eq!(health_of(None, now, interval), Health::Unknown);
        assert_eq!(health_of(Some(now - Duration::minutes(59)), now, interval), Health::Healthy);
        assert_eq!(health_of(Some(now - Duration::minutes(61)), now, interval), Health::Stale);
    }

    #[test]
    fn test_notification_message() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let downloads = vec![NewDownloads {
            proceeding: 12,
            title: "12. Posiedzenie Sejmu Rzeczypospolitej Polskiej w dniach 8, 9 i 10 maja 2024 r.".into(),
            dates: vec!["2024-05-08".into(), "2024-05-09".into()],
        }];
        let message = notification_message(10, &downloads, now);
        assert!(message.starts_with("Nowe stenogramy z Sejmu RP (kadencja 10)"));
        assert!(message.contains("Pobrano łącznie: 2 transkryptów"));
        assert!(message.contains("• Posiedzenie 12: 2024-05-08, 2024-05-09"));
        assert!(message.contains("\n  12. Posiedzenie Sejmu Rzeczypospolitej Polskiej w ...\n"));
        assert!(message.ends_with("Czas: 2024-05-10 12:00:00"));
    }

    #[test]
    fn test_state_fails_open_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler_state.json");
        fs::write(&path, b"{not json").unwrap();
        assert_eq!(SchedulerState::load(&path), SchedulerState::default());

        let mut state = SchedulerState::default();
        state.mark_processed(1, "2024-01-01");
        state.mark_processed(1, "inna");
        state.mark_processed(2, "2024-01-02");
        state.mark_processed(3, "2024-05-01");
        assert_eq!(state.prune_before(day("2024-04-01")), 2);
        assert_eq!(state.total_dates(), 2);
        assert!(!state.processed_dates.contains_key(&2));
    }

    #[tokio::test]
    async fn test_run_once_fetches_only_new_days() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::new(dir.path().join("out"));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()));
        let mut store = CacheStore::in_memory(clock.clone());
        let api = MockSejmApi::new()
            .with_json(
                "/sejm/term10/proceedings",
                json!([
                    {"number": 3, "title": "3. Posiedzenie", "dates": ["2024-03-01"]},
                    {"number": 5, "title": "5. Posiedzenie", "dates": ["2024-05-09", "2024-05-10", "2024-05-11"]},
                ]),
            )
            .with_json(
                "/sejm/term10/proceedings/5/2024-05-09/transcripts",
                json!({"statements": [{"num": 1, "name": "Marszałek"}]}),
            );
        let config = AppConfig { fetch_full_statements: false, ..AppConfig::default() };
        let state_path = dir.path().join("scheduler_state.json");

        let mut scheduler = Scheduler::new(&api, &mut store, &tree, &config, 10, state_path.clone());
        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.current_proceedings, 1);
        assert_eq!(report.downloaded_days(), 1);
        assert_eq!(report.stats.days_unavailable, 1);
        let saved = SchedulerState::load(&state_path);
        assert!(saved.is_processed(5, "2024-05-09"));
        assert!(!saved.is_processed(5, "2024-05-10"));
        assert_eq!(scheduler.health().status, Health::Healthy);

        scheduler.run_once().await.unwrap();
        assert_eq!(api.call_count("/sejm/term10/proceedings"), 2);
        assert_eq!(api.call_count("/sejm/term10/proceedings/5/2024-05-09/transcripts"), 1);
        assert_eq!(api.call_count("/sejm/term10/proceedings/5/2024-05-10/transcripts"), 2);
        assert_eq!(api.call_count("/sejm/term10/proceedings/5/2024-05-11/transcripts"), 0);
        assert_eq!(api.call_count("/sejm/term10/proceedings/3/2024-03-01/transcripts"), 0);

        let saved = SchedulerState::load(&state_path);
        assert_eq!(saved.term, Some(10));
        assert!(saved.last_check.is_some());
        assert!(tree.transcript_json(10, 5, Some("2024-05-09"), "2024-05-09").exists());
    }

    #[tokio::test]
    async fn test_failed_day_is_counted_and_retried_next_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::new(dir.path());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()));
        let mut store = CacheStore::in_memory(clock);
        let api = MockSejmApi::new()
            .with_json(
                "/sejm/term10/proceedings",
                json!([{"number": 5, "title": "5. Posiedzenie", "dates": ["2024-05-09"]}]),
            )
            .with_error("/sejm/term10/proceedings/5/2024-05-09/transcripts", || Error::Timeout("slow".into()));
        let config = AppConfig { fetch_full_statements: false, ..AppConfig::default() };
        let state_path = dir.path().join("state.json");

        let mut scheduler = Scheduler::new(&api, &mut store, &tree, &config, 10, state_path.clone());
        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.stats.errors, 1);
        assert!(report.stats.has_errors());
        assert_eq!(report.downloaded_days(), 0);
        assert!(!SchedulerState::load(&state_path).is_processed(5, "2024-05-09"));

        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.stats.errors, 1);
        assert_eq!(api.call_count("/sejm/term10/proceedings/5/2024-05-09/transcripts"), 2);
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::new(dir.path());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()));
        let mut store = CacheStore::in_memory(clock);
        let api = MockSejmApi::new()
            .with_json(
                "/sejm/term10/proceedings",
                json!([{"number": 5, "title": "5. Posiedzenie", "dates": ["2024-05-09"]}]),
            )
            .with_error("/sejm/term10/proceedings/5/2024-05-09/transcripts", || Error::Timeout("slow".into()));
        let config = AppConfig { fetch_full_statements: false, ..AppConfig::default() };

        let mut scheduler = Scheduler::new(&api, &mut store, &tree, &config, 10, dir.path().join("state.json"));
        let shutdown = tokio::time::sleep(std::time::Duration::from_millis(50));
        let total = scheduler.run_until(std::time::Duration::from_secs(3600), shutdown).await.unwrap();
        assert_eq!(total.errors, 1);
        assert_eq!(api.call_count("/sejm/term10/proceedings"), 1);
    }

    #[tokio::test]
    async fn test_cleanup_old_state() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::new(dir.path());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()));
        let mut store = CacheStore::in_memory(clock);
        let api = MockSejmApi::new();
        let state_path = dir.path().join("state.json");

        let mut state = SchedulerState { term: Some(10), ..Default::default() };
        state.mark_processed(1, "2024-01-01");
        state.mark_processed(9, "2024-05-09");
        tree.write_json(&state_path, &state).unwrap();

        let mut scheduler = Scheduler::new(&api, &mut store, &tree, &AppConfig::default(), 10, state_path.clone());
        assert_eq!(scheduler.cleanup_old_state(30).unwrap(), 1);
        let saved = SchedulerState::load(&state_path);
        assert_eq!(saved.total_dates(), 1);
        assert!(saved.is_processed(9, "2024-05-09"));
        assert_eq!(scheduler.status().total_processed_dates, 1);
    }
}
