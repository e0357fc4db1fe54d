//! Incremental refresh decisions for proceedings.
//!
//! A proceeding is classified by its sitting dates relative to today:
//!
//! - **future**: every date is after today, re-checked at most once per 24h
//! - **completed**: every date is today or earlier, re-checked at most once per 168h
//!   once all of its days have output on disk, otherwise always
//! - **ongoing**: mixed dates or no usable dates, re-checked at most once per 2h
//!
//! The "last checked" time is a marker entry in the cache whose TTL equals the window.

use crate::Clock;
use crate::cache::{CacheKey, CacheStore};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle bucket of a proceeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProceedingStatus {
    Future,
    Ongoing,
    Completed,
}

impl ProceedingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProceedingStatus::Future => "future",
            ProceedingStatus::Ongoing => "ongoing",
            ProceedingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProceedingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `YYYY-MM-DD` dates, skipping (and logging) anything else.
pub fn parse_dates(dates: &[String]) -> Vec<NaiveDate> {
    dates
        .iter()
        .filter_map(|raw| match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::warn!(date = %raw, error = %e, "Skipping unparseable proceeding date");
                None
            }
        })
        .collect()
}

/// Classify parsed dates against `today`.
pub fn classify(dates: &[NaiveDate], today: NaiveDate) -> ProceedingStatus {
    let future = dates.iter().filter(|d| **d > today).count();
    let past = dates.len() - future;

    match (future, past) {
        (f, 0) if f > 0 => ProceedingStatus::Future,
        (0, p) if p > 0 => ProceedingStatus::Completed,
        _ => ProceedingStatus::Ongoing,
    }
}

/// Everything the policy needs to know about one proceeding.
#[derive(Debug, Clone)]
pub struct RefreshRequest<'a> {
    pub term: u32,
    pub proceeding_id: u32,
    pub dates: &'a [String],
    /// Dates that already have output on disk.
    pub persisted_dates: &'a BTreeSet<NaiveDate>,
    pub force: bool,
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    Forced,
    /// Completed proceeding with days that have no output yet.
    MissingOutput { missing: usize },
    /// No live marker for this status.
    WindowElapsed,
    RecentlyChecked,
}

/// Outcome of [`RefreshPolicy::should_refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshDecision {
    pub refresh: bool,
    pub status: ProceedingStatus,
    pub reason: RefreshReason,
}

/// Time windows for each lifecycle bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub future_window: Duration,
    pub ongoing_window: Duration,
    pub completed_window: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            future_window: Duration::hours(24),
            ongoing_window: Duration::hours(2),
            completed_window: Duration::hours(168),
        }
    }
}

impl RefreshPolicy {
    pub fn window(&self, status: ProceedingStatus) -> Duration {
        match status {
            ProceedingStatus::Future => self.future_window,
            ProceedingStatus::Ongoing => self.ongoing_window,
            ProceedingStatus::Completed => self.completed_window,
        }
    }

    /// Pure decision from the classification, the number of days lacking output and
    /// whether a live marker exists.
    pub fn decide(status: ProceedingStatus, missing: usize, marker_live: bool, force: bool) -> RefreshDecision {
        let (refresh, reason) = if force {
            (true, RefreshReason::Forced)
        } else if status == ProceedingStatus::Completed && missing > 0 {
            (true, RefreshReason::MissingOutput { missing })
        } else if marker_live {
            (false, RefreshReason::RecentlyChecked)
        } else {
            (true, RefreshReason::WindowElapsed)
        };

        RefreshDecision { refresh, status, reason }
    }

    /// Decide whether a proceeding should be fetched again.
    ///
    /// Reads the marker for the proceeding's current status; no network I/O.
    pub fn should_refresh(
        &self, store: &mut CacheStore, request: &RefreshRequest<'_>, today: NaiveDate,
    ) -> RefreshDecision {
        let dates = parse_dates(request.dates);
        let status = classify(&dates, today);

        let missing = match status {
            ProceedingStatus::Completed => dates.iter().filter(|d| !request.persisted_dates.contains(d)).count(),
            _ => 0,
        };

        let marker = CacheKey::marker(status.as_str(), request.term, request.proceeding_id);
        let marker_live = !request.force && store.has(&marker, self.window(status));

        let decision = Self::decide(status, missing, marker_live, request.force);
        tracing::debug!(
            term = request.term,
            proceeding = request.proceeding_id,
            status = %status,
            refresh = decision.refresh,
            reason = ?decision.reason,
            "Refresh decision"
        );
        decision
    }

    /// Record that the proceeding was processed under `status`.
    pub fn mark_checked(&self, store: &mut CacheStore, status: ProceedingStatus, term: u32, proceeding_id: u32) {
        let now = store.clock().now();
        let marker = CacheKey::marker(status.as_str(), term, proceeding_id);
        store.put(&marker, serde_json::json!({ "checked_at": now }), Some(self.window(status)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dates(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify() {
        let today = day("2024-05-10");
        assert_eq!(classify(&[day("2024-05-11"), day("2024-05-12")], today), ProceedingStatus::Future);
        assert_eq!(classify(&[day("2024-05-01"), day("2024-05-10")], today), ProceedingStatus::Completed);
        assert_eq!(classify(&[day("2024-05-10"), day("2024-05-11")], today), ProceedingStatus::Ongoing);
        assert_eq!(classify(&[], today), ProceedingStatus::Ongoing);
    }

    #[test]
    fn test_invalid_dates_ignored() {
        let parsed = parse_dates(&dates(&["2024-05-01", "not-a-date", "2024-13-40"]));
        assert_eq!(parsed, vec![day("2024-05-01")]);

        let parsed = parse_dates(&dates(&["garbage"]));
        assert_eq!(classify(&parsed, day("2024-05-10")), ProceedingStatus::Ongoing);
    }

    #[test]
    fn test_decide_is_pure() {
        let d = RefreshPolicy::decide(ProceedingStatus::Future, 0, true, false);
        assert!(!d.refresh);
        assert_eq!(d.reason, RefreshReason::RecentlyChecked);

        let d = RefreshPolicy::decide(ProceedingStatus::Future, 0, true, true);
        assert!(d.refresh);
        assert_eq!(d.reason, RefreshReason::Forced);

        let d = RefreshPolicy::decide(ProceedingStatus::Completed, 2, true, false);
        assert_eq!(d.reason, RefreshReason::MissingOutput { missing: 2 });
    }

    fn run_twice(gap: Duration) -> (bool, bool) {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mut store = CacheStore::in_memory(clock.clone());
        let policy = RefreshPolicy::default();
        let raw = dates(&["2024-06-01", "2024-06-02"]);
        let persisted = BTreeSet::new();
        let request = RefreshRequest { term: 10, proceeding_id: 12, dates: &raw, persisted_dates: &persisted, force: false };

        let check = |store: &mut CacheStore| {
            let decision = policy.should_refresh(store, &request, clock.today());
            if decision.refresh {
                policy.mark_checked(store, decision.status, 10, 12);
            }
            decision.refresh
        };

        let first = check(&mut store);
        clock.advance(gap);
        let second = check(&mut store);
        (first, second)
    }

    #[test]
    fn test_future_throttled_within_window() {
        assert_eq!(run_twice(Duration::hours(1)), (true, false));
    }

    #[test]
    fn test_future_refreshes_after_window() {
        assert_eq!(run_twice(Duration::hours(25)), (true, true));
    }

    #[test]
    fn test_completed_with_gaps_always_refreshes() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap()));
        let mut store = CacheStore::in_memory(clock.clone());
        let policy = RefreshPolicy::default();
        let raw = dates(&["2024-05-07", "2024-05-08"]);

        let mut persisted = BTreeSet::from([day("2024-05-07")]);
        policy.mark_checked(&mut store, ProceedingStatus::Completed, 10, 5);

        let request = RefreshRequest { term: 10, proceeding_id: 5, dates: &raw, persisted_dates: &persisted, force: false };
        let decision = policy.should_refresh(&mut store, &request, clock.today());
        assert!(decision.refresh);
        assert_eq!(decision.reason, RefreshReason::MissingOutput { missing: 1 });

        persisted.insert(day("2024-05-08"));
        let request = RefreshRequest { term: 10, proceeding_id: 5, dates: &raw, persisted_dates: &persisted, force: false };
        let decision = policy.should_refresh(&mut store, &request, clock.today());
        assert!(!decision.refresh);
        assert_eq!(decision.status, ProceedingStatus::Completed);
    }

    #[test]
    fn test_ongoing_window() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 8, 8, 0, 0).unwrap()));
        let mut store = CacheStore::in_memory(clock.clone());
        let policy = RefreshPolicy::default();
        let raw = dates(&["2024-05-07", "2024-05-09"]);
        let persisted = BTreeSet::new();
        let request = RefreshRequest { term: 10, proceeding_id: 7, dates: &raw, persisted_dates: &persisted, force: false };

        policy.mark_checked(&mut store, ProceedingStatus::Ongoing, 10, 7);
        clock.advance(Duration::minutes(90));
        assert!(!policy.should_refresh(&mut store, &request, clock.today()).refresh);
        clock.advance(Duration::minutes(31));
        assert!(policy.should_refresh(&mut store, &request, clock.today()).refresh);
    }

    #[test]
    fn test_force_bypasses_marker() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()));
        let mut store = CacheStore::in_memory(clock.clone());
        let policy = RefreshPolicy::default();
        let raw = dates(&["2024-06-01"]);
        let persisted = BTreeSet::new();
        policy.mark_checked(&mut store, ProceedingStatus::Future, 10, 1);

        let request = RefreshRequest { term: 10, proceeding_id: 1, dates: &raw, persisted_dates: &persisted, force: true };
        let decision = policy.should_refresh(&mut store, &request, clock.today());
        assert!(decision.refresh);
        assert_eq!(decision.reason, RefreshReason::Forced);
    }
}
