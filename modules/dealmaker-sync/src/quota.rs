//! Weekly processing quota persisted as a small JSON file.
//!
//! The file holds `{currentWeek, dealsProcessed, lastUpdate}`. A missing or
//! unreadable file means "nothing processed yet"; a file from an earlier ISO
//! week is treated as zero and rewritten on first touch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{info, warn};

use dealmaker_common::{AdmissionResult, DealmakerError, WeeklyQuota};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// ISO-8601 week identifier, e.g. `2026-W43`.
pub fn week_id(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Pure admission decision: how many of `requested` fit under `limit` given
/// `used` so far.
pub fn evaluate(used: u32, limit: u32, requested: u32) -> AdmissionResult {
    let remaining = limit.saturating_sub(used);
    if remaining == 0 {
        AdmissionResult::Denied
    } else if requested <= remaining {
        AdmissionResult::Full(requested)
    } else {
        AdmissionResult::Partial(remaining)
    }
}

pub struct RateTracker {
    path: PathBuf,
    weekly_limit: u32,
    clock: Clock,
}

impl RateTracker {
    pub fn new(path: impl Into<PathBuf>, weekly_limit: u32) -> Self {
        Self {
            path: path.into(),
            weekly_limit,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to pin the week in tests.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn weekly_limit(&self) -> u32 {
        self.weekly_limit
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_week_id(&self) -> String {
        week_id((self.clock)().date_naive())
    }

    /// Stored quota, as persisted. Missing or corrupt files read as a fresh
    /// record for the current week.
    pub fn load(&self) -> WeeklyQuota {
        let fresh = || WeeklyQuota::fresh(self.current_week_id(), (self.clock)());
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return fresh(),
        };
        match serde_json::from_str(&raw) {
            Ok(quota) => quota,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable quota file, starting from zero");
                fresh()
            }
        }
    }

    /// Quota for the current week. A record from another week is replaced by
    /// a zeroed one and persisted; a failed write is logged and ignored.
    fn load_current(&self) -> WeeklyQuota {
        let stored = self.load();
        let week = self.current_week_id();
        if stored.current_week == week {
            return stored;
        }

        info!(
            previous_week = %stored.current_week,
            previous_count = stored.deals_processed,
            %week,
            "New week, resetting quota"
        );
        let fresh = WeeklyQuota::fresh(week, (self.clock)());
        if let Err(e) = self.save(&fresh) {
            warn!(error = %e, "Failed to persist quota rollover");
        }
        fresh
    }

    pub fn remaining(&self) -> u32 {
        self.weekly_limit
            .saturating_sub(self.load_current().deals_processed)
    }

    /// Decide how many of `requested` records this run may process.
    pub fn admit(&self, requested: u32) -> AdmissionResult {
        let quota = self.load_current();
        let result = evaluate(quota.deals_processed, self.weekly_limit, requested);
        match result {
            AdmissionResult::Denied => warn!(
                processed = quota.deals_processed,
                limit = self.weekly_limit,
                "Weekly quota exhausted"
            ),
            AdmissionResult::Partial(n) => info!(
                requested,
                admitted = n,
                "Quota admits only part of this batch"
            ),
            AdmissionResult::Full(_) => {}
        }
        result
    }

    /// Add `processed` to this week's count and persist it.
    pub fn commit(&self, processed: u32) -> Result<WeeklyQuota, DealmakerError> {
        let mut quota = self.load_current();
        quota.deals_processed = quota.deals_processed.saturating_add(processed);
        quota.last_update = (self.clock)();
        self.save(&quota)?;
        info!(
            week = %quota.current_week,
            processed = quota.deals_processed,
            limit = self.weekly_limit,
            "Quota updated"
        );
        Ok(quota)
    }

    /// Zero the current week.
    pub fn reset(&self) -> Result<WeeklyQuota, DealmakerError> {
        self.set(0)
    }

    /// Overwrite the current week's count.
    pub fn set(&self, count: u32) -> Result<WeeklyQuota, DealmakerError> {
        let mut quota = WeeklyQuota::fresh(self.current_week_id(), (self.clock)());
        quota.deals_processed = count;
        self.save(&quota)?;
        Ok(quota)
    }

    fn save(&self, quota: &WeeklyQuota) -> Result<(), DealmakerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(quota)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn tracker(dir: &tempfile::TempDir, limit: u32, now: DateTime<Utc>) -> RateTracker {
        RateTracker::new(dir.path().join("data/weekly.json"), limit).with_clock(move || now)
    }

    #[test]
    fn week_ids_follow_iso_rules() {
        assert_eq!(week_id(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()), "2026-W43");
        // Jan 1 2027 is a Friday and belongs to the last week of 2026.
        assert_eq!(week_id(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()), "2026-W53");
        assert_eq!(week_id(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()), "2025-W02");
    }

    #[test]
    fn evaluate_covers_full_partial_denied() {
        assert_eq!(evaluate(0, 5, 3), AdmissionResult::Full(3));
        assert_eq!(evaluate(3, 5, 10), AdmissionResult::Partial(2));
        assert_eq!(evaluate(5, 5, 1), AdmissionResult::Denied);
        assert_eq!(evaluate(7, 5, 1), AdmissionResult::Denied);
    }

    #[test]
    fn missing_file_reads_as_fresh_week() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(&dir, 10, at(2026, 10, 19));
        let quota = t.load();
        assert_eq!(quota.current_week, "2026-W43");
        assert_eq!(quota.deals_processed, 0);
        assert_eq!(t.remaining(), 10);
    }

    #[test]
    fn corrupt_file_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(&dir, 10, at(2026, 10, 19));
        fs::create_dir_all(t.path().parent().unwrap()).unwrap();
        fs::write(t.path(), "{not json").unwrap();
        assert_eq!(t.load().deals_processed, 0);
    }

    #[test]
    fn commit_accumulates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(&dir, 10, at(2026, 10, 19));
        t.commit(3).unwrap();
        t.commit(4).unwrap();

        let raw = fs::read_to_string(t.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["currentWeek"], "2026-W43");
        assert_eq!(json["dealsProcessed"], 7);
        assert!(json["lastUpdate"].is_string());
        assert_eq!(t.remaining(), 3);
        assert_eq!(t.admit(5), AdmissionResult::Partial(3));
    }

    #[test]
    fn new_week_resets_count_on_first_touch() {
        let dir = tempfile::tempdir().unwrap();
        tracker(&dir, 10, at(2026, 10, 19)).set(10).unwrap();

        let old_week = tracker(&dir, 10, at(2026, 10, 19));
        assert_eq!(old_week.admit(1), AdmissionResult::Denied);

        let next_week = tracker(&dir, 10, at(2026, 10, 26));
        assert_eq!(next_week.admit(4), AdmissionResult::Full(4));
        let stored = next_week.load();
        assert_eq!(stored.current_week, "2026-W44");
        assert_eq!(stored.deals_processed, 0);
    }

    #[test]
    fn reset_and_set_overwrite_current_week() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(&dir, 10, at(2026, 10, 19));
        t.commit(6).unwrap();
        assert_eq!(t.set(2).unwrap().deals_processed, 2);
        assert_eq!(t.remaining(), 8);
        assert_eq!(t.reset().unwrap().deals_processed, 0);
        assert_eq!(t.remaining(), 10);
    }

    #[test]
    fn reads_file_written_by_earlier_tooling() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(&dir, 1000, at(2026, 10, 19));
        fs::create_dir_all(t.path().parent().unwrap()).unwrap();
        fs::write(
            t.path(),
            r#"{"currentWeek":"2026-W43","dealsProcessed":998,"lastUpdate":"2026-10-19T08:15:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(t.admit(5), AdmissionResult::Partial(2));
    }
}
