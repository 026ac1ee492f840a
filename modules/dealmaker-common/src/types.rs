use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Source records ---

/// A CRM deal the workflow reads profile links from. Only `stage` is ever
/// written back, and only once the record has been associated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Dedicated external-link field (the original post URL), when set.
    pub link: Option<String>,
    pub stage: Option<String>,
}

impl SourceRecord {
    /// Name for logs and reports; falls back to the id for unnamed deals.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Deal {}", self.id)
        } else {
            self.name.clone()
        }
    }
}

/// Server-side filter selecting the deals a run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub pipeline_id: String,
    pub stage_id: String,
    /// Token the deal name must contain (e.g. `Post:`).
    pub name_token: String,
}

// --- Profile candidates ---

/// A normalized profile URL and every record that mentioned it, in
/// first-seen order, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCandidate {
    pub url: String,
    pub record_ids: Vec<String>,
    pub record_names: Vec<String>,
}

impl ProfileCandidate {
    pub fn new(url: impl Into<String>, record: &SourceRecord) -> Self {
        Self {
            url: url.into(),
            record_ids: vec![record.id.clone()],
            record_names: vec![record.display_name()],
        }
    }

    /// Add a referencing record. Returns false if it was already listed.
    pub fn add_record(&mut self, record: &SourceRecord) -> bool {
        if self.record_ids.iter().any(|id| id == &record.id) {
            return false;
        }
        self.record_ids.push(record.id.clone());
        self.record_names.push(record.display_name());
        true
    }
}

// --- Weekly quota ---

/// Persisted weekly processing counter. Field names match the tracking file
/// written by earlier tooling so existing files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyQuota {
    pub current_week: String,
    pub deals_processed: u32,
    pub last_update: DateTime<Utc>,
}

impl WeeklyQuota {
    pub fn fresh(week: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            current_week: week.into(),
            deals_processed: 0,
            last_update: now,
        }
    }
}

/// Outcome of asking the quota for room to process `n` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionResult {
    /// Nothing more may be processed this week.
    Denied,
    /// The whole request fits.
    Full(u32),
    /// Only this many (fewer than requested) fit.
    Partial(u32),
}

impl AdmissionResult {
    pub fn admitted(&self) -> u32 {
        match self {
            AdmissionResult::Denied => 0,
            AdmissionResult::Full(n) | AdmissionResult::Partial(n) => *n,
        }
    }
}
