use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;

use dealmaker_common::{AdmissionResult, Config, ProfileCandidate, RecordQuery};

use crate::enrichment::enrich_batch;
use crate::extractor::{self, normalize_profile_url};
use crate::filter;
use crate::profile::{normalize, NormalizedProfile, RawProfile};
use crate::quota::RateTracker;
use crate::reconciler::{ReconcileAction, ReconcileOutcome, Reconciler, SkipReason};
use crate::sources::RecordSource;
use crate::stage::{MoveMode, StageMover};
use crate::traits::{ContactStore, ProfileClassifier, ProfileEnricher, RecordStore};

/// The validated subset of [`Config`] one run needs.
#[derive(Debug, Clone, TypedBuilder)]
pub struct WorkflowSettings {
    /// Records waiting to be processed.
    pub source: RecordQuery,
    /// Stage processed records are advanced to.
    #[builder(setter(into))]
    pub target_stage_id: String,
    #[builder(default)]
    pub page_delay: Duration,
    #[builder(default)]
    pub lookup_delay: Duration,
    #[builder(default)]
    pub write_delay: Duration,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .source(config.source_query())
            .target_stage_id(config.target_stage_id.clone())
            .page_delay(config.page_delay)
            .lookup_delay(config.lookup_delay)
            .write_delay(config.write_delay)
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Apply,
    /// Stop after the existing-contact check. No enrichment, no writes.
    DryRun,
}

/// Why a run ended before reconciling anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuotaExhausted,
    NoRecords,
    NoCandidates,
    DryRun,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::QuotaExhausted => write!(f, "weekly quota exhausted"),
            StopReason::NoRecords => write!(f, "no records to process"),
            StopReason::NoCandidates => write!(f, "no profile links found"),
            StopReason::DryRun => write!(f, "dry run"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SkipCounts {
    pub no_url: u32,
    pub company: u32,
    pub no_name: u32,
    pub not_enriched: u32,
}

impl SkipCounts {
    pub fn total(&self) -> u32 {
        self.no_url + self.company + self.no_name + self.not_enriched
    }

    fn add(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NoUrl => self.no_url += 1,
            SkipReason::Company => self.company += 1,
            SkipReason::NoName => self.no_name += 1,
            SkipReason::NotEnriched => self.not_enriched += 1,
        }
    }
}

/// Stats from one workflow run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub quota_remaining: u32,
    pub records_fetched: usize,
    pub records_admitted: usize,
    pub records_without_links: usize,
    pub candidates: usize,
    pub existing: usize,
    pub new: usize,
    /// URLs that would be (or were) sent for enrichment.
    pub pending_urls: Vec<String>,
    pub profiles_returned: usize,
    pub unmatched_profiles: u32,
    pub profiles_without_url: u32,
    pub created: u32,
    pub updated: u32,
    pub linked: u32,
    pub skipped: SkipCounts,
    pub errors: u32,
    pub associations: u32,
    pub associations_failed: u32,
    pub records_advanced: u32,
    pub advance_errors: u32,
    pub records_committed: u32,
    pub fetch_error: Option<String>,
    pub stopped: Option<StopReason>,
}

impl RunStats {
    fn tally(&mut self, outcome: &ReconcileOutcome) {
        match outcome.action {
            ReconcileAction::Created => self.created += 1,
            ReconcileAction::Updated => self.updated += 1,
            ReconcileAction::Linked => self.linked += 1,
            ReconcileAction::Skipped(reason) => self.skipped.add(reason),
        }
        self.associations += outcome.associated.len() as u32;
        self.associations_failed += outcome.failed_associations.len() as u32;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Dealmaker Run Complete ===")?;
        if let Some(reason) = self.stopped {
            writeln!(f, "Stopped early:      {reason}")?;
        }
        writeln!(f, "Quota remaining:    {}", self.quota_remaining)?;
        writeln!(f, "Records fetched:    {}", self.records_fetched)?;
        writeln!(f, "Records admitted:   {}", self.records_admitted)?;
        writeln!(f, "Without links:      {}", self.records_without_links)?;
        writeln!(f, "Profile candidates: {}", self.candidates)?;
        writeln!(f, "  Existing:         {}", self.existing)?;
        writeln!(f, "  New:              {}", self.new)?;
        if self.stopped == Some(StopReason::DryRun) {
            writeln!(f, "\nWould enrich:")?;
            for url in &self.pending_urls {
                writeln!(f, "  {url}")?;
            }
            return Ok(());
        }
        writeln!(f, "Profiles returned:  {}", self.profiles_returned)?;
        writeln!(f, "Unmatched profiles: {}", self.unmatched_profiles)?;
        writeln!(f, "Profiles w/o URL:   {}", self.profiles_without_url)?;
        writeln!(f, "\nContacts:")?;
        writeln!(f, "  Created: {}", self.created)?;
        writeln!(f, "  Updated: {}", self.updated)?;
        writeln!(f, "  Linked:  {}", self.linked)?;
        writeln!(f, "  Skipped: {}", self.skipped.total())?;
        writeln!(f, "    no url:       {}", self.skipped.no_url)?;
        writeln!(f, "    company:      {}", self.skipped.company)?;
        writeln!(f, "    no name:      {}", self.skipped.no_name)?;
        writeln!(f, "    not enriched: {}", self.skipped.not_enriched)?;
        writeln!(f, "  Errors:  {}", self.errors)?;
        writeln!(f, "\nAssociations:       {} ({} failed)", self.associations, self.associations_failed)?;
        writeln!(f, "Records advanced:   {} ({} failed)", self.records_advanced, self.advance_errors)?;
        writeln!(f, "Quota committed:    {}", self.records_committed)?;
        if let Some(err) = &self.fetch_error {
            writeln!(f, "\nFetch stopped early: {err}")?;
        }
        Ok(())
    }
}

/// Per-record bookkeeping across candidates.
#[derive(Default)]
struct RecordLedger {
    associated: HashSet<String>,
    errored: HashSet<String>,
}

impl RecordLedger {
    fn apply(&mut self, outcome: &ReconcileOutcome) {
        self.associated.extend(outcome.associated.iter().cloned());
        self.errored.extend(outcome.failed_associations.iter().cloned());
    }

    fn mark_errored(&mut self, candidate: &ProfileCandidate) {
        self.errored.extend(candidate.record_ids.iter().cloned());
    }

    fn ready_to_advance(&self, record_id: &str) -> bool {
        self.associated.contains(record_id) && !self.errored.contains(record_id)
    }
}

/// One pass of the reconciliation workflow over the source stage.
pub struct Workflow<'a> {
    records: &'a dyn RecordStore,
    contacts: &'a dyn ContactStore,
    enricher: &'a dyn ProfileEnricher,
    classifier: &'a dyn ProfileClassifier,
    tracker: &'a RateTracker,
    settings: WorkflowSettings,
}

impl<'a> Workflow<'a> {
    pub fn new(
        records: &'a dyn RecordStore,
        contacts: &'a dyn ContactStore,
        enricher: &'a dyn ProfileEnricher,
        classifier: &'a dyn ProfileClassifier,
        tracker: &'a RateTracker,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            records,
            contacts,
            enricher,
            classifier,
            tracker,
            settings,
        }
    }

    pub async fn run(&self, mode: RunMode) -> Result<RunStats> {
        let mut stats = RunStats::default();
        info!(classifier = self.classifier.name(), ?mode, "Starting dealmaker run");

        // Quota gate
        let remaining = self.tracker.remaining();
        stats.quota_remaining = remaining;
        if remaining == 0 {
            warn!(limit = self.tracker.weekly_limit(), "Weekly quota already used up");
            stats.stopped = Some(StopReason::QuotaExhausted);
            return Ok(stats);
        }

        // Fetch
        let source = RecordSource::new(self.records, self.settings.page_delay);
        let mut records = match source
            .fetch_candidate_records(&self.settings.source, Some(remaining as usize))
            .await
        {
            Ok(records) => records,
            Err(partial) if !partial.fetched.is_empty() => {
                warn!(
                    fetched = partial.fetched.len(),
                    error = %partial.error,
                    "Continuing with records fetched before the failure"
                );
                stats.fetch_error = Some(format!("{:#}", partial.error));
                partial.fetched
            }
            Err(partial) => return Err(partial.error.context("Failed to fetch source records")),
        };
        stats.records_fetched = records.len();
        if records.is_empty() {
            info!("No records waiting in the source stage");
            stats.stopped = Some(StopReason::NoRecords);
            return Ok(stats);
        }

        // Records with nothing to extract are never admitted or charged.
        let fetched = records.len();
        records.retain(extractor::has_profile_links);
        stats.records_without_links = fetched - records.len();
        if records.is_empty() {
            info!(without_links = stats.records_without_links, "No record carries a profile link");
            stats.stopped = Some(StopReason::NoCandidates);
            return Ok(stats);
        }

        // Admission
        let admission = self.tracker.admit(records.len() as u32);
        if admission == AdmissionResult::Denied {
            stats.stopped = Some(StopReason::QuotaExhausted);
            return Ok(stats);
        }
        records.truncate(admission.admitted() as usize);
        stats.records_admitted = records.len();

        // Extraction
        let candidates = extractor::extract(&records);
        stats.candidates = candidates.len();
        info!(
            records = records.len(),
            candidates = candidates.len(),
            without_links = stats.records_without_links,
            "Extracted profile candidates"
        );

        // Existing-contact filter
        let partition = filter::partition(self.contacts, candidates, self.settings.lookup_delay).await;
        stats.existing = partition.existing.len();
        stats.new = partition.new.len();
        stats.pending_urls = partition.new.iter().map(|c| c.url.clone()).collect();

        if mode == RunMode::DryRun {
            info!(would_enrich = stats.new, "Dry run, stopping before enrichment");
            stats.stopped = Some(StopReason::DryRun);
            return Ok(stats);
        }

        // Enrichment
        let raw = enrich_batch(self.enricher, &stats.pending_urls)
            .await
            .context("Profile enrichment failed")?;
        stats.profiles_returned = raw.len();
        let profiles = self.match_profiles(&partition.new, &raw, &mut stats);

        // Reconciliation
        let reconciler = Reconciler::new(
            self.records,
            self.contacts,
            self.classifier,
            self.settings.write_delay,
        );
        let mut ledger = RecordLedger::default();

        for (candidate, contact_id) in &partition.existing {
            let outcome = reconciler.link_existing(candidate, contact_id).await;
            stats.tally(&outcome);
            ledger.apply(&outcome);
        }

        for candidate in &partition.new {
            let outcome = match profiles.get(&candidate.url) {
                None => {
                    warn!(url = %candidate.url, "No enrichment data for candidate");
                    ReconcileOutcome::skipped(SkipReason::NotEnriched)
                }
                Some(profile) => match reconciler.reconcile(candidate, profile).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(url = %candidate.url, error = %e, "Failed to reconcile candidate");
                        stats.errors += 1;
                        ledger.mark_errored(candidate);
                        continue;
                    }
                },
            };
            stats.tally(&outcome);
            ledger.apply(&outcome);
        }

        // Advance
        let ready: Vec<_> = records
            .iter()
            .filter(|r| ledger.ready_to_advance(&r.id))
            .cloned()
            .collect();
        let moves = StageMover::new(self.records, self.settings.write_delay)
            .move_records(&ready, &self.settings.target_stage_id, MoveMode::Apply)
            .await;
        stats.records_advanced = moves.moved;
        stats.advance_errors = moves.errors;
        ledger.errored.extend(moves.failed_ids);

        // Quota commit
        let processed = records
            .iter()
            .filter(|r| !ledger.errored.contains(&r.id))
            .count() as u32;
        stats.records_committed = processed;
        if let Err(e) = self.tracker.commit(processed) {
            error!(error = %e, processed, "Failed to persist weekly quota");
        }

        info!(
            created = stats.created,
            updated = stats.updated,
            linked = stats.linked,
            skipped = stats.skipped.total(),
            errors = stats.errors,
            advanced = stats.records_advanced,
            "Dealmaker run complete"
        );
        Ok(stats)
    }

    /// Pair enriched profiles with the candidates they were requested for,
    /// by normalized URL.
    fn match_profiles(
        &self,
        pending: &[ProfileCandidate],
        raw: &[RawProfile],
        stats: &mut RunStats,
    ) -> HashMap<String, NormalizedProfile> {
        let wanted: HashSet<&str> = pending.iter().map(|c| c.url.as_str()).collect();
        let mut matched: HashMap<String, NormalizedProfile> = HashMap::new();

        for profile in raw {
            let hints = profile.url_hints();
            if hints.is_empty() {
                warn!(keys = ?profile.keys(), "Enriched profile carries no URL");
                stats.profiles_without_url += 1;
                continue;
            }
            let url = hints
                .iter()
                .filter_map(|h| normalize_profile_url(h))
                .find(|u| wanted.contains(u.as_str()) && !matched.contains_key(u));
            match url {
                Some(url) => {
                    matched.insert(url, normalize(profile));
                }
                None => {
                    warn!(urls = ?hints, "Enriched profile matches no pending candidate");
                    stats.unmatched_profiles += 1;
                }
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn settings_builder_defaults_delays_to_zero() {
        let settings = WorkflowSettings::builder()
            .source(RecordQuery {
                pipeline_id: "default".into(),
                stage_id: "source".into(),
                name_token: "Post:".into(),
            })
            .target_stage_id("target")
            .build();
        assert_eq!(settings.page_delay, Duration::ZERO);
        assert_eq!(settings.write_delay, Duration::ZERO);
    }

    #[test]
    fn ledger_blocks_records_touched_by_errors() {
        let mut ledger = RecordLedger::default();
        ledger.apply(&ReconcileOutcome {
            action: ReconcileAction::Created,
            contact_id: Some("c".into()),
            associated: vec!["A".into(), "B".into()],
            failed_associations: vec![],
        });
        let mut other = ProfileCandidate::new("u", &record("B", "", "source"));
        other.add_record(&record("C", "", "source"));
        ledger.mark_errored(&other);

        assert!(ledger.ready_to_advance("A"));
        assert!(!ledger.ready_to_advance("B"));
        assert!(!ledger.ready_to_advance("C"));
    }

    #[test]
    fn dry_run_summary_lists_pending_urls() {
        let stats = RunStats {
            stopped: Some(StopReason::DryRun),
            pending_urls: vec!["https://www.linkedin.com/in/jane-doe".into()],
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Would enrich"));
        assert!(text.contains("jane-doe"));
        assert!(!text.contains("Quota committed"));
    }
}
