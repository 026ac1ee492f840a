use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use dealmaker_common::SourceRecord;

use crate::extractor::{self, normalize_profile_url};
use crate::profile::normalize;
use crate::reconciler::{ReconcileAction, Reconciler, SkipReason};
use crate::sources::RecordSource;
use crate::traits::{ContactStore, ProfileClassifier, ProfileEnricher, RecordStore};
use crate::workflow::WorkflowSettings;

const BATCH_SIZE: usize = 10;
const BATCH_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Clone)]
pub struct RepairStats {
    pub records_checked: u32,
    pub records_missing_contacts: u32,
    pub candidates: u32,
    pub batches: u32,
    pub failed_batches: u32,
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub not_enriched: u32,
    pub errors: u32,
    pub associations: u32,
}

impl fmt::Display for RepairStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Contact Repair Complete ===")?;
        writeln!(f, "Records checked:     {}", self.records_checked)?;
        writeln!(f, "Missing contacts:    {}", self.records_missing_contacts)?;
        writeln!(f, "Profile candidates:  {}", self.candidates)?;
        writeln!(f, "Batches:             {} ({} failed)", self.batches, self.failed_batches)?;
        writeln!(f, "Contacts created:    {}", self.created)?;
        writeln!(f, "Contacts updated:    {}", self.updated)?;
        writeln!(f, "Skipped:             {}", self.skipped)?;
        writeln!(f, "Not enriched:        {}", self.not_enriched)?;
        writeln!(f, "Errors:              {}", self.errors)?;
        writeln!(f, "Associations:        {}", self.associations)?;
        Ok(())
    }
}

/// Finds advanced records that ended up without any associated contact and
/// reconciles their profiles again. Stages are left alone.
pub struct Repair<'a> {
    records: &'a dyn RecordStore,
    contacts: &'a dyn ContactStore,
    enricher: &'a dyn ProfileEnricher,
    classifier: &'a dyn ProfileClassifier,
    settings: WorkflowSettings,
    batch_size: usize,
    batch_delay: Duration,
}

impl<'a> Repair<'a> {
    pub fn new(
        records: &'a dyn RecordStore,
        contacts: &'a dyn ContactStore,
        enricher: &'a dyn ProfileEnricher,
        classifier: &'a dyn ProfileClassifier,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            records,
            contacts,
            enricher,
            classifier,
            settings,
            batch_size: BATCH_SIZE,
            batch_delay: BATCH_DELAY,
        }
    }

    pub fn with_batching(mut self, size: usize, delay: Duration) -> Self {
        self.batch_size = size.max(1);
        self.batch_delay = delay;
        self
    }

    pub async fn run(&self) -> Result<RepairStats> {
        let mut stats = RepairStats::default();
        let query = dealmaker_common::RecordQuery {
            stage_id: self.settings.target_stage_id.clone(),
            ..self.settings.source.clone()
        };

        let records = RecordSource::new(self.records, self.settings.page_delay)
            .fetch_candidate_records(&query, None)
            .await
            .context("Failed to fetch advanced records")?;
        let records: Vec<SourceRecord> = records
            .into_iter()
            .filter(|r| r.name.starts_with(&query.name_token))
            .collect();

        let orphans = self.records_without_contacts(&records, &mut stats).await;
        if orphans.is_empty() {
            info!("Every advanced record has a contact");
            return Ok(stats);
        }

        let candidates = extractor::extract(&orphans);
        stats.candidates = candidates.len() as u32;
        info!(
            records = orphans.len(),
            candidates = candidates.len(),
            "Repairing records without contacts"
        );

        let reconciler = Reconciler::new(
            self.records,
            self.contacts,
            self.classifier,
            self.settings.write_delay,
        );

        for (i, batch) in candidates.chunks(self.batch_size).enumerate() {
            if i > 0 {
                crate::pause(self.batch_delay).await;
            }
            stats.batches += 1;

            let urls: Vec<String> = batch.iter().map(|c| c.url.clone()).collect();
            let raw = match self.enricher.enrich(&urls).await {
                Ok(raw) => raw,
                Err(e) => {
                    error!(batch = i + 1, error = %e, "Enrichment batch failed, skipping");
                    stats.failed_batches += 1;
                    continue;
                }
            };

            let mut profiles = HashMap::new();
            for profile in &raw {
                if let Some(url) = profile
                    .url_hints()
                    .iter()
                    .filter_map(|h| normalize_profile_url(h))
                    .find(|u| urls.contains(u))
                {
                    profiles.entry(url).or_insert_with(|| normalize(profile));
                }
            }

            for candidate in batch {
                let Some(profile) = profiles.get(&candidate.url) else {
                    warn!(url = %candidate.url, "No enrichment data for candidate");
                    stats.not_enriched += 1;
                    continue;
                };
                match reconciler.reconcile(candidate, profile).await {
                    Ok(outcome) => {
                        match outcome.action {
                            ReconcileAction::Created => stats.created += 1,
                            ReconcileAction::Updated | ReconcileAction::Linked => stats.updated += 1,
                            ReconcileAction::Skipped(SkipReason::NotEnriched) => stats.not_enriched += 1,
                            ReconcileAction::Skipped(_) => stats.skipped += 1,
                        }
                        stats.associations += outcome.associated.len() as u32;
                    }
                    Err(e) => {
                        error!(url = %candidate.url, error = %e, "Failed to repair candidate");
                        stats.errors += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    async fn records_without_contacts(
        &self,
        records: &[SourceRecord],
        stats: &mut RepairStats,
    ) -> Vec<SourceRecord> {
        let mut orphans = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                crate::pause(self.settings.lookup_delay).await;
            }
            stats.records_checked += 1;
            match self.records.associated_contact_ids(&record.id).await {
                Ok(ids) if ids.is_empty() => orphans.push(record.clone()),
                Ok(_) => {}
                Err(e) => warn!(record_id = %record.id, error = %e, "Could not read associations"),
            }
        }
        stats.records_missing_contacts = orphans.len() as u32;
        orphans
    }
}
