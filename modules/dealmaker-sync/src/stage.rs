use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use dealmaker_common::SourceRecord;

use crate::traits::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    /// Report what would move without writing.
    Preview,
    Apply,
}

#[derive(Debug, Default, Clone)]
pub struct MoveStats {
    pub planned: u32,
    pub already_there: u32,
    pub moved: u32,
    pub errors: u32,
    pub failed_ids: Vec<String>,
}

impl fmt::Display for MoveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Stage Move ===")?;
        writeln!(f, "Planned:       {}", self.planned)?;
        writeln!(f, "Already there: {}", self.already_there)?;
        writeln!(f, "Moved:         {}", self.moved)?;
        writeln!(f, "Errors:        {}", self.errors)?;
        if !self.failed_ids.is_empty() {
            writeln!(f, "Failed:        {}", self.failed_ids.join(", "))?;
        }
        Ok(())
    }
}

/// Moves records between pipeline stages, one write at a time.
pub struct StageMover<'a> {
    records: &'a dyn RecordStore,
    write_delay: Duration,
}

impl<'a> StageMover<'a> {
    pub fn new(records: &'a dyn RecordStore, write_delay: Duration) -> Self {
        Self {
            records,
            write_delay,
        }
    }

    /// Move every record not already in `target_stage`. A failed write is
    /// logged and the rest continue.
    pub async fn move_records(
        &self,
        records: &[SourceRecord],
        target_stage: &str,
        mode: MoveMode,
    ) -> MoveStats {
        let mut stats = MoveStats::default();

        for record in records {
            if record.stage.as_deref() == Some(target_stage) {
                stats.already_there += 1;
                continue;
            }
            stats.planned += 1;

            if mode == MoveMode::Preview {
                info!(record_id = %record.id, name = %record.display_name(), target_stage, "Would move record");
                continue;
            }

            match self.records.set_record_stage(&record.id, target_stage).await {
                Ok(()) => {
                    stats.moved += 1;
                    info!(record_id = %record.id, target_stage, "Moved record");
                }
                Err(e) => {
                    stats.errors += 1;
                    stats.failed_ids.push(record.id.clone());
                    warn!(record_id = %record.id, error = %e, "Stage move failed");
                }
            }
            crate::pause(self.write_delay).await;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, MockCrm};

    #[tokio::test]
    async fn preview_writes_nothing() {
        let crm = MockCrm::new();
        let records = vec![record("A", "", "source"), record("B", "", "source")];
        let stats = StageMover::new(&crm, Duration::ZERO)
            .move_records(&records, "target", MoveMode::Preview)
            .await;
        assert_eq!(stats.planned, 2);
        assert_eq!(stats.moved, 0);
        assert!(crm.stage_moves().is_empty());
    }

    #[tokio::test]
    async fn apply_moves_and_reports_failures() {
        let crm = MockCrm::new().fail_stage_move("B");
        for id in ["A", "B", "C"] {
            crm.add_record(record(id, "", "source"));
        }
        let mut records = crm.all_records();
        records[2].stage = Some("target".into());

        let stats = StageMover::new(&crm, Duration::ZERO)
            .move_records(&records, "target", MoveMode::Apply)
            .await;

        assert_eq!(stats.planned, 2);
        assert_eq!(stats.already_there, 1);
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.failed_ids, vec!["B"]);
        assert_eq!(crm.stage_of("A").as_deref(), Some("target"));
        assert_eq!(crm.stage_of("B").as_deref(), Some("source"));
    }
}
