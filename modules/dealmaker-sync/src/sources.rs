use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use dealmaker_common::{RecordQuery, SourceRecord};
use hubspot_client::types::MAX_SEARCH_LIMIT;

use crate::traits::RecordStore;

/// A page request failed after some records were already fetched. The
/// records gathered so far are kept so the caller can decide whether to
/// carry on with them.
#[derive(Debug)]
pub struct PartialFetch {
    pub fetched: Vec<SourceRecord>,
    pub error: anyhow::Error,
}

impl fmt::Display for PartialFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record fetch failed after {} records: {:#}",
            self.fetched.len(),
            self.error
        )
    }
}

impl std::error::Error for PartialFetch {}

/// Paginated reader over a [`RecordStore`].
pub struct RecordSource<'a> {
    store: &'a dyn RecordStore,
    page_delay: Duration,
}

impl<'a> RecordSource<'a> {
    pub fn new(store: &'a dyn RecordStore, page_delay: Duration) -> Self {
        Self { store, page_delay }
    }

    /// All records matching `query`, in server order, stopping once
    /// `max_count` have been gathered (if given).
    pub async fn fetch_candidate_records(
        &self,
        query: &RecordQuery,
        max_count: Option<usize>,
    ) -> Result<Vec<SourceRecord>, PartialFetch> {
        let mut records: Vec<SourceRecord> = Vec::new();
        let mut after: Option<String> = None;
        let mut page = 0u32;

        loop {
            if max_count.is_some_and(|max| records.len() >= max) {
                break;
            }
            if page > 0 {
                crate::pause(self.page_delay).await;
            }
            page += 1;

            let limit = match max_count {
                Some(max) => (max - records.len()).min(MAX_SEARCH_LIMIT as usize) as u32,
                None => MAX_SEARCH_LIMIT,
            };
            let result = match self.store.search_records(query, after.take(), limit).await {
                Ok(result) => result,
                Err(error) => {
                    warn!(page, fetched = records.len(), error = %error, "Record page request failed");
                    return Err(PartialFetch {
                        fetched: records,
                        error,
                    });
                }
            };

            info!(page, count = result.records.len(), "Fetched record page");
            records.extend(result.records);

            match result.next_after {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        if let Some(max) = max_count {
            records.truncate(max);
        }
        info!(total = records.len(), stage = %query.stage_id, "Record fetch complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, MockCrm};

    fn query() -> RecordQuery {
        RecordQuery {
            pipeline_id: "default".into(),
            stage_id: "source".into(),
            name_token: "Post:".into(),
        }
    }

    fn crm_with(n: usize) -> MockCrm {
        let crm = MockCrm::new().with_page_size(2);
        for i in 0..n {
            crm.add_record(record(&format!("{i}"), "", "source"));
        }
        crm
    }

    #[tokio::test]
    async fn follows_cursors_until_exhausted() {
        let crm = crm_with(5);
        let records = RecordSource::new(&crm, Duration::ZERO)
            .fetch_candidate_records(&query(), None)
            .await
            .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn stops_at_max_count() {
        let crm = crm_with(5);
        let records = RecordSource::new(&crm, Duration::ZERO)
            .fetch_candidate_records(&query(), Some(3))
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn failed_page_keeps_earlier_records() {
        let crm = crm_with(5).fail_page(2);
        let err = RecordSource::new(&crm, Duration::ZERO)
            .fetch_candidate_records(&query(), None)
            .await
            .unwrap_err();
        assert_eq!(err.fetched.len(), 2);
        assert!(err.to_string().contains("after 2 records"));
    }

    #[tokio::test]
    async fn only_matching_records_are_returned() {
        let crm = crm_with(1);
        crm.add_record(record("other-stage", "", "elsewhere"));
        let mut untagged = record("untagged", "", "source");
        untagged.name = "Weekly digest".into();
        crm.add_record(untagged);

        let records = RecordSource::new(&crm, Duration::ZERO)
            .fetch_candidate_records(&query(), None)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "0");
    }
}
