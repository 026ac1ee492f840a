use std::time::Duration;

use tracing::{debug, info, warn};

use dealmaker_common::ProfileCandidate;

use crate::traits::ContactStore;

/// Candidates split by whether the CRM already holds a contact for them.
#[derive(Debug, Default)]
pub struct Partition {
    /// Candidate plus the id of its existing contact.
    pub existing: Vec<(ProfileCandidate, String)>,
    pub new: Vec<ProfileCandidate>,
}

/// Look each candidate up by profile URL, one request at a time.
///
/// A failed lookup counts the candidate as new: enrichment is repeated at
/// worst, and the reconciler checks again before creating anything.
pub async fn partition(
    contacts: &dyn ContactStore,
    candidates: Vec<ProfileCandidate>,
    lookup_delay: Duration,
) -> Partition {
    let mut result = Partition::default();

    for (i, candidate) in candidates.into_iter().enumerate() {
        if i > 0 {
            crate::pause(lookup_delay).await;
        }
        match contacts.find_contact_by_profile_url(&candidate.url).await {
            Ok(Some(contact_id)) => {
                debug!(url = %candidate.url, %contact_id, "Contact already exists");
                result.existing.push((candidate, contact_id));
            }
            Ok(None) => result.new.push(candidate),
            Err(e) => {
                warn!(url = %candidate.url, error = %e, "Contact lookup failed, treating as new");
                result.new.push(candidate);
            }
        }
    }

    info!(
        existing = result.existing.len(),
        new = result.new.len(),
        "Partitioned profile candidates"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, MockCrm};

    fn candidate(url: &str) -> ProfileCandidate {
        ProfileCandidate::new(url, &record("1", "", "source"))
    }

    #[tokio::test]
    async fn splits_on_existing_contacts() {
        let crm = MockCrm::new().with_contact("c-1", "https://www.linkedin.com/in/jane-doe");
        let parts = partition(
            &crm,
            vec![
                candidate("https://www.linkedin.com/in/jane-doe"),
                candidate("https://www.linkedin.com/in/new-person"),
            ],
            Duration::ZERO,
        )
        .await;

        assert_eq!(parts.existing.len(), 1);
        assert_eq!(parts.existing[0].1, "c-1");
        assert_eq!(parts.new.len(), 1);
        assert_eq!(parts.new[0].url, "https://www.linkedin.com/in/new-person");
    }

    #[tokio::test]
    async fn lookup_failure_treats_candidate_as_new() {
        let crm = MockCrm::new()
            .with_contact("c-1", "https://www.linkedin.com/in/jane-doe")
            .fail_lookup("https://www.linkedin.com/in/jane-doe");
        let parts = partition(
            &crm,
            vec![candidate("https://www.linkedin.com/in/jane-doe")],
            Duration::ZERO,
        )
        .await;
        assert!(parts.existing.is_empty());
        assert_eq!(parts.new.len(), 1);
    }
}
