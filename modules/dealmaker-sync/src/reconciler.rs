use std::fmt;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use dealmaker_common::ProfileCandidate;

use crate::classifier::ProfileKind;
use crate::profile::{ContactDraft, NormalizedProfile};
use crate::traits::{ContactStore, ProfileClassifier, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Profile carried no URL.
    NoUrl,
    /// Classified as an organization.
    Company,
    /// No usable first name for a new contact.
    NoName,
    /// The enrichment provider returned nothing for the candidate.
    NotEnriched,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoUrl => write!(f, "no profile url"),
            SkipReason::Company => write!(f, "company profile"),
            SkipReason::NoName => write!(f, "no valid name"),
            SkipReason::NotEnriched => write!(f, "not enriched"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Skipped(SkipReason),
    /// Existing contact refreshed with scraped fields.
    Updated,
    Created,
    /// Existing contact associated without touching its fields.
    Linked,
}

/// What happened to one candidate. Association results are per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub action: ReconcileAction,
    pub contact_id: Option<String>,
    pub associated: Vec<String>,
    pub failed_associations: Vec<String>,
}

impl ReconcileOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            action: ReconcileAction::Skipped(reason),
            contact_id: None,
            associated: Vec::new(),
            failed_associations: Vec::new(),
        }
    }
}

/// Turns a candidate (and its scraped profile) into a contact linked to
/// every record that mentioned it.
pub struct Reconciler<'a> {
    records: &'a dyn RecordStore,
    contacts: &'a dyn ContactStore,
    classifier: &'a dyn ProfileClassifier,
    write_delay: Duration,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        records: &'a dyn RecordStore,
        contacts: &'a dyn ContactStore,
        classifier: &'a dyn ProfileClassifier,
        write_delay: Duration,
    ) -> Self {
        Self {
            records,
            contacts,
            classifier,
            write_delay,
        }
    }

    /// Update-or-create the contact for `candidate`, then associate it.
    ///
    /// Lookup, create and update failures are returned as errors. Association
    /// failures are not: they are reported per record in the outcome.
    pub async fn reconcile(
        &self,
        candidate: &ProfileCandidate,
        profile: &NormalizedProfile,
    ) -> Result<ReconcileOutcome> {
        if profile.profile_url.trim().is_empty() {
            return Ok(ReconcileOutcome::skipped(SkipReason::NoUrl));
        }
        let draft = ContactDraft::from_profile(profile, &candidate.url);

        if let Some(contact_id) = self.contacts.find_contact_by_profile_url(&candidate.url).await? {
            self.contacts.update_contact(&contact_id, &draft).await?;
            info!(%contact_id, url = %candidate.url, "Updated existing contact");
            return Ok(self
                .associate_all(candidate, contact_id, ReconcileAction::Updated)
                .await);
        }

        let kind = self.classifier.classify(profile).await;
        if kind == ProfileKind::Company {
            info!(url = %candidate.url, name = %profile.name, "Skipping company profile");
            return Ok(ReconcileOutcome::skipped(SkipReason::Company));
        }

        if !draft.has_valid_name() {
            warn!(
                url = %candidate.url,
                name = %profile.name,
                experience = profile.experience_count,
                education = profile.education_count,
                "Skipping profile without a usable name"
            );
            return Ok(ReconcileOutcome::skipped(SkipReason::NoName));
        }

        let contact_id = self.contacts.create_contact(&draft).await?;
        info!(
            %contact_id,
            url = %candidate.url,
            name = %profile.name,
            %kind,
            "Created contact"
        );
        let outcome = self
            .associate_all(candidate, contact_id, ReconcileAction::Created)
            .await;
        crate::pause(self.write_delay).await;
        Ok(outcome)
    }

    /// Associate an already-known contact without updating it.
    pub async fn link_existing(
        &self,
        candidate: &ProfileCandidate,
        contact_id: &str,
    ) -> ReconcileOutcome {
        self.associate_all(candidate, contact_id.to_string(), ReconcileAction::Linked)
            .await
    }

    async fn associate_all(
        &self,
        candidate: &ProfileCandidate,
        contact_id: String,
        action: ReconcileAction,
    ) -> ReconcileOutcome {
        let mut associated = Vec::new();
        let mut failed = Vec::new();

        for record_id in &candidate.record_ids {
            match self.records.associate_contact(record_id, &contact_id).await {
                Ok(()) => associated.push(record_id.clone()),
                Err(e) => {
                    warn!(%record_id, %contact_id, error = %e, "Association failed");
                    failed.push(record_id.clone());
                }
            }
        }

        ReconcileOutcome {
            action,
            contact_id: Some(contact_id),
            associated,
            failed_associations: failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RuleClassifier;
    use crate::testing::{record, FixedClassifier, MockCrm};

    const URL: &str = "https://www.linkedin.com/in/jane-doe";

    fn candidate(record_ids: &[&str]) -> ProfileCandidate {
        let mut c = ProfileCandidate::new(URL, &record(record_ids[0], "", "source"));
        for id in &record_ids[1..] {
            c.add_record(&record(id, "", "source"));
        }
        c
    }

    fn jane() -> NormalizedProfile {
        NormalizedProfile {
            name: "Jane Doe".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            position: "CEO".into(),
            company: "Acme".into(),
            profile_url: URL.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn creates_and_associates_new_person() {
        let crm = MockCrm::new();
        let reconciler = Reconciler::new(&crm, &crm, &RuleClassifier, Duration::ZERO);

        let outcome = reconciler.reconcile(&candidate(&["A", "B"]), &jane()).await.unwrap();

        assert_eq!(outcome.action, ReconcileAction::Created);
        assert_eq!(outcome.associated, vec!["A", "B"]);
        let contacts = crm.contacts();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].profile_url, URL);
        assert_eq!(contacts[0].properties.get("firstname").map(String::as_str), Some("Jane"));
        assert_eq!(
            contacts[0].properties.get("lifecyclestage").map(String::as_str),
            Some("lead")
        );
    }

    #[tokio::test]
    async fn existing_contact_is_updated_not_duplicated() {
        let crm = MockCrm::new().with_contact("c-9", URL);
        let reconciler = Reconciler::new(&crm, &crm, &FixedClassifier(ProfileKind::Company), Duration::ZERO);

        let outcome = reconciler.reconcile(&candidate(&["A"]), &jane()).await.unwrap();

        assert_eq!(outcome.action, ReconcileAction::Updated);
        assert_eq!(outcome.contact_id.as_deref(), Some("c-9"));
        assert_eq!(crm.contacts().len(), 1);
        assert_eq!(
            crm.contacts()[0].properties.get("jobtitle").map(String::as_str),
            Some("CEO")
        );
        assert_eq!(crm.associations(), vec![("A".to_string(), "c-9".to_string())]);
    }

    #[tokio::test]
    async fn company_profiles_are_skipped() {
        let crm = MockCrm::new();
        let reconciler = Reconciler::new(&crm, &crm, &FixedClassifier(ProfileKind::Company), Duration::ZERO);
        let outcome = reconciler.reconcile(&candidate(&["A"]), &jane()).await.unwrap();
        assert_eq!(outcome.action, ReconcileAction::Skipped(SkipReason::Company));
        assert!(crm.contacts().is_empty());
        assert!(crm.associations().is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_proceeds_as_person() {
        let crm = MockCrm::new();
        let reconciler = Reconciler::new(&crm, &crm, &FixedClassifier(ProfileKind::Unknown), Duration::ZERO);
        let outcome = reconciler.reconcile(&candidate(&["A"]), &jane()).await.unwrap();
        assert_eq!(outcome.action, ReconcileAction::Created);
    }

    #[tokio::test]
    async fn nameless_profile_is_skipped() {
        let crm = MockCrm::new();
        let reconciler = Reconciler::new(&crm, &crm, &FixedClassifier(ProfileKind::Person), Duration::ZERO);
        let profile = NormalizedProfile {
            profile_url: URL.into(),
            ..Default::default()
        };
        let outcome = reconciler.reconcile(&candidate(&["A"]), &profile).await.unwrap();
        assert_eq!(outcome.action, ReconcileAction::Skipped(SkipReason::NoName));
        assert!(crm.contacts().is_empty());
    }

    #[tokio::test]
    async fn profile_without_url_is_skipped() {
        let crm = MockCrm::new();
        let reconciler = Reconciler::new(&crm, &crm, &RuleClassifier, Duration::ZERO);
        let mut profile = jane();
        profile.profile_url.clear();
        let outcome = reconciler.reconcile(&candidate(&["A"]), &profile).await.unwrap();
        assert_eq!(outcome.action, ReconcileAction::Skipped(SkipReason::NoUrl));
    }

    #[tokio::test]
    async fn association_failure_is_reported_per_record() {
        let crm = MockCrm::new().fail_association("B");
        let reconciler = Reconciler::new(&crm, &crm, &RuleClassifier, Duration::ZERO);
        let outcome = reconciler.reconcile(&candidate(&["A", "B"]), &jane()).await.unwrap();
        assert_eq!(outcome.action, ReconcileAction::Created);
        assert_eq!(outcome.associated, vec!["A"]);
        assert_eq!(outcome.failed_associations, vec!["B"]);
    }

    #[tokio::test]
    async fn lookup_failure_is_an_error() {
        let crm = MockCrm::new().fail_lookup(URL);
        let reconciler = Reconciler::new(&crm, &crm, &RuleClassifier, Duration::ZERO);
        assert!(reconciler.reconcile(&candidate(&["A"]), &jane()).await.is_err());
        assert!(crm.contacts().is_empty());
    }

    #[tokio::test]
    async fn link_existing_associates_without_update() {
        let crm = MockCrm::new().with_contact("c-1", URL);
        let reconciler = Reconciler::new(&crm, &crm, &RuleClassifier, Duration::ZERO);
        let outcome = reconciler.link_existing(&candidate(&["A"]), "c-1").await;
        assert_eq!(outcome.action, ReconcileAction::Linked);
        assert_eq!(outcome.associated, vec!["A"]);
        assert!(crm.contacts()[0].properties.get("jobtitle").is_none());
    }
}
