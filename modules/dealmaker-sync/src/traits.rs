// Collaborator seams for the dealmaker workflow.
//
// RecordStore / ContactStore: the CRM, split by capability so callers only
//   see what they use. HubSpotClient implements both.
// ProfileEnricher: batch profile scraping (Apify in production).
// ProfileClassifier: person/company labelling (LLM or rules).
//
// Mocks for all four live in `testing.rs`.

use anyhow::Result;
use async_trait::async_trait;

use dealmaker_common::{RecordQuery, SourceRecord};
use hubspot_client::types::{
    CONTACT_LINKEDIN_URL, DEAL_DESCRIPTION, DEAL_NAME, DEAL_PIPELINE, DEAL_SOURCE_LINK, DEAL_STAGE,
};
use hubspot_client::{CrmObject, Filter, HubSpotClient, ObjectType, PropertiesPayload, SearchRequest};

use crate::classifier::ProfileKind;
use crate::profile::{ContactDraft, NormalizedProfile, RawProfile};

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// One page of source records plus the cursor for the next page.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<SourceRecord>,
    pub next_after: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one page of records matching the query.
    async fn search_records(
        &self,
        query: &RecordQuery,
        after: Option<String>,
        limit: u32,
    ) -> Result<RecordPage>;

    /// Move a record to another pipeline stage.
    async fn set_record_stage(&self, record_id: &str, stage_id: &str) -> Result<()>;

    /// Link a record to a contact.
    async fn associate_contact(&self, record_id: &str, contact_id: &str) -> Result<()>;

    /// Contacts currently linked to a record.
    async fn associated_contact_ids(&self, record_id: &str) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// ContactStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Exact match on the profile-URL property. Returns the contact id.
    async fn find_contact_by_profile_url(&self, url: &str) -> Result<Option<String>>;

    /// Create a contact, returning its id.
    async fn create_contact(&self, contact: &ContactDraft) -> Result<String>;

    /// Overwrite the non-empty fields of an existing contact.
    async fn update_contact(&self, contact_id: &str, contact: &ContactDraft) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ProfileEnricher / ProfileClassifier
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProfileEnricher: Send + Sync {
    /// Scrape all `urls` in one batch. Either the whole result list or an error.
    async fn enrich(&self, urls: &[String]) -> Result<Vec<RawProfile>>;
}

#[async_trait]
pub trait ProfileClassifier: Send + Sync {
    /// Label a profile. Never fails: problems degrade to `Unknown`.
    async fn classify(&self, profile: &NormalizedProfile) -> ProfileKind;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// HubSpot implementations
// ---------------------------------------------------------------------------

const DEAL_PROPERTIES: &[&str] = &[
    DEAL_NAME,
    DEAL_STAGE,
    DEAL_PIPELINE,
    DEAL_SOURCE_LINK,
    DEAL_DESCRIPTION,
];

fn record_from_deal(deal: CrmObject) -> SourceRecord {
    SourceRecord {
        name: deal.property(DEAL_NAME).unwrap_or_default().to_string(),
        description: deal.property(DEAL_DESCRIPTION).unwrap_or_default().to_string(),
        link: deal
            .property(DEAL_SOURCE_LINK)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
        stage: deal.property(DEAL_STAGE).map(str::to_string),
        id: deal.id,
    }
}

#[async_trait]
impl RecordStore for HubSpotClient {
    async fn search_records(
        &self,
        query: &RecordQuery,
        after: Option<String>,
        limit: u32,
    ) -> Result<RecordPage> {
        let request = SearchRequest::new(vec![
            Filter::eq(DEAL_STAGE, &query.stage_id),
            Filter::eq(DEAL_PIPELINE, &query.pipeline_id),
            Filter::contains_token(DEAL_NAME, &query.name_token),
        ])
        .properties(DEAL_PROPERTIES)
        .limit(limit)
        .after(after);

        let response = self.search(ObjectType::Deals, &request).await?;
        let next_after = response.next_after();
        Ok(RecordPage {
            records: response.results.into_iter().map(record_from_deal).collect(),
            next_after,
        })
    }

    async fn set_record_stage(&self, record_id: &str, stage_id: &str) -> Result<()> {
        Ok(self.update_deal_stage(record_id, stage_id).await?)
    }

    async fn associate_contact(&self, record_id: &str, contact_id: &str) -> Result<()> {
        Ok(self.associate_deal_contact(record_id, contact_id).await?)
    }

    async fn associated_contact_ids(&self, record_id: &str) -> Result<Vec<String>> {
        Ok(self.deal_contact_ids(record_id).await?)
    }
}

#[async_trait]
impl ContactStore for HubSpotClient {
    async fn find_contact_by_profile_url(&self, url: &str) -> Result<Option<String>> {
        let found = self
            .find_by_property(
                ObjectType::Contacts,
                CONTACT_LINKEDIN_URL,
                url,
                &["firstname", "lastname", CONTACT_LINKEDIN_URL],
            )
            .await?;
        Ok(found.map(|c| c.id))
    }

    async fn create_contact(&self, contact: &ContactDraft) -> Result<String> {
        let payload = PropertiesPayload {
            properties: contact.properties(true),
        };
        let created = self.create(ObjectType::Contacts, &payload).await?;
        Ok(created.id)
    }

    async fn update_contact(&self, contact_id: &str, contact: &ContactDraft) -> Result<()> {
        let payload = PropertiesPayload {
            properties: contact.properties(false),
        };
        self.update(ObjectType::Contacts, contact_id, &payload).await?;
        Ok(())
    }
}
