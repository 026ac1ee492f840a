// Test mocks for the dealmaker workflow.
//
// Three mocks matching the trait boundaries:
// - MockCrm (RecordStore + ContactStore): stateful in-memory CRM
// - MockEnricher (ProfileEnricher): HashMap-based URL→profile JSON
// - FixedClassifier (ProfileClassifier): always returns one label
//
// Plus helpers for building source records and scraped profiles.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use dealmaker_common::{RecordQuery, SourceRecord};

use crate::classifier::ProfileKind;
use crate::profile::{ContactDraft, NormalizedProfile, RawProfile};
use crate::traits::{ContactStore, ProfileClassifier, ProfileEnricher, RecordPage, RecordStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A tagged source record named `Post: {id}`.
pub fn record(id: &str, description: &str, stage: &str) -> SourceRecord {
    SourceRecord {
        id: id.to_string(),
        name: format!("Post: {id}"),
        description: description.to_string(),
        link: None,
        stage: Some(stage.to_string()),
    }
}

/// Scraped profile in the shape the LinkedIn actor returns.
pub fn linkedin_profile(url: &str, name: &str, position: &str, company: &str) -> Value {
    json!({
        "linkedinUrl": url,
        "name": name,
        "position": position,
        "company": company,
        "location": "Madrid, Spain",
        "about": "",
    })
}

// ---------------------------------------------------------------------------
// MockCrm
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MockContact {
    pub id: String,
    pub profile_url: String,
    pub properties: BTreeMap<String, String>,
}

struct MockCrmInner {
    records: Vec<SourceRecord>,
    contacts: Vec<MockContact>,
    /// (record_id, contact_id)
    associations: Vec<(String, String)>,
    /// (record_id, stage_id), in call order
    stage_moves: Vec<(String, String)>,
    page_size: usize,
    search_calls: u32,
    next_contact: u32,
    failing_page: Option<u32>,
    failing_lookups: HashSet<String>,
    failing_associations: HashSet<String>,
    failing_stage_moves: HashSet<String>,
    failing_association_reads: HashSet<String>,
    fail_on_create: bool,
}

/// In-memory CRM. Thread-safe via interior Mutex.
pub struct MockCrm {
    inner: Mutex<MockCrmInner>,
}

impl Default for MockCrm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCrm {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockCrmInner {
                records: Vec::new(),
                contacts: Vec::new(),
                associations: Vec::new(),
                stage_moves: Vec::new(),
                page_size: 100,
                search_calls: 0,
                next_contact: 1,
                failing_page: None,
                failing_lookups: HashSet::new(),
                failing_associations: HashSet::new(),
                failing_stage_moves: HashSet::new(),
                failing_association_reads: HashSet::new(),
                fail_on_create: false,
            }),
        }
    }

    pub fn with_page_size(self, size: usize) -> Self {
        self.inner.lock().unwrap().page_size = size.max(1);
        self
    }

    pub fn with_record(self, record: SourceRecord) -> Self {
        self.add_record(record);
        self
    }

    /// Pre-populate a contact whose profile URL is `url`.
    pub fn with_contact(self, id: &str, url: &str) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            hubspot_client::types::CONTACT_LINKEDIN_URL.to_string(),
            url.to_string(),
        );
        self.inner.lock().unwrap().contacts.push(MockContact {
            id: id.to_string(),
            profile_url: url.to_string(),
            properties,
        });
        self
    }

    /// Pre-populate an association.
    pub fn with_association(self, record_id: &str, contact_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .associations
            .push((record_id.to_string(), contact_id.to_string()));
        self
    }

    /// Make the `n`th search call (1-based) fail.
    pub fn fail_page(self, n: u32) -> Self {
        self.inner.lock().unwrap().failing_page = Some(n);
        self
    }

    pub fn fail_lookup(self, url: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_lookups
            .insert(url.to_string());
        self
    }

    pub fn fail_association(self, record_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_associations
            .insert(record_id.to_string());
        self
    }

    pub fn fail_stage_move(self, record_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_stage_moves
            .insert(record_id.to_string());
        self
    }

    pub fn fail_association_read(self, record_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_association_reads
            .insert(record_id.to_string());
        self
    }

    /// Make `create_contact` return an error for every call.
    pub fn failing_creates(self) -> Self {
        self.inner.lock().unwrap().fail_on_create = true;
        self
    }

    pub fn add_record(&self, record: SourceRecord) {
        self.inner.lock().unwrap().records.push(record);
    }

    // --- Assertion helpers ---

    pub fn all_records(&self) -> Vec<SourceRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn contacts(&self) -> Vec<MockContact> {
        self.inner.lock().unwrap().contacts.clone()
    }

    pub fn contact_by_url(&self, url: &str) -> Option<MockContact> {
        self.inner
            .lock()
            .unwrap()
            .contacts
            .iter()
            .find(|c| c.profile_url == url)
            .cloned()
    }

    pub fn associations(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().associations.clone()
    }

    pub fn stage_of(&self, record_id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.id == record_id)
            .and_then(|r| r.stage.clone())
    }

    pub fn stage_moves(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().stage_moves.clone()
    }
}

#[async_trait]
impl RecordStore for MockCrm {
    async fn search_records(
        &self,
        query: &RecordQuery,
        after: Option<String>,
        limit: u32,
    ) -> Result<RecordPage> {
        let mut inner = self.inner.lock().unwrap();
        inner.search_calls += 1;
        if inner.failing_page == Some(inner.search_calls) {
            return Err(anyhow!("mock search failure on page {}", inner.search_calls));
        }

        let matching: Vec<SourceRecord> = inner
            .records
            .iter()
            .filter(|r| r.stage.as_deref() == Some(query.stage_id.as_str()))
            .filter(|r| r.name.contains(&query.name_token))
            .cloned()
            .collect();

        let start = after.and_then(|a| a.parse::<usize>().ok()).unwrap_or(0);
        let size = inner.page_size.min(limit as usize);
        let end = (start + size).min(matching.len());
        let records = matching.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_after = (end < matching.len()).then(|| end.to_string());

        Ok(RecordPage {
            records,
            next_after,
        })
    }

    async fn set_record_stage(&self, record_id: &str, stage_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_stage_moves.contains(record_id) {
            return Err(anyhow!("mock stage move failure for {record_id}"));
        }
        inner
            .stage_moves
            .push((record_id.to_string(), stage_id.to_string()));
        match inner.records.iter_mut().find(|r| r.id == record_id) {
            Some(record) => {
                record.stage = Some(stage_id.to_string());
                Ok(())
            }
            None => Err(anyhow!("record {record_id} not found")),
        }
    }

    async fn associate_contact(&self, record_id: &str, contact_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_associations.contains(record_id) {
            return Err(anyhow!("mock association failure for {record_id}"));
        }
        let pair = (record_id.to_string(), contact_id.to_string());
        if !inner.associations.contains(&pair) {
            inner.associations.push(pair);
        }
        Ok(())
    }

    async fn associated_contact_ids(&self, record_id: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_association_reads.contains(record_id) {
            return Err(anyhow!("mock association read failure for {record_id}"));
        }
        Ok(inner
            .associations
            .iter()
            .filter(|(r, _)| r == record_id)
            .map(|(_, c)| c.clone())
            .collect())
    }
}

#[async_trait]
impl ContactStore for MockCrm {
    async fn find_contact_by_profile_url(&self, url: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_lookups.contains(url) {
            return Err(anyhow!("mock lookup failure for {url}"));
        }
        Ok(inner
            .contacts
            .iter()
            .find(|c| c.profile_url == url)
            .map(|c| c.id.clone()))
    }

    async fn create_contact(&self, contact: &ContactDraft) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_on_create {
            return Err(anyhow!("mock create failure"));
        }
        let id = format!("contact-{}", inner.next_contact);
        inner.next_contact += 1;
        inner.contacts.push(MockContact {
            id: id.clone(),
            profile_url: contact.profile_url.clone(),
            properties: contact.properties(true),
        });
        Ok(id)
    }

    async fn update_contact(&self, contact_id: &str, contact: &ContactDraft) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner
            .contacts
            .iter_mut()
            .find(|c| c.id == contact_id)
            .ok_or_else(|| anyhow!("contact {contact_id} not found"))?;
        existing.properties.extend(contact.properties(false));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockEnricher
// ---------------------------------------------------------------------------

/// Returns the registered profile for each requested URL; unknown URLs are
/// silently dropped, as the real scraper does for private profiles.
pub struct MockEnricher {
    profiles: HashMap<String, Value>,
    fail_all: bool,
    failing_call: Option<usize>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl Default for MockEnricher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnricher {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            fail_all: false,
            failing_call: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    pub fn with_profile(mut self, url: &str, profile: Value) -> Self {
        self.profiles.insert(url.to_string(), profile);
        self
    }

    /// Make the `n`th call (1-based) fail.
    pub fn fail_call(mut self, n: usize) -> Self {
        self.failing_call = Some(n);
        self
    }

    /// URL batches received, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileEnricher for MockEnricher {
    async fn enrich(&self, urls: &[String]) -> Result<Vec<RawProfile>> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(urls.to_vec());
            calls.len()
        };
        if self.fail_all || self.failing_call == Some(call) {
            return Err(anyhow!("mock enrichment failure"));
        }
        Ok(urls
            .iter()
            .filter_map(|u| self.profiles.get(u))
            .cloned()
            .map(RawProfile)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FixedClassifier
// ---------------------------------------------------------------------------

pub struct FixedClassifier(pub ProfileKind);

#[async_trait]
impl ProfileClassifier for FixedClassifier {
    async fn classify(&self, _profile: &NormalizedProfile) -> ProfileKind {
        self.0
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
