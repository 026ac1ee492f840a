pub mod error;
pub mod types;

pub use error::{HubSpotError, Result};
pub use types::{
    AssociatedObject, CrmObject, Filter, FilterGroup, FilterOperator, Pipeline, PipelineStage,
    PropertiesPayload, SearchRequest, SearchResponse,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{AssociationList, ListResponse, DEAL_STAGE, DEAL_TO_CONTACT_ASSOCIATION};

const BASE_URL: &str = "https://api.hubapi.com";

/// CRM object families this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Deals,
    Contacts,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Deals => "deals",
            ObjectType::Contacts => "contacts",
        }
    }
}

pub struct HubSpotClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl HubSpotClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HubSpotError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Run one page of a CRM search. Callers drive pagination via `after`.
    pub async fn search(&self, object: ObjectType, request: &SearchRequest) -> Result<SearchResponse> {
        tracing::debug!(
            object = object.as_str(),
            after = ?request.after,
            limit = request.limit,
            "HubSpot search"
        );
        self.post_json(&format!("/crm/v3/objects/{}/search", object.as_str()), request)
            .await
    }

    /// Patch properties on an existing object.
    pub async fn update(
        &self,
        object: ObjectType,
        id: &str,
        payload: &PropertiesPayload,
    ) -> Result<CrmObject> {
        let url = format!("{}/crm/v3/objects/{}/{}", self.base_url, object.as_str(), id);
        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Create a new object and return it (with its assigned id).
    pub async fn create(&self, object: ObjectType, payload: &PropertiesPayload) -> Result<CrmObject> {
        self.post_json(&format!("/crm/v3/objects/{}", object.as_str()), payload)
            .await
    }

    /// Move a deal to another pipeline stage.
    pub async fn update_deal_stage(&self, deal_id: &str, stage_id: &str) -> Result<()> {
        self.update(
            ObjectType::Deals,
            deal_id,
            &PropertiesPayload::single(DEAL_STAGE, stage_id),
        )
        .await?;
        Ok(())
    }

    /// Exact-match lookup of a single object by property value. Returns the
    /// first hit; a 404 counts as "not found".
    pub async fn find_by_property(
        &self,
        object: ObjectType,
        property: &str,
        value: &str,
        properties: &[&str],
    ) -> Result<Option<CrmObject>> {
        let request = SearchRequest::new(vec![Filter::eq(property, value)])
            .properties(properties)
            .limit(1);
        match self.search(object, &request).await {
            Ok(resp) => Ok(resp.results.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Link a deal to a contact. Re-linking an existing pair is harmless.
    pub async fn associate_deal_contact(&self, deal_id: &str, contact_id: &str) -> Result<()> {
        let url = format!(
            "{}/crm/v3/objects/deals/{}/associations/contacts/{}/{}",
            self.base_url, deal_id, contact_id, DEAL_TO_CONTACT_ASSOCIATION
        );
        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// IDs of contacts associated with a deal.
    pub async fn deal_contact_ids(&self, deal_id: &str) -> Result<Vec<String>> {
        let list: AssociationList = self
            .get_json(&format!("/crm/v3/objects/deals/{}/associations/contacts", deal_id))
            .await?;
        Ok(list.results.into_iter().map(|a| a.id).collect())
    }

    /// All pipelines (with stages) for an object family.
    pub async fn list_pipelines(&self, object: ObjectType) -> Result<Vec<Pipeline>> {
        let list: ListResponse<Pipeline> = self
            .get_json(&format!("/crm/v3/pipelines/{}", object.as_str()))
            .await?;
        Ok(list.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths() {
        assert_eq!(ObjectType::Deals.as_str(), "deals");
        assert_eq!(ObjectType::Contacts.as_str(), "contacts");
    }

    #[test]
    fn not_found_detection() {
        let err = HubSpotError::Api {
            status: 404,
            message: String::new(),
        };
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unreachable_api_surfaces_network_error() {
        let client = HubSpotClient::new("token".into()).with_base_url("http://127.0.0.1:9");
        let err = client.update_deal_stage("1", "2").await.unwrap_err();
        assert!(matches!(err, HubSpotError::Network(_)));
    }
}
