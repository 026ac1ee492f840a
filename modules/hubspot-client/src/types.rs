use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// --- Property names used by the dealmaker pipeline ---

pub const DEAL_NAME: &str = "dealname";
pub const DEAL_STAGE: &str = "dealstage";
pub const DEAL_PIPELINE: &str = "pipeline";
pub const DEAL_DESCRIPTION: &str = "description";
/// Custom deal property holding the link to the originating post.
pub const DEAL_SOURCE_LINK: &str = "link_original_de_la_noticia";
/// Custom contact property holding the contact's LinkedIn profile URL.
pub const CONTACT_LINKEDIN_URL: &str = "linkedin_profile_link";

/// HubSpot-defined association type id for deal → contact.
pub const DEAL_TO_CONTACT_ASSOCIATION: u32 = 3;

/// Maximum page size accepted by the CRM search endpoints.
pub const MAX_SEARCH_LIMIT: u32 = 100;

// --- Search ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Eq,
    ContainsToken,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub property_name: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl Filter {
    pub fn eq(property: &str, value: impl Into<String>) -> Self {
        Self {
            property_name: property.to_string(),
            operator: FilterOperator::Eq,
            value: value.into(),
        }
    }

    pub fn contains_token(property: &str, value: impl Into<String>) -> Self {
        Self {
            property_name: property.to_string(),
            operator: FilterOperator::ContainsToken,
            value: value.into(),
        }
    }
}

/// Filters within a group are AND-ed; groups are OR-ed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterGroup {
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub filter_groups: Vec<FilterGroup>,
    pub properties: Vec<String>,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl SearchRequest {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self {
            filter_groups: vec![FilterGroup { filters }],
            properties: Vec::new(),
            limit: MAX_SEARCH_LIMIT,
            after: None,
        }
    }

    pub fn properties(mut self, properties: &[&str]) -> Self {
        self.properties = properties.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit.min(MAX_SEARCH_LIMIT);
        self
    }

    pub fn after(mut self, after: Option<String>) -> Self {
        self.after = after;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub results: Vec<CrmObject>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl SearchResponse {
    /// Cursor for the next page, if there is one.
    pub fn next_after(&self) -> Option<String> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|n| n.after.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub next: Option<NextPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextPage {
    pub after: String,
}

// --- Objects ---

/// A CRM object (deal, contact, ...) as returned by the v3 object endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmObject {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Option<String>>,
}

impl CrmObject {
    /// Property value, treating null and missing alike.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_deref())
    }
}

/// Body for create/update calls: `{"properties": {...}}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropertiesPayload {
    pub properties: BTreeMap<String, String>,
}

impl PropertiesPayload {
    pub fn single(name: &str, value: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(name.to_string(), value.into());
        Self { properties }
    }
}

// --- Associations ---

#[derive(Debug, Clone, Deserialize)]
pub struct AssociationList {
    #[serde(default)]
    pub results: Vec<AssociatedObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssociatedObject {
    pub id: String,
    #[serde(rename = "type", default)]
    pub association_type: Option<String>,
}

// --- Pipelines ---

#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub stages: Vec<PipelineStage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStage {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub display_order: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_matches_wire_format() {
        let req = SearchRequest::new(vec![
            Filter::eq(DEAL_STAGE, "1169433784"),
            Filter::contains_token(DEAL_NAME, "Post:"),
        ])
        .properties(&[DEAL_NAME, DEAL_DESCRIPTION])
        .after(Some("100".into()));

        let json = serde_json::to_value(&req).unwrap();
        let filters = &json["filterGroups"][0]["filters"];
        assert_eq!(filters[0]["propertyName"], "dealstage");
        assert_eq!(filters[0]["operator"], "EQ");
        assert_eq!(filters[1]["operator"], "CONTAINS_TOKEN");
        assert_eq!(json["limit"], 100);
        assert_eq!(json["after"], "100");
        assert_eq!(json["properties"][1], "description");
    }

    #[test]
    fn first_page_omits_after() {
        let req = SearchRequest::new(vec![]).limit(500);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("after").is_none());
        assert_eq!(json["limit"], 100);
    }

    #[test]
    fn search_response_exposes_cursor_and_null_properties() {
        let body = r#"{
            "total": 2,
            "results": [
                {"id": "11", "properties": {"dealname": "Post: Jane", "description": null}}
            ],
            "paging": {"next": {"after": "1", "link": "?after=1"}}
        }"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.next_after().as_deref(), Some("1"));
        assert_eq!(resp.results[0].property(DEAL_NAME), Some("Post: Jane"));
        assert_eq!(resp.results[0].property(DEAL_DESCRIPTION), None);
        assert_eq!(resp.results[0].property("missing"), None);
    }

    #[test]
    fn last_page_has_no_cursor() {
        let resp: SearchResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(resp.next_after().is_none());
    }

    #[test]
    fn pipelines_parse() {
        let body = r#"{"results":[{"id":"654720623","label":"Proyectos","stages":[{"id":"1169433784","label":"13P Posible Oportunidad","displayOrder":0}]}]}"#;
        let resp: ListResponse<Pipeline> = serde_json::from_str(body).unwrap();
        assert_eq!(resp.results[0].stages[0].label, "13P Posible Oportunidad");
    }
}
