use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Scraper mode that returns full profile details without the paid email search.
pub const PROFILE_DETAILS_MODE: &str = "Profile details no email ($4 per 1k)";

/// Input for the LinkedIn profile scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedInProfileScraperInput {
    #[serde(rename = "profileScraperMode")]
    pub profile_scraper_mode: String,
    /// Profile URLs (or public identifiers) to scrape.
    pub queries: Vec<String>,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
}

/// Terminal and non-terminal run states reported by Apify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed(String),
    InProgress,
}

impl RunStatus {
    pub fn from_api(status: &str) -> Self {
        match status {
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" | "ABORTED" | "TIMED-OUT" => Self::Failed(status.to_string()),
            _ => Self::InProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_input_serializes_with_actor_field_names() {
        let input = LinkedInProfileScraperInput {
            profile_scraper_mode: PROFILE_DETAILS_MODE.into(),
            queries: vec!["https://www.linkedin.com/in/jane-doe".into()],
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(
            json["profileScraperMode"],
            "Profile details no email ($4 per 1k)"
        );
        assert_eq!(json["queries"][0], "https://www.linkedin.com/in/jane-doe");
    }

    #[test]
    fn run_data_parses_api_envelope() {
        let body = r#"{"data":{"id":"run1","status":"RUNNING","defaultDatasetId":"ds1","startedAt":"2026-10-19T10:00:00.000Z","finishedAt":null}}"#;
        let resp: ApiResponse<RunData> = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data.id, "run1");
        assert_eq!(resp.data.default_dataset_id, "ds1");
        assert_eq!(RunStatus::from_api(&resp.data.status), RunStatus::InProgress);
    }

    #[test]
    fn run_status_classifies_terminal_states() {
        assert_eq!(RunStatus::from_api("SUCCEEDED"), RunStatus::Succeeded);
        assert_eq!(
            RunStatus::from_api("TIMED-OUT"),
            RunStatus::Failed("TIMED-OUT".into())
        );
        assert_eq!(RunStatus::from_api("READY"), RunStatus::InProgress);
    }
}
