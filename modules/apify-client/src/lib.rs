pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{LinkedInProfileScraperInput, RunData, RunStatus, PROFILE_DETAILS_MODE};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for the LinkedIn profile scraper (no cookies, batch queries).
pub const LINKEDIN_PROFILE_SCRAPER: &str = "LpVuK3Zozwuipa5bp";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
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
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    /// Start an actor run with the given input. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize + ?Sized>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let api_resp: ApiResponse<RunData> = Self::check(resp).await?.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let api_resp: ApiResponse<RunData> = Self::check(resp).await?.json().await?;
            match RunStatus::from_api(&api_resp.data.status) {
                RunStatus::Succeeded => return Ok(api_resp.data),
                RunStatus::Failed(status) => return Err(ApifyError::RunFailed(status)),
                RunStatus::InProgress => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let items: Vec<T> = Self::check(resp).await?.json().await?;
        Ok(items)
    }

    /// Run an actor end-to-end: start, poll, fetch the default dataset.
    pub async fn call_actor<I, T>(&self, actor_id: &str, input: &I) -> Result<Vec<T>>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let run = self.start_run(actor_id, input).await?;
        tracing::info!(run_id = %run.id, actor_id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        self.get_dataset_items(&completed.default_dataset_id).await
    }

    /// Scrape LinkedIn profiles in a single batch run.
    ///
    /// Items are returned as raw JSON: the actor's output shape varies between
    /// profiles and callers normalize it themselves.
    pub async fn scrape_linkedin_profiles(
        &self,
        profile_urls: &[String],
    ) -> Result<Vec<serde_json::Value>> {
        tracing::info!(count = profile_urls.len(), "Starting LinkedIn profile scrape");

        let input = LinkedInProfileScraperInput {
            profile_scraper_mode: PROFILE_DETAILS_MODE.to_string(),
            queries: profile_urls.to_vec(),
        };

        let items: Vec<serde_json::Value> =
            self.call_actor(LINKEDIN_PROFILE_SCRAPER, &input).await?;
        tracing::info!(count = items.len(), "Fetched LinkedIn profiles");

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_api_surfaces_network_error() {
        let client = ApifyClient::new("token".into()).with_base_url("http://127.0.0.1:9/v2/");
        let result = client
            .scrape_linkedin_profiles(&["https://www.linkedin.com/in/jane-doe".to_string()])
            .await;
        assert!(matches!(result, Err(ApifyError::Network(_))));
    }

    #[test]
    fn base_url_is_trimmed() {
        let client = ApifyClient::new("token".into()).with_base_url("http://localhost:1234/v2/");
        assert_eq!(client.base_url, "http://localhost:1234/v2");
    }
}
