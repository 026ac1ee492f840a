use apify_client::ApifyClient;
use async_trait::async_trait;
use tracing::info;

use dealmaker_common::DealmakerError;

use crate::profile::RawProfile;
use crate::traits::ProfileEnricher;

/// Scrapes profiles through the Apify LinkedIn profile actor.
pub struct ApifyEnricher {
    client: ApifyClient,
}

impl ApifyEnricher {
    pub fn new(client: ApifyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileEnricher for ApifyEnricher {
    async fn enrich(&self, urls: &[String]) -> anyhow::Result<Vec<RawProfile>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let items = self.client.scrape_linkedin_profiles(urls).await?;
        Ok(items.into_iter().map(RawProfile::from).collect())
    }
}

/// Run one enrichment batch. Provider failures surface as
/// [`DealmakerError::Enrichment`].
pub async fn enrich_batch(
    enricher: &dyn ProfileEnricher,
    urls: &[String],
) -> Result<Vec<RawProfile>, DealmakerError> {
    if urls.is_empty() {
        return Ok(Vec::new());
    }
    info!(count = urls.len(), "Enriching profiles");
    let profiles = enricher
        .enrich(urls)
        .await
        .map_err(|e| DealmakerError::Enrichment(format!("{e:#}")))?;
    info!(requested = urls.len(), returned = profiles.len(), "Enrichment finished");
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEnricher;
    use serde_json::json;

    #[tokio::test]
    async fn empty_batch_skips_the_provider() {
        let enricher = MockEnricher::failing();
        let profiles = enrich_batch(&enricher, &[]).await.unwrap();
        assert!(profiles.is_empty());
        assert!(enricher.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_an_enrichment_error() {
        let enricher = MockEnricher::failing();
        let err = enrich_batch(&enricher, &["https://www.linkedin.com/in/x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, DealmakerError::Enrichment(_)));
    }

    #[tokio::test]
    async fn returns_profiles_for_requested_urls() {
        let enricher = MockEnricher::new().with_profile(
            "https://www.linkedin.com/in/jane-doe",
            json!({ "name": "Jane Doe", "linkedinUrl": "https://www.linkedin.com/in/jane-doe" }),
        );
        let profiles = enrich_batch(&enricher, &["https://www.linkedin.com/in/jane-doe".to_string()])
            .await
            .unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(enricher.calls().len(), 1);
    }

    #[tokio::test]
    async fn apify_network_failure_propagates() {
        let client = ApifyClient::new("token".into()).with_base_url("http://127.0.0.1:9");
        let enricher = ApifyEnricher::new(client);
        let err = enricher
            .enrich(&["https://www.linkedin.com/in/jane-doe".to_string()])
            .await;
        assert!(err.is_err());
    }
}
