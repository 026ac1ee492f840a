use std::path::PathBuf;
use std::time::Duration;

use crate::error::DealmakerError;
use crate::types::RecordQuery;

type Result<T> = std::result::Result<T, DealmakerError>;

const DEFAULT_MAX_DEALS_PER_WEEK: u32 = 1000;
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_NAME_TOKEN: &str = "Post:";

/// Application configuration loaded from environment variables (and `.env`).
/// Validated once at startup; nothing downstream re-reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Credentials
    pub hubspot_token: String,
    pub apify_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    // Pipeline
    pub pipeline_id: String,
    pub source_stage_id: String,
    pub target_stage_id: String,
    pub record_name_token: String,

    // Quota
    pub max_deals_per_week: u32,
    pub tracking_file: PathBuf,

    // Self-imposed rate limiting
    pub page_delay: Duration,
    pub lookup_delay: Duration,
    pub write_delay: Duration,
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| DealmakerError::Config(format!("{key} environment variable is required")))
        };

        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let tracking_file = get("WEEKLY_TRACKING_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("weekly-tracking.json"));

        let max_deals_per_week = match get("MAX_DEALS_PER_WEEK") {
            Some(raw) => {
                let parsed: i64 = raw.parse().map_err(|_| {
                    DealmakerError::Config(format!("MAX_DEALS_PER_WEEK must be a number, got {raw:?}"))
                })?;
                if parsed <= 0 {
                    return Err(DealmakerError::Config(format!(
                        "MAX_DEALS_PER_WEEK must be greater than 0, got {parsed}"
                    )));
                }
                u32::try_from(parsed).map_err(|_| {
                    DealmakerError::Config(format!("MAX_DEALS_PER_WEEK is too large: {parsed}"))
                })?
            }
            None => DEFAULT_MAX_DEALS_PER_WEEK,
        };

        let config = Self {
            hubspot_token: required("HUBSPOT_TOKEN")?,
            apify_token: get("APIFY_TOKEN"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            pipeline_id: required("PIPELINE_ID")?,
            source_stage_id: required("SOURCE_STAGE_ID")?,
            target_stage_id: required("TARGET_STAGE_ID")?,
            record_name_token: get("RECORD_NAME_TOKEN")
                .unwrap_or_else(|| DEFAULT_NAME_TOKEN.to_string()),
            max_deals_per_week,
            tracking_file,
            page_delay: millis(&get, "PAGE_DELAY_MS", 3000)?,
            lookup_delay: millis(&get, "LOOKUP_DELAY_MS", 100)?,
            write_delay: millis(&get, "WRITE_DELAY_MS", 500)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks.
    pub fn validate(&self) -> Result<()> {
        if self.source_stage_id == self.target_stage_id {
            return Err(DealmakerError::Config(format!(
                "SOURCE_STAGE_ID and TARGET_STAGE_ID must differ (both {})",
                self.source_stage_id
            )));
        }
        if self.max_deals_per_week == 0 {
            return Err(DealmakerError::Config(
                "MAX_DEALS_PER_WEEK must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// The Apify token, required by commands that enrich profiles.
    pub fn require_apify_token(&self) -> Result<&str> {
        self.apify_token
            .as_deref()
            .ok_or_else(|| DealmakerError::Config("APIFY_TOKEN environment variable is required".into()))
    }

    /// Deals waiting to be processed.
    pub fn source_query(&self) -> RecordQuery {
        RecordQuery {
            pipeline_id: self.pipeline_id.clone(),
            stage_id: self.source_stage_id.clone(),
            name_token: self.record_name_token.clone(),
        }
    }

    /// Deals already advanced to the terminal stage.
    pub fn target_query(&self) -> RecordQuery {
        RecordQuery {
            pipeline_id: self.pipeline_id.clone(),
            stage_id: self.target_stage_id.clone(),
            name_token: self.record_name_token.clone(),
        }
    }

    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.chars().take(5).map(char::len_utf8).sum();
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  HUBSPOT_TOKEN: {}", preview(&self.hubspot_token));
        tracing::info!("  APIFY_TOKEN: {}", preview_opt(&self.apify_token));
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!(
            pipeline = %self.pipeline_id,
            source_stage = %self.source_stage_id,
            target_stage = %self.target_stage_id,
            name_token = %self.record_name_token,
            max_deals_per_week = self.max_deals_per_week,
            tracking_file = %self.tracking_file.display(),
            "Pipeline settings"
        );
    }
}

fn millis(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    match get(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| DealmakerError::Config(format!("{key} must be a number of milliseconds, got {raw:?}"))),
        None => Ok(Duration::from_millis(default)),
    }
}
