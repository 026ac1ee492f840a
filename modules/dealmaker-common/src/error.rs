use thiserror::Error;

#[derive(Error, Debug)]
pub enum DealmakerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quota tracking error: {0}")]
    Quota(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<std::io::Error> for DealmakerError {
    fn from(err: std::io::Error) -> Self {
        DealmakerError::Quota(err.to_string())
    }
}

impl From<serde_json::Error> for DealmakerError {
    fn from(err: serde_json::Error) -> Self {
        DealmakerError::Quota(err.to_string())
    }
}
