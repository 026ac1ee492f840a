use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubSpotError>;

#[derive(Debug, Error)]
pub enum HubSpotError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl HubSpotError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HubSpotError::Api { status: 404, .. })
    }
}

impl From<reqwest::Error> for HubSpotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            HubSpotError::Parse(err.to_string())
        } else {
            HubSpotError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HubSpotError {
    fn from(err: serde_json::Error) -> Self {
        HubSpotError::Parse(err.to_string())
    }
}
