use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid screening input: {0}")]
    Validation(String),

    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watch-list parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Screening persistence failed: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn unavailable(provider: &str, reason: impl Into<String>) -> Self {
        Error::ProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
