use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Email platform API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("No conversion metric available on the account")]
    NoConversionMetric,

    #[error("Unexpected response shape: {0}")]
    Response(String),
}

impl From<config::ConfigError> for CampaignError {
    fn from(err: config::ConfigError) -> Self {
        CampaignError::Config(err.to_string())
    }
}
