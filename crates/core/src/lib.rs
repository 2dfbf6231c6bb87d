pub mod config;
pub mod error;
pub mod markets;
pub mod types;

pub use config::AppConfig;
pub use error::{CampaignError, CampaignResult};
pub use types::{
    Audiences, CampaignRecord, DateWindow, ExchangeRates, RawCampaignRecord, UrlClicks,
};
