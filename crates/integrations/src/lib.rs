//! Email platform and exchange-rate integrations, and the loader that turns
//! their answers into normalized campaign records.

pub mod cache;
pub mod client;
pub mod exchange;
pub mod loader;
pub mod responses;
pub mod retry;

pub use client::EmailPlatformClient;
pub use exchange::ExchangeRateClient;
pub use loader::{
    fetch_click_outcomes, CampaignLoader, CampaignSource, ClickSource, LoadedCampaigns, RateSource,
};
pub use retry::RetryPolicy;
