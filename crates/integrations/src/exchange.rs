//! Latest exchange rates from an Open Exchange Rates compatible endpoint.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use campaign_core::config::ExchangeConfig;
use campaign_core::{CampaignError, CampaignResult};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::loader::RateSource;

#[derive(Debug, Deserialize)]
struct LatestRates {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

pub fn parse_rates(body: &str) -> CampaignResult<HashMap<String, f64>> {
    let latest: LatestRates = serde_json::from_str(body)
        .map_err(|e| CampaignError::Response(format!("exchange rates: {e}")))?;
    Ok(latest.rates)
}

pub struct ExchangeRateClient {
    http: Client,
    rates_url: String,
    app_id: String,
}

impl ExchangeRateClient {
    pub fn new(config: &ExchangeConfig) -> CampaignResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CampaignError::Http(e.to_string()))?;
        info!(rates_url = %config.rates_url, "exchange rate client initialized");
        Ok(Self {
            http,
            rates_url: config.rates_url.clone(),
            app_id: config.app_id.clone(),
        })
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    async fn fetch_exchange_rates(
        &self,
        base: &str,
        symbols: &[String],
    ) -> CampaignResult<HashMap<String, f64>> {
        let mut query: Vec<(&str, String)> = vec![
            ("app_id", self.app_id.clone()),
            ("base", base.to_string()),
        ];
        if !symbols.is_empty() {
            query.push(("symbols", symbols.join(",")));
        }

        metrics::counter!("exchange_rates.requests").increment(1);
        let response = self
            .http
            .get(&self.rates_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| CampaignError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CampaignError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(CampaignError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let rates = parse_rates(&body)?;
        debug!(base, requested = symbols.len(), received = rates.len(), "exchange rates fetched");
        Ok(rates)
    }
}
