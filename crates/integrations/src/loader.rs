//! Loading a window of campaigns together with the exchange rates needed to
//! normalize them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use campaign_core::config::ReportConfig;
use campaign_core::markets;
use campaign_core::{
    CampaignRecord, CampaignResult, DateWindow, ExchangeRates, RawCampaignRecord, UrlClicks,
};
use campaign_reporting::clicks::{CampaignClicks, ClickOutcome};
use campaign_reporting::normalizer::normalize_all;
use tracing::{info, warn};

#[async_trait]
pub trait CampaignSource: Send + Sync {
    async fn fetch_campaigns(&self, window: DateWindow) -> CampaignResult<Vec<RawCampaignRecord>>;
}

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Rates against `base` for each currency in `symbols`.
    async fn fetch_exchange_rates(
        &self,
        base: &str,
        symbols: &[String],
    ) -> CampaignResult<HashMap<String, f64>>;
}

#[async_trait]
pub trait ClickSource: Send + Sync {
    /// Click totals per URL for one campaign, from its send date onward.
    async fn fetch_url_clicks(
        &self,
        campaign_id: &str,
        send_date: &str,
    ) -> CampaignResult<Vec<UrlClicks>>;
}

#[derive(Debug, Clone)]
pub struct LoadedCampaigns {
    /// Indexed from 1 in load order.
    pub records: Vec<CampaignRecord>,
    pub rates: ExchangeRates,
    /// The window that produced `records`, widened when that was needed.
    pub window: DateWindow,
}

impl LoadedCampaigns {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct CampaignLoader {
    campaigns: Arc<dyn CampaignSource>,
    rates: Arc<dyn RateSource>,
    base_currency: String,
    widen_empty_window_days: Option<u32>,
}

impl CampaignLoader {
    pub fn new(campaigns: Arc<dyn CampaignSource>, rates: Arc<dyn RateSource>) -> Self {
        Self {
            campaigns,
            rates,
            base_currency: markets::DEFAULT_CURRENCY.to_string(),
            widen_empty_window_days: None,
        }
    }

    pub fn with_report_config(mut self, config: &ReportConfig) -> Self {
        self.widen_empty_window_days = config.widen_empty_window_days;
        self
    }

    pub fn with_base_currency(mut self, base: impl Into<String>) -> Self {
        self.base_currency = base.into();
        self
    }

    pub fn with_widening(mut self, days: Option<u32>) -> Self {
        self.widen_empty_window_days = days;
        self
    }

    pub async fn load(&self, window: DateWindow) -> CampaignResult<LoadedCampaigns> {
        let mut window = window;
        let mut raws = self.campaigns.fetch_campaigns(window).await?;

        if raws.is_empty() {
            if let Some(days) = self.widen_empty_window_days.filter(|d| *d > 0) {
                let wider = window.widened(days);
                info!(%window, %wider, "no campaigns in window, retrying with a wider one");
                raws = self.campaigns.fetch_campaigns(wider).await?;
                window = wider;
            }
        }

        let rates = self.rates_for(&raws).await;
        let records = normalize_all(raws, &rates);
        info!(
            %window,
            campaigns = records.len(),
            rates = rates.len(),
            "campaigns loaded"
        );
        Ok(LoadedCampaigns {
            records,
            rates,
            window,
        })
    }

    /// Rates for the currencies the loaded campaigns report in. Provider
    /// failures and empty answers fall back to the identity table.
    async fn rates_for(&self, raws: &[RawCampaignRecord]) -> ExchangeRates {
        if raws.is_empty() {
            return ExchangeRates::identity();
        }
        let symbols: Vec<String> = required_currencies(raws).into_iter().collect();

        match self
            .rates
            .fetch_exchange_rates(&self.base_currency, &symbols)
            .await
        {
            Ok(rates) if !rates.is_empty() => ExchangeRates::new(rates),
            Ok(_) => {
                warn!(?symbols, "exchange rate provider returned no rates, using 1.0");
                ExchangeRates::identity()
            }
            Err(e) => {
                warn!(error = %e, ?symbols, "exchange rate fetch failed, using 1.0");
                ExchangeRates::identity()
            }
        }
    }
}

/// Distinct local currencies of a batch, in a stable order.
pub fn required_currencies(raws: &[RawCampaignRecord]) -> BTreeSet<String> {
    raws.iter()
        .map(|raw| markets::currency_for(&markets::country_code_for(&raw.name)).to_string())
        .collect()
}

/// Fetches URL clicks for each record. A failure for one campaign is kept as
/// that campaign's outcome instead of failing the whole batch.
pub async fn fetch_click_outcomes(
    source: &dyn ClickSource,
    records: &[CampaignRecord],
) -> Vec<CampaignClicks> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let outcome = match source.fetch_url_clicks(&record.id, &record.send_date).await {
            Ok(urls) => ClickOutcome::Clicks(urls),
            Err(e) => {
                warn!(campaign_id = %record.id, error = %e, "click fetch failed");
                ClickOutcome::Failed(e.to_string())
            }
        };
        out.push(CampaignClicks {
            campaign_name: record.name.clone(),
            send_date: record.send_date.clone(),
            outcome,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use campaign_core::CampaignError;

    struct FakeCampaigns {
        by_start: HashMap<String, Vec<RawCampaignRecord>>,
        calls: Mutex<Vec<DateWindow>>,
    }

    impl FakeCampaigns {
        fn new(entries: Vec<(&str, Vec<RawCampaignRecord>)>) -> Self {
            Self {
                by_start: entries
                    .into_iter()
                    .map(|(start, raws)| (start.to_string(), raws))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<DateWindow> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CampaignSource for FakeCampaigns {
        async fn fetch_campaigns(
            &self,
            window: DateWindow,
        ) -> CampaignResult<Vec<RawCampaignRecord>> {
            self.calls.lock().unwrap().push(window);
            Ok(self
                .by_start
                .get(&window.start.to_string())
                .cloned()
                .unwrap_or_default())
        }
    }

    enum FakeRates {
        Table(Vec<(&'static str, f64)>),
        Failing,
    }

    #[async_trait]
    impl RateSource for FakeRates {
        async fn fetch_exchange_rates(
            &self,
            base: &str,
            _symbols: &[String],
        ) -> CampaignResult<HashMap<String, f64>> {
            assert_eq!(base, "USD");
            match self {
                FakeRates::Table(rates) => Ok(rates
                    .iter()
                    .map(|(c, r)| (c.to_string(), *r))
                    .collect()),
                FakeRates::Failing => Err(CampaignError::Http("connection refused".into())),
            }
        }
    }

    struct FakeClicks {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClickSource for FakeClicks {
        async fn fetch_url_clicks(
            &self,
            campaign_id: &str,
            _send_date: &str,
        ) -> CampaignResult<Vec<UrlClicks>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if campaign_id == "bad" {
                return Err(CampaignError::Api {
                    status: 400,
                    message: "invalid filter".into(),
                });
            }
            Ok(vec![UrlClicks {
                url: "https://shop.com/".into(),
                count: 3,
                unique: 2,
            }])
        }
    }

    fn raw(id: &str, name: &str, local: f64) -> RawCampaignRecord {
        RawCampaignRecord {
            id: id.into(),
            name: name.into(),
            send_time: "2025-05-10 10:00:00".into(),
            delivered: 100,
            open_rate: 50.0,
            order_sum_value_local: local,
            ..Default::default()
        }
    }

    fn window() -> DateWindow {
        DateWindow::parse("2025-05-01", "2025-05-31").unwrap()
    }

    #[tokio::test]
    async fn test_load_normalizes_with_fetched_rates() {
        let campaigns = Arc::new(FakeCampaigns::new(vec![(
            "2025-05-01",
            vec![raw("A", "promo_hn", 245.0), raw("B", "promo_pa", 10.0)],
        )]));
        let rates = Arc::new(FakeRates::Table(vec![("HNL", 24.5), ("PAB", 2.0)]));
        let loader = CampaignLoader::new(campaigns, rates);

        let loaded = loader.load(window()).await.unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].index, 1);
        assert!((loaded.records[0].order_sum_value_usd - 10.0).abs() < 1e-9);
        assert_eq!(loaded.records[1].order_sum_value_usd, 10.0);
        assert_eq!(loaded.window, window());
    }

    #[tokio::test]
    async fn test_rate_failure_falls_back_to_identity() {
        let campaigns = Arc::new(FakeCampaigns::new(vec![(
            "2025-05-01",
            vec![raw("A", "promo_hn", 245.0)],
        )]));
        let loader = CampaignLoader::new(campaigns, Arc::new(FakeRates::Failing));

        let loaded = loader.load(window()).await.unwrap();
        assert_eq!(loaded.rates, ExchangeRates::identity());
        assert_eq!(loaded.records[0].order_sum_value_usd, 245.0);
    }

    #[tokio::test]
    async fn test_empty_rate_table_falls_back_to_identity() {
        let campaigns = Arc::new(FakeCampaigns::new(vec![(
            "2025-05-01",
            vec![raw("A", "promo_gt", 78.0)],
        )]));
        let loader = CampaignLoader::new(campaigns, Arc::new(FakeRates::Table(vec![])));
        let loaded = loader.load(window()).await.unwrap();
        assert_eq!(loaded.records[0].order_sum_value_usd, 78.0);
    }

    #[tokio::test]
    async fn test_empty_window_is_not_widened_by_default() {
        let campaigns = Arc::new(FakeCampaigns::new(vec![(
            "2025-04-01",
            vec![raw("A", "promo_hn", 0.0)],
        )]));
        let loader = CampaignLoader::new(campaigns.clone(), Arc::new(FakeRates::Failing));

        let loaded = loader.load(window()).await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(campaigns.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_widening_retries_once_with_earlier_start() {
        let campaigns = Arc::new(FakeCampaigns::new(vec![(
            "2025-04-01",
            vec![raw("A", "promo_hn", 0.0)],
        )]));
        let config = ReportConfig {
            widen_empty_window_days: Some(30),
            ..ReportConfig::default()
        };
        let loader = CampaignLoader::new(campaigns.clone(), Arc::new(FakeRates::Failing))
            .with_report_config(&config);

        let loaded = loader.load(window()).await.unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.window.start.to_string(), "2025-04-01");
        assert_eq!(loaded.window.end, window().end);
        assert_eq!(campaigns.calls().len(), 2);
    }

    #[test]
    fn test_required_currencies() {
        let raws = vec![
            raw("A", "promo_hn", 0.0),
            raw("B", "promo_hn", 0.0),
            raw("C", "newsletter", 0.0),
            raw("D", "flash_vi", 0.0),
        ];
        let currencies: Vec<String> = required_currencies(&raws).into_iter().collect();
        assert_eq!(currencies, vec!["HNL", "USD"]);
    }

    #[tokio::test]
    async fn test_click_failures_stay_per_campaign() {
        let loaded = normalize_all(
            vec![raw("ok", "promo_hn", 0.0), raw("bad", "promo_gt", 0.0)],
            &ExchangeRates::identity(),
        );
        let source = FakeClicks {
            calls: AtomicUsize::new(0),
        };

        let clicks = fetch_click_outcomes(&source, &loaded).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(clicks[0].send_date, "2025-05-10");
        assert!(matches!(clicks[0].outcome, ClickOutcome::Clicks(ref urls) if urls.len() == 1));
        match &clicks[1].outcome {
            ClickOutcome::Failed(message) => assert!(message.contains("invalid filter")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
