use serde::Deserialize;

/// Root application configuration. Loaded from `campaign-report.toml` and
/// environment variables with the prefix `CAMPAIGN_REPORT__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Email platform REST API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Metric that records completed orders, grouped by attributed message.
    #[serde(default = "default_order_metric_id")]
    pub order_metric_id: String,
    /// Metric that records link clicks, grouped by URL.
    #[serde(default = "default_click_metric_id")]
    pub click_metric_id: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Wait used on HTTP 429 when the response carries no `Retry-After`.
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
}

/// Exchange-rate provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_rates_url")]
    pub rates_url: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_grouping")]
    pub default_grouping: String,
    #[serde(default = "default_show_local_value")]
    pub show_local_value: bool,
    /// When set, an empty fetch is retried once with the start date moved
    /// back by this many days. Off unless configured.
    #[serde(default)]
    pub widen_empty_window_days: Option<u32>,
}

// Default functions
fn default_api_base_url() -> String {
    "https://a.klaviyo.com/api".to_string()
}
fn default_revision() -> String {
    "2025-01-15".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_order_metric_id() -> String {
    "QXw4AK".to_string()
}
fn default_click_metric_id() -> String {
    "SCJBvM".to_string()
}
fn default_page_size() -> u32 {
    500
}
fn default_max_retries() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    60_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_retry_after_secs() -> u64 {
    17
}
fn default_rates_url() -> String {
    "https://openexchangerates.org/api/latest.json".to_string()
}
fn default_base_currency() -> String {
    "USD".to_string()
}
fn default_grouping() -> String {
    "country".to_string()
}
fn default_show_local_value() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key: String::new(),
            revision: default_revision(),
            timeout_secs: default_timeout_secs(),
            order_metric_id: default_order_metric_id(),
            click_metric_id: default_click_metric_id(),
            page_size: default_page_size(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            default_retry_after_secs: default_retry_after_secs(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rates_url: default_rates_url(),
            app_id: String::new(),
            base_currency: default_base_currency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_grouping: default_grouping(),
            show_local_value: default_show_local_value(),
            widen_empty_window_days: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional `campaign-report.toml` in the
    /// working directory, overridden by environment variables.
    pub fn load() -> crate::CampaignResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("campaign-report").required(false))
            .add_source(
                config::Environment::with_prefix("CAMPAIGN_REPORT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let app: AppConfig = config.try_deserialize()?;
        tracing::debug!(
            base_url = %app.api.base_url,
            rates_url = %app.exchange.rates_url,
            "configuration resolved"
        );
        Ok(app)
    }

    /// Fail early when credentials required for a live fetch are missing.
    pub fn validate_credentials(&self) -> crate::CampaignResult<()> {
        if self.api.api_key.trim().is_empty() {
            return Err(crate::CampaignError::Config(
                "api.api_key is not set (CAMPAIGN_REPORT__API__API_KEY)".into(),
            ));
        }
        Ok(())
    }
}
