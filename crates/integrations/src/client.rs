//! REST client for the email platform: campaign statistics, campaign
//! details, audience names, order attribution and per-URL clicks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use campaign_core::config::ApiConfig;
use campaign_core::types::NOT_AVAILABLE;
use campaign_core::{
    Audiences, CampaignError, CampaignResult, DateWindow, RawCampaignRecord, UrlClicks,
};
use chrono::{Days, NaiveDate, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::LookupCache;
use crate::loader::{CampaignSource, ClickSource};
use crate::responses::{
    self, CampaignDetail, CampaignStatistics, MessageContent, OrderTotals,
};
use crate::retry::RetryPolicy;

const JSON_API: &str = "application/vnd.api+json";
const AUDIENCE_ID_PREFIX_CHARS: usize = 8;

/// Placeholder for a list or segment whose name could not be resolved.
pub fn fallback_audience_name(id: &str) -> String {
    let head: String = id.chars().take(AUDIENCE_ID_PREFIX_CHARS).collect();
    format!("ID-{head}")
}

pub struct EmailPlatformClient {
    http: Client,
    base_url: String,
    order_metric_id: String,
    click_metric_id: String,
    page_size: u32,
    retry: RetryPolicy,
    details: LookupCache<CampaignDetail>,
    audience_names: LookupCache<String>,
}

impl EmailPlatformClient {
    pub fn new(config: &ApiConfig) -> CampaignResult<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| CampaignError::Config(format!("api.base_url {}: {e}", config.base_url)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_API));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));
        headers.insert(
            "revision",
            HeaderValue::from_str(&config.revision)
                .map_err(|e| CampaignError::Config(format!("api.revision: {e}")))?,
        );
        let mut auth = HeaderValue::from_str(&format!("Klaviyo-API-Key {}", config.api_key))
            .map_err(|e| CampaignError::Config(format!("api.api_key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CampaignError::Http(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            revision = %config.revision,
            max_retries = config.retry.max_retries,
            "email platform client initialized"
        );
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            order_metric_id: config.order_metric_id.clone(),
            click_metric_id: config.click_metric_id.clone(),
            page_size: config.page_size,
            retry: RetryPolicy::from(&config.retry),
            details: LookupCache::new("campaign_details"),
            audience_names: LookupCache::new("audience_names"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ─── Transport ──────────────────────────────────────────────────────────

    /// Sends the request built by `build`, retrying rate-limited responses
    /// after `Retry-After` and transport failures with exponential backoff.
    /// Any other non-success status fails immediately.
    async fn send(
        &self,
        endpoint: &'static str,
        build: impl Fn() -> RequestBuilder + Send + Sync,
    ) -> CampaignResult<String> {
        let mut attempt = 0u32;
        loop {
            metrics::counter!("email_api.requests", "endpoint" => endpoint).increment(1);
            match build().send().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    metrics::counter!("email_api.rate_limited", "endpoint" => endpoint)
                        .increment(1);
                    if !self.retry.has_attempts_left(attempt) {
                        return Err(CampaignError::RateLimited {
                            attempts: attempt + 1,
                        });
                    }
                    let header = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok());
                    let wait = self.retry.retry_after(header);
                    warn!(endpoint, attempt = attempt + 1, wait_secs = wait.as_secs(), "rate limited, waiting");
                    tokio::time::sleep(wait).await;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| CampaignError::Http(e.to_string()))?;
                    if status.is_success() {
                        return Ok(body);
                    }
                    let message = match responses::parse_error_id(&body) {
                        Some(id) => format!("error id {id}"),
                        None => body,
                    };
                    return Err(CampaignError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(e) => {
                    if !self.retry.has_attempts_left(attempt) {
                        return Err(CampaignError::Http(e.to_string()));
                    }
                    let backoff = self.retry.backoff_for_attempt(attempt);
                    metrics::counter!("email_api.retries", "endpoint" => endpoint).increment(1);
                    warn!(
                        endpoint,
                        attempt = attempt + 1,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
            attempt += 1;
        }
    }

    async fn get(&self, endpoint: &'static str, path: &str) -> CampaignResult<String> {
        let url = self.url(path);
        self.send(endpoint, || self.http.get(&url)).await
    }

    async fn post(
        &self,
        endpoint: &'static str,
        url: &str,
        payload: Option<&serde_json::Value>,
    ) -> CampaignResult<String> {
        self.send(endpoint, || {
            let request = self.http.post(url);
            match payload {
                Some(body) => request.body(body.to_string()),
                None => request,
            }
        })
        .await
    }

    // ─── Endpoints ──────────────────────────────────────────────────────────

    pub async fn conversion_metric_id(&self) -> CampaignResult<String> {
        let body = self.get("metrics", "metrics/").await?;
        responses::parse_conversion_metric_id(&body)
    }

    /// Every page of the campaign values report for `window`.
    pub async fn campaign_statistics(
        &self,
        window: DateWindow,
        conversion_metric_id: &str,
    ) -> CampaignResult<Vec<CampaignStatistics>> {
        let payload = json!({
            "data": {
                "type": "campaign-values-report",
                "attributes": {
                    "timeframe": {
                        "start": window.start_timestamp(),
                        "end": window.end_timestamp(),
                    },
                    "conversion_metric_id": conversion_metric_id,
                    "statistics": ["open_rate", "click_rate", "delivered", "delivery_rate"],
                }
            }
        });

        let mut url = self.url("campaign-values-reports/");
        let mut body = Some(&payload);
        let mut results = Vec::new();
        let mut pages = 0u32;
        loop {
            let text = self.post("campaign_values_report", &url, body).await?;
            let page = responses::parse_values_report(&text)?;
            pages += 1;
            debug!(page = pages, rows = page.results.len(), "campaign values page fetched");
            results.extend(page.results);
            match page.next {
                Some(next) => {
                    url = next;
                    // Cursor links carry the query, later pages send no body.
                    body = None;
                }
                None => break,
            }
        }
        info!(pages, campaigns = results.len(), %window, "campaign statistics fetched");
        Ok(results)
    }

    /// Campaign name, send time, audiences and message id, cached per load.
    /// Failures degrade to placeholder values so one broken campaign does not
    /// sink the report.
    pub async fn campaign_detail(&self, campaign_id: &str) -> CampaignDetail {
        if let Some(detail) = self.details.get(campaign_id) {
            return detail;
        }
        let path = format!("campaigns/{campaign_id}/");
        let detail = match self.get("campaigns", &path).await {
            Ok(body) => responses::parse_campaign_detail(&body, campaign_id),
            Err(e) => Err(e),
        };
        match detail {
            Ok(detail) => {
                self.details.put(campaign_id, detail.clone());
                detail
            }
            Err(e) => {
                warn!(campaign_id, error = %e, "campaign detail unavailable");
                CampaignDetail {
                    name: format!("Campaign {campaign_id}"),
                    send_time: NOT_AVAILABLE.to_string(),
                    audiences: Default::default(),
                    message_id: None,
                }
            }
        }
    }

    pub async fn message_content(&self, message_id: Option<&str>) -> MessageContent {
        let Some(message_id) = message_id else {
            return MessageContent::default();
        };
        let path = format!("campaign-messages/{message_id}/");
        match self.get("campaign_messages", &path).await {
            Ok(body) => responses::parse_campaign_message(&body).unwrap_or_else(|e| {
                warn!(message_id, error = %e, "campaign message unreadable");
                MessageContent::default()
            }),
            Err(e) => {
                warn!(message_id, error = %e, "campaign message unavailable");
                MessageContent::default()
            }
        }
    }

    /// Name of a list, or of a segment when no list has that id. The
    /// `ID-` placeholder is cached only once both collections have answered;
    /// transport failures and rate limits leave the id open for a later lookup.
    pub async fn audience_name(&self, audience_id: &str) -> String {
        if let Some(name) = self.audience_names.get(audience_id) {
            return name;
        }
        let mut settled = true;
        for (endpoint, collection) in [("lists", "lists"), ("segments", "segments")] {
            let path = format!("{collection}/{audience_id}/");
            match self.get(endpoint, &path).await {
                Ok(body) => {
                    if let Ok(Some(name)) = responses::parse_audience_name(&body) {
                        self.audience_names.put(audience_id, name.clone());
                        return name;
                    }
                }
                Err(CampaignError::Api { status: 404, .. }) => {
                    debug!(audience_id, collection, "audience not in collection");
                }
                Err(e) => {
                    settled = false;
                    warn!(audience_id, collection, error = %e, "audience lookup failed");
                }
            }
        }
        let name = fallback_audience_name(audience_id);
        if settled {
            self.audience_names.put(audience_id, name.clone());
        }
        name
    }

    async fn audience_names(&self, ids: &[String]) -> Vec<String> {
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            names.push(self.audience_name(id).await);
        }
        names
    }

    /// Completed orders attributed to each campaign message, from the window
    /// start through the end of today (UTC). A failed lookup leaves every
    /// campaign without orders.
    pub async fn order_totals(&self, window: DateWindow) -> HashMap<String, OrderTotals> {
        let until = format!("{}T23:59:59Z", Utc::now().date_naive().format(DateWindow::DATE_FORMAT));
        let payload = json!({
            "data": {
                "type": "metric-aggregate",
                "attributes": {
                    "interval": "day",
                    "page_size": self.page_size,
                    "timezone": "UTC",
                    "measurements": ["unique", "sum_value", "count"],
                    "by": ["$attributed_message"],
                    "filter": [
                        format!("greater-or-equal(datetime,{})", window.start_timestamp()),
                        format!("less-than(datetime,{until})"),
                    ],
                    "metric_id": self.order_metric_id,
                }
            }
        });

        let url = self.url("metric-aggregates");
        let result = match self.post("metric_aggregates", &url, Some(&payload)).await {
            Ok(body) => responses::parse_order_aggregates(&body),
            Err(e) => Err(e),
        };
        match result {
            Ok(totals) => {
                debug!(campaigns = totals.len(), "order totals fetched");
                totals
            }
            Err(e) => {
                warn!(error = %e, "order totals unavailable, reporting zero orders");
                HashMap::new()
            }
        }
    }
}

/// Click aggregation runs from the send date up to tomorrow (UTC).
fn click_window_start(send_date: &str) -> String {
    match NaiveDateTime::parse_from_str(send_date, "%Y-%m-%d %H:%M:%S") {
        Ok(sent) => sent.date().format(DateWindow::DATE_FORMAT).to_string(),
        Err(_) => send_date.to_string(),
    }
}

fn tomorrow() -> NaiveDate {
    let today = Utc::now().date_naive();
    today.checked_add_days(Days::new(1)).unwrap_or(today)
}

#[async_trait]
impl CampaignSource for EmailPlatformClient {
    async fn fetch_campaigns(&self, window: DateWindow) -> CampaignResult<Vec<RawCampaignRecord>> {
        let metric_id = self.conversion_metric_id().await?;
        let statistics = self.campaign_statistics(window, &metric_id).await?;
        if statistics.is_empty() {
            info!(%window, "no campaigns reported in window");
            return Ok(Vec::new());
        }
        let orders = self.order_totals(window).await;

        let mut raws = Vec::with_capacity(statistics.len());
        let mut outside = 0usize;
        for stats in statistics {
            let detail = self.campaign_detail(&stats.campaign_id).await;
            if !window.admits(&detail.send_time) {
                outside += 1;
                continue;
            }
            let content = self.message_content(detail.message_id.as_deref()).await;
            let audiences = Audiences {
                included: self.audience_names(&detail.audiences.included).await,
                excluded: self.audience_names(&detail.audiences.excluded).await,
            };
            let order = orders.get(&stats.campaign_id).cloned().unwrap_or_default();

            raws.push(RawCampaignRecord {
                id: stats.campaign_id,
                name: detail.name,
                send_time: detail.send_time,
                open_rate: stats.open_rate,
                click_rate: stats.click_rate,
                delivered: stats.delivered,
                subject: content.subject,
                preview_text: content.preview_text,
                template_id: content.template_id,
                audiences: (!audiences.is_empty()).then_some(audiences),
                order_unique: order.unique,
                order_count: order.count,
                order_sum_value_local: order.sum_value,
            });
        }

        info!(
            kept = raws.len(),
            outside_window = outside,
            cached_details = self.details.len(),
            cached_audiences = self.audience_names.len(),
            "campaigns assembled"
        );
        Ok(raws)
    }
}

#[async_trait]
impl ClickSource for EmailPlatformClient {
    async fn fetch_url_clicks(
        &self,
        campaign_id: &str,
        send_date: &str,
    ) -> CampaignResult<Vec<UrlClicks>> {
        let start = click_window_start(send_date);
        let payload = json!({
            "data": {
                "type": "metric-aggregate",
                "attributes": {
                    "interval": "day",
                    "page_size": self.page_size,
                    "timezone": "UTC",
                    "measurements": ["count", "unique"],
                    "by": ["URL"],
                    "filter": [
                        format!("greater-or-equal(datetime,{start}T00:00:00Z)"),
                        format!("less-than(datetime,{}T00:00:00Z)", tomorrow().format(DateWindow::DATE_FORMAT)),
                        format!("equals($message,'{campaign_id}')"),
                    ],
                    "metric_id": self.click_metric_id,
                }
            }
        });

        let url = self.url("metric-aggregates");
        let body = self.post("metric_aggregates", &url, Some(&payload)).await?;
        let clicks = responses::parse_url_clicks(&body)?;
        debug!(campaign_id, urls = clicks.len(), "url clicks fetched");
        Ok(clicks)
    }
}
