//! Currency normalization and derived per-campaign metrics.

use campaign_core::markets;
use campaign_core::{CampaignRecord, ExchangeRates, RawCampaignRecord};
use chrono::NaiveDateTime;

pub const SEND_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date part of a send timestamp. Unparseable values are returned as-is so
/// they still group together instead of failing the load.
pub fn send_date(send_time: &str) -> String {
    match NaiveDateTime::parse_from_str(send_time, SEND_TIME_FORMAT) {
        Ok(dt) => dt.format("%Y-%m-%d").to_string(),
        Err(_) => send_time.to_string(),
    }
}

/// Converts a local-currency order value to USD for the given market.
pub fn to_usd(local_value: f64, country_code: &str, rates: &ExchangeRates) -> f64 {
    if markets::is_usd_pass_through(country_code) {
        return local_value;
    }
    local_value / rates.rate_for(markets::currency_for(country_code))
}

pub fn per_recipient(usd_value: f64, delivered: u64) -> f64 {
    if delivered > 0 {
        usd_value / delivered as f64
    } else {
        0.0
    }
}

pub fn unique_opens(delivered: u64, open_rate: f64) -> u64 {
    (delivered as f64 * open_rate / 100.0).floor().max(0.0) as u64
}

pub fn normalize(raw: RawCampaignRecord, index: usize, rates: &ExchangeRates) -> CampaignRecord {
    let country_code = markets::country_code_for(&raw.name);
    let currency = markets::currency_for(&country_code).to_string();
    let order_sum_value_usd = to_usd(raw.order_sum_value_local, &country_code, rates);

    CampaignRecord {
        index,
        send_date: send_date(&raw.send_time),
        unique_opens: unique_opens(raw.delivered, raw.open_rate),
        per_recipient: per_recipient(order_sum_value_usd, raw.delivered),
        order_sum_value_usd,
        country_code,
        currency,
        id: raw.id,
        name: raw.name,
        send_time: raw.send_time,
        open_rate: raw.open_rate,
        click_rate: raw.click_rate,
        delivered: raw.delivered,
        subject: raw.subject,
        preview_text: raw.preview_text,
        template_id: raw.template_id,
        audiences: raw.audiences,
        order_unique: raw.order_unique,
        order_count: raw.order_count,
        order_sum_value_local: raw.order_sum_value_local,
    }
}

/// Normalizes a loaded batch, assigning 1-based indexes in input order.
pub fn normalize_all(raws: Vec<RawCampaignRecord>, rates: &ExchangeRates) -> Vec<CampaignRecord> {
    let records: Vec<_> = raws
        .into_iter()
        .enumerate()
        .map(|(i, raw)| normalize(raw, i + 1, rates))
        .collect();
    tracing::debug!(count = records.len(), "campaign records normalized");
    records
}
