use std::collections::HashMap;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, CampaignResult};
use crate::markets;

pub const NO_SUBJECT_LINE: &str = "No Subject Line";
pub const NO_PREVIEW_TEXT: &str = "No Preview Text";
pub const NOT_AVAILABLE: &str = "N/A";

/// Campaign statistics as delivered by the email platform, before any
/// currency or per-recipient derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCampaignRecord {
    pub id: String,
    pub name: String,
    /// `"YYYY-MM-DD HH:MM:SS"`, or `"N/A"` when the platform has none.
    pub send_time: String,
    /// Percent in [0, 100], two decimals.
    pub open_rate: f64,
    pub click_rate: f64,
    pub delivered: u64,
    pub subject: String,
    pub preview_text: String,
    pub template_id: Option<String>,
    pub audiences: Option<Audiences>,
    pub order_unique: u64,
    pub order_count: u64,
    /// Order value in the campaign's local currency.
    pub order_sum_value_local: f64,
}

impl Default for RawCampaignRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            send_time: NOT_AVAILABLE.to_string(),
            open_rate: 0.0,
            click_rate: 0.0,
            delivered: 0,
            subject: NO_SUBJECT_LINE.to_string(),
            preview_text: NO_PREVIEW_TEXT.to_string(),
            template_id: None,
            audiences: None,
            order_unique: 0,
            order_count: 0,
            order_sum_value_local: 0.0,
        }
    }
}

/// A normalized campaign row. Every derived field is a pure function of the
/// raw fields and the exchange-rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    /// 1-based load position.
    pub index: usize,
    pub id: String,
    pub name: String,
    pub send_time: String,
    /// Date part of `send_time`, or the raw `send_time` when it does not parse.
    pub send_date: String,
    pub country_code: String,
    pub currency: String,
    pub open_rate: f64,
    pub click_rate: f64,
    pub delivered: u64,
    pub unique_opens: u64,
    pub subject: String,
    pub preview_text: String,
    pub template_id: Option<String>,
    pub audiences: Option<Audiences>,
    pub order_unique: u64,
    pub order_count: u64,
    pub order_sum_value_local: f64,
    pub order_sum_value_usd: f64,
    pub per_recipient: f64,
}

impl CampaignRecord {
    /// Key used to recognize the same send across selections.
    pub fn identity(&self) -> (&str, &str) {
        (&self.id, &self.send_time)
    }

    pub fn currency_symbol(&self) -> &'static str {
        markets::currency_symbol(&self.currency)
    }
}

/// Lists and segments a campaign was sent to (included) or suppressed
/// from (excluded), as display names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audiences {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
}

const AUDIENCE_NAMES_SHOWN: usize = 2;
const AUDIENCE_NAME_MAX_CHARS: usize = 15;
const AUDIENCE_NAME_TRUNCATED_CHARS: usize = 12;

impl Audiences {
    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    /// Compact one-line rendering, e.g. `"Inc: VIP, Newsletter, +3; Exc: Bounced"`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.included.is_empty() {
            parts.push(format!("Inc: {}", summarize_names(&self.included)));
        }
        if !self.excluded.is_empty() {
            parts.push(format!("Exc: {}", summarize_names(&self.excluded)));
        }
        if parts.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            parts.join("; ")
        }
    }
}

fn summarize_names(names: &[String]) -> String {
    let mut shown: Vec<String> = names
        .iter()
        .take(AUDIENCE_NAMES_SHOWN)
        .map(|name| {
            if name.chars().count() > AUDIENCE_NAME_MAX_CHARS {
                let head: String = name.chars().take(AUDIENCE_NAME_TRUNCATED_CHARS).collect();
                format!("{head}...")
            } else {
                name.clone()
            }
        })
        .collect();
    if names.len() > AUDIENCE_NAMES_SHOWN {
        shown.push(format!("+{}", names.len() - AUDIENCE_NAMES_SHOWN));
    }
    shown.join(", ")
}

/// USD-based exchange rates keyed by currency code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    rates: HashMap<String, f64>,
}

impl ExchangeRates {
    pub fn new(rates: HashMap<String, f64>) -> Self {
        Self { rates }
    }

    /// Identity table over every supported currency, used when the rate
    /// provider fails or returns nothing.
    pub fn identity() -> Self {
        Self {
            rates: markets::SUPPORTED_CURRENCIES
                .iter()
                .map(|c| (c.to_string(), 1.0))
                .collect(),
        }
    }

    /// Rate for `currency`; missing or zero rates resolve to 1.0.
    pub fn rate_for(&self, currency: &str) -> f64 {
        match self.rates.get(currency) {
            Some(rate) if *rate != 0.0 && rate.is_finite() => *rate,
            _ => 1.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }
}

impl FromIterator<(String, f64)> for ExchangeRates {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().collect(),
        }
    }
}

/// Click totals for one URL of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlClicks {
    pub url: String,
    pub count: u64,
    pub unique: u64,
}

/// Inclusive range of send dates, `start 00:00:00` through `end 23:59:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d";
    const SEND_TIME_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn new(start: NaiveDate, end: NaiveDate) -> CampaignResult<Self> {
        if start > end {
            return Err(CampaignError::InvalidDate(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> CampaignResult<Self> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), Self::DATE_FORMAT)
                .map_err(|e| CampaignError::InvalidDate(format!("{value}: {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Same window with the start moved `days` earlier.
    pub fn widened(&self, days: u32) -> Self {
        Self {
            start: self.start - Duration::days(i64::from(days)),
            end: self.end,
        }
    }

    /// Whether a `YYYY-MM-DD HH:MM:SS` send time falls inside the window.
    /// Send times that do not parse (including `"N/A"`) are accepted.
    pub fn admits(&self, send_time: &str) -> bool {
        match NaiveDateTime::parse_from_str(send_time, Self::SEND_TIME_FORMAT) {
            Ok(sent) => {
                let date = sent.date();
                self.start <= date && date <= self.end
            }
            Err(_) => true,
        }
    }

    pub fn start_timestamp(&self) -> String {
        format!("{}T00:00:00Z", self.start.format(Self::DATE_FORMAT))
    }

    pub fn end_timestamp(&self) -> String {
        format!("{}T23:59:59Z", self.end.format(Self::DATE_FORMAT))
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audience_summary() {
        let audiences = Audiences {
            included: vec![
                "VIP Customers".into(),
                "Newsletter Subscribers 2024".into(),
                "Extra".into(),
            ],
            excluded: vec!["Bounced".into()],
        };
        assert_eq!(
            audiences.summary(),
            "Inc: VIP Customers, Newsletter S..., +1; Exc: Bounced"
        );
        assert_eq!(Audiences::default().summary(), "N/A");
    }

    #[test]
    fn test_rate_fallbacks() {
        let rates: ExchangeRates = [("HNL".to_string(), 24.5), ("GTQ".to_string(), 0.0)]
            .into_iter()
            .collect();
        assert_eq!(rates.rate_for("HNL"), 24.5);
        assert_eq!(rates.rate_for("GTQ"), 1.0);
        assert_eq!(rates.rate_for("CRC"), 1.0);
        assert_eq!(ExchangeRates::identity().len(), 13);
    }

    #[test]
    fn test_date_window() {
        let window = DateWindow::parse("2025-03-01", "2025-03-31").unwrap();
        assert!(window.admits("2025-03-01 00:00:00"));
        assert!(window.admits("2025-03-31 23:59:59"));
        assert!(!window.admits("2025-04-01 00:00:00"));
        assert!(!window.admits("2025-02-28 23:59:59"));
        assert!(window.admits("N/A"));
        assert_eq!(window.start_timestamp(), "2025-03-01T00:00:00Z");
        assert_eq!(window.end_timestamp(), "2025-03-31T23:59:59Z");

        let wider = window.widened(30);
        assert_eq!(wider.start.to_string(), "2025-01-30");
        assert_eq!(wider.end, window.end);
    }

    #[test]
    fn test_date_window_rejects_bad_input() {
        assert!(matches!(
            DateWindow::parse("2025-03-31", "2025-03-01"),
            Err(CampaignError::InvalidDate(_))
        ));
        assert!(DateWindow::parse("03/01/2025", "2025-03-31").is_err());
    }
}
