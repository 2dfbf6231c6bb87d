//! Grouping of campaign rows by market or by send date and name prefix,
//! with delivered-volume-weighted subtotals per group.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use campaign_core::markets;
use campaign_core::CampaignRecord;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_COUNTRY: &str = "unknown";
pub const OTHER_PREFIX: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    Country,
    Date,
}

impl FromStr for GroupingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "country" | "país" | "pais" => Ok(GroupingMode::Country),
            "date" | "fecha" => Ok(GroupingMode::Date),
            other => Err(format!("unknown grouping mode: {other}")),
        }
    }
}

impl fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingMode::Country => write!(f, "country"),
            GroupingMode::Date => write!(f, "date"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    Country { code: String },
    Date { date: String, prefix: String },
}

impl GroupKey {
    pub fn for_record(record: &CampaignRecord, mode: GroupingMode) -> Self {
        match mode {
            GroupingMode::Country => GroupKey::Country {
                code: markets::name_suffix(&record.name)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
            },
            GroupingMode::Date => GroupKey::Date {
                date: record.send_date.clone(),
                prefix: markets::name_prefix(&record.name)
                    .unwrap_or(OTHER_PREFIX)
                    .to_string(),
            },
        }
    }

    /// Header text for the group row.
    pub fn label(&self) -> String {
        match self {
            GroupKey::Country { code } => code.to_uppercase(),
            GroupKey::Date { date, prefix } => format!("{date} / {prefix}"),
        }
    }
}

/// Raw accumulators for a set of campaigns. Averages are always derived from
/// these, never from already-rounded averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub campaigns: usize,
    pub delivered: u64,
    /// Σ open_rate × delivered / 100, i.e. estimated opens.
    pub weighted_open: f64,
    pub weighted_click: f64,
    pub unique_orders: u64,
    pub order_count: u64,
    pub usd_value: f64,
    pub local_value: f64,
    pub unique_opens: u64,
    /// Σ per_recipient × delivered.
    pub weighted_per_recipient: f64,
}

impl MetricTotals {
    pub fn add(&mut self, record: &CampaignRecord) {
        let delivered = record.delivered as f64;
        self.campaigns += 1;
        self.delivered += record.delivered;
        self.weighted_open += record.open_rate * delivered / 100.0;
        self.weighted_click += record.click_rate * delivered / 100.0;
        self.unique_orders += record.order_unique;
        self.order_count += record.order_count;
        self.usd_value += record.order_sum_value_usd;
        self.local_value += record.order_sum_value_local;
        self.unique_opens += record.unique_opens;
        self.weighted_per_recipient += record.per_recipient * delivered;
    }

    pub fn merge(&mut self, other: &MetricTotals) {
        self.campaigns += other.campaigns;
        self.delivered += other.delivered;
        self.weighted_open += other.weighted_open;
        self.weighted_click += other.weighted_click;
        self.unique_orders += other.unique_orders;
        self.order_count += other.order_count;
        self.usd_value += other.usd_value;
        self.local_value += other.local_value;
        self.unique_opens += other.unique_opens;
        self.weighted_per_recipient += other.weighted_per_recipient;
    }

    pub fn avg_open_rate(&self) -> f64 {
        self.weighted_rate(self.weighted_open)
    }

    pub fn avg_click_rate(&self) -> f64 {
        self.weighted_rate(self.weighted_click)
    }

    pub fn avg_per_recipient(&self) -> f64 {
        if self.delivered == 0 {
            return 0.0;
        }
        self.weighted_per_recipient / self.delivered as f64
    }

    fn weighted_rate(&self, weighted: f64) -> f64 {
        if self.delivered == 0 {
            return 0.0;
        }
        round2(weighted / self.delivered as f64 * 100.0)
    }
}

impl<'a> FromIterator<&'a CampaignRecord> for MetricTotals {
    fn from_iter<I: IntoIterator<Item = &'a CampaignRecord>>(iter: I) -> Self {
        let mut totals = MetricTotals::default();
        for record in iter {
            totals.add(record);
        }
        totals
    }
}

/// Totals plus the averages shown on a subtotal row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subtotal {
    pub totals: MetricTotals,
    pub avg_open_rate: f64,
    pub avg_click_rate: f64,
    pub avg_per_recipient: f64,
}

impl From<MetricTotals> for Subtotal {
    fn from(totals: MetricTotals) -> Self {
        Self {
            avg_open_rate: totals.avg_open_rate(),
            avg_click_rate: totals.avg_click_rate(),
            avg_per_recipient: totals.avg_per_recipient(),
            totals,
        }
    }
}

impl Subtotal {
    pub fn of<'a>(records: impl IntoIterator<Item = &'a CampaignRecord>) -> Self {
        records.into_iter().collect::<MetricTotals>().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordGroup {
    pub key: GroupKey,
    /// Sorted by `index`.
    pub records: Vec<CampaignRecord>,
    pub subtotal: Subtotal,
}

/// Groups records by `mode`. Country groups sort alphabetically; date groups
/// sort by date, then prefix. Members sort by load index.
pub fn group(records: &[CampaignRecord], mode: GroupingMode) -> Vec<RecordGroup> {
    let mut buckets: BTreeMap<GroupKey, Vec<CampaignRecord>> = BTreeMap::new();
    for record in records {
        buckets
            .entry(GroupKey::for_record(record, mode))
            .or_default()
            .push(record.clone());
    }

    buckets
        .into_iter()
        .map(|(key, mut records)| {
            records.sort_by_key(|r| r.index);
            let subtotal = Subtotal::of(&records);
            RecordGroup {
                key,
                records,
                subtotal,
            }
        })
        .collect()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
