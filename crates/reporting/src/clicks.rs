//! Per-URL click analysis for a set of selected campaigns.

use std::collections::{BTreeMap, HashMap};

use campaign_core::UrlClicks;
use serde::{Deserialize, Serialize};

use crate::links::{classify, LinkFilter};

pub const NO_CLICKS_MESSAGE: &str = "No clicks found for this campaign.";

/// Result of fetching the URL clicks of one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ClickOutcome {
    Clicks(Vec<UrlClicks>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignClicks {
    pub campaign_name: String,
    pub send_date: String,
    pub outcome: ClickOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedUrl {
    pub url: String,
    pub count: u64,
    pub unique: u64,
    pub extracted_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignClickSummary {
    pub campaign_name: String,
    pub send_date: String,
    pub total_clicks: u64,
    /// Sorted by count, descending.
    pub urls: Vec<ClassifiedUrl>,
    /// Set when there is nothing to list, either because no URL passed the
    /// filter or because fetching failed.
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateClicks {
    pub send_date: String,
    /// Sorted by total clicks, descending.
    pub campaigns: Vec<CampaignClickSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedIdClicks {
    pub id: String,
    pub count: u64,
    pub unique: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickReport {
    pub filter: LinkFilter,
    /// Ascending by send date.
    pub dates: Vec<DateClicks>,
    pub total_clicks: u64,
}

impl ClickReport {
    /// Clicks summed per product or category id across every campaign,
    /// busiest first. Empty for the `All` filter.
    pub fn by_extracted_id(&self) -> Vec<ExtractedIdClicks> {
        let mut totals: HashMap<&str, (u64, u64)> = HashMap::new();
        for url in self
            .dates
            .iter()
            .flat_map(|d| &d.campaigns)
            .flat_map(|c| &c.urls)
        {
            if let Some(id) = url.extracted_id.as_deref() {
                let entry = totals.entry(id).or_default();
                entry.0 += url.count;
                entry.1 += url.unique;
            }
        }

        let mut ids: Vec<ExtractedIdClicks> = totals
            .into_iter()
            .map(|(id, (count, unique))| ExtractedIdClicks {
                id: id.to_string(),
                count,
                unique,
            })
            .collect();
        ids.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
        ids
    }

    pub fn campaign_count(&self) -> usize {
        self.dates.iter().map(|d| d.campaigns.len()).sum()
    }
}

fn summarize(campaign: CampaignClicks, filter: LinkFilter) -> CampaignClickSummary {
    let urls = match campaign.outcome {
        ClickOutcome::Failed(message) => {
            return CampaignClickSummary {
                campaign_name: campaign.campaign_name,
                send_date: campaign.send_date,
                total_clicks: 0,
                urls: Vec::new(),
                message: Some(message),
            };
        }
        ClickOutcome::Clicks(urls) => urls,
    };

    let mut kept: Vec<ClassifiedUrl> = urls
        .into_iter()
        .filter_map(|u| {
            let link = classify(&u.url, filter);
            link.matches.then(|| ClassifiedUrl {
                url: u.url,
                count: u.count,
                unique: u.unique,
                extracted_id: link.extracted_id,
            })
        })
        .collect();
    kept.sort_by(|a, b| b.count.cmp(&a.count));

    let total_clicks = kept.iter().map(|u| u.count).sum();
    let message = kept.is_empty().then(|| NO_CLICKS_MESSAGE.to_string());
    CampaignClickSummary {
        campaign_name: campaign.campaign_name,
        send_date: campaign.send_date,
        total_clicks,
        urls: kept,
        message,
    }
}

pub fn analyze(campaigns: Vec<CampaignClicks>, filter: LinkFilter) -> ClickReport {
    let mut by_date: BTreeMap<String, Vec<CampaignClickSummary>> = BTreeMap::new();
    for campaign in campaigns {
        let summary = summarize(campaign, filter);
        by_date
            .entry(summary.send_date.clone())
            .or_default()
            .push(summary);
    }

    let dates: Vec<DateClicks> = by_date
        .into_iter()
        .map(|(send_date, mut campaigns)| {
            campaigns.sort_by(|a, b| b.total_clicks.cmp(&a.total_clicks));
            DateClicks {
                send_date,
                campaigns,
            }
        })
        .collect();
    let total_clicks = dates
        .iter()
        .flat_map(|d| &d.campaigns)
        .map(|c| c.total_clicks)
        .sum();

    tracing::debug!(%filter, dates = dates.len(), total_clicks, "click report built");
    ClickReport {
        filter,
        dates,
        total_clicks,
    }
}
