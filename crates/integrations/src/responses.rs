//! Typed views of the email platform's JSON:API payloads and the parsing
//! rules applied to them. Kept free of I/O so fixtures can drive them.

use std::collections::HashMap;

use campaign_core::types::{NOT_AVAILABLE, NO_PREVIEW_TEXT, NO_SUBJECT_LINE};
use campaign_core::{CampaignError, CampaignResult, UrlClicks};
use campaign_reporting::grouping::round2;
use campaign_reporting::normalizer::SEND_TIME_FORMAT;
use chrono::DateTime;
use serde::Deserialize;

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource<A> {
    #[serde(default)]
    id: String,
    attributes: A,
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Default, Deserialize)]
struct Relationships {
    #[serde(rename = "campaign-messages")]
    campaign_messages: Option<Related<Vec<ResourceId>>>,
    template: Option<Related<Option<ResourceId>>>,
}

#[derive(Debug, Deserialize)]
struct Related<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ValuesReportAttributes {
    #[serde(default)]
    results: Vec<ValuesReportRow>,
}

#[derive(Debug, Deserialize)]
struct ValuesReportRow {
    groupings: ValuesReportGroupings,
    statistics: ValuesReportStatistics,
}

#[derive(Debug, Deserialize)]
struct ValuesReportGroupings {
    campaign_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ValuesReportStatistics {
    #[serde(default)]
    open_rate: Option<f64>,
    #[serde(default)]
    click_rate: Option<f64>,
    #[serde(default)]
    delivered: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CampaignAttributes {
    name: Option<String>,
    send_time: Option<String>,
    #[serde(default)]
    audiences: Option<AudienceIds>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct AudienceIds {
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MessageAttributes {
    #[serde(default)]
    definition: Option<MessageDefinition>,
}

#[derive(Debug, Deserialize)]
struct MessageDefinition {
    #[serde(default)]
    content: Option<MessageContentFields>,
}

#[derive(Debug, Deserialize)]
struct MessageContentFields {
    subject: Option<String>,
    preview_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedAttributes {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregateAttributes {
    #[serde(default)]
    data: Vec<AggregateRow>,
}

#[derive(Debug, Deserialize)]
struct AggregateRow {
    #[serde(default)]
    dimensions: Vec<String>,
    #[serde(default)]
    measurements: HashMap<String, Vec<f64>>,
}

impl AggregateRow {
    fn total(&self, measurement: &str) -> f64 {
        self.measurements
            .get(measurement)
            .map(|values| values.iter().sum())
            .unwrap_or(0.0)
    }
}

// ─── Parsed results ─────────────────────────────────────────────────────────

/// One row of the campaign values report, rates already in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignStatistics {
    pub campaign_id: String,
    pub open_rate: f64,
    pub click_rate: f64,
    pub delivered: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuesReportPage {
    pub results: Vec<CampaignStatistics>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignDetail {
    pub name: String,
    /// `YYYY-MM-DD HH:MM:SS` in the offset the platform reported, or `"N/A"`.
    pub send_time: String,
    pub audiences: AudienceIds,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageContent {
    pub subject: String,
    pub preview_text: String,
    pub template_id: Option<String>,
}

impl Default for MessageContent {
    fn default() -> Self {
        Self {
            subject: NO_SUBJECT_LINE.to_string(),
            preview_text: NO_PREVIEW_TEXT.to_string(),
            template_id: None,
        }
    }
}

/// Completed-order totals attributed to one campaign message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderTotals {
    pub unique: u64,
    pub count: u64,
    pub sum_value: f64,
}

// ─── Parsers ────────────────────────────────────────────────────────────────

fn malformed(what: &str, err: serde_json::Error) -> CampaignError {
    CampaignError::Response(format!("{what}: {err}"))
}

/// The first metric listed on the account is used as the conversion metric.
pub fn parse_conversion_metric_id(body: &str) -> CampaignResult<String> {
    let doc: Document<Vec<Resource<serde_json::Value>>> =
        serde_json::from_str(body).map_err(|e| malformed("metrics", e))?;
    doc.data
        .into_iter()
        .map(|metric| metric.id)
        .find(|id| !id.is_empty())
        .ok_or(CampaignError::NoConversionMetric)
}

fn percent(fraction: Option<f64>) -> f64 {
    round2(fraction.unwrap_or(0.0) * 100.0)
}

pub fn parse_values_report(body: &str) -> CampaignResult<ValuesReportPage> {
    let doc: Document<Resource<ValuesReportAttributes>> =
        serde_json::from_str(body).map_err(|e| malformed("campaign values report", e))?;
    let results = doc
        .data
        .attributes
        .results
        .into_iter()
        .map(|row| CampaignStatistics {
            campaign_id: row.groupings.campaign_id,
            open_rate: percent(row.statistics.open_rate),
            click_rate: percent(row.statistics.click_rate),
            delivered: row.statistics.delivered.unwrap_or(0.0).max(0.0) as u64,
        })
        .collect();
    Ok(ValuesReportPage {
        results,
        next: doc.links.next.filter(|n| !n.is_empty()),
    })
}

/// ISO-8601 send time reformatted for display. Values that do not parse are
/// kept verbatim.
pub fn format_send_time(iso: Option<&str>) -> String {
    match iso {
        None => NOT_AVAILABLE.to_string(),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => dt.naive_local().format(SEND_TIME_FORMAT).to_string(),
            Err(_) => raw.to_string(),
        },
    }
}

pub fn parse_campaign_detail(body: &str, campaign_id: &str) -> CampaignResult<CampaignDetail> {
    let doc: Document<Resource<CampaignAttributes>> =
        serde_json::from_str(body).map_err(|e| malformed("campaign", e))?;
    let Resource {
        attributes,
        relationships,
        ..
    } = doc.data;

    Ok(CampaignDetail {
        name: attributes
            .name
            .unwrap_or_else(|| format!("Campaign {campaign_id}")),
        send_time: format_send_time(attributes.send_time.as_deref()),
        audiences: attributes.audiences.unwrap_or_default(),
        message_id: relationships
            .campaign_messages
            .and_then(|rel| rel.data.into_iter().next())
            .map(|m| m.id),
    })
}

pub fn parse_campaign_message(body: &str) -> CampaignResult<MessageContent> {
    let doc: Document<Resource<MessageAttributes>> =
        serde_json::from_str(body).map_err(|e| malformed("campaign message", e))?;
    let content = doc.data.attributes.definition.and_then(|d| d.content);
    let defaults = MessageContent::default();

    Ok(MessageContent {
        subject: content
            .as_ref()
            .and_then(|c| c.subject.clone())
            .unwrap_or(defaults.subject),
        preview_text: content
            .and_then(|c| c.preview_text)
            .unwrap_or(defaults.preview_text),
        template_id: doc
            .data
            .relationships
            .template
            .and_then(|rel| rel.data)
            .map(|t| t.id),
    })
}

/// Display name of a list or segment, when the payload carries one.
pub fn parse_audience_name(body: &str) -> CampaignResult<Option<String>> {
    let doc: Document<Resource<NamedAttributes>> =
        serde_json::from_str(body).map_err(|e| malformed("audience", e))?;
    Ok(doc.data.attributes.name.filter(|n| !n.trim().is_empty()))
}

/// Order totals keyed by attributed campaign id, summed over every interval.
pub fn parse_order_aggregates(body: &str) -> CampaignResult<HashMap<String, OrderTotals>> {
    let doc: Document<Resource<AggregateAttributes>> =
        serde_json::from_str(body).map_err(|e| malformed("order aggregates", e))?;
    let mut totals: HashMap<String, OrderTotals> = HashMap::new();
    for row in doc.data.attributes.data {
        let campaign_id = row
            .dimensions
            .first()
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let entry = totals.entry(campaign_id).or_default();
        entry.unique += row.total("unique").max(0.0) as u64;
        entry.count += row.total("count").max(0.0) as u64;
        entry.sum_value += row.total("sum_value");
    }
    Ok(totals)
}

/// Click totals per URL. Rows without a URL dimension are skipped.
pub fn parse_url_clicks(body: &str) -> CampaignResult<Vec<UrlClicks>> {
    let doc: Document<Resource<AggregateAttributes>> =
        serde_json::from_str(body).map_err(|e| malformed("click aggregates", e))?;
    let mut clicks: Vec<UrlClicks> = Vec::new();
    for row in doc.data.attributes.data {
        let Some(url) = row.dimensions.first() else {
            continue;
        };
        let count = row.total("count").max(0.0) as u64;
        let unique = row.total("unique").max(0.0) as u64;
        match clicks.iter_mut().find(|c| &c.url == url) {
            Some(existing) => {
                existing.count += count;
                existing.unique += unique;
            }
            None => clicks.push(UrlClicks {
                url: url.clone(),
                count,
                unique,
            }),
        }
    }
    Ok(clicks)
}

/// First error id of a JSON:API error body, used to describe 400 responses.
pub fn parse_error_id(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("errors")?
        .get(0)?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversion_metric_is_first_listed() {
        let body = json!({"data": [
            {"type": "metric", "id": "QXw4AK", "attributes": {"name": "Placed Order"}},
            {"type": "metric", "id": "SCJBvM", "attributes": {"name": "Clicked Email"}}
        ]})
        .to_string();
        assert_eq!(parse_conversion_metric_id(&body).unwrap(), "QXw4AK");

        let empty = json!({"data": []}).to_string();
        assert!(matches!(
            parse_conversion_metric_id(&empty),
            Err(CampaignError::NoConversionMetric)
        ));
    }

    #[test]
    fn test_values_report_converts_rates_to_percent() {
        let body = json!({
            "data": {
                "type": "campaign-values-report",
                "attributes": {"results": [
                    {
                        "groupings": {"campaign_id": "01JAB", "send_channel": "email"},
                        "statistics": {"open_rate": 0.213745, "click_rate": 0.0311, "delivered": 1000.0, "delivery_rate": 0.99}
                    },
                    {
                        "groupings": {"campaign_id": "01JAC"},
                        "statistics": {"delivered": 37}
                    }
                ]}
            },
            "links": {"self": "https://a.klaviyo.com/api/campaign-values-reports/", "next": "https://a.klaviyo.com/api/campaign-values-reports/?page_cursor=abc"}
        })
        .to_string();

        let page = parse_values_report(&body).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].campaign_id, "01JAB");
        assert_eq!(page.results[0].open_rate, 21.37);
        assert_eq!(page.results[0].click_rate, 3.11);
        assert_eq!(page.results[0].delivered, 1000);
        assert_eq!(page.results[1].open_rate, 0.0);
        assert_eq!(page.results[1].delivered, 37);
        assert!(page.next.unwrap().ends_with("page_cursor=abc"));
    }

    #[test]
    fn test_values_report_last_page() {
        let body = json!({
            "data": {"attributes": {"results": []}},
            "links": {"next": null}
        })
        .to_string();
        let page = parse_values_report(&body).unwrap();
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_campaign_detail() {
        let body = json!({
            "data": {
                "type": "campaign",
                "id": "01JAB",
                "attributes": {
                    "name": "promo_blast_hn",
                    "send_time": "2025-03-04T15:30:00+00:00",
                    "audiences": {"included": ["Xy12AbCdEf"], "excluded": []}
                },
                "relationships": {
                    "campaign-messages": {"data": [{"type": "campaign-message", "id": "MSG1"}]}
                }
            }
        })
        .to_string();

        let detail = parse_campaign_detail(&body, "01JAB").unwrap();
        assert_eq!(detail.name, "promo_blast_hn");
        assert_eq!(detail.send_time, "2025-03-04 15:30:00");
        assert_eq!(detail.audiences.included, vec!["Xy12AbCdEf"]);
        assert_eq!(detail.message_id.as_deref(), Some("MSG1"));
    }

    #[test]
    fn test_campaign_detail_defaults() {
        let body = json!({"data": {"id": "01JAZ", "attributes": {"send_time": null}}}).to_string();
        let detail = parse_campaign_detail(&body, "01JAZ").unwrap();
        assert_eq!(detail.name, "Campaign 01JAZ");
        assert_eq!(detail.send_time, "N/A");
        assert_eq!(detail.audiences, AudienceIds::default());
        assert!(detail.message_id.is_none());
    }

    #[test]
    fn test_send_time_formats() {
        assert_eq!(format_send_time(Some("2025-01-02T03:04:05Z")), "2025-01-02 03:04:05");
        assert_eq!(
            format_send_time(Some("2025-01-02T03:04:05.123-06:00")),
            "2025-01-02 03:04:05"
        );
        assert_eq!(format_send_time(Some("tomorrow")), "tomorrow");
        assert_eq!(format_send_time(None), "N/A");
    }

    #[test]
    fn test_campaign_message() {
        let body = json!({
            "data": {
                "id": "MSG1",
                "attributes": {"definition": {"channel": "email", "content": {
                    "subject": "Big sale!", "preview_text": "Up to 50% off"
                }}},
                "relationships": {"template": {"data": {"type": "template", "id": "TPL9"}}}
            }
        })
        .to_string();
        let content = parse_campaign_message(&body).unwrap();
        assert_eq!(content.subject, "Big sale!");
        assert_eq!(content.preview_text, "Up to 50% off");
        assert_eq!(content.template_id.as_deref(), Some("TPL9"));

        let bare = json!({"data": {"id": "MSG2", "attributes": {}}}).to_string();
        assert_eq!(parse_campaign_message(&bare).unwrap(), MessageContent::default());
    }

    #[test]
    fn test_audience_name() {
        let body = json!({"data": {"id": "L1", "attributes": {"name": "VIP Customers"}}}).to_string();
        assert_eq!(parse_audience_name(&body).unwrap().as_deref(), Some("VIP Customers"));
        let unnamed = json!({"data": {"id": "L1", "attributes": {"name": " "}}}).to_string();
        assert_eq!(parse_audience_name(&unnamed).unwrap(), None);
    }

    #[test]
    fn test_order_aggregates_sum_per_campaign() {
        let body = json!({"data": {"attributes": {
            "dates": ["2025-03-04T00:00:00+00:00", "2025-03-05T00:00:00+00:00"],
            "data": [
                {"dimensions": ["01JAB"], "measurements": {"unique": [2.0, 1.0], "sum_value": [150.5, 49.5], "count": [2.0, 2.0]}},
                {"dimensions": ["01JAC"], "measurements": {"unique": [0.0, 0.0], "sum_value": [0.0, 0.0], "count": [0.0, 0.0]}},
                {"dimensions": ["01JAB"], "measurements": {"unique": [1.0], "sum_value": [10.0], "count": [1.0]}}
            ]
        }}})
        .to_string();

        let totals = parse_order_aggregates(&body).unwrap();
        let jab = &totals["01JAB"];
        assert_eq!(jab.unique, 4);
        assert_eq!(jab.count, 5);
        assert!((jab.sum_value - 210.0).abs() < 1e-9);
        assert_eq!(totals["01JAC"], OrderTotals::default());
    }

    #[test]
    fn test_url_clicks() {
        let body = json!({"data": {"attributes": {"data": [
            {"dimensions": ["https://shop.com/producto/a/SKU1"], "measurements": {"count": [3.0, 4.0], "unique": [2.0, 3.0]}},
            {"dimensions": [], "measurements": {"count": [99.0]}},
            {"dimensions": ["https://shop.com/"], "measurements": {"count": [1.0], "unique": [1.0]}}
        ]}}})
        .to_string();

        let clicks = parse_url_clicks(&body).unwrap();
        assert_eq!(
            clicks,
            vec![
                UrlClicks { url: "https://shop.com/producto/a/SKU1".into(), count: 7, unique: 5 },
                UrlClicks { url: "https://shop.com/".into(), count: 1, unique: 1 },
            ]
        );
    }

    #[test]
    fn test_malformed_payload_is_a_response_error() {
        assert!(matches!(
            parse_values_report("{\"data\": 3}"),
            Err(CampaignError::Response(_))
        ));
        assert_eq!(
            parse_error_id(r#"{"errors": [{"id": "abc-123", "status": 400}]}"#).as_deref(),
            Some("abc-123")
        );
        assert_eq!(parse_error_id("not json"), None);
    }
}
