//! Plain-text tables for terminal output.

use std::fmt::Write;

use campaign_core::markets;
use campaign_core::CampaignRecord;
use campaign_reporting::clicks::ClickReport;
use campaign_reporting::format::{format_count, format_currency, format_percentage};
use campaign_reporting::{LinkFilter, MetricTotals, ReportSnapshot};

const NAME_WIDTH: usize = 36;
const URL_WIDTH: usize = 70;

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let head: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{head}...")
}

fn header(show_local: bool) -> String {
    let mut line = format!(
        "{:>4}  {:<NAME_WIDTH$}  {:<19}  {:>8}  {:>8}  {:>10}  {:>10}  {:>7}  {:>7}  {:>14}",
        "#", "Campaign", "Send Time", "Open", "Click", "Delivered", "Opens", "Orders", "Count", "Value (USD)"
    );
    if show_local {
        let _ = write!(line, "  {:>16}", "Value (Local)");
    }
    let _ = write!(line, "  {:>10}  Audiences", "Per Rcpt");
    line
}

fn record_row(record: &CampaignRecord, show_local: bool) -> String {
    let mut line = format!(
        "{:>4}  {:<NAME_WIDTH$}  {:<19}  {:>8}  {:>8}  {:>10}  {:>10}  {:>7}  {:>7}  {:>14}",
        record.index,
        clip(&record.name, NAME_WIDTH),
        record.send_time,
        format_percentage(record.open_rate),
        format_percentage(record.click_rate),
        format_count(record.delivered),
        format_count(record.unique_opens),
        format_count(record.order_unique),
        format_count(record.order_count),
        format_currency(record.order_sum_value_usd, "$"),
    );
    if show_local {
        let _ = write!(
            line,
            "  {:>16}",
            format_currency(record.order_sum_value_local, record.currency_symbol())
        );
    }
    let audiences = record
        .audiences
        .as_ref()
        .map(|a| a.summary())
        .unwrap_or_else(|| campaign_core::types::NOT_AVAILABLE.to_string());
    let _ = write!(
        line,
        "  {:>10}  {}",
        format_currency(record.per_recipient, "$"),
        audiences
    );
    line
}

/// Local values only add up within one currency, so mixed groups show none.
fn local_total(records: &[CampaignRecord], totals: &MetricTotals) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    if records.iter().all(|r| r.currency == first.currency) {
        format_currency(totals.local_value, first.currency_symbol())
    } else {
        String::new()
    }
}

fn totals_row(
    label: &str,
    totals: &MetricTotals,
    averages: (f64, f64, f64),
    local: Option<String>,
) -> String {
    let (open, click, per_recipient) = averages;
    let mut line = format!(
        "{:>4}  {:<NAME_WIDTH$}  {:<19}  {:>8}  {:>8}  {:>10}  {:>10}  {:>7}  {:>7}  {:>14}",
        "",
        clip(label, NAME_WIDTH),
        format!("{} campaigns", totals.campaigns),
        format_percentage(open),
        format_percentage(click),
        format_count(totals.delivered),
        format_count(totals.unique_opens),
        format_count(totals.unique_orders),
        format_count(totals.order_count),
        format_currency(totals.usd_value, "$"),
    );
    if let Some(local) = local {
        let _ = write!(line, "  {local:>16}");
    }
    let _ = write!(line, "  {:>10}", format_currency(per_recipient, "$"));
    line
}

pub fn render_report(snapshot: &ReportSnapshot, show_local: bool) -> String {
    let mut out = String::new();
    if snapshot.is_empty() {
        out.push_str("No campaigns found for the selected range.\n");
        return out;
    }

    let head = header(show_local);
    let _ = writeln!(out, "{head}");
    let _ = writeln!(out, "{}", "-".repeat(head.chars().count()));

    for group in &snapshot.groups {
        let _ = writeln!(out, "[{}]", group.key.label());
        for record in &group.records {
            let _ = writeln!(out, "{}", record_row(record, show_local));
        }
        let subtotal = &group.subtotal;
        let local = show_local.then(|| local_total(&group.records, &subtotal.totals));
        let _ = writeln!(
            out,
            "{}",
            totals_row(
                &format!("Subtotal {}", group.key.label()),
                &subtotal.totals,
                (subtotal.avg_open_rate, subtotal.avg_click_rate, subtotal.avg_per_recipient),
                local,
            )
        );
        let _ = writeln!(out);
    }

    let grand = &snapshot.grand_total;
    let local = show_local.then(String::new);
    let _ = writeln!(
        out,
        "{}",
        totals_row(
            &format!("TOTAL ({} groups)", grand.groups),
            &grand.totals,
            (grand.avg_open_rate, grand.avg_click_rate, grand.avg_per_recipient),
            local,
        )
    );
    out
}

pub fn render_clicks(report: &ClickReport) -> String {
    let mut out = String::new();
    if report.dates.is_empty() {
        out.push_str("No campaigns selected.\n");
        return out;
    }

    for date in &report.dates {
        let _ = writeln!(out, "Send date: {}", date.send_date);
        for campaign in &date.campaigns {
            let market = markets::name_suffix(&campaign.campaign_name)
                .map(|s| s.to_uppercase())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {} {}  ({} clicks)",
                campaign.campaign_name,
                market,
                format_count(campaign.total_clicks)
            );
            if let Some(message) = &campaign.message {
                let _ = writeln!(out, "      {message}");
            }
            for url in &campaign.urls {
                let id = url
                    .extracted_id
                    .as_deref()
                    .map(|id| format!("  [{id}]"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "      {:<URL_WIDTH$}  {:>8}  {:>8}{id}",
                    clip(&url.url, URL_WIDTH),
                    format_count(url.count),
                    format_count(url.unique),
                );
            }
        }
        let _ = writeln!(out);
    }

    if report.filter != LinkFilter::All {
        let _ = writeln!(out, "Clicks by {} id:", report.filter);
        for entry in report.by_extracted_id() {
            let _ = writeln!(
                out,
                "  {:<30}  {:>8}  {:>8}",
                entry.id,
                format_count(entry.count),
                format_count(entry.unique)
            );
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "Total clicks: {}", format_count(report.total_clicks));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::{ExchangeRates, RawCampaignRecord, UrlClicks};
    use campaign_reporting::clicks::{CampaignClicks, ClickOutcome};
    use campaign_reporting::{analyze, normalize_all, GroupingMode};

    fn snapshot() -> ReportSnapshot {
        let rates: ExchangeRates = [("HNL".to_string(), 24.5)].into_iter().collect();
        let records = normalize_all(
            vec![
                RawCampaignRecord {
                    id: "A1".into(),
                    name: "promo_hn".into(),
                    send_time: "2025-06-01 10:00:00".into(),
                    open_rate: 50.0,
                    delivered: 1200,
                    order_sum_value_local: 200.0,
                    ..Default::default()
                },
                RawCampaignRecord {
                    id: "A2".into(),
                    name: "a_very_long_campaign_name_that_will_not_fit_gt".into(),
                    send_time: "2025-06-02 10:00:00".into(),
                    delivered: 10,
                    ..Default::default()
                },
            ],
            &rates,
        );
        ReportSnapshot::build(&records, GroupingMode::Country)
    }

    #[test]
    fn test_report_lists_groups_and_totals() {
        let text = render_report(&snapshot(), true);
        assert!(text.contains("[GT]"));
        assert!(text.contains("[HN]"));
        assert!(text.contains("Subtotal HN"));
        assert!(text.contains("TOTAL (2 groups)"));
        assert!(text.contains("1,200"));
        assert!(text.contains("$8.16"));
        assert!(text.contains("L200.00"));
        assert!(text.contains("Value (Local)"));
        assert!(text.contains("..."));
    }

    #[test]
    fn test_report_without_local_column() {
        let text = render_report(&snapshot(), false);
        assert!(!text.contains("Value (Local)"));
        assert!(!text.contains("L200.00"));
    }

    #[test]
    fn test_empty_report() {
        let empty = ReportSnapshot::build(&[], GroupingMode::Date);
        assert_eq!(
            render_report(&empty, true),
            "No campaigns found for the selected range.\n"
        );
    }

    #[test]
    fn test_clicks_render() {
        let report = analyze(
            vec![
                CampaignClicks {
                    campaign_name: "promo_hn".into(),
                    send_date: "2025-06-01".into(),
                    outcome: ClickOutcome::Clicks(vec![UrlClicks {
                        url: "https://shop.com/product/shirts/SKU9".into(),
                        count: 1500,
                        unique: 900,
                    }]),
                },
                CampaignClicks {
                    campaign_name: "flash_gt".into(),
                    send_date: "2025-06-01".into(),
                    outcome: ClickOutcome::Clicks(vec![]),
                },
            ],
            LinkFilter::Product,
        );
        let text = render_clicks(&report);
        assert!(text.contains("Send date: 2025-06-01"));
        assert!(text.contains("promo_hn HN  (1,500 clicks)"));
        assert!(text.contains("[SKU9]"));
        assert!(text.contains("No clicks found for this campaign."));
        assert!(text.contains("Clicks by product id:"));
        assert!(text.ends_with("Total clicks: 1,500\n"));
    }
}
