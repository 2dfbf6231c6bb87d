//! Campaign selection by free-text query: display numbers, country codes,
//! and name-prefix keywords, comma separated.

use std::collections::HashSet;

use campaign_core::markets;
use campaign_core::CampaignRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// 1-based position in the current list.
    Position(usize),
    Country(String),
    Keyword(String),
}

fn parse_tokens(query: &str) -> Vec<Token> {
    query
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.chars().all(|c| c.is_ascii_digit()) {
                // Digits too large for usize can never be in range.
                Token::Position(t.parse().unwrap_or(usize::MAX))
            } else if t.len() == 2 && markets::is_allowed_country(&t) {
                Token::Country(t)
            } else {
                Token::Keyword(t)
            }
        })
        .collect()
}

fn matches_country(record: &CampaignRecord, code: &str) -> bool {
    markets::name_suffix(&record.name).is_some_and(|suffix| suffix == code)
}

fn matches_keyword(record: &CampaignRecord, keyword: &str) -> bool {
    let prefix = markets::name_prefix(&record.name).unwrap_or(&record.name);
    prefix.to_lowercase().contains(keyword)
}

/// Records matched by any token of `query`, each at most once (by campaign id
/// and send time), ordered by load index. Blank queries select nothing.
pub fn select(records: &[CampaignRecord], query: &str) -> Vec<CampaignRecord> {
    let tokens = parse_tokens(query);
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut selected: Vec<&CampaignRecord> = Vec::new();

    for token in &tokens {
        let matched: Vec<&CampaignRecord> = match token {
            Token::Position(n) => n
                .checked_sub(1)
                .and_then(|i| records.get(i))
                .into_iter()
                .collect(),
            Token::Country(code) => records.iter().filter(|r| matches_country(r, code)).collect(),
            Token::Keyword(keyword) => records
                .iter()
                .filter(|r| matches_keyword(r, keyword))
                .collect(),
        };
        for record in matched {
            if seen.insert(record.identity()) {
                selected.push(record);
            }
        }
    }

    selected.sort_by_key(|r| r.index);
    tracing::debug!(
        query,
        tokens = tokens.len(),
        selected = selected.len(),
        "campaign selection evaluated"
    );
    selected.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::{ExchangeRates, RawCampaignRecord};

    use crate::normalizer::normalize_all;

    fn records(names: &[&str]) -> Vec<CampaignRecord> {
        let raws = names
            .iter()
            .enumerate()
            .map(|(i, name)| RawCampaignRecord {
                id: format!("c{}", i + 1),
                name: name.to_string(),
                send_time: "2025-05-01 08:00:00".into(),
                ..Default::default()
            })
            .collect();
        normalize_all(raws, &ExchangeRates::default())
    }

    fn indexes(selected: &[CampaignRecord]) -> Vec<usize> {
        selected.iter().map(|r| r.index).collect()
    }

    #[test]
    fn test_mixed_query_scenario() {
        let records = records(&[
            "welcome_hn",
            "promo_blast_gt",
            "newsletter_sv",
            "summer_promo_hn",
            "flash_cr",
        ]);
        let selected = select(&records, "2, hn, promo");
        // #2 by position, #1 and #4 by country; "promo" only appears in the
        // prefix of #2, which is already selected.
        assert_eq!(indexes(&selected), vec![1, 2, 4]);
    }

    #[test]
    fn test_keyword_matches_prefix_substring() {
        let records = records(&["Promotion_x_hn", "mypromo_gt", "sale_promo_sv", "promo"]);
        let selected = select(&records, "PROMO");
        assert_eq!(indexes(&selected), vec![1, 2, 4]);
    }

    #[test]
    fn test_positions_out_of_range_are_skipped() {
        let records = records(&["a_hn", "b_gt"]);
        assert!(select(&records, "0, 3, 99999999999999999999999").is_empty());
        assert_eq!(indexes(&select(&records, "2,1")), vec![1, 2]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let records = records(&["a_hn", "b_gt"]);
        let selected = select(&records, "1, hn, a, 1");
        assert_eq!(indexes(&selected), vec![1]);
    }

    #[test]
    fn test_same_campaign_sent_twice_is_kept_per_send() {
        let mut records = records(&["a_hn", "a_hn"]);
        records[1].id = records[0].id.clone();
        records[1].send_time = "2025-05-02 08:00:00".into();
        assert_eq!(indexes(&select(&records, "hn")), vec![1, 2]);

        records[1].send_time = records[0].send_time.clone();
        assert_eq!(indexes(&select(&records, "hn")), vec![1]);
    }

    #[test]
    fn test_blank_query_selects_nothing() {
        let records = records(&["a_hn"]);
        assert!(select(&records, "").is_empty());
        assert!(select(&records, "  , ,").is_empty());
    }

    #[test]
    fn test_selection_is_idempotent() {
        let records = records(&["a_hn", "b_gt", "promo_x_hn"]);
        let once = select(&records, "3, hn, promo");
        let twice = select(&records, "3, hn, promo");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unlisted_country_code_is_a_keyword() {
        let records = records(&["mx_launch_gt", "launch_mx"]);
        // "mx" is not a known market, so it matches name prefixes instead.
        assert_eq!(indexes(&select(&records, "mx")), vec![1]);
    }
}
