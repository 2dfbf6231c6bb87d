//! Market tables: the country codes campaigns are tagged with, the local
//! currency of each market, and helpers that read those tags out of a
//! campaign name (`"<prefix>_..._<country>"`).

/// Country codes recognized as a campaign-name suffix.
pub const ALLOWED_COUNTRY_CODES: [&str; 13] = [
    "hn", "gt", "sv", "pa", "co", "ni", "cr", "do", "aw", "bb", "jm", "tt", "vi",
];

/// Currencies requested from the exchange-rate provider when nothing more
/// specific is known; also the key set of the identity fallback table.
pub const SUPPORTED_CURRENCIES: [&str; 13] = [
    "HNL", "GTQ", "SVC", "CRC", "NIO", "JMD", "COP", "PAB", "AWG", "BBD", "TTD", "USD", "DOP",
];

/// Markets whose order values are already reported in US dollars.
pub const USD_PASS_THROUGH: [&str; 3] = ["pa", "sv", "vi"];

pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_CURRENCY: &str = "USD";

const COUNTRY_TO_CURRENCY: [(&str, &str); 13] = [
    ("hn", "HNL"),
    ("gt", "GTQ"),
    ("sv", "SVC"),
    ("pa", "PAB"),
    ("co", "COP"),
    ("ni", "NIO"),
    ("cr", "CRC"),
    ("do", "DOP"),
    ("aw", "AWG"),
    ("bb", "BBD"),
    ("jm", "JMD"),
    ("tt", "TTD"),
    ("vi", "USD"),
];

const CURRENCY_SYMBOLS: [(&str, &str); 13] = [
    ("HNL", "L"),
    ("GTQ", "Q"),
    ("SVC", "$"),
    ("CRC", "₡"),
    ("NIO", "C$"),
    ("JMD", "J$"),
    ("COP", "$"),
    ("PAB", "$"),
    ("AWG", "ƒ"),
    ("BBD", "$"),
    ("TTD", "TT$"),
    ("USD", "$"),
    ("DOP", "RD$"),
];

pub fn is_allowed_country(code: &str) -> bool {
    ALLOWED_COUNTRY_CODES.contains(&code)
}

pub fn is_usd_pass_through(country_code: &str) -> bool {
    USD_PASS_THROUGH.contains(&country_code)
}

/// Local currency of a market; unmapped markets report in USD.
pub fn currency_for(country_code: &str) -> &'static str {
    COUNTRY_TO_CURRENCY
        .iter()
        .find(|(code, _)| *code == country_code)
        .map_or(DEFAULT_CURRENCY, |(_, currency)| currency)
}

pub fn currency_symbol(currency: &str) -> &'static str {
    CURRENCY_SYMBOLS
        .iter()
        .find(|(code, _)| *code == currency)
        .map_or("$", |(_, symbol)| symbol)
}

/// Last `_` segment of a name, trimmed and lower-cased, when the name has
/// more than one segment.
pub fn name_suffix(name: &str) -> Option<String> {
    let mut parts = name.split('_');
    parts.next()?;
    parts.last().map(|s| s.trim().to_lowercase())
}

/// Text before the first `_`, or `None` when the name has no `_`.
pub fn name_prefix(name: &str) -> Option<&str> {
    name.split_once('_').map(|(prefix, _)| prefix)
}

/// Country code encoded in a campaign name, `"us"` when the suffix is absent
/// or not a recognized market.
pub fn country_code_for(name: &str) -> String {
    match name_suffix(name) {
        Some(suffix) if is_allowed_country(&suffix) => suffix,
        _ => DEFAULT_COUNTRY.to_string(),
    }
}
