//! Display formatting for report tables.

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `1234567` → `"1,234,567"`.
pub fn format_count(n: u64) -> String {
    group_thousands(&n.to_string())
}

/// `(-1234.5, "$")` → `"-$1,234.50"`.
pub fn format_currency(value: f64, symbol: &str) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{symbol}{}.{frac}", group_thousands(whole))
}

/// Percent values are already in [0, 100]: `12.346` → `"12.35%"`.
pub fn format_percentage(value: f64) -> String {
    format!("{value:.2}%")
}
