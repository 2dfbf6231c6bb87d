//! Classification of clicked URLs into product and category links.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const PRODUCT_MARKERS: [&str; 2] = ["/producto/", "/product/"];
const CATEGORY_MARKERS: [&str; 2] = ["/categoria/", "/category/"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFilter {
    #[default]
    All,
    Product,
    Category,
}

impl LinkFilter {
    fn markers(&self) -> &'static [&'static str] {
        match self {
            LinkFilter::All => &[],
            LinkFilter::Product => &PRODUCT_MARKERS,
            LinkFilter::Category => &CATEGORY_MARKERS,
        }
    }
}

impl FromStr for LinkFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "todos" => Ok(LinkFilter::All),
            "product" | "producto" => Ok(LinkFilter::Product),
            "category" | "categoria" => Ok(LinkFilter::Category),
            other => Err(format!("unknown link filter: {other}")),
        }
    }
}

impl fmt::Display for LinkFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkFilter::All => write!(f, "all"),
            LinkFilter::Product => write!(f, "product"),
            LinkFilter::Category => write!(f, "category"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMatch {
    pub matches: bool,
    pub extracted_id: Option<String>,
}

/// Path of a URL exactly as written, without scheme, host, query string or
/// fragment. Escapes and `..` segments are left alone so extracted ids match
/// the link text.
fn path_of(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let target = &raw[..end];
    match target.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |slash| &rest[slash..]),
        None => target,
    }
}

pub fn classify(raw_url: &str, filter: LinkFilter) -> LinkMatch {
    if filter == LinkFilter::All {
        return LinkMatch {
            matches: true,
            extracted_id: None,
        };
    }

    let path = path_of(raw_url);
    // ASCII lowering keeps byte offsets valid in `path`.
    let lowered = path.to_ascii_lowercase();
    let Some((start, marker)) = filter
        .markers()
        .iter()
        .filter_map(|m| lowered.find(m).map(|pos| (pos, *m)))
        .min_by_key(|(pos, _)| *pos)
    else {
        return LinkMatch::default();
    };

    let tail = &path[start + marker.len()..];
    let segments: Vec<&str> = tail.split('/').filter(|s| !s.is_empty()).collect();
    let extracted_id = if segments.len() >= 2 {
        segments.last().map(|s| s.to_string())
    } else {
        None
    };

    LinkMatch {
        matches: true,
        extracted_id,
    }
}
