//! Campaign metrics aggregation: currency normalization, grouping with
//! volume-weighted subtotals, grand totals, campaign selection and click
//! analysis.

pub mod clicks;
pub mod format;
pub mod grouping;
pub mod links;
pub mod normalizer;
pub mod selector;
pub mod snapshot;
pub mod totals;

pub use clicks::{analyze, CampaignClicks, ClickOutcome, ClickReport};
pub use grouping::{group, GroupKey, GroupingMode, MetricTotals, RecordGroup, Subtotal};
pub use links::{classify, LinkFilter, LinkMatch};
pub use normalizer::{normalize, normalize_all};
pub use selector::select;
pub use snapshot::ReportSnapshot;
pub use totals::{reduce, GrandTotal};
