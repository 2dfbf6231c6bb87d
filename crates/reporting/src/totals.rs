//! Grand total across every group of the current view.

use serde::{Deserialize, Serialize};

use crate::grouping::{MetricTotals, Subtotal};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrandTotal {
    pub groups: usize,
    pub totals: MetricTotals,
    pub avg_open_rate: f64,
    pub avg_click_rate: f64,
    pub avg_per_recipient: f64,
}

/// Sums the subtotal accumulators and reapplies the weighted-average
/// formulas. Rounded subtotal averages are never averaged again.
pub fn reduce<'a>(subtotals: impl IntoIterator<Item = &'a Subtotal>) -> GrandTotal {
    let mut totals = MetricTotals::default();
    let mut groups = 0;
    for subtotal in subtotals {
        totals.merge(&subtotal.totals);
        groups += 1;
    }

    GrandTotal {
        groups,
        avg_open_rate: totals.avg_open_rate(),
        avg_click_rate: totals.avg_click_rate(),
        avg_per_recipient: totals.avg_per_recipient(),
        totals,
    }
}
