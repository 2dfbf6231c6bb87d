//! Immutable report snapshot: grouped rows, subtotals and the grand total
//! computed in one pass over a loaded campaign list.

use std::time::Instant;

use campaign_core::CampaignRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grouping::{group, GroupingMode, RecordGroup};
use crate::totals::{reduce, GrandTotal};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub snapshot_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub grouping: GroupingMode,
    pub groups: Vec<RecordGroup>,
    pub grand_total: GrandTotal,
}

impl ReportSnapshot {
    pub fn build(records: &[CampaignRecord], grouping: GroupingMode) -> Self {
        let started = Instant::now();
        let groups = group(records, grouping);
        let grand_total = reduce(groups.iter().map(|g| &g.subtotal));

        let snapshot = Self {
            snapshot_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            grouping,
            groups,
            grand_total,
        };
        tracing::info!(
            snapshot_id = %snapshot.snapshot_id,
            %grouping,
            records = records.len(),
            groups = snapshot.groups.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "report snapshot built"
        );
        snapshot
    }

    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rows in display order, group by group.
    pub fn records(&self) -> impl Iterator<Item = &CampaignRecord> {
        self.groups.iter().flat_map(|g| g.records.iter())
    }
}
