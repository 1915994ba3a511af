//! Partitions raw reconciliation rows into the three category outputs.

use crate::records::{CategoryRow, TransactionRecord};
use crate::status::{Category, StatusExtractor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Category outputs of one run.
///
/// The sets are disjoint only when every status blob names a single label; a
/// blob naming several labels lands its row in each matching set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Categorized {
    pub matched: Vec<CategoryRow>,
    pub not_found_sys_b: Vec<CategoryRow>,
    pub not_matched: Vec<CategoryRow>,
    /// Rows whose blob named no category and were left out.
    pub uncategorized: usize,
}

impl Categorized {
    pub fn rows(&self, category: Category) -> &[CategoryRow] {
        match category {
            Category::Matched => &self.matched,
            Category::NotFoundSysB => &self.not_found_sys_b,
            Category::NotMatched => &self.not_matched,
        }
    }

    fn push(&mut self, category: Category, row: CategoryRow) {
        match category {
            Category::Matched => self.matched.push(row),
            Category::NotFoundSysB => self.not_found_sys_b.push(row),
            Category::NotMatched => self.not_matched.push(row),
        }
    }
}

pub struct Categorizer {
    row_cap: usize,
}

impl Categorizer {
    pub fn new(row_cap: usize) -> Self {
        Self { row_cap }
    }

    /// Classify the first `row_cap` records by their status blob.
    pub fn categorize(&self, rows: &[TransactionRecord]) -> Categorized {
        let mut out = Categorized::default();

        for record in rows.iter().take(self.row_cap) {
            let memberships = StatusExtractor::memberships(record.recon_sub_status.as_deref());
            if memberships.is_empty() {
                debug!("{} matches no category, dropping", record.txn_ref_id);
                out.uncategorized += 1;
                continue;
            }
            if memberships.len() > 1 {
                debug!("{} belongs to {} categories", record.txn_ref_id, memberships.len());
            }
            for category in memberships {
                out.push(category, CategoryRow::from(record));
            }
        }

        info!(
            "Categorized {} rows: {} matched, {} not found in system B, {} not matched, {} uncategorized",
            rows.len().min(self.row_cap),
            out.matched.len(),
            out.not_found_sys_b.len(),
            out.not_matched.len(),
            out.uncategorized
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str, blob: Option<&str>) -> TransactionRecord {
        TransactionRecord {
            txn_ref_id: id.to_string(),
            sys_a_amount: 10.0,
            sys_b_amount: 0.0,
            sys_a_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            sys_b_date: None,
            recon_sub_status: blob.map(str::to_string),
        }
    }

    #[test]
    fn test_three_row_partition() {
        let rows = vec![
            record("row1", Some(r#"{"a":"Matched"}"#)),
            record("row2", Some(r#"{"a":"Not Found-SysB"}"#)),
            record("row3", Some("{oops")),
        ];
        let out = Categorizer::new(200).categorize(&rows);

        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.matched[0].order_id, "row1");
        assert_eq!(out.not_found_sys_b.len(), 1);
        assert_eq!(out.not_found_sys_b[0].order_id, "row2");
        assert!(out.not_matched.is_empty());
        assert_eq!(out.uncategorized, 1);
    }

    #[test]
    fn test_multi_label_row_in_every_output() {
        let rows = vec![record("dup", Some("{'x': 'Matched', 'y': 'Not Matched'}"))];
        let out = Categorizer::new(200).categorize(&rows);
        assert_eq!(out.rows(Category::Matched).len(), 1);
        assert_eq!(out.rows(Category::NotMatched).len(), 1);
        assert!(out.rows(Category::NotFoundSysB).is_empty());
    }

    #[test]
    fn test_row_cap_limits_input() {
        let rows: Vec<_> = (0..250)
            .map(|i| record(&format!("T{}", i), Some("{'s': 'Not Matched'}")))
            .collect();
        let out = Categorizer::new(200).categorize(&rows);
        assert_eq!(out.not_matched.len(), 200);
        assert_eq!(out.not_matched.last().unwrap().order_id, "T199");

        let small = Categorizer::new(5).categorize(&rows);
        assert_eq!(small.not_matched.len(), 5);
    }

    #[test]
    fn test_schema_transform_keeps_system_a_side() {
        let mut rec = record("T1", Some("{'s': 'Matched'}"));
        rec.sys_a_amount = 0.0;
        rec.sys_b_amount = 99.0;
        rec.sys_a_date = None;
        let out = Categorizer::new(200).categorize(&[rec]);
        let row = &out.matched[0];
        assert_eq!(row.order_id, "T1");
        assert_eq!(row.amount, 0.0);
        assert_eq!(row.date_string(), "");
    }
}
