//! Status blob parsing
//!
//! `recon_sub_status` holds a loosely quoted mapping of sub-check names to
//! category labels, e.g. `{'amount_check': 'Matched'}`. A blob that cannot be
//! read is data, not a fault: it simply belongs to no category.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Reconciliation category a record can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Matched,
    NotFoundSysB,
    NotMatched,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Matched,
        Category::NotFoundSysB,
        Category::NotMatched,
    ];

    /// Canonical label as it appears inside status blobs.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Matched => "Matched",
            Category::NotFoundSysB => "Not Found-SysB",
            Category::NotMatched => "Not Matched",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reads category membership out of status blobs.
pub struct StatusExtractor;

impl StatusExtractor {
    /// True iff `category_label` is one of the blob's string values.
    ///
    /// The key is deliberately ignored: any sub-check reporting the label puts
    /// the record in that category. Label comparison is exact and
    /// case-sensitive.
    pub fn extract(status_blob: Option<&str>, category_label: &str) -> bool {
        Self::parse(status_blob)
            .map(|map| Self::contains_label(&map, category_label))
            .unwrap_or(false)
    }

    /// Every category the blob names, in canonical order. A blob naming
    /// several labels yields several categories.
    pub fn memberships(status_blob: Option<&str>) -> Vec<Category> {
        let Some(map) = Self::parse(status_blob) else {
            return Vec::new();
        };

        Category::ALL
            .into_iter()
            .filter(|category| Self::contains_label(&map, category.label()))
            .collect()
    }

    fn parse(status_blob: Option<&str>) -> Option<Map<String, Value>> {
        let normalized = status_blob?.replace('\'', "\"");
        match serde_json::from_str::<Value>(&normalized) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    fn contains_label(map: &Map<String, Value>, label: &str) -> bool {
        map.values()
            .any(|value| matches!(value, Value::String(s) if s == label))
    }
}
