//! Flat CSV outputs
//!
//! Every file gets a header row, even when it has no data rows. Existing files
//! are overwritten in place.

use crate::categorizer::Categorized;
use crate::classifier::ResolutionReport;
use crate::error::Result;
use crate::records::{format_amount, CaseRow, CategoryRow, TriageFailure, TriageRecord};
use csv::WriterBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MATCHED_FILE: &str = "matched.csv";
pub const NOT_FOUND_FILE: &str = "not_found_sys_b.csv";
pub const NOT_MATCHED_FILE: &str = "not_matched.csv";
pub const RESOLVED_DIR: &str = "resolved";
pub const UNRESOLVED_DIR: &str = "unresolved";
pub const RESOLVED_FILE: &str = "resolved_cases.csv";
pub const UNRESOLVED_FILE: &str = "unresolved_cases.csv";
pub const UNRESOLVED_DETAILS_FILE: &str = "unresolved_cases_details.csv";
pub const TRIAGE_FAILURES_FILE: &str = "triage_failures.csv";

/// A record with a fixed column layout.
pub trait CsvRow {
    fn header() -> &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

impl CsvRow for CategoryRow {
    fn header() -> &'static [&'static str] {
        &["order_id", "amount", "date"]
    }

    fn fields(&self) -> Vec<String> {
        vec![self.order_id.clone(), format_amount(self.amount), self.date_string()]
    }
}

impl CsvRow for CaseRow {
    fn header() -> &'static [&'static str] {
        &["order_id", "amount", "date", "comment"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.order_id.clone(),
            format_amount(self.amount),
            self.date.clone(),
            self.comment.clone(),
        ]
    }
}

impl CsvRow for TriageRecord {
    fn header() -> &'static [&'static str] {
        &["order_id", "comment", "summary", "next_steps"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.order_id.clone(),
            self.comment.clone(),
            self.summary.clone(),
            self.next_steps.clone(),
        ]
    }
}

impl CsvRow for TriageFailure {
    fn header() -> &'static [&'static str] {
        &["order_id", "error"]
    }

    fn fields(&self) -> Vec<String> {
        vec![self.order_id.clone(), self.error.clone()]
    }
}

pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create the output root and its subdirectories if missing.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.root.join(RESOLVED_DIR))?;
        fs::create_dir_all(self.root.join(UNRESOLVED_DIR))?;
        Ok(())
    }

    pub fn write_categories(&self, categorized: &Categorized) -> Result<Vec<PathBuf>> {
        Ok(vec![
            self.write(&self.root.join(MATCHED_FILE), &categorized.matched)?,
            self.write(&self.root.join(NOT_FOUND_FILE), &categorized.not_found_sys_b)?,
            self.write(&self.root.join(NOT_MATCHED_FILE), &categorized.not_matched)?,
        ])
    }

    pub fn write_resolution(&self, report: &ResolutionReport) -> Result<Vec<PathBuf>> {
        let resolved_dir = self.root.join(RESOLVED_DIR);
        let unresolved_dir = self.root.join(UNRESOLVED_DIR);
        Ok(vec![
            self.write(&resolved_dir.join(RESOLVED_FILE), &report.resolved)?,
            self.write(&unresolved_dir.join(UNRESOLVED_FILE), &report.unresolved)?,
            self.write(&unresolved_dir.join(UNRESOLVED_DETAILS_FILE), &report.details)?,
            self.write(&unresolved_dir.join(TRIAGE_FAILURES_FILE), &report.failures)?,
        ])
    }

    /// Write `rows` under a header, replacing any existing file.
    pub fn write<R: CsvRow>(&self, path: &Path, rows: &[R]) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
        wtr.write_record(R::header())?;
        for row in rows {
            wtr.write_record(row.fields())?;
        }
        wtr.flush()?;

        info!("Wrote {} rows to {}", rows.len(), path.display());
        println!("File written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}
