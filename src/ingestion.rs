//! CSV ingestion for the raw reconciliation export and the reply file.

use crate::config::SourceEncoding;
use crate::error::{ReconError, Result};
use crate::records::{ReplyRecord, TransactionRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const COL_TXN_REF_ID: &str = "txn_ref_id";
pub const COL_SYS_A_AMOUNT: &str = "sys_a_amount_attribute_1";
pub const COL_SYS_B_AMOUNT: &str = "sys_b_amount_attribute_1";
pub const COL_SYS_A_DATE: &str = "sys_a_date";
pub const COL_SYS_B_DATE: &str = "sys_b_date";
pub const COL_RECON_SUB_STATUS: &str = "recon_sub_status";

pub const COL_TRANSACTION_ID: &str = "Transaction ID";
pub const COL_REPLY_AMOUNT: &str = "amount";
pub const COL_COMMENTS: &str = "Comments";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A CSV file with a header row, read with an explicit encoding.
pub struct CsvSource {
    source_id: String,
    path: PathBuf,
    encoding: SourceEncoding,
    limit: Option<usize>,
}

impl CsvSource {
    pub fn new(source_id: impl Into<String>, path: impl AsRef<Path>, encoding: SourceEncoding) -> Self {
        Self {
            source_id: source_id.into(),
            path: path.as_ref().to_path_buf(),
            encoding,
            limit: None,
        }
    }

    /// Stop reading after `limit` data rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn read_table(&self) -> Result<CsvTable> {
        let bytes = std::fs::read(&self.path)?;
        let text = self.encoding.decode(&bytes).map_err(|e| {
            ReconError::Encoding(format!("{} ({}): {}", self.source_id, self.path.display(), e))
        })?;
        let table = CsvTable::parse(&text, self.limit)?;
        debug!(
            "Read {} rows from {} ({})",
            table.len(),
            self.source_id,
            self.path.display()
        );
        if table.is_empty() {
            warn!("{} has a header but no data rows", self.source_id);
        }
        Ok(table)
    }
}

/// Header-indexed rows; header names are trimmed.
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    pub fn parse(text: &str, limit: Option<usize>) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for result in rdr.records() {
            if limit.map_or(false, |n| rows.len() >= n) {
                break;
            }
            rows.push(result?);
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require_column(&self, name: &str, source: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| ReconError::Schema(format!("{} is missing column '{}'", source, name)))
    }

    /// Trimmed cell, `None` when the column is absent or the cell is blank.
    fn cell(row: &StringRecord, idx: Option<usize>) -> Option<&str> {
        idx.and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Load the raw reconciliation export, applying the amount and date
/// preprocessing rules.
pub fn load_transactions(source: &CsvSource) -> Result<Vec<TransactionRecord>> {
    let table = source.read_table()?;
    transactions_from_table(&table, source.source_id())
}

pub fn transactions_from_table(table: &CsvTable, source: &str) -> Result<Vec<TransactionRecord>> {
    let id_idx = table.require_column(COL_TXN_REF_ID, source)?;
    let a_amount_idx = table.column_index(COL_SYS_A_AMOUNT);
    let b_amount_idx = table.column_index(COL_SYS_B_AMOUNT);
    let a_date_idx = table.column_index(COL_SYS_A_DATE);
    let b_date_idx = table.column_index(COL_SYS_B_DATE);
    let status_idx = table.column_index(COL_RECON_SUB_STATUS);

    let records = table
        .rows
        .iter()
        .map(|row| {
            let txn_ref_id = CsvTable::cell(row, Some(id_idx)).unwrap_or_default().to_string();
            TransactionRecord {
                sys_a_amount: parse_amount(CsvTable::cell(row, a_amount_idx), &txn_ref_id),
                sys_b_amount: parse_amount(CsvTable::cell(row, b_amount_idx), &txn_ref_id),
                sys_a_date: CsvTable::cell(row, a_date_idx).and_then(parse_date),
                sys_b_date: CsvTable::cell(row, b_date_idx).and_then(parse_date),
                recon_sub_status: CsvTable::cell(row, status_idx).map(str::to_string),
                txn_ref_id,
            }
        })
        .collect();

    Ok(records)
}

/// Load the counterparty reply file.
pub fn load_replies(source: &CsvSource) -> Result<Vec<ReplyRecord>> {
    let table = source.read_table()?;
    replies_from_table(&table, source.source_id())
}

pub fn replies_from_table(table: &CsvTable, source: &str) -> Result<Vec<ReplyRecord>> {
    let id_idx = table.require_column(COL_TRANSACTION_ID, source)?;
    let amount_idx = table.column_index(COL_REPLY_AMOUNT);
    let comments_idx = table.column_index(COL_COMMENTS);

    let replies = table
        .rows
        .iter()
        .map(|row| ReplyRecord {
            transaction_id: CsvTable::cell(row, Some(id_idx)).unwrap_or_default().to_string(),
            amount: CsvTable::cell(row, amount_idx).and_then(|s| s.parse::<f64>().ok()),
            comments: comments_idx
                .and_then(|i| row.get(i))
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
        })
        .collect();

    Ok(replies)
}

/// Missing amounts default to zero. Unreadable ones do too, with a warning.
pub fn parse_amount(cell: Option<&str>, txn_ref_id: &str) -> f64 {
    match cell {
        None => 0.0,
        Some(s) => match s.replace(',', "").parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                warn!("Unreadable amount '{}' for {}, using 0", s, txn_ref_id);
                0.0
            }
        },
    }
}

/// Parse a date in one of the accepted layouts; anything else is `None`.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let s = cell.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
