//! Record types that flow between pipeline stages.
//!
//! Every stage produces new values; nothing here is mutated once built.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the raw reconciliation export after preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txn_ref_id: String,
    /// Missing amounts are already defaulted to zero.
    pub sys_a_amount: f64,
    pub sys_b_amount: f64,
    /// `None` when the source date could not be parsed.
    pub sys_a_date: Option<NaiveDate>,
    pub sys_b_date: Option<NaiveDate>,
    /// Raw `recon_sub_status` blob, untouched.
    pub recon_sub_status: Option<String>,
}

/// Output schema shared by the three category files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub order_id: String,
    pub amount: f64,
    pub date: Option<NaiveDate>,
}

impl CategoryRow {
    /// `YYYY-MM-DD`, or an empty string for a missing date.
    pub fn date_string(&self) -> String {
        format_date(self.date)
    }
}

impl From<&TransactionRecord> for CategoryRow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            order_id: record.txn_ref_id.clone(),
            amount: record.sys_a_amount,
            date: record.sys_a_date,
        }
    }
}

/// One row of the reply file sent back by the counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub transaction_id: String,
    pub amount: Option<f64>,
    pub comments: Option<String>,
}

/// A NotFoundSysB row left-joined with its reply, if any.
///
/// The category-side `amount` is authoritative; the reply's own amount is kept
/// in `reply_amount` for reference only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedCase {
    pub order_id: String,
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub reply_amount: Option<f64>,
    pub comment: Option<String>,
}

impl JoinedCase {
    /// Unmatched left row: every reply field stays empty.
    pub fn without_reply(row: &CategoryRow) -> Self {
        Self {
            order_id: row.order_id.clone(),
            amount: row.amount,
            date: row.date,
            reply_amount: None,
            comment: None,
        }
    }

    pub fn with_reply(row: &CategoryRow, reply: &ReplyRecord) -> Self {
        Self {
            order_id: row.order_id.clone(),
            amount: row.amount,
            date: row.date,
            reply_amount: reply.amount,
            comment: reply.comments.clone(),
        }
    }

    /// Comment coerced to text, trimmed; absent comments become "".
    pub fn comment_text(&self) -> String {
        self.comment
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    pub fn to_case_row(&self) -> CaseRow {
        CaseRow {
            order_id: self.order_id.clone(),
            amount: self.amount,
            date: self.date_string(),
            comment: self.comment_text(),
        }
    }

    pub fn date_string(&self) -> String {
        format_date(self.date)
    }
}

/// `{order_id, amount, date, comment}` as written to the resolved and
/// unresolved case files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRow {
    pub order_id: String,
    pub amount: f64,
    pub date: String,
    pub comment: String,
}

/// Model-generated triage for an unresolved case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRecord {
    pub order_id: String,
    pub comment: String,
    pub summary: String,
    pub next_steps: String,
}

/// An unresolved case whose triage could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageFailure {
    pub order_id: String,
    pub error: String,
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Amounts render without a trailing `.0` for whole numbers so output files
/// stay stable across runs and platforms.
pub fn format_amount(amount: f64) -> String {
    format!("{}", amount)
}
