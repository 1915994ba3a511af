//! Resolved / unresolved split of joined cases and triage of the unresolved.
//!
//! Each case moves once from joined to one of two terminal states. Resolved
//! cases are copied through; unresolved cases get a summary and next steps from
//! the model, computed on a bounded worker pool.

use crate::assist::SummaryAssist;
use crate::error::ReconError;
use crate::records::{CaseRow, JoinedCase, TriageFailure, TriageRecord};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

lazy_static! {
    /// Whole word, any case: "Resolved." matches, "unresolved" does not.
    static ref RESOLVED_WORD: Regex = Regex::new(r"(?i)\bresolved\b").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassificationOutcome {
    Resolved(CaseRow),
    Unresolved(CaseRow),
}

/// Everything produced for one batch of joined cases, in joined-row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub resolved: Vec<CaseRow>,
    /// Includes cases whose triage failed.
    pub unresolved: Vec<CaseRow>,
    pub details: Vec<TriageRecord>,
    pub failures: Vec<TriageFailure>,
}

pub struct ResolutionClassifier {
    concurrency: usize,
}

impl ResolutionClassifier {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn is_resolved(comment: &str) -> bool {
        RESOLVED_WORD.is_match(comment)
    }

    /// Decide a single case from its comment alone.
    pub fn classify(case: &JoinedCase) -> ClassificationOutcome {
        let row = case.to_case_row();
        if Self::is_resolved(&row.comment) {
            ClassificationOutcome::Resolved(row)
        } else {
            ClassificationOutcome::Unresolved(row)
        }
    }

    /// Classify every case and triage the unresolved ones.
    ///
    /// A failing model call only affects its own case: the case stays in
    /// `unresolved`, gets no triage record and is listed in `failures`.
    pub async fn resolve(&self, cases: &[JoinedCase], assist: &SummaryAssist) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        for case in cases {
            match Self::classify(case) {
                ClassificationOutcome::Resolved(row) => report.resolved.push(row),
                ClassificationOutcome::Unresolved(row) => report.unresolved.push(row),
            }
        }
        info!(
            "{} cases resolved, {} need triage",
            report.resolved.len(),
            report.unresolved.len()
        );

        let triaged = self.triage(&report.unresolved, assist).await;
        for (row, outcome) in report.unresolved.iter().zip(triaged) {
            match outcome {
                Ok((summary, next_steps)) => report.details.push(TriageRecord {
                    order_id: row.order_id.clone(),
                    comment: row.comment.clone(),
                    summary,
                    next_steps,
                }),
                Err(e) => {
                    warn!("Triage failed for {}: {}", row.order_id, e);
                    report.failures.push(TriageFailure {
                        order_id: row.order_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Summary and next steps per row, returned in input order.
    async fn triage(
        &self,
        rows: &[CaseRow],
        assist: &SummaryAssist,
    ) -> Vec<Result<(String, String), ReconError>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (idx, row) in rows.iter().enumerate() {
            let assist = assist.clone();
            let semaphore = Arc::clone(&semaphore);
            let comment = row.comment.clone();

            set.spawn(async move {
                let result = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| ReconError::Llm(format!("Worker pool closed: {}", e)))?;
                    let summary = assist.generate_summary(&comment).await?;
                    let next_steps = assist.suggest_next_steps(&comment).await?;
                    Ok::<_, ReconError>((summary, next_steps))
                }
                .await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<Result<(String, String), ReconError>>> =
            (0..rows.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!("Triage task aborted: {}", e),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(ReconError::Llm("Triage task aborted".to_string())))
            })
            .collect()
    }
}
