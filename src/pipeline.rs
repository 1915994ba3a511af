//! End-to-end reconciliation run: categorize, join replies, triage, write.

use crate::assist::SummaryAssist;
use crate::categorizer::{Categorized, Categorizer};
use crate::classifier::{ResolutionClassifier, ResolutionReport};
use crate::config::ReconConfig;
use crate::error::Result;
use crate::ingestion::{load_replies, load_transactions, CsvSource};
use crate::joiner::ResolutionJoiner;
use crate::llm::GenerativeModel;
use crate::notify::{notify_quietly, Notifier};
use crate::records::{ReplyRecord, TransactionRecord};
use crate::writer::OutputWriter;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct ReconPipeline {
    config: ReconConfig,
    assist: SummaryAssist,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ReconPipeline {
    pub fn new(config: ReconConfig, model: Arc<dyn GenerativeModel>) -> Self {
        let assist = SummaryAssist::new(model).with_timeout(config.model_timeout);
        Self {
            config,
            assist,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn assist(&self) -> &SummaryAssist {
        &self.assist
    }

    pub fn load_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let source = CsvSource::new("recon_data_raw", self.config.raw_path(), self.config.raw_encoding)
            .with_limit(self.config.row_cap);
        load_transactions(&source)
    }

    pub fn load_replies(&self) -> Result<Vec<ReplyRecord>> {
        let source = CsvSource::new("recon_data_reply", self.config.reply_path(), self.config.reply_encoding)
            .with_limit(self.config.row_cap);
        load_replies(&source)
    }

    /// Categorize the raw file and write the three category files.
    pub fn categorize(&self) -> Result<(Categorized, Vec<PathBuf>)> {
        let transactions = self.load_transactions()?;
        let writer = self.writer()?;
        let categorized = Categorizer::new(self.config.row_cap).categorize(&transactions);
        let files = writer.write_categories(&categorized)?;
        Ok((categorized, files))
    }

    /// Full run over the configured input files.
    pub async fn run(&self) -> Result<PipelineSummary> {
        info!(
            "Reconciliation run: raw={} reply={} output={}",
            self.config.raw_path().display(),
            self.config.reply_path().display(),
            self.config.output_dir.display()
        );
        let transactions = self.load_transactions()?;
        let replies = self.load_replies()?;
        self.process(&transactions, &replies).await
    }

    /// Full run over already loaded records.
    pub async fn process(
        &self,
        transactions: &[TransactionRecord],
        replies: &[ReplyRecord],
    ) -> Result<PipelineSummary> {
        let writer = self.writer()?;

        let categorized = Categorizer::new(self.config.row_cap).categorize(transactions);
        let mut files = writer.write_categories(&categorized)?;

        let joined = ResolutionJoiner::new(self.config.row_cap).join(&categorized.not_found_sys_b, replies);
        let report = ResolutionClassifier::new(self.config.concurrency)
            .resolve(&joined, &self.assist)
            .await;
        files.extend(writer.write_resolution(&report)?);

        let notified = self.notify_unresolved(&report).await;

        Ok(PipelineSummary {
            considered: transactions.len().min(self.config.row_cap),
            matched: categorized.matched.len(),
            not_found_sys_b: categorized.not_found_sys_b.len(),
            not_matched: categorized.not_matched.len(),
            uncategorized: categorized.uncategorized,
            resolved: report.resolved.len(),
            unresolved: report.unresolved.len(),
            triaged: report.details.len(),
            failed: report.failures.iter().map(|f| f.order_id.clone()).collect(),
            notified,
            files,
        })
    }

    async fn notify_unresolved(&self, report: &ResolutionReport) -> usize {
        let Some(notifier) = &self.notifier else {
            return 0;
        };
        let mut sent = 0;
        for record in &report.details {
            let details = [
                format!("Summary: {}", record.summary),
                format!("Next Steps: {}", record.next_steps),
            ];
            if notify_quietly(notifier.as_ref(), &record.order_id, "Unresolved", &details).await {
                sent += 1;
            }
        }
        sent
    }

    fn writer(&self) -> Result<OutputWriter> {
        let writer = OutputWriter::new(&self.config.output_dir);
        writer.prepare()?;
        Ok(writer)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub considered: usize,
    pub matched: usize,
    pub not_found_sys_b: usize,
    pub not_matched: usize,
    pub uncategorized: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub triaged: usize,
    /// Order ids whose triage failed.
    pub failed: Vec<String>,
    pub notified: usize,
    pub files: Vec<PathBuf>,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows considered: {}", self.considered)?;

        writeln!(f, "\n=== Categories ===")?;
        writeln!(f, "Matched: {}", self.matched)?;
        writeln!(f, "Not Found-SysB: {}", self.not_found_sys_b)?;
        writeln!(f, "Not Matched: {}", self.not_matched)?;
        writeln!(f, "Uncategorized (dropped): {}", self.uncategorized)?;

        writeln!(f, "\n=== Resolution ===")?;
        writeln!(f, "Resolved: {}", self.resolved)?;
        writeln!(f, "Unresolved: {}", self.unresolved)?;
        writeln!(f, "Triaged: {}", self.triaged)?;
        if !self.failed.is_empty() {
            writeln!(f, "Triage failed for: {}", self.failed.join(", "))?;
        }
        if self.notified > 0 {
            writeln!(f, "Notifications sent: {}", self.notified)?;
        }

        writeln!(f, "\n=== Files ===")?;
        for file in &self.files {
            writeln!(f, "{}", file.display())?;
        }
        Ok(())
    }
}
