//! Prompt templates over the shared generative model.

use crate::error::{ReconError, Result};
use crate::llm::GenerativeModel;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const PATTERN_PROMPT: &str =
    "Identify the key pattern or reason for resolution in this financial discrepancy comment";
const SUMMARY_PROMPT: &str = "Summarize why this financial discrepancy is unresolved";
const NEXT_STEPS_PROMPT: &str = "Suggest next steps to resolve this financial discrepancy";

/// Summary and next-step generation for discrepancy comments.
///
/// Cheap to clone: every clone shares the same model instance.
#[derive(Clone)]
pub struct SummaryAssist {
    model: Arc<dyn GenerativeModel>,
    timeout: Option<Duration>,
}

impl SummaryAssist {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Not used by the pipeline; exposed through the `pattern` command.
    pub async fn identify_pattern(&self, comment: &str) -> Result<String> {
        self.complete(PATTERN_PROMPT, comment).await
    }

    pub async fn generate_summary(&self, comment: &str) -> Result<String> {
        self.complete(SUMMARY_PROMPT, comment).await
    }

    pub async fn suggest_next_steps(&self, comment: &str) -> Result<String> {
        self.complete(NEXT_STEPS_PROMPT, comment).await
    }

    async fn complete(&self, template: &str, comment: &str) -> Result<String> {
        let prompt = format!("{}: {}", template, comment);
        let generations = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.model.generate(&prompt))
                .await
                .map_err(|_| ReconError::Timeout(millis(limit)))??,
            None => self.model.generate(&prompt).await?,
        };

        let first = generations
            .into_iter()
            .next()
            .ok_or_else(|| ReconError::Llm("Model returned no candidates".to_string()))?;
        debug!("{} -> {} chars", template, first.generated_text.len());
        Ok(first.generated_text.trim().to_string())
    }
}

/// Saturates instead of truncating for durations beyond `u64` milliseconds.
fn millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}
