use crate::config::{LlmBackend, LlmConfig};
use crate::error::{ReconError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One candidate produced by a text-to-text model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    #[serde(alias = "summary_text")]
    pub generated_text: String,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            generated_text: text.into(),
        }
    }
}

/// A text-to-text model: one prompt in, one or more candidates out.
///
/// Implementations hold no per-call state, so one instance is shared across
/// all concurrent triage tasks.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<Generation>>;

    fn name(&self) -> &str;
}

/// Build the process-wide model for the configured backend.
pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn GenerativeModel>> {
    let model: Arc<dyn GenerativeModel> = match config.backend {
        LlmBackend::HuggingFace => Arc::new(HuggingFaceClient::new(
            required_key(config)?,
            config.model.clone(),
            config.base_url.clone(),
        )),
        LlmBackend::OpenAi => Arc::new(OpenAiClient::new(
            required_key(config)?,
            config.model.clone(),
            config.base_url.clone(),
        )),
        LlmBackend::Offline => {
            warn!("Offline backend selected: triage details are placeholders, not model output");
            Arc::new(OfflineModel)
        }
    };
    info!("Using {:?} model backend ({})", config.backend, model.name());
    Ok(model)
}

fn required_key(config: &LlmConfig) -> Result<String> {
    config
        .api_key
        .clone()
        .ok_or_else(|| ReconError::Config(format!("{:?} backend needs an API key", config.backend)))
}

/// Hugging Face inference API, e.g. `facebook/bart-large-cnn`.
#[derive(Clone)]
pub struct HuggingFaceClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    fn parse_response(body: serde_json::Value) -> Result<Vec<Generation>> {
        if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
            return Err(ReconError::Llm(format!("Inference API error: {}", error)));
        }
        let generations: Vec<Generation> = serde_json::from_value(body)
            .map_err(|e| ReconError::Llm(format!("Failed to parse inference response: {}", e)))?;
        Ok(generations)
    }
}

#[async_trait]
impl GenerativeModel for HuggingFaceClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<Generation>> {
        let url = format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model);
        debug!("POST {} ({} prompt chars)", url, prompt.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "inputs": prompt }))
            .send()
            .await
            .map_err(|e| ReconError::Llm(format!("Inference API call failed: {}", e)))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReconError::Llm(format!("Failed to read inference response ({}): {}", status, e)))?;

        Self::parse_response(body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible chat completions; each choice is one candidate.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    fn parse_response(body: &serde_json::Value) -> Result<Vec<Generation>> {
        let choices = body["choices"]
            .as_array()
            .ok_or_else(|| ReconError::Llm("No choices in LLM response".to_string()))?;

        Ok(choices
            .iter()
            .filter_map(|choice| choice["message"]["content"].as_str())
            .map(Generation::new)
            .collect())
    }
}

#[async_trait]
impl GenerativeModel for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<Generation>> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a financial reconciliation analyst. Answer briefly in plain text."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
            "max_tokens": 300
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReconError::Llm(format!("LLM API call failed: {}", e)))?;

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReconError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        Self::parse_response(&response_json)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Deterministic stand-in for dry runs. Only used when selected by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModel;

#[async_trait]
impl GenerativeModel for OfflineModel {
    async fn generate(&self, prompt: &str) -> Result<Vec<Generation>> {
        let subject = prompt
            .split_once(": ")
            .map(|(_, rest)| rest.trim())
            .filter(|rest| !rest.is_empty())
            .unwrap_or("no comment provided");
        Ok(vec![Generation::new(format!("Manual review needed: {}", subject))])
    }

    fn name(&self) -> &str {
        "offline"
    }
}
