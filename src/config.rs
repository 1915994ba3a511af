//! Run configuration
//!
//! Defaults are overridden by environment variables (a `.env` file is loaded by
//! the binary) and then by command line flags.

use crate::error::{ReconError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ROW_CAP: usize = 200;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HF_MODEL: &str = "facebook/bart-large-cnn";
pub const DEFAULT_HF_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Character encoding of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceEncoding {
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

impl SourceEncoding {
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            SourceEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| ReconError::Encoding(format!("Input is not valid UTF-8: {}", e))),
            SourceEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl FromStr for SourceEncoding {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(SourceEncoding::Utf8),
            "iso-8859-1" | "latin-1" | "latin1" | "iso8859-1" => Ok(SourceEncoding::Latin1),
            other => Err(ReconError::Config(format!("Unsupported encoding: {}", other))),
        }
    }
}

/// Which generative model backend serves the triage prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmBackend {
    HuggingFace,
    OpenAi,
    Offline,
}

impl LlmBackend {
    /// Environment variable holding this backend's credentials.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            LlmBackend::HuggingFace => Some("HF_API_TOKEN"),
            LlmBackend::OpenAi => Some("OPENAI_API_KEY"),
            LlmBackend::Offline => None,
        }
    }
}

impl FromStr for LlmBackend {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hf" => Ok(LlmBackend::HuggingFace),
            "openai" => Ok(LlmBackend::OpenAi),
            "offline" | "dummy" => Ok(LlmBackend::Offline),
            other => Err(ReconError::Config(format!("Unknown LLM backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl LlmConfig {
    /// Resolve the model settings from `RECON_LLM_*` and the credential variables.
    ///
    /// An explicit `backend` wins over `RECON_LLM_BACKEND`; otherwise the backend
    /// follows whichever credential is present. The offline backend is only ever
    /// chosen by name, so a run without credentials fails validation instead of
    /// writing placeholder triage.
    pub fn from_lookup<F>(backend: Option<LlmBackend>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend: LlmBackend = match (backend, var("RECON_LLM_BACKEND")) {
            (Some(backend), _) => backend,
            (None, Some(name)) => name.parse()?,
            (None, None) if var("OPENAI_API_KEY").is_some() && var("HF_API_TOKEN").is_none() => {
                LlmBackend::OpenAi
            }
            (None, None) => LlmBackend::HuggingFace,
        };
        let api_key = backend.api_key_var().and_then(|key| var(key));

        let mut llm = Self::for_backend(backend, api_key);
        if let Some(model) = var("RECON_LLM_MODEL") {
            llm.model = model;
        }
        if let Some(url) = var("RECON_LLM_BASE_URL") {
            llm.base_url = url;
        }
        Ok(llm)
    }

    /// Backend defaults for model name and endpoint.
    pub fn for_backend(backend: LlmBackend, api_key: Option<String>) -> Self {
        let (model, base_url) = match backend {
            LlmBackend::OpenAi => (DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_BASE_URL),
            LlmBackend::HuggingFace | LlmBackend::Offline => (DEFAULT_HF_MODEL, DEFAULT_HF_BASE_URL),
        };
        Self {
            backend,
            model: model.to_string(),
            base_url: base_url.to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// Mail relay endpoint; without it notifications only go to the log.
    pub webhook_url: Option<String>,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub raw_file: String,
    pub reply_file: String,
    pub raw_encoding: SourceEncoding,
    pub reply_encoding: SourceEncoding,
    /// Maximum rows considered per input file.
    pub row_cap: usize,
    /// Maximum unresolved cases triaged at once.
    pub concurrency: usize,
    /// Per model call; `None` waits indefinitely.
    pub model_timeout: Option<Duration>,
    pub llm: LlmConfig,
    pub notify: NotifyConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            raw_file: "recon_data_raw.csv".to_string(),
            reply_file: "recon_data_reply.csv".to_string(),
            raw_encoding: SourceEncoding::Utf8,
            reply_encoding: SourceEncoding::Latin1,
            row_cap: DEFAULT_ROW_CAP,
            concurrency: DEFAULT_CONCURRENCY,
            model_timeout: Some(Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS)),
            llm: LlmConfig::for_backend(LlmBackend::HuggingFace, None),
            notify: NotifyConfig::default(),
        }
    }
}

impl ReconConfig {
    /// Build a config from `RECON_*` variables on top of defaults.
    ///
    /// Values are parsed but not validated: command line overrides still have to
    /// be applied before [`ReconConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = var("RECON_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("RECON_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(name) = var("RECON_RAW_FILE") {
            config.raw_file = name;
        }
        if let Some(name) = var("RECON_REPLY_FILE") {
            config.reply_file = name;
        }
        if let Some(enc) = var("RECON_RAW_ENCODING") {
            config.raw_encoding = enc.parse()?;
        }
        if let Some(enc) = var("RECON_REPLY_ENCODING") {
            config.reply_encoding = enc.parse()?;
        }
        if let Some(cap) = var("RECON_ROW_CAP") {
            config.row_cap = parse_number("RECON_ROW_CAP", &cap)?;
        }
        if let Some(n) = var("RECON_CONCURRENCY") {
            config.concurrency = parse_number("RECON_CONCURRENCY", &n)?;
        }
        if let Some(secs) = var("RECON_MODEL_TIMEOUT_SECS") {
            let secs: u64 = parse_number("RECON_MODEL_TIMEOUT_SECS", &secs)?;
            config.model_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        config.llm = LlmConfig::from_lookup(None, &var)?;

        config.notify.enabled = var("RECON_NOTIFY")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        config.notify.webhook_url = var("RECON_NOTIFY_WEBHOOK");
        config.notify.from = var("RECON_EMAIL_FROM").unwrap_or_default();
        config.notify.to = var("RECON_EMAIL_TO").unwrap_or_default();

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.row_cap == 0 {
            return Err(ReconError::Config("row cap must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ReconError::Config("concurrency must be at least 1".to_string()));
        }
        if let (Some(key_var), None) = (self.llm.backend.api_key_var(), &self.llm.api_key) {
            return Err(ReconError::Config(format!(
                "{:?} backend needs an API key: set {} or pass --api-key, \
                 or choose the offline backend explicitly",
                self.llm.backend, key_var
            )));
        }
        Ok(())
    }

    pub fn raw_path(&self) -> PathBuf {
        self.data_dir.join(&self.raw_file)
    }

    pub fn reply_path(&self) -> PathBuf {
        self.data_dir.join(&self.reply_file)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ReconError::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ReconConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.row_cap, 200);
        assert_eq!(config.reply_encoding, SourceEncoding::Latin1);
        assert_eq!(config.raw_encoding, SourceEncoding::Utf8);
        assert_eq!(config.llm.backend, LlmBackend::HuggingFace);
        assert_eq!(config.reply_path(), PathBuf::from("data/recon_data_reply.csv"));
    }

    #[test]
    fn test_missing_credentials_never_fall_back_to_offline() {
        let config = ReconConfig::from_lookup(lookup(&[])).unwrap();
        assert_ne!(config.llm.backend, LlmBackend::Offline);
        assert!(config.llm.api_key.is_none());
        match config.validate() {
            Err(ReconError::Config(msg)) => assert!(msg.contains("HF_API_TOKEN"), "{msg}"),
            other => panic!("expected config error, got {:?}", other),
        }

        // A mistyped credential variable is the same as no credential.
        let config = ReconConfig::from_lookup(lookup(&[("HF_API_TOKN", "hf_secret")])).unwrap();
        assert!(config.validate().is_err());

        let config = ReconConfig::from_lookup(lookup(&[("RECON_LLM_BACKEND", "offline")])).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Offline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_backend_keeps_env_model_settings() {
        let vars = lookup(&[
            ("HF_API_TOKEN", "hf_secret"),
            ("OPENAI_API_KEY", "sk-env"),
            ("RECON_LLM_MODEL", "gpt-4o"),
            ("RECON_LLM_BASE_URL", "http://proxy.local/v1"),
        ]);
        assert_eq!(LlmConfig::from_lookup(None, &vars).unwrap().backend, LlmBackend::HuggingFace);

        let llm = LlmConfig::from_lookup(Some(LlmBackend::OpenAi), &vars).unwrap();
        assert_eq!(llm.backend, LlmBackend::OpenAi);
        assert_eq!(llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(llm.model, "gpt-4o");
        assert_eq!(llm.base_url, "http://proxy.local/v1");
    }

    #[test]
    fn test_env_overrides() {
        let config = ReconConfig::from_lookup(lookup(&[
            ("RECON_ROW_CAP", "50"),
            ("RECON_CONCURRENCY", "2"),
            ("RECON_MODEL_TIMEOUT_SECS", "0"),
            ("RECON_REPLY_ENCODING", "utf-8"),
            ("HF_API_TOKEN", "hf_secret"),
        ]))
        .unwrap();
        assert_eq!(config.row_cap, 50);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.model_timeout, None);
        assert_eq!(config.reply_encoding, SourceEncoding::Utf8);
        assert_eq!(config.llm.backend, LlmBackend::HuggingFace);
        assert_eq!(config.llm.model, DEFAULT_HF_MODEL);
        assert_eq!(config.llm.api_key.as_deref(), Some("hf_secret"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            ReconConfig::from_lookup(lookup(&[("RECON_ROW_CAP", "many")])),
            Err(ReconError::Config(_))
        ));
        assert!(matches!(
            ReconConfig::from_lookup(lookup(&[("RECON_ROW_CAP", "0"), ("HF_API_TOKEN", "hf")]))
                .and_then(|c| c.validate()),
            Err(ReconError::Config(_))
        ));
        assert!(matches!(
            ReconConfig::from_lookup(lookup(&[("RECON_LLM_BACKEND", "gemini")])),
            Err(ReconError::Config(_))
        ));

        // Loading succeeds; only validation wants the key.
        let config = ReconConfig::from_lookup(lookup(&[("RECON_LLM_BACKEND", "openai")])).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::OpenAi);
        assert!(matches!(config.validate(), Err(ReconError::Config(_))));
    }

    #[test]
    fn test_latin1_decoding() {
        let bytes = b"caf\xe9";
        assert_eq!(SourceEncoding::Latin1.decode(bytes).unwrap(), "café");
        assert!(SourceEncoding::Utf8.decode(bytes).is_err());
    }
}
