use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM call timed out after {0} ms")]
    Timeout(u64),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;
