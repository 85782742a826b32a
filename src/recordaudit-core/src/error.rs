//! Error types for the audit pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unrecognized bill number: {0:?}")]
    UnrecognizedBillNumber(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("Speech synthesis error: {0}")]
    Tts(String),

    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),

    #[error("No bill records found in {0}")]
    NoRecords(PathBuf),

    #[error("Text generation returned an empty script")]
    EmptyScript,
}
