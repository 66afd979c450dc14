//! Custom error types for rustsdgs.
//!
//! This module defines all error types used throughout the pipeline.
//! All functions return `Result<T, SdgError>` instead of using `unwrap()`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rustsdgs operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum SdgError {
    /// The canonical corpus file does not exist
    #[error("Corpus not found: {0}")]
    CorpusNotFound(PathBuf),

    /// The canonical corpus file exists but could not be decoded
    #[error("Corpus malformed at {path}: {reason}")]
    CorpusMalformed {
        /// Corpus file path
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// The canonical corpus file is zero-length or whitespace only
    #[error("Corpus file is empty: {0}")]
    CorpusEmpty(PathBuf),

    /// Another writer panicked while holding the corpus lock
    #[error("Corpus lock poisoned")]
    LockPoisoned,

    /// PDF could not be opened or its text could not be read
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Model files could not be fetched from the hub
    #[error("Download error: {0}")]
    Download(String),

    /// Tokenizer failed to load, encode or decode
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Tensor operation failed inside the model
    #[error("Model error: {0}")]
    Model(#[from] candle_core::Error),

    /// Inference returned something unusable or did not finish
    #[error("Inference error: {0}")]
    Inference(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `SdgError`
pub type Result<T> = std::result::Result<T, SdgError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a config error message
    fn ok_or_config(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| SdgError::Config(msg.to_string()))
    }
}
