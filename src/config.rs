//! Pipeline configuration.

use crate::error::{Result, SdgError};
use std::path::PathBuf;
use std::time::Duration;

/// Default Hugging Face model for SDG classification
pub const DEFAULT_MODEL_ID: &str = "Zaniiiii/sdgs";

/// Default canonical corpus file
pub const DEFAULT_CORPUS_PATH: &str = "hasil_akhir.json";

/// Runtime settings for extraction, classification and merging.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Canonical corpus JSON file
    pub corpus_path: PathBuf,
    /// Hugging Face repository of the classification model
    pub model_id: String,
    /// Labels must score strictly above this to be kept
    pub threshold: f32,
    /// Input token budget, special tokens included
    pub max_tokens: usize,
    /// Maximum concurrent inference calls within a batch
    pub concurrency: usize,
    /// Per-record inference timeout
    pub inference_timeout: Duration,
    /// Run the model on the first CUDA device when available
    pub use_gpu: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            model_id: DEFAULT_MODEL_ID.to_string(),
            threshold: 0.5,
            max_tokens: 512,
            concurrency: 4,
            inference_timeout: Duration::from_secs(60),
            use_gpu: false,
        }
    }
}

impl PipelineConfig {
    /// Check value ranges before any model is loaded.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(SdgError::Config(format!(
                "threshold must be in [0, 1), got {}",
                self.threshold
            )));
        }
        if self.max_tokens == 0 {
            return Err(SdgError::Config("max_tokens must be positive".to_string()));
        }
        if self.concurrency == 0 {
            return Err(SdgError::Config("concurrency must be positive".to_string()));
        }
        if self.inference_timeout.is_zero() {
            return Err(SdgError::Config("inference timeout must be positive".to_string()));
        }
        if self.model_id.trim().is_empty() {
            return Err(SdgError::Config("model id is empty".to_string()));
        }
        Ok(())
    }
}
