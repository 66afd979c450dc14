//! BERT sequence-classification model for SDG scoring, run with Candle.
//!
//! Weights, config and tokenizer come from a Hugging Face repository (or a local
//! directory holding the same files). The model is loaded once per process and shared
//! read-only by every caller through [`BertSdgModel::shared`].

use crate::classifier::{LabelScore, SdgScorer};
use crate::config::PipelineConfig;
use crate::error::{OptionExt, Result, SdgError};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::api::sync::Api;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{PostProcessor, Tokenizer};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Process-wide model, initialised on first use
static SHARED_MODEL: OnceCell<Arc<BertSdgModel>> = OnceCell::const_new();

/// How logits become per-label confidences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Independent per-label probabilities (multi-label heads)
    Sigmoid,
    /// Probabilities summing to one across labels
    Softmax,
}

/// Paths of the three files a checkpoint needs
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Use files already present in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let files = Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.is_file() {
                return Err(SdgError::Download(format!("missing model file {:?}", path)));
            }
        }
        Ok(files)
    }

    /// Fetch (or reuse from the local hub cache) the files of `model_id`.
    pub fn download(model_id: &str) -> Result<Self> {
        let api = Api::new().map_err(|e| SdgError::Download(format!("API init: {}", e)))?;
        let repo = api.model(model_id.to_string());
        let get = |name: &str| {
            repo.get(name)
                .map_err(|e| SdgError::Download(format!("{}: {}", name, e)))
        };
        Ok(Self {
            config: get("config.json")?,
            tokenizer: get("tokenizer.json")?,
            weights: get("model.safetensors")?,
        })
    }

    /// A local directory wins over the hub.
    fn locate(model_id: &str) -> Result<Self> {
        let local = Path::new(model_id);
        if local.is_dir() {
            Self::from_dir(local)
        } else {
            Self::download(model_id)
        }
    }
}

/// BERT encoder + pooler + linear classification head.
pub struct BertSdgModel {
    model_id: String,
    bert: BertModel,
    pooler: Linear,
    head: Linear,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    activation: Activation,
    max_positions: usize,
    device: Device,
}

impl std::fmt::Debug for BertSdgModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertSdgModel")
            .field("model_id", &self.model_id)
            .field("labels", &self.labels.len())
            .field("activation", &self.activation)
            .field("max_positions", &self.max_positions)
            .field("device", &self.device)
            .finish()
    }
}

impl BertSdgModel {
    /// Return the process-wide model, loading it on the first call.
    ///
    /// Later calls reuse the first model even if `config` names another one.
    pub async fn shared(config: &PipelineConfig) -> Result<Arc<Self>> {
        let model = SHARED_MODEL
            .get_or_try_init(|| async { Self::load(config).await.map(Arc::new) })
            .await?;
        if model.model_id != config.model_id {
            warn!(
                loaded = %model.model_id,
                requested = %config.model_id,
                "Model already loaded for this process, ignoring requested model"
            );
        }
        Ok(Arc::clone(model))
    }

    /// Load a model without touching the process-wide slot.
    pub async fn load(config: &PipelineConfig) -> Result<Self> {
        let start = Instant::now();
        info!(model = %config.model_id, "Loading SDG classification model");

        let device = if config.use_gpu {
            Device::cuda_if_available(0)?
        } else {
            Device::Cpu
        };
        debug!(device = ?device, "Using device");

        let model_id = config.model_id.clone();
        let model = tokio::task::spawn_blocking(move || {
            let files = ModelFiles::locate(&model_id)?;
            Self::from_files(model_id, &files, device)
        })
        .await
        .map_err(|e| SdgError::Download(e.to_string()))??;

        info!(
            model = %model.model_id,
            labels = model.labels.len(),
            activation = ?model.activation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded"
        );
        Ok(model)
    }

    /// Build the model from files on disk.
    pub fn from_files(model_id: String, files: &ModelFiles, device: Device) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let bert_config: Config = serde_json::from_value(raw.clone())?;
        let labels = head_labels(&raw)?;
        let activation = activation_for(&raw, labels.len());
        let hidden_size = raw["hidden_size"].as_u64().unwrap_or(768) as usize;
        let max_positions = raw["max_position_embeddings"].as_u64().unwrap_or(512) as usize;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| SdgError::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(None);

        let weights = std::fs::read(&files.weights)?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, &device)?;

        let bert = BertModel::load(vb.pp("bert"), &bert_config)
            .or_else(|_| BertModel::load(vb.clone(), &bert_config))?;
        let pooler = candle_nn::linear(hidden_size, hidden_size, vb.pp("bert.pooler.dense"))
            .or_else(|_| candle_nn::linear(hidden_size, hidden_size, vb.pp("pooler.dense")))?;
        let head = candle_nn::linear(hidden_size, labels.len(), vb.pp("classifier"))?;

        Ok(Self {
            model_id,
            bert,
            pooler,
            head,
            tokenizer,
            labels,
            activation,
            max_positions,
            device,
        })
    }

    /// Number of special tokens the post-processor wraps a single sequence in
    fn special_token_count(&self) -> usize {
        self.tokenizer
            .get_post_processor()
            .map(|p| p.added_tokens(false))
            .unwrap_or(0)
    }

    fn logits_to_scores(&self, logits: &Tensor) -> Result<Vec<f32>> {
        let probs = match self.activation {
            Activation::Sigmoid => candle_nn::ops::sigmoid(logits)?,
            Activation::Softmax => candle_nn::ops::softmax(logits, D::Minus1)?,
        };
        Ok(probs.squeeze(0)?.to_vec1::<f32>()?)
    }
}

impl SdgScorer for BertSdgModel {
    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| SdgError::Tokenizer(e.to_string()))?;
        let budget = max_tokens.saturating_sub(self.special_token_count());
        let ids = encoding.get_ids();
        if ids.len() <= budget {
            return Ok(text.to_string());
        }
        self.tokenizer
            .decode(&ids[..budget], true)
            .map_err(|e| SdgError::Tokenizer(e.to_string()))
    }

    fn score(&self, text: &str) -> Result<Vec<LabelScore>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| SdgError::Tokenizer(e.to_string()))?;
        let ids = encoding.get_ids();
        let ids = &ids[..ids.len().min(self.max_positions)];
        if ids.is_empty() {
            return Err(SdgError::Inference("tokenizer produced no tokens".to_string()));
        }

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        let attention_mask = input_ids.ones_like()?;

        // [1, seq, hidden] -> [CLS] -> pooler -> head
        let hidden = self
            .bert
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.head.forward(&pooled)?;
        let scores = self.logits_to_scores(&logits)?;

        if scores.len() != self.labels.len() {
            return Err(SdgError::Inference(format!(
                "head produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }

        Ok(self
            .labels
            .iter()
            .zip(scores)
            .map(|(label, score)| LabelScore {
                label: label.clone(),
                score,
            })
            .collect())
    }
}

/// Labels of the classification head ordered by output index
fn head_labels(config: &serde_json::Value) -> Result<Vec<String>> {
    let map = config["id2label"]
        .as_object()
        .ok_or_config("config.json has no id2label")?;

    let mut labels: Vec<(usize, String)> = map
        .iter()
        .map(|(k, v)| {
            let id = k
                .parse::<usize>()
                .map_err(|_| SdgError::Config(format!("non-numeric label id {:?}", k)))?;
            let label = v
                .as_str()
                .ok_or_else(|| SdgError::Config(format!("label {} is not a string", k)))?;
            Ok((id, label.to_string()))
        })
        .collect::<Result<_>>()?;
    labels.sort_by_key(|(id, _)| *id);

    if labels.iter().enumerate().any(|(i, (id, _))| i != *id) {
        return Err(SdgError::Config("id2label ids are not contiguous".to_string()));
    }
    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

/// Multi-label heads (or a single output) use sigmoid; everything else softmax
fn activation_for(config: &serde_json::Value, num_labels: usize) -> Activation {
    if config["problem_type"].as_str() == Some("multi_label_classification") || num_labels == 1 {
        Activation::Sigmoid
    } else {
        Activation::Softmax
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_head_labels_sorted_by_id() {
        let config = json!({"id2label": {"1": "SDG2", "0": "SDG1", "2": "SDG3"}});
        assert_eq!(head_labels(&config).unwrap(), vec!["SDG1", "SDG2", "SDG3"]);
    }

    #[test]
    fn test_head_labels_rejects_gaps() {
        let config = json!({"id2label": {"0": "SDG1", "2": "SDG3"}});
        assert!(matches!(head_labels(&config), Err(SdgError::Config(_))));
    }

    #[test]
    fn test_head_labels_missing() {
        assert!(head_labels(&json!({})).is_err());
    }

    #[test]
    fn test_activation_selection() {
        let multi = json!({"problem_type": "multi_label_classification"});
        assert_eq!(activation_for(&multi, 17), Activation::Sigmoid);
        assert_eq!(activation_for(&json!({}), 17), Activation::Softmax);
        assert_eq!(activation_for(&json!({}), 1), Activation::Sigmoid);
    }

    #[test]
    fn test_local_dir_requires_all_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let err = ModelFiles::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, SdgError::Download(_)));
    }
}
