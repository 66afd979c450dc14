//! Multi-label SDG classification of publication abstracts.
//!
//! The [`Classifier`] truncates an abstract to the model's token budget, scores every
//! SDG label through an [`SdgScorer`] and keeps the labels scoring strictly above the
//! threshold. Batches run inference on the blocking pool with bounded concurrency;
//! a failed or timed-out record is reported on its own without aborting the batch.

use crate::config::PipelineConfig;
use crate::error::{Result, SdgError};
use crate::record::{LabelSet, SdgLabel, NOT_FOUND, SDG_COUNT};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Confidence for one label of the model's output head
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// A text classifier that scores every SDG label.
///
/// Implementations hold read-only weights and may be called from several threads at once.
pub trait SdgScorer: Send + Sync {
    /// Output labels in head order, as named by the model.
    fn labels(&self) -> Vec<String>;

    /// Cut `text` to at most `max_tokens` tokens using the model's own tokenizer,
    /// returning decoded text.
    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String>;

    /// Score every label for `text`, each in [0, 1].
    fn score(&self, text: &str) -> Result<Vec<LabelScore>>;
}

/// Result of classifying one abstract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Inference ran. `None` means no label cleared the threshold.
    Scored(Option<LabelSet>),
    /// The abstract was empty or the extraction sentinel, so inference was not run.
    Skipped,
}

impl Classification {
    pub fn labels(&self) -> Option<&LabelSet> {
        match self {
            Classification::Scored(labels) => labels.as_ref(),
            Classification::Skipped => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Classification::Scored(_))
    }
}

/// Thresholded SDG classifier over a shared scorer.
#[derive(Clone)]
pub struct Classifier {
    scorer: Arc<dyn SdgScorer>,
    threshold: f32,
    max_tokens: usize,
    concurrency: usize,
    timeout: Duration,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("threshold", &self.threshold)
            .field("max_tokens", &self.max_tokens)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Wrap a scorer, checking that its labels are exactly `SDG1`..`SDG17`.
    pub fn new(scorer: Arc<dyn SdgScorer>, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        check_label_vocabulary(&scorer.labels())?;

        Ok(Self {
            scorer,
            threshold: config.threshold,
            max_tokens: config.max_tokens,
            concurrency: config.concurrency,
            timeout: config.inference_timeout,
        })
    }

    /// Classify a single abstract.
    pub fn classify(&self, abstract_text: &str) -> Result<Classification> {
        if should_skip(abstract_text) {
            debug!("Skipping classification of empty abstract");
            return Ok(Classification::Skipped);
        }

        let truncated = self.scorer.truncate(abstract_text, self.max_tokens)?;
        let scores = self.scorer.score(&truncated)?;
        let labels = self.select_labels(&scores)?;

        debug!(
            chars = abstract_text.len(),
            truncated_chars = truncated.len(),
            labels = ?labels,
            "Abstract classified"
        );
        Ok(Classification::Scored(labels))
    }

    /// Keep labels scoring strictly above the threshold; `None` if none do.
    pub fn select_labels(&self, scores: &[LabelScore]) -> Result<Option<LabelSet>> {
        let mut kept = LabelSet::new();
        for s in scores {
            if !(0.0..=1.0).contains(&s.score) {
                return Err(SdgError::Inference(format!(
                    "score out of range for {}: {}",
                    s.label, s.score
                )));
            }
            if s.score > self.threshold {
                kept.insert(s.label.parse::<SdgLabel>().map_err(|_| {
                    SdgError::Inference(format!("model returned unknown label {:?}", s.label))
                })?);
            }
        }
        Ok((!kept.is_empty()).then_some(kept))
    }

    /// Classify many abstracts concurrently, preserving input order.
    ///
    /// Every call completes (or times out) before this returns.
    pub async fn classify_batch(&self, abstracts: Vec<String>) -> Vec<Result<Classification>> {
        if abstracts.is_empty() {
            return Vec::new();
        }

        let total = abstracts.len();
        info!(
            count = total,
            concurrency = self.concurrency,
            "Starting SDG classification"
        );

        let timeout = self.timeout;
        let results: Vec<Result<Classification>> = stream::iter(abstracts.into_iter().enumerate())
            .map(|(idx, text)| {
                let classifier = self.clone();
                async move {
                    let task = tokio::task::spawn_blocking(move || classifier.classify(&text));
                    let result = match tokio::time::timeout(timeout, task).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => Err(SdgError::Inference(format!("inference task failed: {}", e))),
                        Err(_) => Err(SdgError::Inference(format!(
                            "inference timed out after {:?}",
                            timeout
                        ))),
                    };
                    if let Err(e) = &result {
                        warn!(idx = idx, error = %e, "Failed to classify abstract");
                    }
                    result
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        let skipped = results
            .iter()
            .filter(|r| matches!(r, Ok(Classification::Skipped)))
            .count();
        info!(
            count = total,
            failed = failed,
            skipped = skipped,
            "SDG classification complete"
        );
        results
    }
}

/// Empty text and the extraction sentinel carry nothing to classify
fn should_skip(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == NOT_FOUND
}

fn check_label_vocabulary(labels: &[String]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for label in labels {
        let parsed = label.parse::<SdgLabel>().map_err(|_| {
            SdgError::Config(format!("model label {:?} is not an SDG label", label))
        })?;
        if !seen.insert(parsed) {
            return Err(SdgError::Config(format!("model label {} is duplicated", parsed)));
        }
    }
    if seen.len() != usize::from(SDG_COUNT) {
        return Err(SdgError::Config(format!(
            "model has {} SDG labels, expected {}",
            seen.len(),
            SDG_COUNT
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Deterministic scorer: scores come from a keyword table, everything else scores 0.1.
    #[derive(Default)]
    pub struct StubScorer {
        pub keywords: HashMap<String, Vec<(u8, f32)>>,
        pub calls: AtomicUsize,
        /// Texts containing the keyword block for the given delay before scoring
        pub slow: Option<(String, Duration)>,
    }

    impl StubScorer {
        pub fn with(keyword: &str, scores: &[(u8, f32)]) -> Self {
            let mut stub = Self::default();
            stub.keywords.insert(keyword.to_string(), scores.to_vec());
            stub
        }

        pub fn and(mut self, keyword: &str, scores: &[(u8, f32)]) -> Self {
            self.keywords.insert(keyword.to_string(), scores.to_vec());
            self
        }

        pub fn slow_on(mut self, keyword: &str, delay: Duration) -> Self {
            self.slow = Some((keyword.to_string(), delay));
            self
        }
    }

    impl SdgScorer for StubScorer {
        fn labels(&self) -> Vec<String> {
            SdgLabel::all().map(|l| l.to_string()).collect()
        }

        fn truncate(&self, text: &str, max_tokens: usize) -> Result<String> {
            Ok(text
                .split_whitespace()
                .take(max_tokens)
                .collect::<Vec<_>>()
                .join(" "))
        }

        fn score(&self, text: &str) -> Result<Vec<LabelScore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((keyword, delay)) = &self.slow {
                if text.contains(keyword.as_str()) {
                    std::thread::sleep(*delay);
                }
            }
            if text.contains("boom") {
                return Err(SdgError::Inference("stub failure".to_string()));
            }
            let mut scores: HashMap<u8, f32> = (1..=SDG_COUNT).map(|g| (g, 0.1)).collect();
            for (keyword, overrides) in &self.keywords {
                if text.contains(keyword.as_str()) {
                    scores.extend(overrides.iter().copied());
                }
            }
            Ok(scores
                .into_iter()
                .map(|(goal, score)| LabelScore {
                    label: format!("SDG{}", goal),
                    score,
                })
                .collect())
        }
    }
}
