//! Ingestion pipeline: raw source → extraction (PDF only) → classification → corpus merge.

use crate::classifier::{Classification, Classifier};
use crate::config::PipelineConfig;
use crate::corpus::{CorpusStore, MergeSummary};
use crate::error::{Result, SdgError};
use crate::extract::TextExtractor;
use crate::model::BertSdgModel;
use crate::record::{CorpusRecord, DocumentRecord, Source};
use crate::tabular::document_to_record;
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// What one ingestion did
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: Source,
    /// Records offered for classification
    pub records: usize,
    /// Records the model scored
    pub classified: usize,
    /// Records with an empty or missing abstract
    pub skipped: usize,
    /// Records whose inference failed or timed out
    pub failed: usize,
    pub merge: MergeSummary,
    pub elapsed_ms: u64,
    pub finished_at: String,
}

/// Orchestrates extraction, classification and merging for one canonical corpus.
#[derive(Debug)]
pub struct IngestionPipeline {
    extractor: TextExtractor,
    classifier: Classifier,
    store: Arc<CorpusStore>,
}

impl IngestionPipeline {
    pub fn new(extractor: TextExtractor, classifier: Classifier, store: Arc<CorpusStore>) -> Self {
        Self {
            extractor,
            classifier,
            store,
        }
    }

    /// Build a pipeline around the process-wide model.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let model = BertSdgModel::shared(config).await?;
        let classifier = Classifier::new(model, config)?;
        Ok(Self::new(
            TextExtractor::new()?,
            classifier,
            Arc::new(CorpusStore::new(config.corpus_path.clone())),
        ))
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    /// Extraction only; nothing is classified or written.
    pub fn extract<S: AsRef<str>>(&self, pages: &[S]) -> DocumentRecord {
        self.extractor.extract(pages)
    }

    /// Upload path: extract one document's pages, classify and merge it as `Upload`.
    pub async fn ingest_document<S: AsRef<str>>(
        &self,
        pages: &[S],
    ) -> Result<(DocumentRecord, IngestReport)> {
        let document = self.extractor.extract(pages);
        if !document.title.is_known() {
            warn!("Document title not found, record will be keyed by the sentinel");
        }
        let record = document_to_record(&document)?;
        let report = self.classify_and_merge(vec![record], Source::Upload).await?;
        Ok((document, report))
    }

    /// Tabular path: classify scraper rows and merge them under `source`.
    pub async fn ingest_rows(&self, rows: Vec<CorpusRecord>, source: Source) -> Result<IngestReport> {
        self.classify_and_merge(rows, source).await
    }

    async fn classify_and_merge(
        &self,
        mut records: Vec<CorpusRecord>,
        source: Source,
    ) -> Result<IngestReport> {
        let start = Instant::now();
        info!(source = %source, records = records.len(), "Starting ingestion");

        let abstracts: Vec<String> = records
            .iter()
            .map(|r| r.abstract_text.clone().unwrap_or_default())
            .collect();
        let outcomes = self.classifier.classify_batch(abstracts).await;

        let (mut classified, mut skipped, mut failed) = (0, 0, 0);
        for (record, outcome) in records.iter_mut().zip(outcomes) {
            match outcome {
                Ok(classification) => {
                    match classification {
                        Classification::Scored(_) => classified += 1,
                        Classification::Skipped => skipped += 1,
                    }
                    record.classified = Some(classification.is_classified());
                    record.sdgs = classification.labels().cloned();
                }
                Err(_) => {
                    failed += 1;
                    record.classified = Some(false);
                    record.sdgs = None;
                }
            }
        }

        let records_len = records.len();
        let store = Arc::clone(&self.store);
        let merge = tokio::task::spawn_blocking(move || store.merge_batch(records, source))
            .await
            .map_err(|e| SdgError::Io(std::io::Error::other(e.to_string())))??;

        let report = IngestReport {
            source,
            records: records_len,
            classified,
            skipped,
            failed,
            merge,
            elapsed_ms: start.elapsed().as_millis() as u64,
            finished_at: Local::now().to_rfc3339(),
        };
        info!(
            source = %source,
            classified = report.classified,
            skipped = report.skipped,
            failed = report.failed,
            added = report.merge.added,
            total = report.merge.total,
            "Ingestion complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testing::StubScorer;
    use crate::record::{SdgLabel, NOT_FOUND};
    use std::time::Duration;
    use tempfile::TempDir;

    const FIRST_PAGE: &str = "homepage: www.GrowingScience.com/ijds\n \n \n\
        Climate policy in Southeast Asia\n \n \n\
        Jane Doea, John Smithb and Amy Leea*\n \n\
        aDepartment of Environmental Science, Example University\n\
        C H R O N I C L E  A B S T R A C T\n\
        Article history:\nAccepted: 12 March 2021\n\
        Keywords:\nClimate\n \n\
        Climate change mitigation requires coordinated policy.\n\
        © 2021 by the authors\n";

    fn pipeline(dir: &TempDir) -> IngestionPipeline {
        let store = Arc::new(CorpusStore::new(dir.path().join("hasil_akhir.json")));
        store.init().unwrap();
        let stub = StubScorer::with("Climate change", &[(13, 0.93), (7, 0.3)]);
        let classifier = Classifier::new(Arc::new(stub), &PipelineConfig::default()).unwrap();
        IngestionPipeline::new(TextExtractor::new().unwrap(), classifier, store)
    }

    #[tokio::test]
    async fn test_ingest_document_end_to_end() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);

        let (document, report) = pipeline
            .ingest_document(&[FIRST_PAGE, "2. Method\nbody\n"])
            .await
            .unwrap();
        assert_eq!(document.author_list(), vec!["Jane Doe", "John Smith", "Amy Lee"]);
        assert_eq!(report.classified, 1);
        assert_eq!(report.merge.added, 1);

        let corpus = pipeline.store().load().unwrap();
        assert_eq!(corpus.len(), 1);
        let record = &corpus[0];
        assert_eq!(record.title, "Climate policy in Southeast Asia");
        assert_eq!(
            record.abstract_text.as_deref(),
            Some("Climate change mitigation requires coordinated policy.")
        );
        assert_eq!(record.extra["Penulis"], "Jane Doe, John Smith, Amy Lee");
        assert_eq!(record.extra["Tahun"], 2021);
        assert_eq!(record.source, Some(Source::Upload));
        assert_eq!(record.classified, Some(true));
        let labels: Vec<u8> = record.sdgs.as_ref().unwrap().iter().map(|l| l.goal()).collect();
        assert_eq!(labels, vec![13]);
    }

    #[tokio::test]
    async fn test_ingest_rows_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let rows = vec![
            CorpusRecord::new("Ok", Some("Climate change adaptation".to_string())),
            CorpusRecord::new("Broken", Some("boom".to_string())),
            CorpusRecord::new("Empty", None),
            CorpusRecord::new("Unrelated", Some("Database indexing".to_string())),
        ];

        let report = pipeline.ingest_rows(rows, Source::Sinta).await.unwrap();
        assert_eq!((report.classified, report.skipped, report.failed), (2, 1, 1));

        let corpus = pipeline.store().load().unwrap();
        assert_eq!(corpus.len(), 4);
        assert!(corpus.iter().all(|r| r.source == Some(Source::Sinta)));
        assert_eq!(corpus[0].sdgs.as_ref().map(|s| s.contains(&SdgLabel::new(13).unwrap())), Some(true));
        assert_eq!((corpus[1].sdgs.as_ref(), corpus[1].classified), (None, Some(false)));
        assert_eq!((corpus[2].sdgs.as_ref(), corpus[2].classified), (None, Some(false)));
        assert_eq!((corpus[3].sdgs.as_ref(), corpus[3].classified), (None, Some(true)));
    }

    #[tokio::test]
    async fn test_timed_out_record_is_persisted_unclassified() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CorpusStore::new(dir.path().join("hasil_akhir.json")));
        store.init().unwrap();
        let config = PipelineConfig {
            inference_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let stub = StubScorer::with("Climate change", &[(13, 0.93)])
            .slow_on("stalls", Duration::from_millis(1200));
        let classifier = Classifier::new(Arc::new(stub), &config).unwrap();
        let pipeline = IngestionPipeline::new(TextExtractor::new().unwrap(), classifier, store);

        let rows = vec![
            CorpusRecord::new("Slow", Some("inference stalls here".to_string())),
            CorpusRecord::new("Fast", Some("Climate change".to_string())),
        ];
        let report = pipeline.ingest_rows(rows, Source::Oplib).await.unwrap();
        assert_eq!((report.classified, report.failed), (1, 1));
        assert_eq!(report.merge.added, 2);

        let corpus = pipeline.store().load().unwrap();
        assert_eq!(corpus[0].title, "Slow");
        assert_eq!((corpus[0].sdgs.as_ref(), corpus[0].classified), (None, Some(false)));
        assert_eq!(corpus[1].classified, Some(true));
        assert!(corpus[1].sdgs.is_some());
    }

    #[tokio::test]
    async fn test_reingesting_batch_is_noop() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let rows = || {
            vec![
                CorpusRecord::new("A", Some("Climate change".to_string())),
                CorpusRecord::new("B", Some("other".to_string())),
            ]
        };

        pipeline.ingest_rows(rows(), Source::Oplib).await.unwrap();
        let first = pipeline.store().load().unwrap();
        let report = pipeline.ingest_rows(rows(), Source::Oplib).await.unwrap();
        assert_eq!(report.merge.added, 0);
        assert_eq!(pipeline.store().load().unwrap(), first);
    }

    #[tokio::test]
    async fn test_missing_corpus_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CorpusStore::new(dir.path().join("missing.json")));
        let classifier =
            Classifier::new(Arc::new(StubScorer::default()), &PipelineConfig::default()).unwrap();
        let pipeline = IngestionPipeline::new(TextExtractor::new().unwrap(), classifier, store);

        let err = pipeline
            .ingest_rows(vec![CorpusRecord::new("A", None)], Source::Sinta)
            .await
            .unwrap_err();
        assert!(matches!(err, SdgError::CorpusNotFound(_)));
        assert!(!dir.path().join("missing.json").exists());
    }

    #[tokio::test]
    async fn test_unreadable_document_keeps_sentinels() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);

        let (document, report) = pipeline.ingest_document(&["scanned image"]).await.unwrap();
        assert_eq!(document, DocumentRecord::empty());
        assert_eq!(report.skipped, 1);

        let corpus = pipeline.store().load().unwrap();
        assert_eq!(corpus[0].title, NOT_FOUND);
        assert_eq!(corpus[0].extra["Tahun"], NOT_FOUND);
    }
}
