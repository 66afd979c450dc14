//! rustsdgs - SDG Publication Mapping Pipeline
//!
//! Extracts bibliographic fields from journal PDFs, classifies abstracts against the
//! 17 Sustainable Development Goals and merges the results into a deduplicated corpus.
//!
//! ## Usage
//!
//! ```bash
//! rustsdgs extract paper.pdf
//! rustsdgs upload paper.pdf --corpus hasil_akhir.json
//! rustsdgs ingest preProcessSinta.json --source sinta
//! rustsdgs counts
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustsdgs::config::{PipelineConfig, DEFAULT_CORPUS_PATH, DEFAULT_MODEL_ID};
use rustsdgs::corpus::{sdg_counts, CorpusStore};
use rustsdgs::extract::TextExtractor;
use rustsdgs::pipeline::IngestionPipeline;
use rustsdgs::record::Source;
use rustsdgs::{pdf, tabular};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// SDG Publication Mapping Pipeline
#[derive(Parser)]
#[command(name = "rustsdgs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Canonical corpus JSON file
    #[arg(long, global = true, env = "SDG_CORPUS", default_value = DEFAULT_CORPUS_PATH)]
    corpus: PathBuf,

    /// Hugging Face model id or local model directory
    #[arg(long, global = true, env = "SDG_MODEL", default_value = DEFAULT_MODEL_ID)]
    model: String,

    /// Keep labels scoring strictly above this value
    #[arg(long, global = true, env = "SDG_THRESHOLD", default_value_t = 0.5)]
    threshold: f32,

    /// Token budget for the classifier input
    #[arg(long, global = true, default_value_t = 512)]
    max_tokens: usize,

    /// Concurrent inference calls per batch
    #[arg(long, global = true, env = "SDG_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-record inference timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,

    /// Use the first CUDA device when available
    #[arg(long, global = true)]
    gpu: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract title, abstract, year and authors from a PDF without classifying it
    Extract {
        /// PDF file
        pdf: PathBuf,
    },

    /// Extract, classify and merge an uploaded PDF
    Upload {
        /// PDF file
        pdf: PathBuf,
    },

    /// Classify and merge a scraped batch (CSV or JSON rows with Judul/Abstrak)
    Ingest {
        /// Batch file
        file: PathBuf,

        /// Provenance of the batch
        #[arg(long, value_parser = ["sinta", "oplib"])]
        source: String,
    },

    /// Count publications per SDG in the corpus
    Counts,

    /// Create an empty corpus file if none exists
    Init,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            corpus_path: self.corpus.clone(),
            model_id: self.model.clone(),
            threshold: self.threshold,
            max_tokens: self.max_tokens,
            concurrency: self.concurrency,
            inference_timeout: Duration::from_secs(self.timeout_secs),
            use_gpu: self.gpu,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = cli.pipeline_config();
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Extract { pdf } => run_extract(pdf),
        Commands::Upload { pdf } => run_upload(&config, pdf).await,
        Commands::Ingest { file, source } => run_ingest(&config, file, &source).await,
        Commands::Counts => run_counts(&config),
        Commands::Init => run_init(&config),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_extract(pdf_path: PathBuf) -> Result<()> {
    let pages = pdf::read_pages(&pdf_path).context("Failed to read PDF")?;
    let extractor = TextExtractor::new()?;
    let document = extractor.extract(&pages);
    print_json(&document)
}

async fn run_upload(config: &PipelineConfig, pdf_path: PathBuf) -> Result<()> {
    let pages = pdf::read_pages(&pdf_path).context("Failed to read PDF")?;
    let pipeline = IngestionPipeline::from_config(config)
        .await
        .context("Failed to initialise pipeline")?;

    let (document, report) = pipeline
        .ingest_document(&pages)
        .await
        .with_context(|| format!("Failed to ingest {}", pdf_path.display()))?;

    info!(
        added = report.merge.added,
        total = report.merge.total,
        "Upload merged into corpus"
    );
    print_json(&document)
}

async fn run_ingest(config: &PipelineConfig, file: PathBuf, source: &str) -> Result<()> {
    let source: Source = source.parse()?;
    let rows = tabular::read_rows(&file)
        .with_context(|| format!("Failed to read batch {}", file.display()))?;
    info!(rows = rows.len(), file = ?file, "Batch read");

    let pipeline = IngestionPipeline::from_config(config)
        .await
        .context("Failed to initialise pipeline")?;
    let report = pipeline.ingest_rows(rows, source).await?;

    print_json(&report)
}

fn run_counts(config: &PipelineConfig) -> Result<()> {
    let store = CorpusStore::new(config.corpus_path.clone());
    let records = store.load()?;
    let counts: BTreeMap<String, usize> = sdg_counts(&records)
        .into_iter()
        .map(|(label, n)| (label.to_string(), n))
        .collect();

    info!(records = records.len(), "Corpus loaded");
    print_json(&counts)
}

fn run_init(config: &PipelineConfig) -> Result<()> {
    let store = CorpusStore::new(config.corpus_path.clone());
    if store.init()? {
        println!("Created empty corpus at {}", store.path().display());
    } else {
        println!("Corpus already exists at {}", store.path().display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
