//! # rustsdgs
//!
//! SDG Publication Mapping Pipeline
//!
//! ## Modules
//!
//! - [`extract`] - Title, abstract, year and author extraction from journal page text
//! - [`classifier`] - Multi-label SDG classification with a score threshold
//! - [`model`] - BERT sequence classifier loaded through Candle
//! - [`corpus`] - Canonical corpus file and title-keyed merging
//! - [`pipeline`] - Extraction, classification and merge orchestration
//! - [`tabular`] - CSV and JSON scraper batches
//! - [`pdf`] - Page text from PDF uploads
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustsdgs::config::PipelineConfig;
//! use rustsdgs::pipeline::IngestionPipeline;
//! use rustsdgs::{pdf, record::Source, tabular};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = IngestionPipeline::from_config(&PipelineConfig::default()).await?;
//!
//!     let pages = pdf::read_pages("paper.pdf".as_ref())?;
//!     let (document, _) = pipeline.ingest_document(&pages).await?;
//!     println!("Ingested {}", document.title);
//!
//!     let rows = tabular::read_rows("preProcessSinta.json".as_ref())?;
//!     let report = pipeline.ingest_rows(rows, Source::Sinta).await?;
//!     println!("Added {} records", report.merge.added);
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod corpus;
pub mod error;
pub mod extract;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod record;
pub mod tabular;

pub use error::{Result, SdgError};
