//! Tabular input batches and the shared row schema.
//!
//! Scraper collaborators hand over rows carrying at least `Judul` (title) and `Abstrak`
//! (abstract) columns, either as a CSV file or as a JSON array of objects. Extracted PDF
//! records are mapped onto the same schema so both paths merge into one corpus.

use crate::error::{Result, SdgError};
use crate::record::{CorpusRecord, DocumentRecord};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Title column, the corpus uniqueness key
pub const TITLE_COLUMN: &str = "Judul";
/// Abstract column fed to the classifier
pub const ABSTRACT_COLUMN: &str = "Abstrak";
/// Author column of extracted documents
pub const AUTHORS_COLUMN: &str = "Penulis";
/// Year column of extracted documents
pub const YEAR_COLUMN: &str = "Tahun";

/// Columns recomputed on every ingestion and therefore never taken from input rows
const DERIVED_COLUMNS: &[&str] = &["Sdgs", "Source", "Classified"];

/// Read a batch from `path`, choosing the decoder by extension (`.json` or `.csv`).
pub fn read_rows(path: &Path) -> Result<Vec<CorpusRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let rows = match ext.as_deref() {
        Some("json") => read_json_rows(path)?,
        Some("csv") => read_csv_rows(path, b',')?,
        _ => {
            return Err(SdgError::Validation(format!(
                "Unsupported batch file {:?}, expected .csv or .json",
                path
            )))
        }
    };
    Ok(rows_to_records(rows))
}

/// JSON array of row objects
pub fn read_json_rows(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// CSV with a header row; every cell is read as a string.
pub fn read_csv_rows(path: &Path, delimiter: u8) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<HashMap<String, String>>() {
        let row = row?;
        rows.push(row.into_iter().map(|(k, v)| (k, Value::String(v))).collect());
    }
    debug!(rows = rows.len(), path = ?path, "CSV batch read");
    Ok(rows)
}

/// Convert raw rows, skipping rows without a usable title.
pub fn rows_to_records(rows: Vec<Map<String, Value>>) -> Vec<CorpusRecord> {
    let total = rows.len();
    let records: Vec<CorpusRecord> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(idx, row)| match row_to_record(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(idx = idx, error = %e, "Skipping batch row");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(kept = records.len(), total = total, "Some batch rows were skipped");
    }
    records
}

/// Map one row onto a [`CorpusRecord`], keeping unknown columns.
pub fn row_to_record(mut row: Map<String, Value>) -> Result<CorpusRecord> {
    let title = match row.remove(TITLE_COLUMN) {
        Some(Value::String(title)) if !title.trim().is_empty() => title,
        Some(other) if !other.is_null() && !other.is_string() => other.to_string(),
        _ => {
            return Err(SdgError::Validation(format!(
                "row has no {} value",
                TITLE_COLUMN
            )))
        }
    };

    let abstract_text = match row.remove(ABSTRACT_COLUMN) {
        Some(Value::String(text)) => Some(text),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };

    for column in DERIVED_COLUMNS {
        row.remove(*column);
    }
    // Index column written by dataframe exports
    row.retain(|key, _| !key.is_empty() && !key.starts_with("Unnamed"));

    let mut record = CorpusRecord::new(title, abstract_text);
    record.extra = row;
    Ok(record)
}

/// Map an extracted document onto the row schema. Sentinels are written verbatim.
pub fn document_to_record(doc: &DocumentRecord) -> Result<CorpusRecord> {
    let mut record = CorpusRecord::new(doc.title.to_string(), Some(doc.abstract_text.to_string()));
    record
        .extra
        .insert(AUTHORS_COLUMN.to_string(), serde_json::to_value(&doc.authors)?);
    record
        .extra
        .insert(YEAR_COLUMN.to_string(), serde_json::to_value(&doc.year)?);
    Ok(record)
}
