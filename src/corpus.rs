//! Canonical corpus storage and title-keyed merging.
//!
//! The corpus is one JSON array of [`CorpusRecord`]s. Every merge reads the whole file,
//! appends the incoming batch, drops later duplicates of a title (first seen wins) and
//! replaces the file in full. The store serialises that read-merge-write sequence so
//! concurrent ingestions sharing a store cannot lose each other's records.

use crate::error::{Result, SdgError};
use crate::record::{CorpusRecord, SdgLabel, Source};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Counts reported for one merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Records in the corpus before the merge
    pub existing: usize,
    /// Records offered by the batch
    pub incoming: usize,
    /// Incoming records that were new
    pub added: usize,
    /// Records dropped as duplicate titles
    pub duplicates: usize,
    /// Records in the corpus after the merge
    pub total: usize,
}

/// Stamp `incoming` with `source`, append it to `existing` and keep the first record per title.
pub fn merge(
    existing: Vec<CorpusRecord>,
    incoming: Vec<CorpusRecord>,
    source: Source,
) -> Vec<CorpusRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len() + incoming.len());
    existing
        .into_iter()
        .chain(incoming.into_iter().map(|mut record| {
            record.source = Some(source);
            record
        }))
        .filter(|record| seen.insert(record.title.clone()))
        .collect()
}

/// Number of publications per SDG label. Every label is present, unlabelled records count nowhere.
pub fn sdg_counts(records: &[CorpusRecord]) -> BTreeMap<SdgLabel, usize> {
    let mut counts: BTreeMap<SdgLabel, usize> = SdgLabel::all().map(|l| (l, 0)).collect();
    for label in records.iter().filter_map(|r| r.sdgs.as_ref()).flatten() {
        *counts.entry(*label).or_insert(0) += 1;
    }
    counts
}

/// File-backed canonical corpus with a single-writer lock.
#[derive(Debug)]
pub struct CorpusStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CorpusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole corpus.
    ///
    /// A missing, empty or undecodable file is an error, never an empty corpus.
    pub fn load(&self) -> Result<Vec<CorpusRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SdgError::CorpusNotFound(self.path.clone()))
            }
            Err(e) => return Err(SdgError::Io(e)),
        };

        if content.trim().is_empty() {
            return Err(SdgError::CorpusEmpty(self.path.clone()));
        }

        let records: Vec<CorpusRecord> =
            serde_json::from_str(&content).map_err(|e| SdgError::CorpusMalformed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(records = records.len(), path = ?self.path, "Corpus loaded");
        Ok(records)
    }

    /// Create an empty corpus if none exists. Returns whether a file was created.
    pub fn init(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().map_err(|_| SdgError::LockPoisoned)?;
        if self.path.exists() {
            return Ok(false);
        }
        self.write(&[])?;
        info!(path = ?self.path, "Initialised empty corpus");
        Ok(true)
    }

    /// Merge a classified batch into the corpus and replace the file.
    pub fn merge_batch(&self, incoming: Vec<CorpusRecord>, source: Source) -> Result<MergeSummary> {
        let _guard = self.write_lock.lock().map_err(|_| SdgError::LockPoisoned)?;

        let existing = self.load()?;
        let existing_len = existing.len();
        let incoming_len = incoming.len();

        let merged = merge(existing, incoming, source);
        let total = merged.len();
        let summary = MergeSummary {
            existing: existing_len,
            incoming: incoming_len,
            added: total.saturating_sub(existing_len),
            duplicates: (existing_len + incoming_len).saturating_sub(total),
            total,
        };

        if summary.added < incoming_len {
            warn!(
                source = %source,
                duplicates = incoming_len - summary.added,
                "Dropped incoming records with titles already in corpus"
            );
        }

        self.write(&merged)?;
        info!(
            source = %source,
            added = summary.added,
            total = summary.total,
            "Corpus updated"
        );
        Ok(summary)
    }

    /// Replace the corpus file atomically (write a sibling temp file, then rename).
    fn write(&self, records: &[CorpusRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, records)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SdgError::Io(e.error))?;
        Ok(())
    }
}
