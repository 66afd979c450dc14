//! Publication record types shared by every pipeline stage.
//!
//! Extraction produces [`DocumentRecord`]s whose fields are [`Extracted`] values,
//! classification adds a [`LabelSet`], and the corpus stores [`CorpusRecord`]s keyed
//! by title using the Indonesian column names of the shared row schema.

use crate::error::SdgError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Sentinel written in place of any field the extractor could not locate.
pub const NOT_FOUND: &str = "Not found";

/// Number of Sustainable Development Goals.
pub const SDG_COUNT: u8 = 17;

/// Outcome of extracting a single field.
///
/// Serialized as the bare value when known and as the `"Not found"` sentinel otherwise,
/// so callers branch on presence while the output keeps the established row format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted<T> {
    Known(T),
    NotFound,
}

impl<T> Extracted<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Extracted::Known(_))
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            Extracted::Known(v) => Some(v),
            Extracted::NotFound => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Extracted::Known(v) => Some(v),
            Extracted::NotFound => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Extracted<U> {
        match self {
            Extracted::Known(v) => Extracted::Known(f(v)),
            Extracted::NotFound => Extracted::NotFound,
        }
    }
}

impl<T> From<Option<T>> for Extracted<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Extracted::NotFound, Extracted::Known)
    }
}

impl<T: fmt::Display> fmt::Display for Extracted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extracted::Known(v) => v.fmt(f),
            Extracted::NotFound => f.write_str(NOT_FOUND),
        }
    }
}

impl<T: Serialize> Serialize for Extracted<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Extracted::Known(v) => v.serialize(serializer),
            Extracted::NotFound => serializer.serialize_str(NOT_FOUND),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Extracted<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.as_str() == Some(NOT_FOUND) {
            return Ok(Extracted::NotFound);
        }
        T::deserialize(value)
            .map(Extracted::Known)
            .map_err(serde::de::Error::custom)
    }
}

/// Bibliographic fields pulled out of one document's page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(rename = "Title")]
    pub title: Extracted<String>,
    #[serde(rename = "Abstract")]
    pub abstract_text: Extracted<String>,
    #[serde(rename = "Year")]
    pub year: Extracted<i32>,
    /// Comma-joined author names
    #[serde(rename = "Authors")]
    pub authors: Extracted<String>,
}

impl DocumentRecord {
    /// Record with every field set to the sentinel.
    pub fn empty() -> Self {
        Self {
            title: Extracted::NotFound,
            abstract_text: Extracted::NotFound,
            year: Extracted::NotFound,
            authors: Extracted::NotFound,
        }
    }

    /// Individual author names, in document order.
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .as_known()
            .map(|a| {
                a.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One of the seventeen SDG labels, `SDG1` through `SDG17`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SdgLabel(u8);

impl SdgLabel {
    pub fn new(goal: u8) -> Option<Self> {
        (1..=SDG_COUNT).contains(&goal).then_some(Self(goal))
    }

    pub fn goal(self) -> u8 {
        self.0
    }

    /// All labels in goal order.
    pub fn all() -> impl Iterator<Item = SdgLabel> {
        (1..=SDG_COUNT).map(SdgLabel)
    }
}

impl fmt::Display for SdgLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SDG{}", self.0)
    }
}

impl FromStr for SdgLabel {
    type Err = SdgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("SDG")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(SdgLabel::new)
            .ok_or_else(|| SdgError::Validation(format!("Unknown SDG label: {:?}", s)))
    }
}

impl Serialize for SdgLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SdgLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Labels assigned to one publication, kept in goal order.
pub type LabelSet = BTreeSet<SdgLabel>;

/// Provenance of a record, stamped once at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Sinta,
    Upload,
    Oplib,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Sinta => "Sinta",
            Source::Upload => "Upload",
            Source::Oplib => "Oplib",
        };
        f.write_str(name)
    }
}

impl FromStr for Source {
    type Err = SdgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sinta" => Ok(Source::Sinta),
            "upload" => Ok(Source::Upload),
            "oplib" => Ok(Source::Oplib),
            _ => Err(SdgError::Validation(format!("Unknown source: {}", s))),
        }
    }
}

/// One element of the canonical corpus JSON array.
///
/// `Judul` is the uniqueness key. Columns other than the ones modelled here are kept
/// verbatim in `extra` so a rewrite never drops data a source row carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    #[serde(rename = "Judul")]
    pub title: String,

    #[serde(rename = "Abstrak", default)]
    pub abstract_text: Option<String>,

    /// `None` when no label cleared the threshold or the record was never scored;
    /// see `classified` to tell the two apart.
    #[serde(rename = "Sdgs", default)]
    pub sdgs: Option<LabelSet>,

    /// Whether inference actually ran. Absent on records written before the flag existed.
    #[serde(rename = "Classified", default, skip_serializing_if = "Option::is_none")]
    pub classified: Option<bool>,

    #[serde(rename = "Source", default)]
    pub source: Option<Source>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CorpusRecord {
    /// Unclassified record with no provenance yet.
    pub fn new(title: impl Into<String>, abstract_text: Option<String>) -> Self {
        Self {
            title: title.into(),
            abstract_text,
            sdgs: None,
            classified: None,
            source: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_serialization() {
        let record = DocumentRecord {
            title: Extracted::Known("Paper".to_string()),
            abstract_text: Extracted::NotFound,
            year: Extracted::NotFound,
            authors: Extracted::Known("A, B".to_string()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Title"], "Paper");
        assert_eq!(json["Abstract"], NOT_FOUND);
        assert_eq!(json["Year"], NOT_FOUND);

        let back: DocumentRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_year_known_is_integer() {
        let json = serde_json::to_value(Extracted::Known(2021)).unwrap();
        assert_eq!(json, serde_json::json!(2021));
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("SDG7".parse::<SdgLabel>().unwrap().goal(), 7);
        assert!("SDG0".parse::<SdgLabel>().is_err());
        assert!("SDG18".parse::<SdgLabel>().is_err());
        assert!("LABEL_3".parse::<SdgLabel>().is_err());
        assert_eq!(SdgLabel::all().count(), 17);
    }

    #[test]
    fn test_corpus_record_keeps_extra_columns() {
        let raw = r#"{"Judul":"T","Abstrak":"A","Sdgs":["SDG13","SDG3"],"Source":"Sinta","Penulis":"X"}"#;
        let record: CorpusRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.source, Some(Source::Sinta));
        assert_eq!(record.classified, None);
        let labels: Vec<String> = record.sdgs.as_ref().unwrap().iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["SDG3", "SDG13"]);
        assert_eq!(record.extra["Penulis"], "X");

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["Penulis"], "X");
        assert!(out.get("Classified").is_none());
    }

    #[test]
    fn test_author_list() {
        let mut record = DocumentRecord::empty();
        assert!(record.author_list().is_empty());
        record.authors = Extracted::Known("Jane Doe, John Smith, Amy Lee".to_string());
        assert_eq!(record.author_list(), vec!["Jane Doe", "John Smith", "Amy Lee"]);
    }
}
