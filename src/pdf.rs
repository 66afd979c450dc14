//! Page text from uploaded PDF files.
//!
//! lopdf ends every text object with a single newline and never emits blank or
//! space-only lines. The extractor's title and author anchors expect the whitespace
//! before a line break that layout-preserving text layers produce, so on plain lopdf
//! output those two fields come back `Not found` while abstract and year survive.

use crate::error::{Result, SdgError};
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

/// Text of every page of the PDF at `path`, in page order.
pub fn read_pages(path: &Path) -> Result<Vec<String>> {
    let doc = Document::load(path)
        .map_err(|e| SdgError::Pdf(format!("Failed to open {}: {}", path.display(), e)))?;
    page_texts(&doc)
}

/// Text of every page of an in-memory PDF.
pub fn read_pages_from_mem(bytes: &[u8]) -> Result<Vec<String>> {
    let doc = Document::load_mem(bytes).map_err(|e| SdgError::Pdf(format!("Failed to parse PDF: {}", e)))?;
    page_texts(&doc)
}

/// A page whose text cannot be decoded contributes an empty string.
fn page_texts(doc: &Document) -> Result<Vec<String>> {
    let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if numbers.is_empty() {
        return Err(SdgError::Pdf("PDF has no pages".to_string()));
    }

    let pages: Vec<String> = numbers
        .iter()
        .map(|n| {
            doc.extract_text(&[*n]).unwrap_or_else(|e| {
                warn!(page = n, error = %e, "Failed to extract page text");
                String::new()
            })
        })
        .collect();

    debug!(pages = pages.len(), "PDF text extracted");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    fn one_page_pdf(text: &str) -> Vec<u8> {
        page_with_lines(&[text])
    }

    /// One page with each line in its own text object
    fn page_with_lines(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), (760 - 14 * i as i64).into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_reads_page_text() {
        let pages = read_pages_from_mem(&one_page_pdf("Accepted: 12 March 2021")).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("Accepted: 12 March 2021"));
    }

    #[test]
    fn test_extractor_on_lopdf_layout() {
        use crate::extract::TextExtractor;
        use crate::record::Extracted;

        let bytes = page_with_lines(&[
            "homepage: www.GrowingScience.com/ijds",
            "Climate policy in Southeast Asia",
            "Jane Doea, John Smithb and Amy Leea*",
            "aDepartment of Environmental Science, Example University",
            "C H R O N I C L E  A B S T R A C T",
            "Accepted: 12 March 2021",
            "Climate change mitigation requires coordinated policy.",
        ]);
        let pages = read_pages_from_mem(&bytes).unwrap();
        assert!(!pages[0].contains("\n \n"));

        let record = TextExtractor::new().unwrap().extract(&pages);
        assert_eq!(record.year, Extracted::Known(2021));
        assert_eq!(
            record.abstract_text,
            Extracted::Known("Climate change mitigation requires coordinated policy.".to_string())
        );
        assert_eq!(record.title, Extracted::NotFound);
        assert_eq!(record.authors, Extracted::NotFound);
    }

    #[test]
    fn test_rejects_non_pdf() {
        assert!(matches!(
            read_pages_from_mem(b"not a pdf at all"),
            Err(SdgError::Pdf(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(read_pages(Path::new("/nonexistent/upload.pdf")).is_err());
    }
}
