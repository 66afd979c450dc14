//! Rule-based bibliographic extraction from journal PDF text.
//!
//! The International Journal of Data and Network Science template puts every field at a
//! fixed position relative to a literal anchor (the homepage line, the spaced-out
//! `A B S T R A C T` heading, the `Accepted:` history line). Each field is located by
//! one anchored capture and then passed through a list of named cleanup steps. Fields
//! are independent: a missing anchor degrades only its own field to [`Extracted::NotFound`].

use crate::error::{Result, SdgError};
use crate::record::{DocumentRecord, Extracted};
use regex::Regex;
use tracing::{debug, trace, warn};

/// Homepage line printed under the journal's running header
const HOMEPAGE_ANCHOR: &str = "www.GrowingScience.com/ijds";

/// Marks the end of the copyright footer's preceding text
const COPYRIGHT_MARK: &str = "\n©";

/// Blank line as emitted by the PDF text layer (a line holding one space)
const BLOCK_BREAK: &str = "\n \n";

/// A post-processing step applied to a captured field
type CleanupStep = fn(&str) -> String;

/// Cleanup applied to the text captured after the `Accepted:` line
const ABSTRACT_STEPS: &[(&str, CleanupStep)] = &[
    ("truncate_at_copyright", truncate_at_copyright),
    ("trim", trim),
    ("drop_leading_block", drop_leading_block),
    ("trim", trim),
    ("collapse_newlines", collapse_newlines),
    ("trim", trim),
];

/// Cleanup applied to the text between the homepage line and the affiliation block
const AUTHOR_STEPS: &[(&str, CleanupStep)] = &[
    ("trim", trim),
    ("strip_homepage_recurrence", strip_homepage_recurrence),
    ("trim", trim),
    ("drop_leading_block", drop_leading_block),
    ("trim", trim),
    ("strip_asterisks", strip_asterisks),
    ("trim", trim),
    ("tighten_commas", tighten_commas),
    ("collapse_newlines", collapse_newlines),
    ("trim", trim),
    ("split_conjunction", split_conjunction),
    ("drop_char_before_commas", drop_char_before_commas),
    ("drop_last_char", drop_last_char),
];

/// Extracts a [`DocumentRecord`] from the page texts of one journal article.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    title: Regex,
    abstract_section: Regex,
    accepted_body: Regex,
    accepted_year: Regex,
    authors: Regex,
}

impl TextExtractor {
    /// Compile the anchor patterns for the journal template.
    pub fn new() -> Result<Self> {
        let homepage = regex::escape(HOMEPAGE_ANCHOR);
        Ok(Self {
            title: compile(&format!(r"(?s)homepage: {}\s+(.+?)\s+\n", homepage))?,
            abstract_section: compile(r"(?s)A B S T R A C T(.+)")?,
            accepted_body: compile(r"(?s)Accepted:.*?\n(.*)")?,
            accepted_year: compile(r"Accepted: .*?([0-9]{4})")?,
            authors: compile(&format!(r"(?s){}\s+\n(.+?)\na", homepage))?,
        })
    }

    /// Extract all fields. `pages[0]` is the first page; the body is all pages concatenated.
    pub fn extract<S: AsRef<str>>(&self, pages: &[S]) -> DocumentRecord {
        let Some(first_page) = pages.first().map(AsRef::as_ref) else {
            warn!("No pages to extract from");
            return DocumentRecord::empty();
        };
        let full_text: String = pages.iter().map(AsRef::as_ref).collect();

        let record = DocumentRecord {
            title: self.extract_title(first_page),
            abstract_text: self.extract_abstract(&full_text),
            year: self.extract_year(&full_text),
            authors: self.extract_authors(first_page),
        };

        debug!(
            pages = pages.len(),
            title = record.title.is_known(),
            abstract_text = record.abstract_text.is_known(),
            year = record.year.is_known(),
            authors = record.authors.is_known(),
            "Extracted document fields"
        );
        record
    }

    /// Text after the homepage line up to the first blank line.
    pub fn extract_title(&self, first_page: &str) -> Extracted<String> {
        capture(&self.title, first_page)
            .map(|raw| collapse_newlines(raw.trim()).trim().to_string())
            .into()
    }

    /// Body text following the article history, without keywords and copyright footer.
    ///
    /// Both the abstract heading and the `Accepted:` line must be present.
    pub fn extract_abstract(&self, full_text: &str) -> Extracted<String> {
        let Some(section) = capture(&self.abstract_section, full_text) else {
            return Extracted::NotFound;
        };
        let Some(body) = capture(&self.accepted_body, section.trim()) else {
            return Extracted::NotFound;
        };
        Extracted::Known(apply_steps(ABSTRACT_STEPS, body.trim()))
    }

    /// First four-digit number on the `Accepted:` line.
    pub fn extract_year(&self, full_text: &str) -> Extracted<i32> {
        capture(&self.accepted_year, full_text)
            .and_then(|digits| digits.parse().ok())
            .into()
    }

    /// Author line between the homepage line and the first affiliation (`\na...`).
    pub fn extract_authors(&self, first_page: &str) -> Extracted<String> {
        capture(&self.authors, first_page)
            .map(|raw| apply_steps(AUTHOR_STEPS, raw))
            .into()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| SdgError::Config(format!("Invalid anchor pattern: {}", e)))
}

/// First capture group of the leftmost match
fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn apply_steps(steps: &[(&str, CleanupStep)], input: &str) -> String {
    steps.iter().fold(input.to_string(), |acc, (name, step)| {
        let out = step(&acc);
        trace!(step = name, before = acc.len(), after = out.len(), "Cleanup step");
        out
    })
}

fn trim(s: &str) -> String {
    s.trim().to_string()
}

/// Replace every run of newlines with a single space.
pub fn collapse_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c == '\n' {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Cut everything from the first line starting with `©`.
pub fn truncate_at_copyright(s: &str) -> String {
    match s.find(COPYRIGHT_MARK) {
        Some(pos) => s[..pos].to_string(),
        None => s.to_string(),
    }
}

/// Drop everything up to and including the first blank line.
pub fn drop_leading_block(s: &str) -> String {
    match s.find(BLOCK_BREAK) {
        Some(pos) => s[pos + BLOCK_BREAK.len()..].to_string(),
        None => s.to_string(),
    }
}

/// Remove the homepage anchor wherever it recurs followed by whitespace.
pub fn strip_homepage_recurrence(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find(HOMEPAGE_ANCHOR) {
        let end = pos + HOMEPAGE_ANCHOR.len();
        let after = &rest[end..];
        match after.chars().next() {
            Some(c) if c.is_whitespace() => {
                out.push_str(&rest[..pos]);
                rest = &after[c.len_utf8()..];
            }
            _ => {
                out.push_str(&rest[..end]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Remove corresponding-author asterisks.
pub fn strip_asterisks(s: &str) -> String {
    s.replace('*', "")
}

/// Remove one whitespace character sitting directly before a comma.
pub fn tighten_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() && chars.peek() == Some(&',') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Turn the final `and` of an author list into a comma.
pub fn split_conjunction(s: &str) -> String {
    s.replace(" and ", ", ")
}

/// Remove the character before every comma.
///
/// Each author name is followed by a one-letter affiliation superscript that the text
/// layer flattens onto the baseline (`Jane Doea,`); this strips it.
pub fn drop_char_before_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\n' && chars.peek() == Some(&',') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Remove the final character (the last author's affiliation superscript).
pub fn drop_last_char(s: &str) -> String {
    let mut out = s.to_string();
    out.pop();
    out
}
