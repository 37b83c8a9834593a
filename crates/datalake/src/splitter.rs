//! Header/body splitter and metadata extractor (C3, spec §4.3).

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub release_date: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SplitDocument {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

const START_MARKER: &str = "*** start of";
const END_MARKER: &str = "*** end of";

/// Returns the byte offset of the first line (searching from `from_line`)
/// whose lowercased content contains `marker`, plus the offset one line
/// past it.
fn find_marker_line(text: &str, marker: &str, search_from: usize) -> Option<(usize, usize)> {
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line_start < search_from {
            continue;
        }
        if line.to_lowercase().contains(marker) {
            return Some((line_start, offset));
        }
    }
    None
}

/// Splits `raw` into header and body bytes (spec §4.3).
///
/// `header` is everything before the `*** START OF` line; `body` runs from
/// that line up to (but not including) the first subsequent `*** END OF`
/// line, or to the end of the document if no END marker exists. If no
/// START marker is present, `header` is empty and `body` is the whole
/// document.
pub fn split(raw: &[u8]) -> SplitDocument {
    let text = String::from_utf8_lossy(raw);

    let Some((start_line_begin, _start_line_end)) = find_marker_line(&text, START_MARKER, 0)
    else {
        return SplitDocument { header: Vec::new(), body: raw.to_vec() };
    };

    let body_end = find_marker_line(&text, END_MARKER, start_line_begin + 1)
        .map(|(end_line_begin, _)| end_line_begin)
        .unwrap_or(text.len());

    SplitDocument {
        header: raw[..start_line_begin].to_vec(),
        body: raw[start_line_begin..body_end].to_vec(),
    }
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*Title:\s*(.+?)\s*$").unwrap());
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*Author:\s*(.+?)\s*$").unwrap());
static RELEASE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*Release Date:\s*(.+?)\s*$").unwrap());
static LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*Language:\s*(.+?)\s*$").unwrap());
static TRAILING_EBOOK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[eBook\s*#\d+\]\s*$").unwrap());

fn capture_field(re: &Regex, text: &str) -> Option<String> {
    let value = re.captures(text)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Extracts `Title`/`Author`/`Release Date`/`Language` fields from the
/// header bytes. Missing or empty fields are `None`. `Release Date` has
/// a trailing `[eBook #NNN]` tag stripped.
pub fn extract_metadata(header: &[u8]) -> DocumentMetadata {
    let text = String::from_utf8_lossy(header);

    let release_date = capture_field(&RELEASE_DATE_RE, &text)
        .map(|v| TRAILING_EBOOK_TAG_RE.replace(&v, "").trim().to_string())
        .filter(|v| !v.is_empty());

    DocumentMetadata {
        title: capture_field(&TITLE_RE, &text),
        author: capture_field(&AUTHOR_RE, &text),
        release_date,
        language: capture_field(&LANGUAGE_RE, &text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Title: Moby Dick\nAuthor: Herman Melville\nRelease Date: January 1, 2005 [eBook #2701]\nLanguage: English\n\n*** START OF THE PROJECT GUTENBERG EBOOK MOBY DICK ***\nCall me Ishmael.\nSome years ago...\n*** END OF THE PROJECT GUTENBERG EBOOK MOBY DICK ***\nLicense stuff.\n";

    #[test]
    fn splits_header_and_body_on_markers() {
        let split_doc = split(SAMPLE.as_bytes());
        let header = String::from_utf8(split_doc.header).unwrap();
        let body = String::from_utf8(split_doc.body).unwrap();

        assert!(header.contains("Title: Moby Dick"));
        assert!(!header.contains("START OF"));
        assert!(body.starts_with("*** START OF"));
        assert!(body.contains("Call me Ishmael."));
        assert!(!body.contains("License stuff."));
        assert!(!body.contains("*** END OF"));
    }

    #[test]
    fn round_trip_concatenation_matches_raw() {
        let split_doc = split(SAMPLE.as_bytes());
        // header ++ body covers everything up to the END marker line,
        // and nothing after it is claimed by either half.
        let mut rejoined = split_doc.header.clone();
        rejoined.extend_from_slice(&split_doc.body);
        assert!(SAMPLE.as_bytes().starts_with(&rejoined));
    }

    #[test]
    fn missing_start_marker_makes_body_the_whole_document() {
        let raw = b"just plain text, no markers here\n";
        let split_doc = split(raw);
        assert!(split_doc.header.is_empty());
        assert_eq!(split_doc.body, raw);
    }

    #[test]
    fn missing_end_marker_runs_body_to_end_of_document() {
        let raw = b"Title: X\n\n*** START OF BOOK ***\nbody text forever\n";
        let split_doc = split(raw);
        assert!(String::from_utf8_lossy(&split_doc.body).contains("body text forever"));
    }

    #[test]
    fn extracts_metadata_and_strips_ebook_tag() {
        let split_doc = split(SAMPLE.as_bytes());
        let meta = extract_metadata(&split_doc.header);
        assert_eq!(meta.title.as_deref(), Some("Moby Dick"));
        assert_eq!(meta.author.as_deref(), Some("Herman Melville"));
        assert_eq!(meta.release_date.as_deref(), Some("January 1, 2005"));
        assert_eq!(meta.language.as_deref(), Some("English"));
    }

    #[test]
    fn missing_fields_are_none() {
        let meta = extract_metadata(b"Title: Only Title\n");
        assert_eq!(meta.title.as_deref(), Some("Only Title"));
        assert_eq!(meta.author, None);
        assert_eq!(meta.release_date, None);
        assert_eq!(meta.language, None);
    }
}
