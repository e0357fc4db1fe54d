//! Content type sniffing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format of a downloaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Docx,
    Html,
    Unknown,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::Html => "html",
            DocumentType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

const SNIFF_LEN: usize = 2048;

/// Classify a document. First match wins:
///
/// 1. magic bytes (`%PDF-`, a zip containing `word/`)
/// 2. HTML markers in the first 2KB
/// 3. URL suffix
/// 4. declared content type
pub fn detect(bytes: &[u8], url: Option<&str>, content_type: Option<&str>) -> DocumentType {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];

    if head.starts_with(b"%PDF-") {
        return DocumentType::Pdf;
    }
    if head.starts_with(b"PK\x03\x04") && head.windows(5).any(|w| w == b"word/") {
        return DocumentType::Docx;
    }

    let lowered = String::from_utf8_lossy(head).to_lowercase();
    if ["<html", "<head", "<body", "<!doctype"].iter().any(|marker| lowered.contains(marker)) {
        return DocumentType::Html;
    }

    if let Some(url) = url {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".pdf") {
            return DocumentType::Pdf;
        }
        if path.ends_with(".docx") || path.ends_with(".doc") {
            return DocumentType::Docx;
        }
        if path.ends_with(".html") || path.ends_with(".htm") {
            return DocumentType::Html;
        }
    }

    if let Some(content_type) = content_type {
        let ct = content_type.to_lowercase();
        if ct.contains("pdf") {
            return DocumentType::Pdf;
        }
        if ct.contains("officedocument") || ct.contains("docx") {
            return DocumentType::Docx;
        }
        if ct.contains("html") {
            return DocumentType::Html;
        }
    }

    DocumentType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_magic() {
        assert_eq!(detect(b"%PDF-1.7\n...", None, None), DocumentType::Pdf);
    }

    #[test]
    fn test_docx_magic() {
        let mut zip = b"PK\x03\x04".to_vec();
        zip.extend_from_slice(b"\x14\x00\x06\x00[Content_Types].xml word/document.xml");
        assert_eq!(detect(&zip, None, None), DocumentType::Docx);

        let plain_zip = b"PK\x03\x04 data/file.txt".to_vec();
        assert_eq!(detect(&plain_zip, None, None), DocumentType::Unknown);
    }

    #[test]
    fn test_html_markers() {
        assert_eq!(detect(b"<!DOCTYPE html><p>x</p>", None, None), DocumentType::Html);
        assert_eq!(detect(b"\n  <HTML lang=\"pl\">", None, None), DocumentType::Html);
        assert_eq!(detect(b"<body>tekst</body>", None, None), DocumentType::Html);
    }

    #[test]
    fn test_magic_beats_url() {
        assert_eq!(detect(b"%PDF-1.4", Some("https://x/a.html"), Some("text/html")), DocumentType::Pdf);
    }

    #[test]
    fn test_url_fallback() {
        assert_eq!(detect(b"binary", Some("https://x/stenogram.PDF?v=2"), None), DocumentType::Pdf);
        assert_eq!(detect(b"binary", Some("https://x/doc.doc"), None), DocumentType::Docx);
        assert_eq!(detect(b"text", Some("https://x/page.htm"), None), DocumentType::Html);
    }

    #[test]
    fn test_content_type_fallback() {
        assert_eq!(detect(b"x", None, Some("application/pdf")), DocumentType::Pdf);
        assert_eq!(
            detect(b"x", None, Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")),
            DocumentType::Docx
        );
        assert_eq!(detect(b"x", None, Some("text/html; charset=utf-8")), DocumentType::Html);
        assert_eq!(detect(b"x", None, Some("text/plain")), DocumentType::Unknown);
    }

    #[test]
    fn test_html_marker_past_sniff_window_ignored() {
        let mut bytes = vec![b' '; SNIFF_LEN];
        bytes.extend_from_slice(b"<html>");
        assert_eq!(detect(&bytes, None, None), DocumentType::Unknown);
    }
}
