//! Transcript content pipeline.
//!
//! Raw bytes go through four stages, each usable on its own:
//!
//! 1. [`detect`] classifies the bytes as PDF, DOCX, HTML or unknown.
//! 2. An [`Extractor`] turns them into text ([`PdfExtractor`], [`HtmlExtractor`]).
//! 3. [`clean`] strips site chrome and normalizes whitespace and punctuation.
//! 4. [`TextValidator`] scores the result as a plausible transcript.
//!
//! [`ContentPipeline::process`] chains the stages and never fails: extraction
//! errors are logged and produce empty text, which then fails validation.

pub mod clean;
pub mod detect;
pub mod html;
pub mod meeting;
pub mod pdf;
pub mod validate;

pub use clean::clean;
pub use detect::{DocumentType, detect};
pub use html::HtmlExtractor;
pub use meeting::{MeetingNumber, MeetingSource, day_letter, find_date, guess_meeting_number};
pub use pdf::PdfExtractor;
pub use validate::{KEYWORDS, TextValidator, ValidationReport};

use bytes::Bytes;
use sejmbot_core::Error;

/// Format-specific text extraction.
pub trait Extractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, Error>;
}

/// The outcome of running bytes through the pipeline.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    raw_bytes: Bytes,
    detected_type: DocumentType,
    text: String,
    validation: ValidationReport,
}

impl ExtractedDocument {
    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }

    pub fn detected_type(&self) -> DocumentType {
        self.detected_type
    }

    /// Cleaned text; empty when extraction failed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    /// Documents whose text failed validation are kept but flagged.
    pub fn is_low_confidence(&self) -> bool {
        !self.validation.passed
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Detect, extract, clean and validate.
#[derive(Debug, Clone, Default)]
pub struct ContentPipeline {
    pub pdf: PdfExtractor,
    pub html: HtmlExtractor,
    pub validator: TextValidator,
}

impl ContentPipeline {
    pub fn new(validator: TextValidator) -> Self {
        Self { validator, ..Self::default() }
    }

    /// Run the full pipeline over a fetched document.
    pub fn process(&self, bytes: Bytes, url: Option<&str>, content_type: Option<&str>) -> ExtractedDocument {
        let (detected_type, text) = self.extract_text(&bytes, url, content_type);
        let validation = self.validate(&text, url);
        ExtractedDocument { raw_bytes: bytes, detected_type, text, validation }
    }

    /// Detect, extract and clean without validating.
    ///
    /// Used for fragments (single statements) that are validated as part of a
    /// larger document.
    pub fn extract_text(&self, bytes: &[u8], url: Option<&str>, content_type: Option<&str>) -> (DocumentType, String) {
        let detected_type = detect(bytes, url, content_type);

        let raw_text = match detected_type {
            DocumentType::Pdf => self.run(&self.pdf, bytes, detected_type, url),
            DocumentType::Html => self.run(&self.html, bytes, detected_type, url),
            DocumentType::Docx => {
                tracing::warn!(url = url.unwrap_or("-"), "DOCX extraction is not supported, skipping");
                String::new()
            }
            DocumentType::Unknown => String::from_utf8_lossy(bytes).into_owned(),
        };

        (detected_type, clean(&raw_text))
    }

    /// Clean and validate text that was extracted elsewhere.
    pub fn process_text(&self, text: &str) -> (String, ValidationReport) {
        let text = clean(text);
        let validation = self.validate(&text, None);
        (text, validation)
    }

    /// Validate already cleaned text, logging a warning on failure.
    pub fn validate(&self, text: &str, source: Option<&str>) -> ValidationReport {
        let validation = self.validator.validate(text);
        if !validation.passed {
            tracing::warn!(
                source = source.unwrap_or("-"),
                chars = validation.char_count,
                reasons = ?validation.reasons,
                "Extracted text failed validation"
            );
        }
        validation
    }

    fn run(&self, extractor: &dyn Extractor, bytes: &[u8], kind: DocumentType, url: Option<&str>) -> String {
        match extractor.extract(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%kind, url = url.unwrap_or("-"), error = %e, "Extraction failed");
                String::new()
            }
        }
    }
}
