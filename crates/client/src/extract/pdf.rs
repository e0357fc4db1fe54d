//! Page-by-page PDF text extraction.

use super::Extractor;
use lopdf::Document;
use sejmbot_core::Error;

/// Inputs shorter than this cannot hold a meaningful PDF.
const MIN_PDF_BYTES: usize = 100;

/// Extracts text from PDF transcripts with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    /// Pages that fail to extract are logged and skipped; the rest are joined
    /// with blank lines.
    fn extract(&self, bytes: &[u8]) -> Result<String, Error> {
        if bytes.len() < MIN_PDF_BYTES || !bytes.starts_with(b"%PDF-") {
            tracing::warn!(bytes = bytes.len(), "Not a usable PDF, skipping extraction");
            return Ok(String::new());
        }

        let document =
            Document::load_mem(bytes).map_err(|e| Error::ExtractFailed(format!("failed to parse PDF: {e}")))?;

        let pages = document.get_pages();
        let mut texts = Vec::with_capacity(pages.len());
        for page in pages.keys() {
            match document.extract_text(&[*page]) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        texts.push(text.to_string());
                    }
                }
                Err(e) => tracing::warn!(page, error = %e, "Skipping unreadable PDF page"),
            }
        }

        tracing::debug!(pages = pages.len(), extracted = texts.len(), "PDF extracted");
        Ok(texts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
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

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pages_joined_with_blank_line() {
        let bytes = pdf_with_pages(&["Posiedzenie Sejmu strona pierwsza", "", "Marszalek strona druga"]);
        assert_eq!(
            PdfExtractor.extract(&bytes).unwrap(),
            "Posiedzenie Sejmu strona pierwsza\n\nMarszalek strona druga"
        );
    }

    #[test]
    fn test_too_short_is_empty() {
        assert_eq!(PdfExtractor.extract(b"%PDF-1.4").unwrap(), "");
    }

    #[test]
    fn test_missing_signature_is_empty() {
        let bytes = vec![b'x'; 500];
        assert_eq!(PdfExtractor.extract(&bytes).unwrap(), "");
    }

    #[test]
    fn test_garbage_after_signature_fails() {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend(std::iter::repeat_n(b'#', 200));
        assert!(matches!(PdfExtractor.extract(&bytes), Err(Error::ExtractFailed(_))));
    }
}
