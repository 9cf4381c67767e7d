//! Page-aware text extraction for PDF uploads.
//!
//! Pages are read in ascending page-number order with `lopdf` and joined
//! with a form feed, the page-break marker. A form feed that already occurs
//! inside a page's text is replaced by a space so every marker in the output
//! is a real page boundary.
//!
//! Corrupt or non-PDF input is reported as [`ExtractError::Pdf`]; callers
//! record the failure and never see a panic.

use thiserror::Error;

/// Separator placed between the text of consecutive pages.
pub const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("PDF has no pages")]
    NoPages,
}

/// Full document text plus the marker separating pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_break: char,
}

impl ExtractedText {
    /// Split into trimmed per-page partitions, first page first.
    ///
    /// Text containing `k` markers always yields `k + 1` partitions, empty
    /// ones included.
    pub fn pages(&self) -> Vec<String> {
        self.text
            .split(self.page_break)
            .map(|p| p.trim().to_string())
            .collect()
    }
}

/// Extract the text of every page of a PDF held in memory.
pub fn extract_text(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    // BTreeMap keyed by 1-based page number, so iteration is page order.
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ExtractError::NoPages);
    }

    let mut parts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let text = doc
            .extract_text(&[*page_number])
            .map_err(|e| ExtractError::Pdf(format!("page {}: {}", page_number, e)))?;
        parts.push(text.replace(PAGE_BREAK, " "));
    }

    Ok(ExtractedText {
        text: parts.join(&PAGE_BREAK.to_string()),
        page_break: PAGE_BREAK,
    })
}

/// Small PDFs for tests, shared with the integration tests in `tests/`.
#[doc(hidden)]
pub mod fixtures {
    use anyhow::Result;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    #[cfg(test)]
    pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
        pdf_from_pages(pages).unwrap()
    }

    /// Build a PDF with one page per entry, each showing that text.
    pub fn pdf_from_pages(pages: &[&str]) -> Result<Vec<u8>> {
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
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
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
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::build_pdf;
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn pages_are_split_in_order() {
        let bytes = build_pdf(&["First page", "Second page", "Third page"]);
        let extracted = extract_text(&bytes).unwrap();
        assert_eq!(extracted.page_break, PAGE_BREAK);
        assert_eq!(extracted.text.matches(PAGE_BREAK).count(), 2);

        let pages = extracted.pages();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("First page"));
        assert!(pages[1].contains("Second page"));
        assert!(pages[2].contains("Third page"));
        assert!(pages.iter().all(|p| p.trim() == p));
    }

    #[test]
    fn partitions_are_marker_count_plus_one() {
        let text = ExtractedText {
            text: format!("  a {0}{0} c  ", PAGE_BREAK),
            page_break: PAGE_BREAK,
        };
        assert_eq!(text.pages(), vec!["a", "", "c"]);

        let single = ExtractedText {
            text: "only".into(),
            page_break: PAGE_BREAK,
        };
        assert_eq!(single.pages(), vec!["only"]);
    }

    #[test]
    fn zero_page_pdf_is_rejected() {
        let bytes = build_pdf(&[]);
        let err = extract_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractError::NoPages));
    }
}
