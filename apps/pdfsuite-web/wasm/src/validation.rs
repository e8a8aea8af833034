//! PDF validation and info extraction
//!
//! Cheap checks run before a file is accepted into the UI, plus the file
//! summary shown next to it.

use pdfsuite_core::{inspect, PageSummary, PdfSuiteError};
use serde::Serialize;

/// PDF file information extracted during validation
#[derive(Debug, Clone, Serialize, Default)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// Whether the document is encrypted
    pub encrypted: bool,
    /// File size in bytes
    pub size_bytes: usize,
    /// Whether the document appears valid
    pub valid: bool,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Document author from metadata (if available)
    pub author: Option<String>,
    /// Effective size and orientation of every page
    pub pages: Vec<PageSummary>,
}

/// Validate a PDF file and extract basic info.
///
/// Encrypted files are reported, not rejected; their metadata stays hidden
/// until they are unlocked.
pub fn validate_pdf(bytes: &[u8]) -> Result<PdfInfo, String> {
    check_header(bytes)?;

    let summary = inspect(bytes).map_err(|e: PdfSuiteError| e.user_message())?;
    if summary.page_count == 0 && !summary.encrypted {
        return Err("PDF has no pages".to_string());
    }

    Ok(PdfInfo {
        page_count: summary.page_count as u32,
        version: summary.version,
        encrypted: summary.encrypted,
        size_bytes: bytes.len(),
        valid: true,
        title: summary.title,
        author: summary.author,
        pages: summary.pages,
    })
}

fn check_header(bytes: &[u8]) -> Result<(), String> {
    // Check minimum size
    if bytes.len() < 8 {
        return Err("File too small to be a valid PDF".to_string());
    }

    // Check PDF magic bytes
    if !bytes.starts_with(b"%PDF-") {
        return Err("Not a valid PDF file (missing %PDF- header)".to_string());
    }
    Ok(())
}

/// Quick validation without full parsing (for large files)
pub fn quick_validate(bytes: &[u8]) -> Result<(), String> {
    check_header(bytes)?;

    // Check for EOF marker (should be near the end)
    let tail = if bytes.len() > 1024 {
        &bytes[bytes.len() - 1024..]
    } else {
        bytes
    };

    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err("PDF appears truncated (missing %%EOF marker)".to_string());
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object, Stream};

    /// A US Letter PDF with `num_pages` pages; every other page is landscape.
    pub fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::new();
        for i in 0..num_pages {
            let content = format!("BT /F1 12 Tf 100 700 Td (Page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let (width, height) = if i % 2 == 0 { (612, 792) } else { (792, 612) };
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
                "Contents" => content_id,
            });
            page_ids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => num_pages as i64,
                "Kids" => page_ids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::create_test_pdf;
    use super::*;
    use pdfsuite_core::codec::PageOrientation;

    #[test]
    fn test_quick_validate_rejects_non_pdf() {
        let result = quick_validate(b"not a pdf file");
        assert!(result.is_err());
    }

    #[test]
    fn test_quick_validate_rejects_small_file() {
        let result = quick_validate(b"tiny");
        assert!(result.is_err());
    }

    #[test]
    fn test_quick_validate_accepts_valid_pdf() {
        let pdf = create_test_pdf(1);
        let result = quick_validate(&pdf);
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_pdf_returns_correct_page_count() {
        let pdf = create_test_pdf(5);
        let info = validate_pdf(&pdf).unwrap();
        assert_eq!(info.page_count, 5);
        assert_eq!(info.pages.len(), 5);
        assert!(info.valid);
    }

    #[test]
    fn test_validate_pdf_reports_orientation() {
        let pdf = create_test_pdf(2);
        let info = validate_pdf(&pdf).unwrap();
        assert_eq!(info.pages[0].orientation, PageOrientation::Portrait);
        assert_eq!(info.pages[1].orientation, PageOrientation::Landscape);
        assert_eq!(info.version, "1.7");
        assert!(!info.encrypted);
    }

    #[test]
    fn test_validate_pdf_rejects_invalid_data() {
        let result = validate_pdf(b"not a valid pdf");
        assert!(result.is_err());

        let result = validate_pdf(b"%PDF-1.7 but nothing else");
        assert!(result.is_err());
    }
}
