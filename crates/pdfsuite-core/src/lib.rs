//! PDF document transformation engine
//!
//! Loads PDF bytes into an in-memory [`Document`], applies page operations
//! (merge, split, remove, extract, rotate, reorder), content overlays (text,
//! images, shapes, signatures, recognized text), compression and password
//! protection, and saves the result.
//!
//! [`Orchestrator`] is the single entry point used by the web boundary: it
//! maps a tool name and an options bag to one of these transforms.

pub mod apply_operations;
pub mod codec;
pub mod command;
pub mod compression;
pub mod config;
pub mod encryption;
pub mod error;
pub mod image;
pub mod merge;
pub mod model;
pub mod ocr;
pub mod operations;
pub mod orchestrator;
pub mod overlay;
pub mod pages;
pub mod split;

pub use apply_operations::apply_edits;
pub use codec::{inspect, DocumentSummary, LoadOptions, PageSummary, SaveOptions};
pub use command::{
    InputFile, Operation, OperationOutput, OperationRequest, OutputFile, ProcessMetrics,
    ProcessResult,
};
pub use compression::{CompressionReport, CompressionTier};
pub use config::EngineConfig;
pub use encryption::{EncryptionSpec, PermissionSet, UnlockOutcome};
pub use error::{ErrorCategory, PdfSuiteError, Result};
pub use merge::merge_documents;
pub use model::Document;
pub use operations::EditOperation;
pub use orchestrator::Orchestrator;
pub use split::split_document;

/// Upper bound on pages a single range like `"1-5000"` may expand to.
const MAX_RANGE_LEN: u32 = 100_000;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32> {
    let doc = codec::load(bytes, &LoadOptions::default())?;
    Ok(doc.page_count() as u32)
}

/// Parse page range string like "1-3, 5, 8-10" into sorted unique page numbers
pub fn parse_ranges(input: &str) -> Result<Vec<u32>> {
    let mut pages: Vec<u32> = parse_range_groups(input)?.into_iter().flatten().collect();
    pages.sort_unstable();
    pages.dedup();
    Ok(pages)
}

/// Parse a range string into one group per comma-separated part, in input
/// order: `"1-3, 5"` gives `[[1, 2, 3], [5]]`. Page numbers are 1-based as
/// typed; empty parts are skipped.
pub fn parse_range_groups(input: &str) -> Result<Vec<Vec<u32>>> {
    let mut groups = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            // Range like "1-3"
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| PdfSuiteError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| PdfSuiteError::InvalidRange(format!("Invalid end: {}", end)))?;

            if start > end {
                return Err(PdfSuiteError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }
            if end - start >= MAX_RANGE_LEN {
                return Err(PdfSuiteError::InvalidRange(format!(
                    "Range {}-{} is too long",
                    start, end
                )));
            }

            groups.push((start..=end).collect());
        } else {
            // Single page like "5"
            let page: u32 = part
                .parse()
                .map_err(|_| PdfSuiteError::InvalidRange(format!("Invalid page: {}", part)))?;
            groups.push(vec![page]);
        }
    }

    Ok(groups)
}

/// Fixture PDFs shared by the unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use lopdf::{dictionary, Object, Stream};

    use crate::codec::{self, LoadOptions};

    /// One page per entry, each `width` points wide and 792 tall, with a
    /// small content stream so the pages are not byte-identical.
    pub fn pdf_with_widths(widths: &[f32]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = widths
            .iter()
            .enumerate()
            .map(|(i, &width)| {
                let content = format!("BT /F1 12 Tf 50 700 Td (Page-{}) Tj ET", i + 1);
                let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), 792.into()],
                    "Contents" => content_id,
                });
                page_id.into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save fixture");
        bytes
    }

    pub fn page_widths(bytes: &[u8]) -> Vec<f32> {
        let doc = codec::load(bytes, &LoadOptions::default()).expect("load output");
        doc.pages().iter().map(|page| page.width()).collect()
    }
}
