//! PDF Split
//!
//! One output document per comma-separated range group.

use tracing::info;

use crate::codec::{self, LoadOptions, SaveOptions};
use crate::error::{PdfSuiteError, Result};
use crate::model::Document;
use crate::pages::extract_pages;
use crate::parse_range_groups;

/// Split `doc` by a 1-based range expression such as `"1-3, 5"`, which
/// yields two documents (pages 1..=3 and page 5). `doc` is unchanged.
pub fn split(doc: &Document, ranges: &str) -> Result<Vec<Document>> {
    let groups = parse_range_groups(ranges)?;
    if groups.is_empty() {
        return Err(PdfSuiteError::InvalidRange("No pages specified".into()));
    }

    let mut outputs = Vec::with_capacity(groups.len());
    for group in &groups {
        let indices = group
            .iter()
            .map(|&page| page_index(page, doc.page_count()))
            .collect::<Result<Vec<_>>>()?;
        outputs.push(extract_pages(doc, &indices)?);
    }
    info!(parts = outputs.len(), source_pages = doc.page_count(), "split document");
    Ok(outputs)
}

fn page_index(page: u32, page_count: usize) -> Result<usize> {
    if page == 0 {
        return Err(PdfSuiteError::InvalidRange("Page numbers must be >= 1".into()));
    }
    let index = page as usize - 1;
    if index >= page_count {
        return Err(PdfSuiteError::PageIndexOutOfRange { index, page_count });
    }
    Ok(index)
}

/// Byte-level convenience over [`split`].
pub fn split_document(bytes: &[u8], ranges: &str) -> Result<Vec<Vec<u8>>> {
    let doc = codec::load(bytes, &LoadOptions::default())?;
    split(&doc, ranges)?
        .iter()
        .map(|part| codec::save(part, &SaveOptions::default()))
        .collect()
}
