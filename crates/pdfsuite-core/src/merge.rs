//! PDF Merge
//!
//! Combines documents page by page, in input order.

use tracing::info;

use crate::codec::{self, LoadOptions, SaveOptions};
use crate::error::{PdfSuiteError, Result};
use crate::model::Document;
use crate::pages::copy_pages;

/// Merge documents into a new one.
///
/// Pages of each document are appended in their original order, documents
/// in the order given. Needs at least two documents and at least one page
/// among them.
pub fn merge(documents: &[Document]) -> Result<Document> {
    if documents.len() < 2 {
        return Err(PdfSuiteError::InsufficientInput(format!(
            "merge needs at least 2 documents, got {}",
            documents.len()
        )));
    }
    let total: usize = documents.iter().map(Document::page_count).sum();
    if total == 0 {
        return Err(PdfSuiteError::InsufficientInput(
            "documents to merge have no pages".into(),
        ));
    }

    let mut dest = Document::new();
    for source in documents {
        let all: Vec<usize> = (0..source.page_count()).collect();
        copy_pages(source, &all, &mut dest)?;
    }
    info!(documents = documents.len(), pages = total, "merged documents");
    Ok(dest)
}

/// Byte-level convenience over [`merge`]: load each input, merge, save
/// compacted.
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    let loaded = documents
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            codec::load(bytes, &LoadOptions::default()).map_err(|e| match e {
                PdfSuiteError::CorruptDocument(msg) => {
                    PdfSuiteError::CorruptDocument(format!("document {}: {}", i, msg))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let merged = merge(&loaded)?;
    codec::save(
        &merged,
        &SaveOptions {
            encryption: None,
            compact: true,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page_widths, pdf_with_widths};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents(vec![]);
        assert!(matches!(result, Err(PdfSuiteError::InsufficientInput(_))));
    }

    #[test]
    fn test_merge_single_document_fails() {
        let result = merge_documents(vec![pdf_with_widths(&[100.0, 101.0])]);
        assert!(matches!(result, Err(PdfSuiteError::InsufficientInput(_))));
    }

    #[test]
    fn test_merge_all_empty_fails() {
        assert!(matches!(
            merge(&[Document::new(), Document::new()]),
            Err(PdfSuiteError::InsufficientInput(_))
        ));
    }

    #[test]
    fn test_merge_preserves_page_order() {
        let merged = merge_documents(vec![
            pdf_with_widths(&[100.0, 101.0]),
            pdf_with_widths(&[200.0]),
            pdf_with_widths(&[300.0, 301.0]),
        ])
        .unwrap();
        assert_eq!(page_widths(&merged), vec![100.0, 101.0, 200.0, 300.0, 301.0]);
    }

    #[test]
    fn test_merge_handles_different_sizes() {
        let large: Vec<f32> = (0..10).map(|i| 100.0 + i as f32).collect();
        let merged = merge_documents(vec![
            pdf_with_widths(&large),
            pdf_with_widths(&[50.0]),
            pdf_with_widths(&[60.0; 5]),
        ])
        .unwrap();
        assert_eq!(page_widths(&merged).len(), 16);
    }

    #[test]
    fn test_merge_allows_an_empty_member() {
        let a = codec::load(&pdf_with_widths(&[100.0]), &LoadOptions::default()).unwrap();
        let merged = merge(&[a, Document::new()]).unwrap();
        assert_eq!(merged.page_count(), 1);
    }

    #[test]
    fn test_corrupt_member_is_named() {
        let err = merge_documents(vec![pdf_with_widths(&[1.0]), b"junk".to_vec()]).unwrap_err();
        assert!(err.to_string().contains("document 1"));
    }
}
