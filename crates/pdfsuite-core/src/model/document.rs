use lopdf::ObjectId;
use serde::{Deserialize, Serialize};

use super::content::ContentInstruction;
use super::page::Page;
use super::resource::ResourcePool;
use crate::encryption::PermissionSet;
use crate::error::{PdfSuiteError, Result};

/// Document-level metadata carried through to the `/Info` dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
}

/// Encryption state of the file the document was loaded from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityState {
    pub encrypted: bool,
    /// Permissions granted by the loaded file; `None` when unencrypted.
    pub permissions: Option<PermissionSet>,
}

/// In-memory PDF: ordered pages over an opaque base object graph.
///
/// The base graph holds the original page objects (content streams, fonts,
/// annotations) exactly as loaded; everything the engine draws lives in the
/// pages' instruction lists and the resource pool until save.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) graph: lopdf::Document,
    pub(crate) pages: Vec<Page>,
    pub(crate) resources: ResourcePool,
    pub(crate) info: DocumentInfo,
    pub(crate) security: SecurityState,
    /// Page objects present at load time, used to decide whether
    /// catalog-level structures that point at pages are still valid.
    pub(crate) loaded_pages: Vec<ObjectId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document with zero pages.
    pub fn new() -> Self {
        Self {
            graph: lopdf::Document::with_version("1.7"),
            pages: Vec::new(),
            resources: ResourcePool::new(),
            info: DocumentInfo::default(),
            security: SecurityState::default(),
            loaded_pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Result<&Page> {
        let page_count = self.pages.len();
        self.pages
            .get(index)
            .ok_or(PdfSuiteError::PageIndexOutOfRange { index, page_count })
    }

    pub(crate) fn page_mut(&mut self, index: usize) -> Result<&mut Page> {
        let page_count = self.pages.len();
        self.pages
            .get_mut(index)
            .ok_or(PdfSuiteError::PageIndexOutOfRange { index, page_count })
    }

    /// Fail with `PageIndexOutOfRange` on the first invalid index, before
    /// any caller mutates anything.
    pub(crate) fn validate_indices(&self, indices: &[usize]) -> Result<()> {
        let page_count = self.pages.len();
        match indices.iter().find(|&&index| index >= page_count) {
            Some(&index) => Err(PdfSuiteError::PageIndexOutOfRange { index, page_count }),
            None => Ok(()),
        }
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut DocumentInfo {
        &mut self.info
    }

    pub fn security(&self) -> &SecurityState {
        &self.security
    }

    /// PDF version of the base graph, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.graph.version
    }

    /// Remove the most recently drawn instruction on a page.
    pub fn undo_last(&mut self, page_index: usize) -> Result<Option<ContentInstruction>> {
        Ok(self.page_mut(page_index)?.pop_instruction())
    }

    /// Remove the instruction at `index` on a page. `Ok(None)` when the page
    /// exists but has no such instruction.
    pub fn remove_instruction(
        &mut self,
        page_index: usize,
        index: usize,
    ) -> Result<Option<ContentInstruction>> {
        Ok(self.page_mut(page_index)?.remove_instruction(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, ShapeKind};

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert_eq!(doc.page_count(), 0);
        assert_eq!(doc.version(), "1.7");
        assert!(!doc.security().encrypted);
    }

    #[test]
    fn test_page_lookup_reports_range() {
        let doc = Document::new();
        match doc.page(0) {
            Err(PdfSuiteError::PageIndexOutOfRange { index, page_count }) => {
                assert_eq!(index, 0);
                assert_eq!(page_count, 0);
            }
            other => panic!("expected out of range, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_validate_indices_reports_first_bad_index() {
        let mut doc = Document::new();
        doc.pages.push(Page::blank(10.0, 10.0));
        assert!(doc.validate_indices(&[0, 0]).is_ok());
        assert!(matches!(
            doc.validate_indices(&[0, 3, 9]),
            Err(PdfSuiteError::PageIndexOutOfRange { index: 3, .. })
        ));
    }

    fn shape_at(x: f32) -> ContentInstruction {
        ContentInstruction::Shape {
            kind: ShapeKind::Rectangle,
            x,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            color: Color::WHITE,
            opacity: 1.0,
        }
    }

    fn doc_with_shapes(xs: &[f32]) -> Document {
        let mut doc = Document::new();
        let mut page = Page::blank(100.0, 100.0);
        for &x in xs {
            page.push_instruction(shape_at(x));
        }
        doc.pages.push(page);
        doc
    }

    #[test]
    fn test_undo_last_pops_newest_instruction() {
        let mut doc = doc_with_shapes(&[1.0, 2.0]);
        assert_eq!(doc.undo_last(0).unwrap(), Some(shape_at(2.0)));
        assert_eq!(doc.undo_last(0).unwrap(), Some(shape_at(1.0)));
        assert_eq!(doc.undo_last(0).unwrap(), None);
        assert!(matches!(
            doc.undo_last(1),
            Err(PdfSuiteError::PageIndexOutOfRange { index: 1, page_count: 1 })
        ));
    }

    #[test]
    fn test_remove_instruction_by_index() {
        let mut doc = doc_with_shapes(&[1.0, 2.0, 3.0]);
        assert_eq!(doc.remove_instruction(0, 1).unwrap(), Some(shape_at(2.0)));
        assert_eq!(doc.pages()[0].instructions(), &[shape_at(1.0), shape_at(3.0)]);
        assert_eq!(doc.remove_instruction(0, 5).unwrap(), None);
        assert!(matches!(
            doc.remove_instruction(2, 0),
            Err(PdfSuiteError::PageIndexOutOfRange { index: 2, page_count: 1 })
        ));
        assert_eq!(doc.pages()[0].instructions().len(), 2);
    }
}
