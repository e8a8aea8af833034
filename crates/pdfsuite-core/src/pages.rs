//! Structural page edits: copy, remove, extract, rotate, reorder, append.
//!
//! Every operation that takes page indices validates all of them before
//! touching the document, so a bad index never leaves a partial edit.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::codec::import_subgraph;
use crate::error::{PdfSuiteError, Result};
use crate::model::{ContentInstruction, Document, FontId, ImageId, MediaBox, Page, Rotation};

/// US Letter, in points.
pub const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Append copies of `source` pages to `target`, in the order given.
///
/// Base page objects are deep-copied into the target's graph and overlay
/// resources are re-embedded in the target's pool, so the copy shares
/// nothing with `source`.
pub fn copy_pages(source: &Document, indices: &[usize], target: &mut Document) -> Result<()> {
    source.validate_indices(indices)?;

    let mut fonts: HashMap<FontId, FontId> = HashMap::new();
    let mut images: HashMap<ImageId, ImageId> = HashMap::new();
    let mut copies = Vec::with_capacity(indices.len());
    for &index in indices {
        let page = &source.pages[index];
        let mut copy = page.with_base(
            page.base
                .map(|base| import_subgraph(&source.graph, base, &mut target.graph)),
        );
        for instruction in copy.instructions_mut() {
            relink(instruction, source, target, &mut fonts, &mut images)?;
        }
        copies.push(copy);
    }

    target.pages.extend(copies);
    debug!(
        copied = indices.len(),
        target_pages = target.pages.len(),
        "copied pages"
    );
    Ok(())
}

fn relink(
    instruction: &mut ContentInstruction,
    source: &Document,
    target: &mut Document,
    fonts: &mut HashMap<FontId, FontId>,
    images: &mut HashMap<ImageId, ImageId>,
) -> Result<()> {
    match instruction {
        ContentInstruction::Text { font, .. } => {
            let mapped = match fonts.get(font) {
                Some(mapped) => *mapped,
                None => {
                    let resource = source.resources.font(*font).ok_or_else(|| {
                        PdfSuiteError::OperationError(format!("font {} not in pool", font.0))
                    })?;
                    let mapped = target.resources.embed_font(resource.font);
                    fonts.insert(*font, mapped);
                    mapped
                }
            };
            *font = mapped;
        }
        ContentInstruction::Image { image, .. } => {
            let mapped = match images.get(image) {
                Some(mapped) => *mapped,
                None => {
                    let resource = source.resources.image(*image).ok_or_else(|| {
                        PdfSuiteError::OperationError(format!("image {} not in pool", image.0))
                    })?;
                    let mapped = target.resources.embed_image(resource.clone());
                    images.insert(*image, mapped);
                    mapped
                }
            };
            *image = mapped;
        }
        ContentInstruction::Shape { .. } => {}
    }
    Ok(())
}

/// Remove every page whose index (before removal) is in `indices`.
/// Duplicates collapse; the order of `indices` does not matter.
pub fn remove_pages(doc: &mut Document, indices: &[usize]) -> Result<()> {
    doc.validate_indices(indices)?;
    let doomed: BTreeSet<usize> = indices.iter().copied().collect();
    let mut index = 0;
    doc.pages.retain(|_| {
        let keep = !doomed.contains(&index);
        index += 1;
        keep
    });
    debug!(removed = doomed.len(), remaining = doc.pages.len(), "removed pages");
    Ok(())
}

/// A new document holding copies of the selected pages. `doc` is unchanged.
pub fn extract_pages(doc: &Document, indices: &[usize]) -> Result<Document> {
    let mut out = Document::new();
    copy_pages(doc, indices, &mut out)?;
    Ok(out)
}

/// Add `degrees` (a multiple of 90, may be negative) to each selected
/// page's rotation. An index listed twice is rotated twice.
pub fn rotate(doc: &mut Document, indices: &[usize], degrees: i64) -> Result<()> {
    Rotation::from_degrees(degrees)?;
    doc.validate_indices(indices)?;
    for &index in indices {
        doc.pages[index].rotate_by(degrees)?;
    }
    Ok(())
}

/// Rearrange pages so that page `i` of the result is old page `order[i]`.
pub fn reorder(doc: &mut Document, order: &[usize]) -> Result<()> {
    doc.validate_indices(order)?;
    let unique: BTreeSet<usize> = order.iter().copied().collect();
    if order.len() != doc.pages.len() || unique.len() != order.len() {
        return Err(PdfSuiteError::invalid_option(
            "pageOrder",
            format!("must be a permutation of 0..{}", doc.pages.len()),
        ));
    }
    let mut old: Vec<Option<Page>> = std::mem::take(&mut doc.pages).into_iter().map(Some).collect();
    doc.pages = order.iter().filter_map(|&i| old[i].take()).collect();
    Ok(())
}

/// Append a blank page and return its index.
pub fn add_page(doc: &mut Document, size: Option<(f32, f32)>) -> Result<usize> {
    let (width, height) = size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
        return Err(PdfSuiteError::invalid_option(
            "pageSize",
            format!("{}x{} is not a positive size", width, height),
        ));
    }
    doc.pages.push(Page::blank(width, height));
    Ok(doc.pages.len() - 1)
}

/// Media box of a page, for callers placing content relative to its edges.
pub fn page_box(doc: &Document, index: usize) -> Result<MediaBox> {
    Ok(doc.page(index)?.media_box())
}
