//! Load and save: the boundary between PDF bytes and the [`Document`] model.

mod graph;
pub(crate) mod overlay_stream;
mod reader;
mod writer;

pub(crate) use graph::{import_subgraph, number, resolve, resolve_dict};

use serde::Serialize;

use crate::encryption::EncryptionSpec;
use crate::error::{PdfSuiteError, Result};
use crate::model::Document;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// User or owner password. Ignored for unencrypted files.
    pub password: Option<String>,
    /// Size of pages that carry no MediaBox, directly or inherited.
    /// Defaults to US Letter.
    pub page_size: Option<(f32, f32)>,
}

#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub encryption: Option<EncryptionSpec>,
    /// Deduplicate identical streams, renumber objects and Flate-compress
    /// uncompressed streams.
    pub compact: bool,
}

/// Parse `bytes` into a document.
pub fn load(bytes: &[u8], options: &LoadOptions) -> Result<Document> {
    reader::load(bytes, options)
}

/// An empty document, ready for `add_page` or `copy_pages`.
pub fn create() -> Document {
    Document::new()
}

/// Serialize `doc`. Identical documents and options produce identical bytes.
pub fn save(doc: &Document, options: &SaveOptions) -> Result<Vec<u8>> {
    writer::save(doc, options)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub width: f32,
    pub height: f32,
    pub rotation: i64,
    /// Orientation as displayed, after rotation.
    pub orientation: PageOrientation,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub page_count: usize,
    pub pages: Vec<PageSummary>,
    pub encrypted: bool,
    pub version: String,
    pub title: Option<String>,
    pub author: Option<String>,
}

fn orientation(width: f32, height: f32, rotation: i64) -> PageOrientation {
    let (w, h) = if rotation % 180 == 0 {
        (width, height)
    } else {
        (height, width)
    };
    if (w - h).abs() < 1.0 {
        PageOrientation::Square
    } else if w > h {
        PageOrientation::Landscape
    } else {
        PageOrientation::Portrait
    }
}

/// Describe a file without decrypting it. Geometry is readable in encrypted
/// files; metadata strings are not and are reported as absent.
pub fn inspect(bytes: &[u8]) -> Result<DocumentSummary> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(PdfSuiteError::CorruptDocument(
            "missing %PDF- header".to_string(),
        ));
    }
    let graph = lopdf::Document::load_mem(bytes)
        .map_err(|e| PdfSuiteError::CorruptDocument(e.to_string()))?;
    let encrypted = graph.is_encrypted();

    let pages: Vec<PageSummary> = graph
        .get_pages()
        .into_values()
        .map(|page_id| {
            let media_box = reader::inherited(&graph, page_id, b"MediaBox")
                .and_then(|o| reader::read_media_box(&graph, &o));
            let (width, height) = media_box.map_or(crate::pages::DEFAULT_PAGE_SIZE, |mb| {
                (mb.width(), mb.height())
            });
            let rotation = reader::inherited(&graph, page_id, b"Rotate")
                .and_then(|o| o.as_i64().ok())
                .map_or(0, |r| r.rem_euclid(360));
            PageSummary {
                width,
                height,
                rotation,
                orientation: orientation(width, height, rotation),
            }
        })
        .collect();

    let info = if encrypted {
        Default::default()
    } else {
        reader::read_info(&graph)
    };
    Ok(DocumentSummary {
        page_count: pages.len(),
        pages,
        encrypted,
        version: graph.version.clone(),
        title: info.title,
        author: info.author,
    })
}
