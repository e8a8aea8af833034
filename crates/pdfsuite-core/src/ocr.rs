//! Searchable text layers from externally recognized text.
//!
//! Recognition itself happens elsewhere; this module only takes words with
//! their bounding boxes and lays them over the page as invisible text.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::{Color, Document, StandardFont, TextRender};
use crate::overlay::{add_text_run, TextRun};

/// One recognized word. The box is in PDF points, origin bottom-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedWord {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedPage {
    pub page_index: usize,
    #[serde(default)]
    pub words: Vec<RecognizedWord>,
}

/// Write every recognized word as invisible text whose baseline sits on the
/// bottom of its box and whose size equals the box height. Returns the
/// number of words written; empty words and degenerate boxes are skipped.
pub fn apply_recognized_text(doc: &mut Document, pages: &[RecognizedPage]) -> Result<usize> {
    let indices: Vec<usize> = pages.iter().map(|p| p.page_index).collect();
    doc.validate_indices(&indices)?;

    let mut written = 0;
    for page in pages {
        for word in &page.words {
            let text = word.text.trim();
            if text.is_empty() || !(word.height > 0.0) {
                continue;
            }
            let run = TextRun {
                content: text,
                x: word.x,
                y: word.y,
                font: StandardFont::Helvetica,
                size: word.height,
                color: Color::BLACK,
                render: TextRender::Invisible,
            };
            add_text_run(doc, page.page_index, &run)?;
            written += 1;
        }
    }
    debug!(pages = pages.len(), words = written, "applied text layer");
    Ok(written)
}
