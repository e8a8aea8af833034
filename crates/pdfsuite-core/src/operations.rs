//! Edit operations accepted by `edit-pdf`.
//!
//! Each edit names its page and placement in PDF points (origin
//! bottom-left). Edits are applied in order by
//! [`apply_edits`](crate::apply_operations::apply_edits).

use serde::{Deserialize, Serialize};

use crate::model::{Rect, TextStyle};

fn default_highlight_color() -> String {
    "#FFFF00".to_string()
}

fn default_highlight_opacity() -> f32 {
    0.4
}

fn default_shape_color() -> String {
    "#000000".to_string()
}

fn default_opacity() -> f32 {
    1.0
}

fn default_checkbox_size() -> f32 {
    12.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EditOperation {
    /// Text with its baseline at `(x, y)`. Without a style the engine's
    /// default font and size are used.
    #[serde(rename_all = "camelCase")]
    Text {
        page_index: usize,
        x: f32,
        y: f32,
        content: String,
        #[serde(default)]
        style: Option<TextStyle>,
    },
    /// A base64-encoded PNG or JPEG.
    #[serde(rename_all = "camelCase")]
    Image {
        page_index: usize,
        x: f32,
        y: f32,
        #[serde(default)]
        width: Option<f32>,
        #[serde(default)]
        height: Option<f32>,
        image: String,
        mime_type: String,
    },
    #[serde(rename_all = "camelCase")]
    Highlight {
        page_index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        #[serde(default = "default_highlight_color")]
        color: String,
        #[serde(default = "default_highlight_opacity")]
        opacity: f32,
    },
    /// Outlined unless `filled`.
    #[serde(rename_all = "camelCase")]
    Rectangle {
        page_index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        #[serde(default = "default_shape_color")]
        color: String,
        #[serde(default)]
        filled: bool,
        #[serde(default = "default_opacity")]
        opacity: f32,
    },
    #[serde(rename_all = "camelCase")]
    Ellipse {
        page_index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        #[serde(default = "default_shape_color")]
        color: String,
        #[serde(default = "default_opacity")]
        opacity: f32,
    },
    #[serde(rename_all = "camelCase")]
    Line {
        page_index: usize,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        #[serde(default = "default_shape_color")]
        color: String,
    },
    /// Opaque white box hiding what is underneath.
    #[serde(rename_all = "camelCase")]
    WhiteOut {
        page_index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// Cover `original` with white and draw `content` at `(x, y)`.
    #[serde(rename_all = "camelCase")]
    ReplaceText {
        page_index: usize,
        original: Rect,
        x: f32,
        y: f32,
        content: String,
        #[serde(default)]
        style: Option<TextStyle>,
    },
    /// Square box with lower-left corner at `(x, y)`, ticked when `checked`.
    #[serde(rename_all = "camelCase")]
    Checkbox {
        page_index: usize,
        x: f32,
        y: f32,
        #[serde(default = "default_checkbox_size")]
        size: f32,
        #[serde(default)]
        checked: bool,
    },
}

impl EditOperation {
    pub fn page_index(&self) -> usize {
        match self {
            EditOperation::Text { page_index, .. }
            | EditOperation::Image { page_index, .. }
            | EditOperation::Highlight { page_index, .. }
            | EditOperation::Rectangle { page_index, .. }
            | EditOperation::Ellipse { page_index, .. }
            | EditOperation::Line { page_index, .. }
            | EditOperation::WhiteOut { page_index, .. }
            | EditOperation::ReplaceText { page_index, .. }
            | EditOperation::Checkbox { page_index, .. } => *page_index,
        }
    }
}
