//! Overlay content drawn on top of a page's original content.

use serde::{Deserialize, Serialize};

use super::resource::{FontId, ImageId};
use crate::error::{PdfSuiteError, Result};

/// Rectangle in PDF user space (origin bottom-left, points).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const HIGHLIGHT: Color = Color::rgb(1.0, 1.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(PdfSuiteError::invalid_option(
                "color",
                format!("expected #RRGGBB, got '{}'", hex),
            ));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| {
                    PdfSuiteError::invalid_option("color", format!("invalid hex digits in '{}'", hex))
                })
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub(crate) fn clamped(self) -> Self {
        Self::rgb(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Text rendering mode written with the `Tr` operator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextRender {
    #[default]
    Fill,
    /// Mode 3: neither filled nor stroked, still selectable and searchable.
    Invisible,
}

impl TextRender {
    pub(crate) fn mode(self) -> i64 {
        match self {
            TextRender::Fill => 0,
            TextRender::Invisible => 3,
        }
    }

    pub(crate) fn from_mode(mode: i64) -> Self {
        if mode == 3 {
            TextRender::Invisible
        } else {
            TextRender::Fill
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    /// Filled rectangle.
    Rectangle,
    /// Stroked rectangle.
    Outline,
    /// Filled ellipse inscribed in the rectangle.
    Ellipse,
    /// Stroked segment from `(x, y)` to `(x + width, y + height)`.
    Line,
}

/// One unit of overlay content. Never mutated after it is appended to a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentInstruction {
    Text {
        content: String,
        x: f32,
        y: f32,
        font: FontId,
        size: f32,
        color: Color,
        render: TextRender,
    },
    Image {
        image: ImageId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Shape {
        kind: ShapeKind,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
        opacity: f32,
    },
}

impl ContentInstruction {
    pub fn font(&self) -> Option<FontId> {
        match self {
            ContentInstruction::Text { font, .. } => Some(*font),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<ImageId> {
        match self {
            ContentInstruction::Image { image, .. } => Some(*image),
            _ => None,
        }
    }
}
