//! Drawing new content onto pages: text, raster images, shapes and
//! signatures. Instructions are appended to the page and written as an
//! overlay stream at save time.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SignaturePlacement;
use crate::error::{PdfSuiteError, Result};
use crate::image::{self, ImageFormat};
use crate::model::font::first_non_win_ansi;
use crate::model::{
    Color, ContentInstruction, Document, ImageResource, Rect, ShapeKind, StandardFont, TextRender,
    TextStyle,
};

/// Text drawn at a baseline origin.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun<'a> {
    pub content: &'a str,
    pub x: f32,
    pub y: f32,
    pub font: StandardFont,
    pub size: f32,
    pub color: Color,
    pub render: TextRender,
}

/// Position of an image; missing dimensions follow the image's pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImagePlacement {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

/// Which page a signature goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureTarget {
    #[default]
    Last,
    Page(usize),
}

fn positive(option: &str, value: f32) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PdfSuiteError::invalid_option(
            option,
            format!("must be a positive number, got {}", value),
        ))
    }
}

/// Draw styled text with its baseline starting at `(x, y)`.
pub fn add_text(
    doc: &mut Document,
    page_index: usize,
    content: &str,
    x: f32,
    y: f32,
    style: &TextStyle,
) -> Result<()> {
    let run = TextRun {
        content,
        x,
        y,
        font: style.standard_font(),
        size: style.font_size,
        color: Color::from_hex(&style.color)?,
        render: TextRender::Fill,
    };
    add_text_run(doc, page_index, &run)
}

pub fn add_text_run(doc: &mut Document, page_index: usize, run: &TextRun<'_>) -> Result<()> {
    doc.page(page_index)?;
    let size = positive("fontSize", run.size)?;
    if let Some(c) = first_non_win_ansi(run.content) {
        return Err(PdfSuiteError::invalid_option(
            "content",
            format!("{:?} cannot be drawn with the standard fonts", c),
        ));
    }
    let font = doc.resources.embed_font(run.font);
    doc.page_mut(page_index)?
        .push_instruction(ContentInstruction::Text {
            content: run.content.to_string(),
            x: run.x,
            y: run.y,
            font,
            size,
            color: run.color,
            render: run.render,
        });
    Ok(())
}

/// Size an image for placement. With one dimension given, the other keeps
/// the aspect ratio; with none, the pixel size is used as points.
fn placed_size(resource: &ImageResource, width: Option<f32>, height: Option<f32>) -> Result<(f32, f32)> {
    let (px_w, px_h) = (resource.width as f32, resource.height as f32);
    let size = match (width, height) {
        (Some(w), Some(h)) => (positive("width", w)?, positive("height", h)?),
        (Some(w), None) => {
            let w = positive("width", w)?;
            (w, positive("height", w * px_h / px_w)?)
        }
        (None, Some(h)) => {
            let h = positive("height", h)?;
            (positive("width", h * px_w / px_h)?, h)
        }
        (None, None) => (px_w, px_h),
    };
    Ok(size)
}

/// Embed an image of the declared MIME type and place it on a page.
/// Returns the rectangle it occupies.
pub fn add_image(
    doc: &mut Document,
    page_index: usize,
    bytes: &[u8],
    mime_type: &str,
    placement: ImagePlacement,
) -> Result<Rect> {
    doc.page(page_index)?;
    let format = ImageFormat::from_mime(mime_type)?;
    let resource = image::decode(bytes, format)?;
    place_image(doc, page_index, resource, placement)
}

pub(crate) fn place_image(
    doc: &mut Document,
    page_index: usize,
    resource: ImageResource,
    placement: ImagePlacement,
) -> Result<Rect> {
    doc.page(page_index)?;
    let (width, height) = placed_size(&resource, placement.width, placement.height)?;
    let image = doc.resources.embed_image(resource);
    doc.page_mut(page_index)?
        .push_instruction(ContentInstruction::Image {
            image,
            x: placement.x,
            y: placement.y,
            width,
            height,
        });
    Ok(Rect::new(placement.x, placement.y, width, height))
}

/// Draw a vector shape. `opacity` is clamped to `0..=1`.
pub fn add_shape(
    doc: &mut Document,
    page_index: usize,
    kind: ShapeKind,
    rect: Rect,
    color: Color,
    opacity: f32,
) -> Result<()> {
    let opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    doc.page_mut(page_index)?
        .push_instruction(ContentInstruction::Shape {
            kind,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            color,
            opacity,
        });
    Ok(())
}

/// Place a signature image (PNG or JPEG, detected from its bytes) in the
/// bottom-right corner of the target page.
pub fn add_signature(
    doc: &mut Document,
    target: SignatureTarget,
    bytes: &[u8],
    placement: &SignaturePlacement,
) -> Result<Rect> {
    let page_index = match target {
        SignatureTarget::Page(index) => index,
        SignatureTarget::Last => match doc.page_count() {
            0 => {
                return Err(PdfSuiteError::PageIndexOutOfRange {
                    index: 0,
                    page_count: 0,
                })
            }
            count => count - 1,
        },
    };
    let media_box = doc.page(page_index)?.media_box();
    let resource = image::decode(bytes, ImageFormat::sniff(bytes)?)?;

    let width = resource.width as f32 * placement.scale;
    let height = resource.height as f32 * placement.scale;
    let x = media_box.urx - placement.margin - width;
    let y = media_box.lly + placement.margin;
    let rect = place_image(
        doc,
        page_index,
        resource,
        ImagePlacement {
            x,
            y,
            width: Some(width),
            height: Some(height),
        },
    )?;
    debug!(page = page_index, x, y, width, height, "placed signature");
    Ok(rect)
}
