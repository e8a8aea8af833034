//! Serialization of page instructions into a dedicated content stream.
//!
//! Each instruction is wrapped in a marked-content sequence whose tag names
//! the instruction kind, and every geometric value is written verbatim as an
//! operand. Decoding reads those operands back, so text and shape
//! instructions survive a save/load cycle exactly.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};

use super::graph::number;
use crate::error::{PdfSuiteError, Result};
use crate::model::font::{decode_win_ansi, encode_win_ansi};
use crate::model::{Color, ContentInstruction, FontId, ImageId, ShapeKind, TextRender};

/// Private stream-dictionary key marking an overlay content stream.
pub(crate) const OVERLAY_KEY: &str = "PdfSuiteOverlay";

const TAG_TEXT: &str = "PsText";
const TAG_IMAGE: &str = "PsImage";
const TAG_RECTANGLE: &str = "PsRectangle";
const TAG_OUTLINE: &str = "PsOutline";
const TAG_ELLIPSE: &str = "PsEllipse";
const TAG_LINE: &str = "PsLine";

/// Bezier control distance for a quarter circle of radius 1.
const KAPPA: f32 = 0.552_284_8;

pub(crate) fn font_resource_name(id: FontId) -> String {
    format!("PsF{}", id.0)
}

pub(crate) fn image_resource_name(id: ImageId) -> String {
    format!("PsIm{}", id.0)
}

pub(crate) fn parse_font_resource_name(name: &[u8]) -> Option<FontId> {
    parse_suffix(name, b"PsF").map(FontId)
}

pub(crate) fn parse_image_resource_name(name: &[u8]) -> Option<ImageId> {
    parse_suffix(name, b"PsIm").map(ImageId)
}

pub(crate) fn is_overlay_resource_name(name: &[u8]) -> bool {
    parse_font_resource_name(name).is_some()
        || parse_image_resource_name(name).is_some()
        || parse_suffix(name, b"PsGs").is_some()
}

fn parse_suffix(name: &[u8], prefix: &[u8]) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// An encoded overlay plus the resources its operators name.
#[derive(Debug, Default)]
pub(crate) struct EncodedOverlay {
    pub content: Vec<u8>,
    pub fonts: BTreeSet<FontId>,
    pub images: BTreeSet<ImageId>,
    /// ExtGState resource name to fill/stroke alpha.
    pub opacities: BTreeMap<String, f32>,
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn color_operands(color: Color) -> Vec<Object> {
    let c = color.clamped();
    vec![real(c.r), real(c.g), real(c.b)]
}

pub(crate) fn encode(instructions: &[ContentInstruction]) -> Result<EncodedOverlay> {
    let mut out = EncodedOverlay::default();
    let mut ops = Vec::new();

    for instruction in instructions {
        match instruction {
            ContentInstruction::Text {
                content,
                x,
                y,
                font,
                size,
                color,
                render,
            } => {
                out.fonts.insert(*font);
                ops.push(op("BMC", vec![name(TAG_TEXT)]));
                ops.push(op("q", vec![]));
                ops.push(op("BT", vec![]));
                ops.push(op("Tf", vec![name(&font_resource_name(*font)), real(*size)]));
                ops.push(op("rg", color_operands(*color)));
                ops.push(op("Tr", vec![Object::Integer(render.mode())]));
                ops.push(op("Td", vec![real(*x), real(*y)]));
                ops.push(op(
                    "Tj",
                    vec![Object::String(encode_win_ansi(content), StringFormat::Hexadecimal)],
                ));
                ops.push(op("ET", vec![]));
                ops.push(op("Q", vec![]));
                ops.push(op("EMC", vec![]));
            }
            ContentInstruction::Image {
                image,
                x,
                y,
                width,
                height,
            } => {
                out.images.insert(*image);
                ops.push(op("BMC", vec![name(TAG_IMAGE)]));
                ops.push(op("q", vec![]));
                ops.push(op(
                    "cm",
                    vec![real(*width), real(0.0), real(0.0), real(*height), real(*x), real(*y)],
                ));
                ops.push(op("Do", vec![name(&image_resource_name(*image))]));
                ops.push(op("Q", vec![]));
                ops.push(op("EMC", vec![]));
            }
            ContentInstruction::Shape {
                kind,
                x,
                y,
                width,
                height,
                color,
                opacity,
            } => {
                let tag = match kind {
                    ShapeKind::Rectangle => TAG_RECTANGLE,
                    ShapeKind::Outline => TAG_OUTLINE,
                    ShapeKind::Ellipse => TAG_ELLIPSE,
                    ShapeKind::Line => TAG_LINE,
                };
                let stroked = matches!(kind, ShapeKind::Outline | ShapeKind::Line);
                ops.push(op("BMC", vec![name(tag)]));
                ops.push(op("q", vec![]));
                if *opacity < 1.0 {
                    let gs = opacity_resource_name(&mut out.opacities, *opacity);
                    ops.push(op("gs", vec![name(&gs)]));
                }
                if stroked {
                    ops.push(op("RG", color_operands(*color)));
                    ops.push(op("w", vec![real(1.0)]));
                } else {
                    ops.push(op("rg", color_operands(*color)));
                }
                ops.push(op(
                    "cm",
                    vec![real(1.0), real(0.0), real(0.0), real(1.0), real(*x), real(*y)],
                ));
                shape_path(&mut ops, *kind, *width, *height);
                ops.push(op(if stroked { "S" } else { "f" }, vec![]));
                ops.push(op("Q", vec![]));
                ops.push(op("EMC", vec![]));
            }
        }
    }

    out.content = Content { operations: ops }
        .encode()
        .map_err(|e| PdfSuiteError::SerializationError(format!("overlay content: {}", e)))?;
    Ok(out)
}

fn opacity_resource_name(opacities: &mut BTreeMap<String, f32>, opacity: f32) -> String {
    let opacity = opacity.clamp(0.0, 1.0);
    if let Some((existing, _)) = opacities.iter().find(|(_, v)| **v == opacity) {
        return existing.clone();
    }
    let gs = format!("PsGs{}", opacities.len());
    opacities.insert(gs.clone(), opacity);
    gs
}

/// Path in shape-local coordinates; the origin is moved to `(x, y)` by `cm`.
fn shape_path(ops: &mut Vec<Operation>, kind: ShapeKind, w: f32, h: f32) {
    match kind {
        ShapeKind::Rectangle | ShapeKind::Outline => {
            ops.push(op("re", vec![real(0.0), real(0.0), real(w), real(h)]));
        }
        ShapeKind::Line => {
            ops.push(op("m", vec![real(0.0), real(0.0)]));
            ops.push(op("l", vec![real(w), real(h)]));
        }
        ShapeKind::Ellipse => {
            let (rx, ry) = (w / 2.0, h / 2.0);
            let (kx, ky) = (rx * KAPPA, ry * KAPPA);
            ops.push(op("m", vec![real(w), real(ry)]));
            ops.push(op(
                "c",
                vec![real(w), real(ry + ky), real(rx + kx), real(h), real(rx), real(h)],
            ));
            ops.push(op(
                "c",
                vec![real(rx - kx), real(h), real(0.0), real(ry + ky), real(0.0), real(ry)],
            ));
            ops.push(op(
                "c",
                vec![real(0.0), real(ry - ky), real(rx - kx), real(0.0), real(rx), real(0.0)],
            ));
            ops.push(op(
                "c",
                vec![real(rx + kx), real(0.0), real(w), real(ry - ky), real(w), real(ry)],
            ));
        }
    }
}

fn operands<'a>(ops: &'a [Operation], operator: &str) -> Option<&'a [Object]> {
    ops.iter()
        .find(|o| o.operator == operator)
        .map(|o| o.operands.as_slice())
}

fn num_at(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(number)
}

fn color_from(operands: Option<&[Object]>) -> Color {
    operands
        .map(|o| {
            Color::rgb(
                num_at(o, 0).unwrap_or(0.0),
                num_at(o, 1).unwrap_or(0.0),
                num_at(o, 2).unwrap_or(0.0),
            )
        })
        .unwrap_or_default()
}

/// Decode an overlay stream back into instructions. `opacity_of` resolves an
/// ExtGState resource name to its alpha. Unrecognized sequences are skipped.
pub(crate) fn decode(
    content: &[u8],
    opacity_of: &dyn Fn(&[u8]) -> Option<f32>,
) -> Result<Vec<ContentInstruction>> {
    let content = Content::decode(content)
        .map_err(|e| PdfSuiteError::CorruptDocument(format!("overlay content: {}", e)))?;

    let mut instructions = Vec::new();
    let mut current: Option<(Vec<u8>, Vec<Operation>)> = None;
    for operation in content.operations {
        match operation.operator.as_str() {
            "BMC" => {
                let tag = operation
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default();
                current = Some((tag, Vec::new()));
            }
            "EMC" => {
                if let Some((tag, body)) = current.take() {
                    if let Some(instruction) = decode_block(&tag, &body, opacity_of) {
                        instructions.push(instruction);
                    }
                }
            }
            _ => {
                if let Some((_, body)) = current.as_mut() {
                    body.push(operation);
                }
            }
        }
    }
    Ok(instructions)
}

fn decode_block(
    tag: &[u8],
    ops: &[Operation],
    opacity_of: &dyn Fn(&[u8]) -> Option<f32>,
) -> Option<ContentInstruction> {
    let tag = std::str::from_utf8(tag).ok()?;
    match tag {
        TAG_TEXT => {
            let tf = operands(ops, "Tf")?;
            let font = parse_font_resource_name(tf.first()?.as_name().ok()?)?;
            let td = operands(ops, "Td")?;
            let text = operands(ops, "Tj")?.first()?.as_str().ok()?;
            let render = operands(ops, "Tr")
                .and_then(|o| o.first())
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(0);
            Some(ContentInstruction::Text {
                content: decode_win_ansi(text),
                x: num_at(td, 0)?,
                y: num_at(td, 1)?,
                font,
                size: num_at(tf, 1)?,
                color: color_from(operands(ops, "rg")),
                render: TextRender::from_mode(render),
            })
        }
        TAG_IMAGE => {
            let cm = operands(ops, "cm")?;
            let image = parse_image_resource_name(operands(ops, "Do")?.first()?.as_name().ok()?)?;
            Some(ContentInstruction::Image {
                image,
                x: num_at(cm, 4)?,
                y: num_at(cm, 5)?,
                width: num_at(cm, 0)?,
                height: num_at(cm, 3)?,
            })
        }
        TAG_RECTANGLE | TAG_OUTLINE | TAG_ELLIPSE | TAG_LINE => {
            let cm = operands(ops, "cm")?;
            let (kind, width, height) = match tag {
                TAG_RECTANGLE | TAG_OUTLINE => {
                    let re = operands(ops, "re")?;
                    let kind = if tag == TAG_RECTANGLE {
                        ShapeKind::Rectangle
                    } else {
                        ShapeKind::Outline
                    };
                    (kind, num_at(re, 2)?, num_at(re, 3)?)
                }
                TAG_LINE => {
                    let l = operands(ops, "l")?;
                    (ShapeKind::Line, num_at(l, 0)?, num_at(l, 1)?)
                }
                _ => {
                    let m = operands(ops, "m")?;
                    let c = operands(ops, "c")?;
                    (ShapeKind::Ellipse, num_at(m, 0)?, num_at(c, 5)?)
                }
            };
            let color = match kind {
                ShapeKind::Outline | ShapeKind::Line => color_from(operands(ops, "RG")),
                _ => color_from(operands(ops, "rg")),
            };
            let opacity = operands(ops, "gs")
                .and_then(|o| o.first())
                .and_then(|o| o.as_name().ok())
                .and_then(opacity_of)
                .unwrap_or(1.0);
            Some(ContentInstruction::Shape {
                kind,
                x: num_at(cm, 4)?,
                y: num_at(cm, 5)?,
                width,
                height,
                color,
                opacity,
            })
        }
        _ => None,
    }
}
