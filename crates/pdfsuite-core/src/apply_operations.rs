//! Apply edit operations to a document

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{PdfSuiteError, Result};
use crate::model::{Color, Document, Rect, ShapeKind, StandardFont, TextRender, TextStyle};
use crate::operations::EditOperation;
use crate::overlay::{add_image, add_shape, add_text_run, ImagePlacement, TextRun};

/// Margin around a replaced text's box so descenders, accents and viewer
/// rendering differences are covered too.
const COVER_PADDING: f32 = 15.0;

/// ZapfDingbats check mark.
const CHECK_MARK: &str = "4";

/// Parse hex color string (e.g., "#FF0000" or "FF0000") to a [`Color`].
fn parse_hex_color(color: &str) -> Result<Color> {
    Color::from_hex(color)
}

/// Apply `edits` in order. All page indices are checked first and the edits
/// run on a copy, so a failing edit leaves `doc` untouched.
pub fn apply_edits(doc: &mut Document, edits: &[EditOperation], config: &EngineConfig) -> Result<()> {
    if edits.is_empty() {
        return Ok(());
    }
    let indices: Vec<usize> = edits.iter().map(EditOperation::page_index).collect();
    doc.validate_indices(&indices)?;

    let mut staged = doc.clone();
    for edit in edits {
        apply_single_edit(&mut staged, edit, config)?;
    }
    *doc = staged;
    debug!(edits = edits.len(), "applied edits");
    Ok(())
}

fn text_run<'a>(
    content: &'a str,
    x: f32,
    y: f32,
    style: Option<&TextStyle>,
    config: &EngineConfig,
) -> Result<TextRun<'a>> {
    let (font, size, color) = match style {
        Some(style) => (
            style.standard_font_or(config.default_font),
            style.font_size,
            parse_hex_color(&style.color)?,
        ),
        None => (config.default_font, config.default_font_size, Color::BLACK),
    };
    Ok(TextRun {
        content,
        x,
        y,
        font,
        size,
        color,
        render: TextRender::Fill,
    })
}

fn apply_single_edit(doc: &mut Document, edit: &EditOperation, config: &EngineConfig) -> Result<()> {
    match edit {
        EditOperation::Text {
            page_index,
            x,
            y,
            content,
            style,
        } => {
            let run = text_run(content, *x, *y, style.as_ref(), config)?;
            add_text_run(doc, *page_index, &run)
        }
        EditOperation::Image {
            page_index,
            x,
            y,
            width,
            height,
            image,
            mime_type,
        } => {
            let bytes = STANDARD
                .decode(image.trim())
                .map_err(|e| PdfSuiteError::invalid_option("image", e.to_string()))?;
            let placement = ImagePlacement {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            };
            add_image(doc, *page_index, &bytes, mime_type, placement).map(|_| ())
        }
        EditOperation::Highlight {
            page_index,
            x,
            y,
            width,
            height,
            color,
            opacity,
        } => add_shape(
            doc,
            *page_index,
            ShapeKind::Rectangle,
            Rect::new(*x, *y, *width, *height),
            parse_hex_color(color)?,
            *opacity,
        ),
        EditOperation::Rectangle {
            page_index,
            x,
            y,
            width,
            height,
            color,
            filled,
            opacity,
        } => {
            let kind = if *filled {
                ShapeKind::Rectangle
            } else {
                ShapeKind::Outline
            };
            add_shape(
                doc,
                *page_index,
                kind,
                Rect::new(*x, *y, *width, *height),
                parse_hex_color(color)?,
                *opacity,
            )
        }
        EditOperation::Ellipse {
            page_index,
            x,
            y,
            width,
            height,
            color,
            opacity,
        } => add_shape(
            doc,
            *page_index,
            ShapeKind::Ellipse,
            Rect::new(*x, *y, *width, *height),
            parse_hex_color(color)?,
            *opacity,
        ),
        EditOperation::Line {
            page_index,
            x1,
            y1,
            x2,
            y2,
            color,
        } => add_shape(
            doc,
            *page_index,
            ShapeKind::Line,
            Rect::new(*x1, *y1, x2 - x1, y2 - y1),
            parse_hex_color(color)?,
            1.0,
        ),
        EditOperation::WhiteOut {
            page_index,
            x,
            y,
            width,
            height,
        } => add_shape(
            doc,
            *page_index,
            ShapeKind::Rectangle,
            Rect::new(*x, *y, *width, *height),
            Color::WHITE,
            1.0,
        ),
        EditOperation::ReplaceText {
            page_index,
            original,
            x,
            y,
            content,
            style,
        } => {
            let cover = Rect::new(
                original.x - COVER_PADDING,
                original.y - COVER_PADDING,
                original.width + 2.0 * COVER_PADDING,
                original.height + 2.0 * COVER_PADDING,
            );
            let run = text_run(content, *x, *y, style.as_ref(), config)?;
            add_shape(doc, *page_index, ShapeKind::Rectangle, cover, Color::WHITE, 1.0)?;
            add_text_run(doc, *page_index, &run)
        }
        EditOperation::Checkbox {
            page_index,
            x,
            y,
            size,
            checked,
        } => {
            add_shape(
                doc,
                *page_index,
                ShapeKind::Outline,
                Rect::new(*x, *y, *size, *size),
                Color::BLACK,
                1.0,
            )?;
            if *checked {
                let run = TextRun {
                    content: CHECK_MARK,
                    x: x + size * 0.15,
                    y: y + size * 0.2,
                    font: StandardFont::ZapfDingbats,
                    size: size * 0.8,
                    color: Color::BLACK,
                    render: TextRender::Fill,
                };
                add_text_run(doc, *page_index, &run)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, LoadOptions, SaveOptions};
    use crate::image::fixtures;
    use crate::model::ContentInstruction;
    use crate::pages::add_page;
    use pretty_assertions::assert_eq;

    fn one_page() -> Document {
        let mut doc = Document::new();
        add_page(&mut doc, None).unwrap();
        doc
    }

    fn shapes(doc: &Document) -> Vec<(ShapeKind, Rect, Color)> {
        doc.page(0)
            .unwrap()
            .instructions()
            .iter()
            .filter_map(|i| match i {
                ContentInstruction::Shape {
                    kind,
                    x,
                    y,
                    width,
                    height,
                    color,
                    ..
                } => Some((*kind, Rect::new(*x, *y, *width, *height), *color)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_edits_leave_document_alone() {
        let mut doc = one_page();
        apply_edits(&mut doc, &[], &EngineConfig::default()).unwrap();
        assert!(doc.page(0).unwrap().is_blank());
    }

    #[test]
    fn test_text_without_style_uses_config_defaults() {
        let mut doc = one_page();
        let config = EngineConfig {
            default_font: StandardFont::Courier,
            default_font_size: 10.0,
            ..Default::default()
        };
        let edits = [EditOperation::Text {
            page_index: 0,
            x: 100.0,
            y: 700.0,
            content: "Hello World".into(),
            style: None,
        }];
        apply_edits(&mut doc, &edits, &config).unwrap();
        match &doc.page(0).unwrap().instructions()[0] {
            ContentInstruction::Text { font, size, .. } => {
                assert_eq!(doc.resources().font(*font).unwrap().font, StandardFont::Courier);
                assert_eq!(*size, 10.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_replace_text_white_cover_has_padding() {
        let mut doc = one_page();
        let edits = [EditOperation::ReplaceText {
            page_index: 0,
            original: Rect::new(100.0, 700.0, 200.0, 24.0),
            x: 100.0,
            y: 705.0,
            content: "Replacement".into(),
            style: None,
        }];
        apply_edits(&mut doc, &edits, &EngineConfig::default()).unwrap();
        let cover = shapes(&doc);
        assert_eq!(
            cover,
            vec![(ShapeKind::Rectangle, Rect::new(85.0, 685.0, 230.0, 54.0), Color::WHITE)]
        );
        // Cover first, then the new text on top of it.
        assert!(matches!(
            doc.page(0).unwrap().instructions()[1],
            ContentInstruction::Text { .. }
        ));
    }

    #[test]
    fn test_line_and_checkbox() {
        let mut doc = one_page();
        let edits = [
            EditOperation::Line {
                page_index: 0,
                x1: 10.0,
                y1: 20.0,
                x2: 5.0,
                y2: 60.0,
                color: "#FF0000".into(),
            },
            EditOperation::Checkbox {
                page_index: 0,
                x: 50.0,
                y: 50.0,
                size: 20.0,
                checked: true,
            },
        ];
        apply_edits(&mut doc, &edits, &EngineConfig::default()).unwrap();
        let drawn = shapes(&doc);
        assert_eq!(drawn[0].1, Rect::new(10.0, 20.0, -5.0, 40.0));
        assert_eq!(drawn[0].2, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(drawn[1].0, ShapeKind::Outline);
        let fonts: Vec<StandardFont> = doc.resources().fonts().map(|(_, f)| f.font).collect();
        assert_eq!(fonts, vec![StandardFont::ZapfDingbats]);
    }

    #[test]
    fn test_failing_edit_is_atomic() {
        let mut doc = one_page();
        let edits = [
            EditOperation::WhiteOut {
                page_index: 0,
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
            EditOperation::Highlight {
                page_index: 0,
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                color: "not-a-color".into(),
                opacity: 0.5,
            },
        ];
        assert!(apply_edits(&mut doc, &edits, &EngineConfig::default()).is_err());
        assert!(doc.page(0).unwrap().is_blank());

        let out_of_range = [EditOperation::WhiteOut {
            page_index: 9,
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }];
        assert!(matches!(
            apply_edits(&mut doc, &out_of_range, &EngineConfig::default()),
            Err(PdfSuiteError::PageIndexOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn test_image_edit_decodes_base64() {
        let mut doc = one_page();
        let edits = [EditOperation::Image {
            page_index: 0,
            x: 10.0,
            y: 10.0,
            width: Some(30.0),
            height: None,
            image: STANDARD.encode(fixtures::png_rgba(6, 3)),
            mime_type: "image/png".into(),
        }];
        apply_edits(&mut doc, &edits, &EngineConfig::default()).unwrap();
        match &doc.page(0).unwrap().instructions()[0] {
            ContentInstruction::Image { width, height, .. } => {
                assert_eq!((*width, *height), (30.0, 15.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_edited_document_roundtrips() {
        let mut doc = one_page();
        let edits = [
            EditOperation::Highlight {
                page_index: 0,
                x: 50.0,
                y: 600.0,
                width: 300.0,
                height: 20.0,
                color: "#FFFF00".into(),
                opacity: 0.5,
            },
            EditOperation::Text {
                page_index: 0,
                x: 100.0,
                y: 700.0,
                content: "Hello World".into(),
                style: Some(TextStyle::default()),
            },
        ];
        apply_edits(&mut doc, &edits, &EngineConfig::default()).unwrap();
        let bytes = codec::save(&doc, &SaveOptions::default()).unwrap();
        let back = codec::load(&bytes, &LoadOptions::default()).unwrap();
        assert_eq!(back.page(0).unwrap().instructions(), doc.page(0).unwrap().instructions());
    }
}
