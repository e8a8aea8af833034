//! Fixture builders shared by the integration tests.

#![allow(dead_code)]

use lopdf::{dictionary, Object, Stream};
use pdfsuite_core::codec::{self, LoadOptions};
use pdfsuite_core::Document;

/// A PDF whose pages are 792 pt tall and `widths[i]` pt wide. Widths are
/// used as page identities: they survive every page operation unchanged.
pub fn pdf_with_widths(widths: &[f32]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(widths.len());
    for (i, &width) in widths.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 50 700 Td (Page-{}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), 792.into()],
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save fixture");
    bytes
}

/// Pages numbered by width: page `i` is `100 + i` points wide.
pub fn numbered_pdf(page_count: usize) -> Vec<u8> {
    let widths: Vec<f32> = (0..page_count).map(|i| 100.0 + i as f32).collect();
    pdf_with_widths(&widths)
}

pub fn load(bytes: &[u8]) -> Document {
    codec::load(bytes, &LoadOptions::default()).expect("load fixture")
}

pub fn widths(doc: &Document) -> Vec<f32> {
    doc.pages().iter().map(|page| page.width()).collect()
}

pub fn page_widths(bytes: &[u8]) -> Vec<f32> {
    widths(&load(bytes))
}

pub fn png_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().expect("png header");
        let data: Vec<u8> = (0..width * height)
            .flat_map(|i| [(i % 256) as u8, 64, 200])
            .collect();
        writer.write_image_data(&data).expect("png data");
    }
    out
}

pub fn jpeg_rgb(width: u16, height: u16) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = jpeg_encoder::Encoder::new(&mut out, 90);
    let data: Vec<u8> = (0..width as u32 * height as u32)
        .flat_map(|i| [(i % 251) as u8, 128, 40])
        .collect();
    encoder
        .encode(&data, width, height, jpeg_encoder::ColorType::Rgb)
        .expect("jpeg encode");
    out
}
