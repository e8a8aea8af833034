//! Compression policy: tiered raster re-encoding plus optional structural
//! compaction at save time.
//!
//! Sizes in the report are measured, never estimated. A tier that fails to
//! shrink a document reports exactly that.

use std::collections::HashMap;
use std::str::FromStr;

use image::imageops::FilterType;
use image::DynamicImage;
use lopdf::{Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{self, number, resolve, SaveOptions};
use crate::config::{CompressionConfig, TierSettings};
use crate::error::{PdfSuiteError, Result};
use crate::image::{deflate, inflate, raw_to_dynamic, resource_pixels};
use crate::model::{
    ColorSpace, ContentInstruction, Document, ImageEncoding, ImageId, ImageResource,
};

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionTier {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionTier {
    pub fn settings(self, config: &CompressionConfig) -> TierSettings {
        match self {
            CompressionTier::Low => config.low,
            CompressionTier::Medium => config.medium,
            CompressionTier::High => config.high,
        }
    }
}

impl FromStr for CompressionTier {
    type Err = PdfSuiteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionTier::Low),
            "medium" => Ok(CompressionTier::Medium),
            "high" => Ok(CompressionTier::High),
            other => Err(PdfSuiteError::invalid_option(
                "tier",
                format!("expected low, medium or high, got '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionReport {
    pub tier: CompressionTier,
    /// Size of the input saved with default options.
    pub original_size: usize,
    /// Length of `bytes`.
    pub compressed_size: usize,
    pub images_total: usize,
    pub images_reencoded: usize,
    pub images_skipped: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl CompressionReport {
    /// Fraction of the original size saved; negative when the output grew.
    pub fn savings_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        1.0 - self.compressed_size as f64 / self.original_size as f64
    }
}

#[derive(Default)]
struct Tally {
    total: usize,
    reencoded: usize,
    skipped: usize,
}

/// Re-encode raster content per `tier` and save. `doc` is not modified.
pub fn compress(
    doc: &Document,
    tier: CompressionTier,
    config: &CompressionConfig,
) -> Result<CompressionReport> {
    let settings = tier.settings(config);
    let original_size = codec::save(doc, &SaveOptions::default())?.len();

    let mut work = doc.clone();
    let mut tally = Tally::default();
    compress_pool_images(&mut work, &settings, &mut tally)?;
    compress_base_images(&mut work, &settings, &mut tally)?;

    let bytes = codec::save(
        &work,
        &SaveOptions {
            encryption: None,
            compact: settings.structural_compaction,
        },
    )?;
    let report = CompressionReport {
        tier,
        original_size,
        compressed_size: bytes.len(),
        images_total: tally.total,
        images_reencoded: tally.reencoded,
        images_skipped: tally.skipped,
        bytes,
    };
    info!(
        ?tier,
        original = report.original_size,
        compressed = report.compressed_size,
        reencoded = report.images_reencoded,
        skipped = report.images_skipped,
        "compressed document"
    );
    Ok(report)
}

/// Pixel size to aim for when an image displayed at `display` points must
/// not exceed `max_dpi`. `None` when the image is already within bounds.
fn target_pixels(pixels: (u32, u32), display: (f32, f32), max_dpi: Option<f32>) -> Option<(u32, u32)> {
    let max_dpi = max_dpi?;
    let (px_w, px_h) = (pixels.0 as f32, pixels.1 as f32);
    let (in_w, in_h) = (display.0.abs() / POINTS_PER_INCH, display.1.abs() / POINTS_PER_INCH);
    if in_w <= 0.0 || in_h <= 0.0 {
        return None;
    }
    // Keep both axes at or above max_dpi.
    let scale = ((in_w * max_dpi) / px_w).max((in_h * max_dpi) / px_h);
    if scale >= 1.0 {
        return None;
    }
    let w = ((px_w * scale).round() as u32).max(1);
    let h = ((px_h * scale).round() as u32).max(1);
    Some((w, h))
}

fn encode_jpeg(image: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let (width, height) = (image.width(), image.height());
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(PdfSuiteError::OperationError(format!(
            "{}x{} exceeds JPEG dimensions",
            width, height
        )));
    }
    let (data, color_type) = match image {
        DynamicImage::ImageLuma8(gray) => (gray.as_raw().clone(), jpeg_encoder::ColorType::Luma),
        other => (other.to_rgb8().into_raw(), jpeg_encoder::ColorType::Rgb),
    };

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
    encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
    encoder
        .encode(&data, width as u16, height as u16, color_type)
        .map_err(|e| PdfSuiteError::OperationError(format!("JPEG encode: {}", e)))?;
    Ok(jpeg_bytes)
}

fn resample(image: DynamicImage, target: Option<(u32, u32)>) -> DynamicImage {
    match target {
        Some((w, h)) => image.resize_exact(w, h, FilterType::Lanczos3),
        None => image,
    }
}

/// Largest size, in points, at which each pool image is drawn.
fn pool_display_sizes(doc: &Document) -> HashMap<ImageId, (f32, f32)> {
    let mut sizes: HashMap<ImageId, (f32, f32)> = HashMap::new();
    for page in &doc.pages {
        for instruction in page.instructions() {
            if let ContentInstruction::Image {
                image,
                width,
                height,
                ..
            } = instruction
            {
                let entry = sizes.entry(*image).or_insert((0.0, 0.0));
                entry.0 = entry.0.max(width.abs());
                entry.1 = entry.1.max(height.abs());
            }
        }
    }
    sizes
}

fn reencode_pool_image(
    resource: &ImageResource,
    display: (f32, f32),
    settings: &TierSettings,
) -> Result<Option<ImageResource>> {
    if resource.color_space == ColorSpace::Cmyk {
        return Ok(None);
    }
    let target = target_pixels((resource.width, resource.height), display, settings.max_dpi);
    let pixels = resample(resource_pixels(resource)?, target);
    let jpeg = encode_jpeg(&pixels, settings.quality)?;

    let alpha = match (&resource.alpha, target) {
        (Some(alpha), Some((w, h))) => {
            let mask = raw_to_dynamic(inflate(alpha)?, resource.width, resource.height, ColorSpace::Gray)?;
            Some(deflate(mask.resize_exact(w, h, FilterType::Lanczos3).to_luma8().as_raw())?)
        }
        (alpha, _) => alpha.clone(),
    };
    let candidate = ImageResource {
        width: pixels.width(),
        height: pixels.height(),
        color_space: resource.color_space,
        encoding: ImageEncoding::Jpeg(jpeg),
        alpha,
    };
    Ok((candidate.encoded_len() < resource.encoded_len()).then_some(candidate))
}

fn compress_pool_images(doc: &mut Document, settings: &TierSettings, tally: &mut Tally) -> Result<()> {
    let sizes = pool_display_sizes(doc);
    let mut replacements = Vec::new();
    for (id, resource) in doc.resources.images() {
        let Some(display) = sizes.get(&id) else {
            continue;
        };
        tally.total += 1;
        match reencode_pool_image(resource, *display, settings) {
            Ok(Some(smaller)) => replacements.push((id, smaller)),
            Ok(None) => {}
            Err(e) => {
                debug!(image = id.0, error = %e, "skipping overlay image");
                tally.skipped += 1;
            }
        }
    }
    for (id, image) in replacements {
        doc.resources.replace_image(id, image);
        tally.reencoded += 1;
    }
    Ok(())
}

/// For each image XObject named directly by a page, the largest page that
/// uses it. An image cannot usefully display larger than its page.
fn base_display_bounds(doc: &Document) -> HashMap<ObjectId, (f32, f32)> {
    let mut bounds: HashMap<ObjectId, (f32, f32)> = HashMap::new();
    for page in &doc.pages {
        let Some(base) = page.base else { continue };
        let xobjects = doc
            .graph
            .get_object(base)
            .and_then(Object::as_dict)
            .and_then(|d| d.get(b"Resources"))
            .ok()
            .and_then(|r| codec::resolve_dict(&doc.graph, r))
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| codec::resolve_dict(&doc.graph, x));
        let Some(xobjects) = xobjects else { continue };
        for (_, value) in xobjects.iter() {
            if let Ok(id) = value.as_reference() {
                let entry = bounds.entry(id).or_insert((0.0, 0.0));
                entry.0 = entry.0.max(page.width());
                entry.1 = entry.1.max(page.height());
            }
        }
    }
    bounds
}

fn largest_page(doc: &Document) -> (f32, f32) {
    doc.pages.iter().fold((0.0, 0.0), |(w, h), page| {
        (f32::max(w, page.width()), f32::max(h, page.height()))
    })
}

fn is_image_stream(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(Object::as_name)
        .map(|n| n == b"Image")
        .unwrap_or(false)
}

/// Decode a base-graph image if it is one the engine can safely rewrite:
/// 8-bit Gray or RGB, DCT or plain Flate, without masks or decode arrays.
fn decodable_base_image(graph: &lopdf::Document, stream: &Stream) -> Option<(DynamicImage, ColorSpace)> {
    let dict = &stream.dict;
    for key in [&b"SMask"[..], b"Mask", b"Decode", b"DecodeParms", b"ImageMask"] {
        if dict.has(key) {
            return None;
        }
    }
    let bpc = dict.get(b"BitsPerComponent").ok().and_then(|o| resolve(graph, o)).and_then(number)?;
    if bpc != 8.0 {
        return None;
    }
    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| resolve(graph, o))
        .and_then(|o| o.as_name().ok())
        .and_then(ColorSpace::from_pdf_name)
        .filter(|cs| *cs != ColorSpace::Cmyk)?;
    let width = dict.get(b"Width").and_then(Object::as_i64).ok()? as u32;
    let height = dict.get(b"Height").and_then(Object::as_i64).ok()? as u32;

    let filter = match dict.get(b"Filter").ok()? {
        Object::Name(name) => name.clone(),
        Object::Array(items) if items.len() == 1 => items[0].as_name().ok()?.to_vec(),
        _ => return None,
    };
    let image = match filter.as_slice() {
        b"DCTDecode" => image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok()?,
        b"FlateDecode" => raw_to_dynamic(inflate(&stream.content).ok()?, width, height, color_space).ok()?,
        _ => return None,
    };
    Some((image, color_space))
}

fn compress_base_images(doc: &mut Document, settings: &TierSettings, tally: &mut Tally) -> Result<()> {
    let bounds = base_display_bounds(doc);
    let fallback = largest_page(doc);
    let candidates: Vec<ObjectId> = doc
        .graph
        .objects
        .iter()
        .filter(|(_, o)| matches!(o, Object::Stream(s) if is_image_stream(s)))
        .map(|(id, _)| *id)
        .collect();

    for id in candidates {
        tally.total += 1;
        let Ok(Object::Stream(stream)) = doc.graph.get_object(id) else {
            continue;
        };
        let Some((pixels, color_space)) = decodable_base_image(&doc.graph, stream) else {
            tally.skipped += 1;
            continue;
        };
        let display = bounds.get(&id).copied().unwrap_or(fallback);
        let target = target_pixels((pixels.width(), pixels.height()), display, settings.max_dpi);
        let pixels = resample(pixels, target);
        let jpeg = match encode_jpeg(&pixels, settings.quality) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                debug!(object = ?id, error = %e, "skipping base image");
                tally.skipped += 1;
                continue;
            }
        };
        if jpeg.len() >= stream.content.len() {
            continue;
        }

        let mut dict = stream.dict.clone();
        dict.set("Filter", "DCTDecode");
        dict.set("Width", pixels.width() as i64);
        dict.set("Height", pixels.height() as i64);
        dict.set("ColorSpace", color_space.pdf_name());
        let mut replacement = Stream::new(dict, Vec::new());
        replacement.set_content(jpeg);
        replacement.allows_compression = false;
        doc.graph.objects.insert(id, Object::Stream(replacement));
        tally.reencoded += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::fixtures;
    use crate::overlay::{add_image, ImagePlacement};
    use crate::pages::add_page;

    /// One page with a large photo-like PNG drawn small, so every tier has
    /// something to do.
    fn doc_with_image() -> Document {
        let mut doc = Document::new();
        add_page(&mut doc, None).unwrap();
        let png = fixtures::png_rgb(600, 400);
        add_image(
            &mut doc,
            0,
            &png,
            "image/png",
            ImagePlacement {
                x: 72.0,
                y: 72.0,
                width: Some(144.0),
                height: Some(96.0),
            },
        )
        .unwrap();
        doc
    }

    #[test]
    fn test_tier_names() {
        assert_eq!("HIGH".parse::<CompressionTier>().unwrap(), CompressionTier::High);
        assert!("extreme".parse::<CompressionTier>().is_err());
        assert_eq!(serde_json::to_string(&CompressionTier::Low).unwrap(), "\"low\"");
    }

    #[test]
    fn test_target_pixels() {
        // 600px across 2in is 300 dpi; capped at 150 dpi that is 300px.
        assert_eq!(target_pixels((600, 400), (144.0, 96.0), Some(150.0)), Some((300, 200)));
        assert_eq!(target_pixels((600, 400), (144.0, 96.0), Some(300.0)), None);
        assert_eq!(target_pixels((600, 400), (144.0, 96.0), None), None);
    }

    #[test]
    fn test_report_sizes_are_measured() {
        let doc = doc_with_image();
        let report = compress(&doc, CompressionTier::Medium, &CompressionConfig::default()).unwrap();
        assert_eq!(report.compressed_size, report.bytes.len());
        assert_eq!(
            report.original_size,
            codec::save(&doc, &SaveOptions::default()).unwrap().len()
        );
        assert_eq!(report.images_total, 1);
        let back = codec::load(&report.bytes, &codec::LoadOptions::default()).unwrap();
        assert_eq!(back.page_count(), 1);
    }

    #[test]
    fn test_high_is_not_larger_than_low() {
        let doc = doc_with_image();
        let config = CompressionConfig::default();
        let low = compress(&doc, CompressionTier::Low, &config).unwrap();
        let high = compress(&doc, CompressionTier::High, &config).unwrap();
        assert!(high.compressed_size <= low.compressed_size);
    }

    #[test]
    fn test_document_without_images_reports_truthfully() {
        let mut doc = Document::new();
        add_page(&mut doc, None).unwrap();
        let report = compress(&doc, CompressionTier::High, &CompressionConfig::default()).unwrap();
        assert_eq!(report.images_total, 0);
        assert_eq!(report.compressed_size, report.bytes.len());
        assert!(report.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_input_document_is_unchanged() {
        let doc = doc_with_image();
        let before = doc.resources().images().next().map(|(_, i)| i.clone());
        compress(&doc, CompressionTier::High, &CompressionConfig::default()).unwrap();
        let after = doc.resources().images().next().map(|(_, i)| i.clone());
        assert_eq!(before, after);
    }
}
