//! Raster image embedding: format detection, JPEG/PNG decoding into pool
//! resources, and the image XObject dictionaries written for them.

use std::io::{Cursor, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Object, Stream};

use crate::error::{PdfSuiteError, Result};
use crate::model::{ColorSpace, ImageEncoding, ImageResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Accepts MIME types as well as bare extensions.
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" | "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "image/png" | "png" => Ok(ImageFormat::Png),
            other => Err(PdfSuiteError::UnsupportedImageFormat(other.to_string())),
        }
    }

    /// Detect the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Ok(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Ok(ImageFormat::Png)
        } else {
            Err(PdfSuiteError::UnsupportedImageFormat(
                "unrecognized image signature".to_string(),
            ))
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// Decode image bytes of a declared format into an embeddable resource.
pub fn decode(bytes: &[u8], format: ImageFormat) -> Result<ImageResource> {
    match format {
        ImageFormat::Jpeg => jpeg_resource(bytes),
        ImageFormat::Png => png_resource(bytes),
    }
}

fn jpeg_resource(bytes: &[u8]) -> Result<ImageResource> {
    let (width, height, components) = jpeg_header(bytes)?;
    let color_space = match components {
        1 => ColorSpace::Gray,
        3 => ColorSpace::Rgb,
        4 => ColorSpace::Cmyk,
        n => {
            return Err(PdfSuiteError::UnsupportedImageFormat(format!(
                "JPEG with {} components",
                n
            )))
        }
    };
    Ok(ImageResource {
        width,
        height,
        color_space,
        encoding: ImageEncoding::Jpeg(bytes.to_vec()),
        alpha: None,
    })
}

/// Width, height and component count from the first SOF marker.
pub(crate) fn jpeg_header(data: &[u8]) -> Result<(u32, u32, u8)> {
    let invalid = |reason: &str| PdfSuiteError::UnsupportedImageFormat(format!("JPEG: {}", reason));
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(invalid("missing SOI marker"));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;
        if marker == 0xFF || marker == 0x00 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }

        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if pos + 8 > data.len() {
                return Err(invalid("truncated frame header"));
            }
            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let components = data[pos + 7];
            if width == 0 || height == 0 {
                return Err(invalid("zero dimension"));
            }
            return Ok((width, height, components));
        }

        if pos + 2 > data.len() {
            break;
        }
        pos += u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
    }
    Err(invalid("no frame header"))
}

fn png_resource(bytes: &[u8]) -> Result<ImageResource> {
    let invalid = |e: String| PdfSuiteError::UnsupportedImageFormat(format!("PNG: {}", e));

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(|e| invalid(e.to_string()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| invalid(e.to_string()))?;
    let pixels = &buf[..frame.buffer_size()];

    let (color_space, samples, alpha) = match frame.color_type {
        png::ColorType::Grayscale => (ColorSpace::Gray, pixels.to_vec(), None),
        png::ColorType::Rgb => (ColorSpace::Rgb, pixels.to_vec(), None),
        png::ColorType::GrayscaleAlpha => {
            let (gray, alpha) = split_alpha(pixels, 1);
            (ColorSpace::Gray, gray, Some(alpha))
        }
        png::ColorType::Rgba => {
            let (rgb, alpha) = split_alpha(pixels, 3);
            (ColorSpace::Rgb, rgb, Some(alpha))
        }
        png::ColorType::Indexed => {
            return Err(invalid("palette was not expanded".to_string()));
        }
    };

    // A fully opaque alpha channel carries no information.
    let alpha = alpha.filter(|a| a.iter().any(|&v| v != 0xFF));

    Ok(ImageResource {
        width: frame.width,
        height: frame.height,
        color_space,
        encoding: ImageEncoding::Flate(deflate(&samples)?),
        alpha: alpha.map(|a| deflate(&a)).transpose()?,
    })
}

fn split_alpha(pixels: &[u8], color_channels: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = color_channels + 1;
    let count = pixels.len() / stride;
    let mut color = Vec::with_capacity(count * color_channels);
    let mut alpha = Vec::with_capacity(count);
    for px in pixels.chunks_exact(stride) {
        color.extend_from_slice(&px[..color_channels]);
        alpha.push(px[color_channels]);
    }
    (color, alpha)
}

pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfSuiteError::SerializationError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PdfSuiteError::SerializationError(e.to_string()))
}

pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| PdfSuiteError::CorruptDocument(format!("flate stream: {}", e)))?;
    Ok(out)
}

fn image_dict(width: u32, height: u32, color_space: ColorSpace, filter: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.pdf_name().as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    dict
}

/// The image XObject stream. The caller links the soft mask, if any.
pub(crate) fn xobject_stream(image: &ImageResource) -> Stream {
    let (filter, data) = match &image.encoding {
        ImageEncoding::Jpeg(data) => ("DCTDecode", data),
        ImageEncoding::Flate(data) => ("FlateDecode", data),
    };
    let mut dict = image_dict(image.width, image.height, image.color_space, filter);
    if image.color_space == ColorSpace::Cmyk && matches!(image.encoding, ImageEncoding::Jpeg(_)) {
        dict.set(
            "Decode",
            Object::Array([1, 0, 1, 0, 1, 0, 1, 0].iter().map(|&v| Object::Integer(v)).collect()),
        );
    }
    let mut stream = Stream::new(dict, data.clone());
    stream.allows_compression = false;
    stream
}

pub(crate) fn smask_stream(image: &ImageResource) -> Option<Stream> {
    image.alpha.as_ref().map(|alpha| {
        let dict = image_dict(image.width, image.height, ColorSpace::Gray, "FlateDecode");
        let mut stream = Stream::new(dict, alpha.clone());
        stream.allows_compression = false;
        stream
    })
}

/// Rebuild a pool resource from an image XObject written by
/// [`xobject_stream`].
pub(crate) fn resource_from_xobject(stream: &Stream, smask: Option<&Stream>) -> Option<ImageResource> {
    let dict = &stream.dict;
    let width = dict.get(b"Width").and_then(Object::as_i64).ok()? as u32;
    let height = dict.get(b"Height").and_then(Object::as_i64).ok()? as u32;
    let color_space = dict
        .get(b"ColorSpace")
        .and_then(Object::as_name)
        .ok()
        .and_then(ColorSpace::from_pdf_name)?;
    let encoding = match dict.get(b"Filter").and_then(Object::as_name).ok()? {
        b"DCTDecode" => ImageEncoding::Jpeg(stream.content.clone()),
        b"FlateDecode" => ImageEncoding::Flate(stream.content.clone()),
        _ => return None,
    };
    Some(ImageResource {
        width,
        height,
        color_space,
        encoding,
        alpha: smask.map(|s| s.content.clone()),
    })
}

/// Decode a resource to 8-bit pixels (`Gray` or `Rgb` layout).
pub(crate) fn resource_pixels(image: &ImageResource) -> Result<image::DynamicImage> {
    match &image.encoding {
        ImageEncoding::Jpeg(data) => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
                .map_err(|e| PdfSuiteError::OperationError(format!("JPEG decode: {}", e)))
        }
        ImageEncoding::Flate(data) => {
            let samples = inflate(data)?;
            raw_to_dynamic(samples, image.width, image.height, image.color_space)
        }
    }
}

pub(crate) fn raw_to_dynamic(
    samples: Vec<u8>,
    width: u32,
    height: u32,
    color_space: ColorSpace,
) -> Result<image::DynamicImage> {
    let mismatch = || PdfSuiteError::OperationError("image sample count mismatch".to_string());
    let expected = width as usize * height as usize * color_space.components();
    if samples.len() < expected {
        return Err(mismatch());
    }
    let mut samples = samples;
    samples.truncate(expected);
    match color_space {
        ColorSpace::Gray => image::GrayImage::from_raw(width, height, samples)
            .map(image::DynamicImage::ImageLuma8)
            .ok_or_else(mismatch),
        ColorSpace::Rgb => image::RgbImage::from_raw(width, height, samples)
            .map(image::DynamicImage::ImageRgb8)
            .ok_or_else(mismatch),
        ColorSpace::Cmyk => Err(PdfSuiteError::OperationError(
            "CMYK samples are not re-encoded".to_string(),
        )),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Synthesized images for tests.

    /// An RGB PNG with a horizontal gradient.
    pub fn png_rgb(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let data: Vec<u8> = (0..width * height)
                .flat_map(|i| {
                    let x = (i % width) as u8;
                    [x, 255 - x, (i / width) as u8]
                })
                .collect();
            writer.write_image_data(&data).unwrap();
        }
        out
    }

    /// An RGBA PNG whose left half is transparent.
    pub fn png_rgba(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let data: Vec<u8> = (0..width * height)
                .flat_map(|i| {
                    let alpha = if i % width < width / 2 { 0 } else { 255 };
                    [0, 0, 0, alpha]
                })
                .collect();
            writer.write_image_data(&data).unwrap();
        }
        out
    }

    pub fn jpeg_rgb(width: u16, height: u16) -> Vec<u8> {
        let mut out = Vec::new();
        let encoder = jpeg_encoder::Encoder::new(&mut out, 90);
        let data: Vec<u8> = (0..width as u32 * height as u32)
            .flat_map(|i| [(i % 251) as u8, 128, (i % 7 * 30) as u8])
            .collect();
        encoder
            .encode(&data, width, height, jpeg_encoder::ColorType::Rgb)
            .unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert_eq!(ImageFormat::from_mime("image/jpeg").unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_mime("JPG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_mime("image/png").unwrap(), ImageFormat::Png);
        assert!(matches!(
            ImageFormat::from_mime("image/gif"),
            Err(PdfSuiteError::UnsupportedImageFormat(_))
        ));
    }

    #[test]
    fn test_sniff() {
        assert_eq!(ImageFormat::sniff(&fixtures::png_rgb(2, 2)).unwrap(), ImageFormat::Png);
        assert_eq!(ImageFormat::sniff(&fixtures::jpeg_rgb(8, 8)).unwrap(), ImageFormat::Jpeg);
        assert!(ImageFormat::sniff(b"GIF89a").is_err());
    }

    #[test]
    fn test_jpeg_header_dimensions() {
        let jpeg = fixtures::jpeg_rgb(40, 30);
        assert_eq!(jpeg_header(&jpeg).unwrap(), (40, 30, 3));
        let res = decode(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!(res.color_space, ColorSpace::Rgb);
        assert!(matches!(res.encoding, ImageEncoding::Jpeg(ref d) if d == &jpeg));
    }

    #[test]
    fn test_truncated_jpeg_rejected() {
        assert!(jpeg_header(&[0xFF, 0xD8, 0xFF, 0xC0, 0x00]).is_err());
        assert!(decode(b"not a jpeg", ImageFormat::Jpeg).is_err());
    }

    #[test]
    fn test_png_rgb_decodes_to_flate_samples() {
        let res = decode(&fixtures::png_rgb(5, 3), ImageFormat::Png).unwrap();
        assert_eq!((res.width, res.height), (5, 3));
        assert_eq!(res.color_space, ColorSpace::Rgb);
        assert!(res.alpha.is_none());
        match &res.encoding {
            ImageEncoding::Flate(data) => assert_eq!(inflate(data).unwrap().len(), 5 * 3 * 3),
            other => panic!("unexpected encoding {:?}", other),
        }
    }

    #[test]
    fn test_png_alpha_split_into_mask() {
        let res = decode(&fixtures::png_rgba(4, 2), ImageFormat::Png).unwrap();
        let alpha = inflate(res.alpha.as_ref().unwrap()).unwrap();
        assert_eq!(alpha, vec![0, 0, 255, 255, 0, 0, 255, 255]);
        assert!(smask_stream(&res).is_some());
    }

    #[test]
    fn test_xobject_roundtrip() {
        let res = decode(&fixtures::png_rgba(4, 4), ImageFormat::Png).unwrap();
        let stream = xobject_stream(&res);
        let mask = smask_stream(&res).unwrap();
        assert_eq!(resource_from_xobject(&stream, Some(&mask)).unwrap(), res);
    }

    #[test]
    fn test_resource_pixels() {
        let res = decode(&fixtures::png_rgb(6, 4), ImageFormat::Png).unwrap();
        let img = resource_pixels(&res).unwrap();
        assert_eq!((img.width(), img.height()), (6, 4));
    }
}
