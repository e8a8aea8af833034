//! Resource pool owned by a single [`Document`](super::Document).
//!
//! Content instructions reference fonts and images by id. Ids are only
//! meaningful inside the pool that issued them; copying a page into another
//! document re-embeds its resources there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::font::StandardFont;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontId(pub u32);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontResource {
    pub font: StandardFont,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    pub fn components(self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    pub fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::Gray => "DeviceGray",
            ColorSpace::Rgb => "DeviceRGB",
            ColorSpace::Cmyk => "DeviceCMYK",
        }
    }

    pub fn from_pdf_name(name: &[u8]) -> Option<Self> {
        match name {
            b"DeviceGray" => Some(ColorSpace::Gray),
            b"DeviceRGB" => Some(ColorSpace::Rgb),
            b"DeviceCMYK" => Some(ColorSpace::Cmyk),
            _ => None,
        }
    }
}

/// How the image samples are stored in the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEncoding {
    /// A complete JPEG file, written with `DCTDecode`.
    Jpeg(Vec<u8>),
    /// zlib-compressed 8-bit samples, written with `FlateDecode`.
    Flate(Vec<u8>),
}

impl ImageEncoding {
    pub fn len(&self) -> usize {
        match self {
            ImageEncoding::Jpeg(data) | ImageEncoding::Flate(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResource {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub encoding: ImageEncoding,
    /// zlib-compressed 8-bit alpha samples, written as an `SMask`.
    pub alpha: Option<Vec<u8>>,
}

impl ImageResource {
    pub fn encoded_len(&self) -> usize {
        self.encoding.len() + self.alpha.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    fonts: BTreeMap<FontId, FontResource>,
    images: BTreeMap<ImageId, ImageResource>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed a font, reusing the existing id when it is already in the pool.
    pub fn embed_font(&mut self, font: StandardFont) -> FontId {
        if let Some((id, _)) = self.fonts.iter().find(|(_, f)| f.font == font) {
            return *id;
        }
        let id = FontId(self.fonts.keys().next_back().map_or(0, |last| last.0 + 1));
        self.fonts.insert(id, FontResource { font });
        id
    }

    /// Embed an image, reusing the existing id for byte-identical images.
    pub fn embed_image(&mut self, image: ImageResource) -> ImageId {
        if let Some((id, _)) = self.images.iter().find(|(_, existing)| **existing == image) {
            return *id;
        }
        let id = ImageId(self.images.keys().next_back().map_or(0, |last| last.0 + 1));
        self.images.insert(id, image);
        id
    }

    pub(crate) fn insert_font(&mut self, id: FontId, font: FontResource) {
        self.fonts.insert(id, font);
    }

    pub(crate) fn insert_image(&mut self, id: ImageId, image: ImageResource) {
        self.images.insert(id, image);
    }

    pub(crate) fn replace_image(&mut self, id: ImageId, image: ImageResource) -> Option<ImageResource> {
        self.images.get_mut(&id).map(|slot| std::mem::replace(slot, image))
    }

    pub fn font(&self, id: FontId) -> Option<&FontResource> {
        self.fonts.get(&id)
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageResource> {
        self.images.get(&id)
    }

    pub fn fonts(&self) -> impl Iterator<Item = (FontId, &FontResource)> {
        self.fonts.iter().map(|(id, f)| (*id, f))
    }

    pub fn images(&self) -> impl Iterator<Item = (ImageId, &ImageResource)> {
        self.images.iter().map(|(id, i)| (*id, i))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}
