use std::collections::HashMap;

use lopdf::{Dictionary, Object, ObjectId};
use tracing::{debug, warn};

use super::graph::{number, resolve, resolve_dict};
use super::overlay_stream::{self, OVERLAY_KEY};
use super::LoadOptions;
use crate::encryption;
use crate::error::{PdfSuiteError, Result};
use crate::image;
use crate::pages::DEFAULT_PAGE_SIZE;
use crate::model::{
    ContentInstruction, Document, DocumentInfo, FontId, FontResource, ImageId, MediaBox, Page,
    ResourcePool, Rotation, SecurityState, StandardFont,
};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

pub(crate) fn load(bytes: &[u8], options: &LoadOptions) -> Result<Document> {
    let mut graph = lopdf::Document::load_mem(bytes)
        .map_err(|e| PdfSuiteError::CorruptDocument(e.to_string()))?;

    let permissions = encryption::open(&mut graph, options.password.as_deref())?;
    let security = SecurityState {
        encrypted: permissions.is_some(),
        permissions,
    };

    let (width, height) = options.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let fallback = MediaBox::from_size(width, height);
    let page_ids: Vec<ObjectId> = graph.get_pages().into_values().collect();
    let mut resources = ResourcePool::new();
    let mut pages = Vec::with_capacity(page_ids.len());
    for page_id in &page_ids {
        let (media_box, rotation) = normalize_page(&mut graph, *page_id, fallback)?;
        let mut page = Page::from_base(*page_id, media_box, rotation);
        for instruction in extract_overlay(&mut graph, *page_id, &mut resources)? {
            page.push_instruction(instruction);
        }
        pages.push(page);
    }

    let info = read_info(&graph);
    debug!(
        pages = pages.len(),
        version = %graph.version,
        encrypted = security.encrypted,
        "loaded document"
    );

    Ok(Document {
        graph,
        pages,
        resources,
        info,
        security,
        loaded_pages: page_ids,
    })
}

pub(crate) fn inherited(graph: &lopdf::Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = graph.get_object(page_id).ok()?.as_dict().ok()?;
    // Bounded walk; malformed files can contain /Parent cycles.
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = graph.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

pub(crate) fn read_media_box(graph: &lopdf::Document, object: &Object) -> Option<MediaBox> {
    let values: Vec<f32> = resolve(graph, object)?
        .as_array()
        .ok()?
        .iter()
        .filter_map(|o| resolve(graph, o).and_then(number))
        .collect();
    match values.as_slice() {
        [llx, lly, urx, ury] => Some(MediaBox {
            llx: *llx,
            lly: *lly,
            urx: *urx,
            ury: *ury,
        }),
        _ => None,
    }
}

/// Copy inherited attributes onto the page and make its resource dictionary
/// direct, so the page can be edited and re-parented on its own.
fn normalize_page(
    graph: &mut lopdf::Document,
    page_id: ObjectId,
    fallback: MediaBox,
) -> Result<(MediaBox, Rotation)> {
    let mut resolved: Vec<(&[u8], Object)> = Vec::new();
    for key in INHERITABLE {
        if let Some(value) = inherited(graph, page_id, key) {
            let value = match (key, &value) {
                (b"Resources", Object::Reference(_)) => resolve_dict(graph, &value)
                    .cloned()
                    .map(Object::Dictionary)
                    .unwrap_or_else(|| Object::Dictionary(Dictionary::new())),
                _ => value,
            };
            resolved.push((key, value));
        }
    }

    let media_box = resolved
        .iter()
        .find(|(key, _)| *key == b"MediaBox")
        .and_then(|(_, value)| read_media_box(graph, value))
        .unwrap_or(fallback);
    let rotation = resolved
        .iter()
        .find(|(key, _)| *key == b"Rotate")
        .and_then(|(_, value)| resolve(graph, value).and_then(|o| o.as_i64().ok()))
        .and_then(|degrees| Rotation::from_degrees(degrees).ok())
        .unwrap_or_default();

    let page = graph
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfSuiteError::CorruptDocument(format!("page {:?}: {}", page_id, e)))?;
    for (key, value) in resolved {
        page.set(key, value);
    }
    Ok((media_box, rotation))
}

fn content_refs(page: &Dictionary) -> Vec<ObjectId> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![*id],
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
        _ => Vec::new(),
    }
}

fn is_overlay_stream(graph: &lopdf::Document, id: ObjectId) -> bool {
    graph
        .get_object(id)
        .and_then(Object::as_stream)
        .map(|s| s.dict.has(OVERLAY_KEY.as_bytes()))
        .unwrap_or(false)
}

/// Detach overlay streams written by a previous save from the base page and
/// decode them back into instructions, registering their fonts and images.
fn extract_overlay(
    graph: &mut lopdf::Document,
    page_id: ObjectId,
    pool: &mut ResourcePool,
) -> Result<Vec<ContentInstruction>> {
    let page = graph
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| PdfSuiteError::CorruptDocument(e.to_string()))?;
    let refs = content_refs(page);
    let overlay_ids: Vec<ObjectId> = refs
        .iter()
        .copied()
        .filter(|id| is_overlay_stream(graph, *id))
        .collect();
    if overlay_ids.is_empty() {
        return Ok(Vec::new());
    }

    let resources = page
        .get(b"Resources")
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_default();
    let opacities = overlay_opacities(graph, &resources);
    let opacity_of = |name: &[u8]| opacities.get(name).copied();

    let mut instructions = Vec::new();
    for id in &overlay_ids {
        let stream = graph
            .get_object(*id)
            .and_then(Object::as_stream)
            .map_err(|e| PdfSuiteError::CorruptDocument(e.to_string()))?;
        let content = if stream.dict.has(b"Filter") {
            stream
                .decompressed_content()
                .map_err(|e| PdfSuiteError::CorruptDocument(format!("overlay stream: {}", e)))?
        } else {
            stream.content.clone()
        };
        instructions.extend(overlay_stream::decode(&content, &opacity_of)?);
    }

    let (font_ids, image_ids) = register_resources(graph, &resources, pool);
    for instruction in instructions.iter_mut() {
        match instruction {
            ContentInstruction::Text { font, .. } => {
                if let Some(mapped) = font_ids.get(font) {
                    *font = *mapped;
                }
            }
            ContentInstruction::Image { image, .. } => {
                if let Some(mapped) = image_ids.get(image) {
                    *image = *mapped;
                }
            }
            ContentInstruction::Shape { .. } => {}
        }
    }
    let before = instructions.len();
    instructions.retain(|i| {
        i.font().map_or(true, |f| pool.font(f).is_some())
            && i.image().map_or(true, |img| pool.image(img).is_some())
    });
    if instructions.len() != before {
        warn!(
            dropped = before - instructions.len(),
            "overlay instructions referenced missing resources"
        );
    }

    detach_overlay(graph, page_id, &refs, &overlay_ids)?;
    Ok(instructions)
}

fn overlay_opacities(graph: &lopdf::Document, resources: &Dictionary) -> HashMap<Vec<u8>, f32> {
    let Some(states) = resources
        .get(b"ExtGState")
        .ok()
        .and_then(|o| resolve_dict(graph, o))
    else {
        return HashMap::new();
    };
    states
        .iter()
        .filter(|(name, _)| overlay_stream::is_overlay_resource_name(name))
        .filter_map(|(name, value)| {
            let state = resolve_dict(graph, value)?;
            let alpha = state.get(b"ca").ok().and_then(number)?;
            Some((name.clone(), alpha))
        })
        .collect()
}

fn sub_dict<'a>(graph: &'a lopdf::Document, resources: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    resources.get(key).ok().and_then(|o| resolve_dict(graph, o))
}

/// Put the fonts and images named by an overlay into the pool. Returns the
/// id translation for names whose id is already taken by a different
/// resource (pages merged from unrelated saves).
fn register_resources(
    graph: &lopdf::Document,
    resources: &Dictionary,
    pool: &mut ResourcePool,
) -> (HashMap<FontId, FontId>, HashMap<ImageId, ImageId>) {
    let mut font_ids = HashMap::new();
    if let Some(fonts) = sub_dict(graph, resources, b"Font") {
        for (name, value) in fonts.iter() {
            let Some(id) = overlay_stream::parse_font_resource_name(name) else {
                continue;
            };
            let font = resolve_dict(graph, value)
                .and_then(|d| d.get(b"BaseFont").ok())
                .and_then(|o| o.as_name().ok())
                .and_then(|n| std::str::from_utf8(n).ok())
                .and_then(StandardFont::from_base_font);
            let Some(font) = font else { continue };
            let resource = FontResource { font };
            let mapped = match pool.font(id) {
                None => {
                    pool.insert_font(id, resource);
                    id
                }
                Some(existing) if *existing == resource => id,
                Some(_) => pool.embed_font(font),
            };
            font_ids.insert(id, mapped);
        }
    }

    let mut image_ids = HashMap::new();
    if let Some(xobjects) = sub_dict(graph, resources, b"XObject") {
        for (name, value) in xobjects.iter() {
            let Some(id) = overlay_stream::parse_image_resource_name(name) else {
                continue;
            };
            let Some(stream) = resolve(graph, value).and_then(|o| o.as_stream().ok()) else {
                continue;
            };
            let smask = stream
                .dict
                .get(b"SMask")
                .ok()
                .and_then(|o| resolve(graph, o))
                .and_then(|o| o.as_stream().ok());
            let Some(resource) = image::resource_from_xobject(stream, smask) else {
                continue;
            };
            let mapped = match pool.image(id) {
                None => {
                    pool.insert_image(id, resource);
                    id
                }
                Some(existing) if *existing == resource => id,
                Some(_) => pool.embed_image(resource),
            };
            image_ids.insert(id, mapped);
        }
    }
    (font_ids, image_ids)
}

fn detach_overlay(
    graph: &mut lopdf::Document,
    page_id: ObjectId,
    refs: &[ObjectId],
    overlay_ids: &[ObjectId],
) -> Result<()> {
    let page = graph
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfSuiteError::CorruptDocument(e.to_string()))?;

    let remaining: Vec<Object> = refs
        .iter()
        .filter(|id| !overlay_ids.contains(id))
        .map(|id| Object::Reference(*id))
        .collect();
    if remaining.is_empty() {
        page.remove(b"Contents");
    } else {
        page.set("Contents", Object::Array(remaining));
    }

    if let Ok(Object::Dictionary(resources)) = page.get_mut(b"Resources") {
        for key in [&b"Font"[..], b"XObject", b"ExtGState"] {
            if let Ok(Object::Dictionary(entries)) = resources.get_mut(key) {
                let names: Vec<Vec<u8>> = entries
                    .iter()
                    .map(|(name, _)| name.clone())
                    .filter(|name| overlay_stream::is_overlay_resource_name(name))
                    .collect();
                for name in names {
                    entries.remove(&name);
                }
            }
        }
    }
    Ok(())
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise PDFDocEncoding
/// (treated as Latin-1).
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn read_info(graph: &lopdf::Document) -> DocumentInfo {
    let Some(info) = graph
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| resolve_dict(graph, o))
    else {
        return DocumentInfo::default();
    };
    let text = |key: &[u8]| {
        info.get(key)
            .ok()
            .and_then(|o| o.as_str().ok())
            .map(decode_text_string)
            .filter(|s| !s.is_empty())
    };
    DocumentInfo {
        title: text(b"Title"),
        author: text(b"Author"),
        subject: text(b"Subject"),
        producer: text(b"Producer"),
    }
}
