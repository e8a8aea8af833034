use std::collections::{BTreeMap, HashSet};

use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use md5::{Digest, Md5};
use tracing::{debug, info};

use super::graph::{dedupe_streams, is_type, resolve_dict};
use super::overlay_stream::{self, EncodedOverlay, OVERLAY_KEY};
use super::SaveOptions;
use crate::encryption;
use crate::error::{PdfSuiteError, Result};
use crate::image;
use crate::model::{Document, DocumentInfo, FontId, ImageId, Page, ResourcePool, Rotation};

/// Catalog entries that point at pages. They are dropped once any page of
/// the loaded file is gone, since they may name it.
const PAGE_BOUND_CATALOG_KEYS: [&[u8]; 5] = [
    b"Outlines",
    b"PageLabels",
    b"StructTreeRoot",
    b"Dests",
    b"OpenAction",
];

/// Pool resources materialized in the output graph, written once each.
#[derive(Default)]
struct EmittedResources {
    fonts: BTreeMap<FontId, ObjectId>,
    images: BTreeMap<ImageId, ObjectId>,
}

impl EmittedResources {
    fn font(&mut self, graph: &mut lopdf::Document, pool: &ResourcePool, id: FontId) -> Result<ObjectId> {
        if let Some(object_id) = self.fonts.get(&id) {
            return Ok(*object_id);
        }
        let resource = pool
            .font(id)
            .ok_or_else(|| PdfSuiteError::OperationError(format!("font {} not in pool", id.0)))?;
        let mut dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => resource.font.base_font(),
        };
        if resource.font.uses_win_ansi() {
            dict.set("Encoding", "WinAnsiEncoding");
        }
        let object_id = graph.add_object(dict);
        self.fonts.insert(id, object_id);
        Ok(object_id)
    }

    fn image(&mut self, graph: &mut lopdf::Document, pool: &ResourcePool, id: ImageId) -> Result<ObjectId> {
        if let Some(object_id) = self.images.get(&id) {
            return Ok(*object_id);
        }
        let resource = pool
            .image(id)
            .ok_or_else(|| PdfSuiteError::OperationError(format!("image {} not in pool", id.0)))?;
        let mut stream = image::xobject_stream(resource);
        if let Some(mask) = image::smask_stream(resource) {
            let mask_id = graph.add_object(mask);
            stream.dict.set("SMask", mask_id);
        }
        let object_id = graph.add_object(stream);
        self.images.insert(id, object_id);
        Ok(object_id)
    }
}

pub(crate) fn save(doc: &Document, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut graph = doc.graph.clone();
    let pages_id = graph.new_object_id();
    let mut emitted = EmittedResources::default();
    let mut kids = Vec::with_capacity(doc.pages.len());
    let mut written: HashSet<ObjectId> = HashSet::new();

    for page in &doc.pages {
        let page_id = write_page(&mut graph, doc, page, pages_id, &mut written, &mut emitted)?;
        kids.push(Object::Reference(page_id));
    }
    graph.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => doc.pages.len() as i64,
        }),
    );

    let pages_lost = doc.loaded_pages.iter().any(|id| !written.contains(id));
    let catalog_id = write_catalog(&mut graph, pages_id, pages_lost);
    let mut trailer = Dictionary::new();
    trailer.set("Root", catalog_id);
    if let Some(info) = info_dict(&doc.info) {
        trailer.set("Info", graph.add_object(info));
    }
    graph.trailer = trailer;

    drop_stale_pages(&mut graph, &written, pages_id);
    graph.prune_objects();
    raise_version(&mut graph, "1.4");

    if options.compact {
        let merged = dedupe_streams(&mut graph);
        graph.renumber_objects();
        graph.compress();
        debug!(merged_streams = merged, "compacted object graph");
    }

    let mut bytes = serialize(&mut graph)?;
    if let Some(spec) = &options.encryption {
        let file_id = Md5::digest(&bytes).to_vec();
        encryption::seal(&mut graph, spec, file_id)?;
        bytes = serialize(&mut graph)?;
    }

    info!(
        pages = doc.pages.len(),
        bytes = bytes.len(),
        compact = options.compact,
        encrypted = options.encryption.is_some(),
        "saved document"
    );
    Ok(bytes)
}

fn serialize(graph: &mut lopdf::Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    graph
        .save_to(&mut bytes)
        .map_err(|e| PdfSuiteError::SerializationError(e.to_string()))?;
    Ok(bytes)
}

fn write_page(
    graph: &mut lopdf::Document,
    doc: &Document,
    page: &Page,
    pages_id: ObjectId,
    written: &mut HashSet<ObjectId>,
    emitted: &mut EmittedResources,
) -> Result<ObjectId> {
    let mut dict = match page.base {
        Some(base) => graph
            .get_object(base)
            .and_then(Object::as_dict)
            .cloned()
            .map_err(|e| PdfSuiteError::OperationError(format!("page {:?}: {}", base, e)))?,
        None => dictionary! { "Resources" => Dictionary::new() },
    };
    // A base page listed twice gets its own object for the second listing.
    let page_id = match page.base {
        Some(base) if written.insert(base) => base,
        _ => graph.new_object_id(),
    };
    written.insert(page_id);

    let mb = page.media_box();
    dict.set("Type", "Page");
    dict.set("Parent", pages_id);
    dict.set(
        "MediaBox",
        vec![mb.llx.into(), mb.lly.into(), mb.urx.into(), mb.ury.into()],
    );
    match page.rotation() {
        Rotation::None => {
            dict.remove(b"Rotate");
        }
        rotation => dict.set("Rotate", rotation.degrees()),
    }

    if !page.instructions().is_empty() {
        let overlay = overlay_stream::encode(page.instructions())?;
        attach_overlay(graph, doc, &mut dict, overlay, emitted)?;
    }

    graph.objects.insert(page_id, Object::Dictionary(dict));
    Ok(page_id)
}

/// Clone the named sub-dictionary of a resource dictionary into a direct
/// value, so pages sharing it upstream are not affected.
fn owned_sub_dict(graph: &lopdf::Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|o| resolve_dict(graph, o))
        .cloned()
        .unwrap_or_default()
}

fn attach_overlay(
    graph: &mut lopdf::Document,
    doc: &Document,
    page: &mut Dictionary,
    overlay: EncodedOverlay,
    emitted: &mut EmittedResources,
) -> Result<()> {
    let mut resources = page
        .get(b"Resources")
        .ok()
        .and_then(|o| resolve_dict(graph, o))
        .cloned()
        .unwrap_or_default();

    if !overlay.fonts.is_empty() {
        let mut fonts = owned_sub_dict(graph, &resources, b"Font");
        for id in &overlay.fonts {
            let object_id = emitted.font(graph, &doc.resources, *id)?;
            fonts.set(overlay_stream::font_resource_name(*id), object_id);
        }
        resources.set("Font", fonts);
    }
    if !overlay.images.is_empty() {
        let mut xobjects = owned_sub_dict(graph, &resources, b"XObject");
        for id in &overlay.images {
            let object_id = emitted.image(graph, &doc.resources, *id)?;
            xobjects.set(overlay_stream::image_resource_name(*id), object_id);
        }
        resources.set("XObject", xobjects);
    }
    if !overlay.opacities.is_empty() {
        let mut states = owned_sub_dict(graph, &resources, b"ExtGState");
        for (name, alpha) in &overlay.opacities {
            states.set(
                name.as_str(),
                dictionary! { "Type" => "ExtGState", "CA" => *alpha, "ca" => *alpha },
            );
        }
        resources.set("ExtGState", states);
    }
    page.set("Resources", resources);

    let stream = Stream::new(dictionary! { OVERLAY_KEY => true }, overlay.content);
    let stream_id = graph.add_object(stream);
    let mut contents = match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        _ => Vec::new(),
    };
    // Isolate the base content's graphics state from the overlay. The
    // wrappers carry the overlay key too, so load strips them again.
    if !contents.is_empty() {
        let open = graph.add_object(Stream::new(dictionary! { OVERLAY_KEY => true }, b"q".to_vec()));
        let close = graph.add_object(Stream::new(dictionary! { OVERLAY_KEY => true }, b"Q".to_vec()));
        contents.insert(0, Object::Reference(open));
        contents.push(Object::Reference(close));
    }
    contents.push(Object::Reference(stream_id));
    page.set("Contents", contents);
    Ok(())
}

fn write_catalog(graph: &mut lopdf::Document, pages_id: ObjectId, pages_lost: bool) -> ObjectId {
    let mut catalog = graph
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|o| resolve_dict(graph, o))
        .cloned()
        .unwrap_or_default();
    catalog.set("Type", "Catalog");
    catalog.set("Pages", pages_id);
    if pages_lost {
        for key in PAGE_BOUND_CATALOG_KEYS {
            catalog.remove(key);
        }
    }
    graph.add_object(catalog)
}

/// Page objects outside the new tree can still be reachable through
/// annotations or form fields. Cut those links so removed pages and the
/// old page tree are pruned.
fn drop_stale_pages(graph: &mut lopdf::Document, kept: &HashSet<ObjectId>, pages_id: ObjectId) {
    let stale: HashSet<ObjectId> = graph
        .objects
        .iter()
        .filter(|(id, object)| match object {
            Object::Dictionary(dict) => {
                (is_type(dict, b"Page") && !kept.contains(id))
                    || (is_type(dict, b"Pages") && **id != pages_id)
            }
            _ => false,
        })
        .map(|(id, _)| *id)
        .collect();
    if stale.is_empty() {
        return;
    }
    for id in &stale {
        graph.objects.remove(id);
    }
    for object in graph.objects.values_mut() {
        null_references(object, &stale);
    }
}

fn null_references(object: &mut Object, stale: &HashSet<ObjectId>) {
    match object {
        Object::Reference(id) if stale.contains(id) => *object = Object::Null,
        Object::Array(items) => items.iter_mut().for_each(|o| null_references(o, stale)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, o)| null_references(o, stale)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, o)| null_references(o, stale)),
        _ => {}
    }
}

fn parse_version(version: &str) -> (u32, u32) {
    let mut parts = version.trim().split('.').map(|p| p.parse().unwrap_or(0));
    (parts.next().unwrap_or(1), parts.next().unwrap_or(0))
}

fn raise_version(graph: &mut lopdf::Document, minimum: &str) {
    if parse_version(&graph.version) < parse_version(minimum) {
        graph.version = minimum.to_string();
    }
}

/// Encode a PDF text string: literal bytes for ASCII, UTF-16BE with BOM
/// otherwise.
pub(crate) fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn info_dict(info: &DocumentInfo) -> Option<Dictionary> {
    let mut dict = Dictionary::new();
    let fields = [
        ("Title", &info.title),
        ("Author", &info.author),
        ("Subject", &info.subject),
        ("Producer", &info.producer),
    ];
    for (key, value) in fields {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            dict.set(key, encode_text_string(value));
        }
    }
    (!dict.is_empty()).then_some(dict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_raised_not_lowered() {
        let mut graph = lopdf::Document::with_version("1.3");
        raise_version(&mut graph, "1.4");
        assert_eq!(graph.version, "1.4");
        let mut graph = lopdf::Document::with_version("1.7");
        raise_version(&mut graph, "1.4");
        assert_eq!(graph.version, "1.7");
        assert!(parse_version("2.0") > parse_version("1.7"));
    }

    #[test]
    fn test_text_string_encoding() {
        match encode_text_string("Report") {
            Object::String(bytes, StringFormat::Literal) => assert_eq!(bytes, b"Report"),
            other => panic!("unexpected {:?}", other),
        }
        match encode_text_string("Zoë") {
            Object::String(bytes, _) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(super::super::reader::decode_text_string(&bytes), "Zoë");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_info_is_omitted() {
        assert!(info_dict(&DocumentInfo::default()).is_none());
        let info = DocumentInfo {
            title: Some("T".into()),
            ..Default::default()
        };
        assert!(info_dict(&info).unwrap().has(b"Title"));
    }
}
