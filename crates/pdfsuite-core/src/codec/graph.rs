//! Object-graph utilities shared by load, save and page copying.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use lopdf::{Dictionary, Object, ObjectId};

/// Follow a reference, returning the object itself for direct values.
pub(crate) fn resolve<'a>(graph: &'a lopdf::Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => graph.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn resolve_dict<'a>(graph: &'a lopdf::Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(graph, object).and_then(|o| o.as_dict().ok())
}

/// Integer or real operand as `f32`.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

pub(crate) fn is_type(dict: &Dictionary, name: &[u8]) -> bool {
    dict.get(b"Type")
        .and_then(Object::as_name)
        .map(|n| n == name)
        .unwrap_or(false)
}

/// Rewrite references through `map`. References missing from the map become
/// `null`, so a copied subgraph never points back into its source.
pub(crate) fn remap_object_refs(obj: Object, map: &HashMap<ObjectId, ObjectId>) -> Object {
    match obj {
        Object::Reference(id) => map
            .get(&id)
            .map_or(Object::Null, |new_id| Object::Reference(*new_id)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, map))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), map);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), map);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Ids reachable from `root`. `/Parent` links of page objects are not
/// followed, which keeps a page from dragging its whole tree along.
pub(crate) fn reachable_from(graph: &lopdf::Document, root: ObjectId) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Ok(object) = graph.get_object(id) {
            collect_refs(object, &mut stack);
        }
    }
    seen
}

fn collect_refs(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|o| collect_refs(o, out)),
        Object::Dictionary(dict) => collect_dict_refs(dict, out),
        Object::Stream(stream) => collect_dict_refs(&stream.dict, out),
        _ => {}
    }
}

fn collect_dict_refs(dict: &Dictionary, out: &mut Vec<ObjectId>) {
    let is_page = is_type(dict, b"Page") || is_type(dict, b"Pages");
    for (key, value) in dict.iter() {
        if is_page && key.as_slice() == b"Parent" {
            continue;
        }
        collect_refs(value, out);
    }
}

/// Deep-copy the subgraph rooted at `root` from `source` into `target` under
/// fresh ids. Returns the new id of `root`.
pub(crate) fn import_subgraph(
    source: &lopdf::Document,
    root: ObjectId,
    target: &mut lopdf::Document,
) -> ObjectId {
    let ids = reachable_from(source, root);
    let map: HashMap<ObjectId, ObjectId> = ids
        .iter()
        .filter(|id| source.objects.contains_key(id))
        .map(|id| (*id, target.new_object_id()))
        .collect();

    for (old_id, new_id) in &map {
        if let Some(object) = source.objects.get(old_id) {
            let mut copy = remap_object_refs(object.clone(), &map);
            if let Object::Dictionary(dict) = &mut copy {
                if is_type(dict, b"Page") {
                    dict.remove(b"Parent");
                }
            }
            target.objects.insert(*new_id, copy);
        }
    }

    map.get(&root).copied().unwrap_or_else(|| {
        target.add_object(Object::Dictionary(lopdf::dictionary! { "Type" => "Page" }))
    })
}

/// Collapse byte-identical streams onto one object. Returns how many
/// duplicates were removed.
pub(crate) fn dedupe_streams(graph: &mut lopdf::Document) -> usize {
    let mut first_seen: BTreeMap<(String, Vec<u8>), ObjectId> = BTreeMap::new();
    let mut replacements: HashMap<ObjectId, ObjectId> = HashMap::new();

    for (id, object) in &graph.objects {
        if let Object::Stream(stream) = object {
            let key = (format!("{:?}", stream.dict), stream.content.clone());
            match first_seen.get(&key) {
                Some(kept) => {
                    replacements.insert(*id, *kept);
                }
                None => {
                    first_seen.insert(key, *id);
                }
            }
        }
    }
    if replacements.is_empty() {
        return 0;
    }

    for id in replacements.keys() {
        graph.objects.remove(id);
    }
    let identity: HashMap<ObjectId, ObjectId> = graph
        .objects
        .keys()
        .map(|id| (*id, *id))
        .chain(replacements.iter().map(|(from, to)| (*from, *to)))
        .collect();
    let objects = std::mem::take(&mut graph.objects);
    graph.objects = objects
        .into_iter()
        .map(|(id, object)| (id, remap_object_refs(object, &identity)))
        .collect();
    let trailer = std::mem::take(&mut graph.trailer);
    if let Object::Dictionary(trailer) = remap_object_refs(Object::Dictionary(trailer), &identity)
    {
        graph.trailer = trailer;
    }
    replacements.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_remap_drops_unknown_references() {
        let map: HashMap<ObjectId, ObjectId> = [((1, 0), (10, 0))].into_iter().collect();
        let obj = Object::Array(vec![Object::Reference((1, 0)), Object::Reference((2, 0))]);
        let remapped = remap_object_refs(obj, &map);
        let items = remapped.as_array().unwrap();
        assert_eq!(items[0].as_reference().unwrap(), (10, 0));
        assert!(matches!(items[1], Object::Null));
    }

    #[test]
    fn test_reachability_skips_page_parent() {
        let mut doc = lopdf::Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => vec![page_id.into()] }),
        );

        let reached = reachable_from(&doc, page_id);
        assert!(reached.contains(&content_id));
        assert!(!reached.contains(&pages_id));
    }

    #[test]
    fn test_import_subgraph_uses_fresh_ids() {
        let mut source = lopdf::Document::with_version("1.7");
        let content_id = source.add_object(Stream::new(dictionary! {}, b"0 0 m".to_vec()));
        let page_id = source.add_object(dictionary! {
            "Type" => "Page",
            "Contents" => content_id,
            "Parent" => (99, 0),
        });

        let mut target = lopdf::Document::with_version("1.7");
        target.add_object(Object::Integer(1));
        let new_page = import_subgraph(&source, page_id, &mut target);

        let dict = target.get_object(new_page).unwrap().as_dict().unwrap();
        assert!(dict.get(b"Parent").is_err());
        let new_content = dict.get(b"Contents").unwrap().as_reference().unwrap();
        assert_ne!(new_content, content_id);
        assert_eq!(
            target.get_object(new_content).unwrap().as_stream().unwrap().content,
            b"0 0 m".to_vec()
        );
    }

    #[test]
    fn test_dedupe_streams_rewrites_references() {
        let mut doc = lopdf::Document::with_version("1.7");
        let a = doc.add_object(Stream::new(dictionary! { "Subtype" => "Image" }, vec![1, 2, 3]));
        let b = doc.add_object(Stream::new(dictionary! { "Subtype" => "Image" }, vec![1, 2, 3]));
        let holder = doc.add_object(dictionary! { "A" => a, "B" => b });

        assert_eq!(dedupe_streams(&mut doc), 1);
        let dict = doc.get_object(holder).unwrap().as_dict().unwrap();
        assert_eq!(
            dict.get(b"A").unwrap().as_reference().unwrap(),
            dict.get(b"B").unwrap().as_reference().unwrap()
        );
        assert_eq!(doc.objects.len(), 2);
    }
}
