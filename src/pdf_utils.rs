//! Adapter presenting a [`lopdf::Document`] as a searchable object graph.

use crate::graph::{GraphMap, GraphValue, ObjectSource};
use crate::{Result, XfaError};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Render a PDF name as a graph key, restoring the leading slash lopdf strips.
pub(crate) fn name_key(name: &[u8]) -> String {
    format!("/{}", String::from_utf8_lossy(name))
}

/// Convert a dictionary one level deep. Inline dictionaries and arrays are
/// converted recursively; indirect references are left as handles.
pub(crate) fn dictionary_to_map(dict: &Dictionary) -> GraphMap {
    dict.iter()
        .map(|(key, value)| (name_key(key), object_to_value(value)))
        .collect()
}

/// The trailer dictionary, the root from which `/Root` → `/AcroForm` → `/XFA`
/// is reachable.
pub(crate) fn trailer_map(document: &Document) -> GraphMap {
    dictionary_to_map(&document.trailer)
}

fn object_to_value(object: &Object) -> GraphValue {
    match object {
        Object::Null => GraphValue::Null,
        Object::Boolean(b) => GraphValue::Scalar(b.to_string()),
        Object::Integer(i) => GraphValue::Scalar(i.to_string()),
        Object::Real(r) => GraphValue::Scalar(r.to_string()),
        Object::Name(name) => GraphValue::Scalar(name_key(name)),
        Object::String(bytes, _) => GraphValue::Scalar(String::from_utf8_lossy(bytes).into_owned()),
        Object::Array(items) => GraphValue::Sequence(items.iter().map(object_to_value).collect()),
        Object::Dictionary(dict) => GraphValue::Map(dictionary_to_map(dict)),
        // Streams are always indirect in a conforming file; an inline one has
        // no id to read content through, so only its dictionary is kept.
        Object::Stream(stream) => GraphValue::Map(dictionary_to_map(&stream.dict)),
        Object::Reference(id) => GraphValue::Reference(*id),
    }
}

impl ObjectSource for Document {
    fn resolve(&self, id: ObjectId) -> Result<GraphValue> {
        let object = self
            .get_object(id)
            .map_err(|_| XfaError::UnresolvedObject(id))?;

        Ok(match object {
            Object::Stream(stream) => GraphValue::Stream {
                id,
                dict: dictionary_to_map(&stream.dict),
            },
            other => object_to_value(other),
        })
    }

    fn stream_bytes(&self, id: ObjectId) -> Result<Vec<u8>> {
        let stream = self
            .get_object(id)
            .map_err(|_| XfaError::UnresolvedObject(id))?
            .as_stream()
            .map_err(|_| XfaError::NotAStream(id))?;

        // Unfiltered streams have nothing to decompress.
        Ok(stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream, StringFormat};

    #[test]
    fn names_keep_their_slash() {
        assert_eq!(name_key(b"XFA"), "/XFA");
    }

    #[test]
    fn dictionaries_convert_in_order_with_references_unresolved() {
        let dict = dictionary! {
            "Type" => "Catalog",
            "AcroForm" => Object::Reference((7, 0)),
            "Count" => Object::Integer(3),
            "T" => Object::String(b"title".to_vec(), StringFormat::Literal),
        };

        let map = dictionary_to_map(&dict);
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["/Type", "/AcroForm", "/Count", "/T"]);
        assert_eq!(map["/Type"], GraphValue::from("/Catalog"));
        assert_eq!(map["/AcroForm"], GraphValue::Reference((7, 0)));
        assert_eq!(map["/Count"], GraphValue::from("3"));
        assert_eq!(map["/T"], GraphValue::from("title"));
    }

    #[test]
    fn document_resolves_streams_with_their_id() {
        let mut doc = Document::with_version("1.7");
        let id = doc.add_object(Stream::new(dictionary! {}, b"<xdp/>".to_vec()));

        match ObjectSource::resolve(&doc, id).unwrap() {
            GraphValue::Stream { id: got, .. } => assert_eq!(got, id),
            other => panic!("expected a stream, got {other:?}"),
        }
        assert_eq!(doc.stream_bytes(id).unwrap(), b"<xdp/>");
        assert!(matches!(ObjectSource::resolve(&doc, (99, 0)), Err(XfaError::UnresolvedObject(_))));
    }

    #[test]
    fn non_stream_objects_have_no_bytes() {
        let mut doc = Document::with_version("1.7");
        let id = doc.add_object(dictionary! { "Kind" => "Plain" });
        assert!(matches!(doc.stream_bytes(id), Err(XfaError::NotAStream(_))));
    }
}
