use crate::{Result, XfaError};
use indexmap::IndexMap;
use lopdf::ObjectId;
use std::collections::HashMap;

/// Mapping node of the object graph. Keys are PDF names with their leading
/// slash (`"/AcroForm"`), kept in the order the producer wrote them.
pub type GraphMap = IndexMap<String, GraphValue>;

// ── GraphValue ───────────────────────────────────────────────────────────────

/// A read-only view of one value in a PDF object graph.
///
/// Indirect references stay unresolved until a consumer asks an
/// [`ObjectSource`] for them, so walking the graph only loads what it touches.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    /// Numbers, booleans, names and strings, rendered as text.
    Scalar(String),
    Map(GraphMap),
    Sequence(Vec<GraphValue>),
    /// An indirect reference (`12 0 R`).
    Reference(ObjectId),
    /// A resolved stream object. Its dictionary is searchable like a map;
    /// its content is fetched through [`ObjectSource::stream_bytes`].
    Stream { id: ObjectId, dict: GraphMap },
}

impl GraphValue {
    /// Build a [`GraphValue::Map`] from `(key, value)` pairs, preserving order.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, GraphValue)>,
    {
        GraphValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns the mapping view of a `Map`, or the dictionary of a `Stream`.
    pub fn as_map(&self) -> Option<&GraphMap> {
        match self {
            GraphValue::Map(map) | GraphValue::Stream { dict: map, .. } => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            GraphValue::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        GraphValue::Scalar(value.to_owned())
    }
}

impl From<ObjectId> for GraphValue {
    fn from(id: ObjectId) -> Self {
        GraphValue::Reference(id)
    }
}

// ── ObjectSource ─────────────────────────────────────────────────────────────

/// Capability to dereference the handles found in a [`GraphValue`] tree.
///
/// Implemented for [`lopdf::Document`] and for [`MemoryGraph`].
pub trait ObjectSource {
    /// Look up the object behind `id`. Nested references inside the result
    /// are left unresolved.
    fn resolve(&self, id: ObjectId) -> Result<GraphValue>;

    /// Read the decoded content of the stream behind `id`.
    fn stream_bytes(&self, id: ObjectId) -> Result<Vec<u8>>;
}

// ── MemoryGraph ──────────────────────────────────────────────────────────────

/// An object table held in memory.
///
/// Useful for assembling graphs by hand; missing ids fail to resolve the same
/// way a dangling reference in a damaged PDF would.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    objects: HashMap<ObjectId, GraphValue>,
    streams: HashMap<ObjectId, Vec<u8>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain object under `id`.
    pub fn insert(&mut self, id: ObjectId, value: GraphValue) -> &mut Self {
        self.objects.insert(id, value);
        self
    }

    /// Register a stream object under `id` with an empty dictionary.
    pub fn insert_stream(&mut self, id: ObjectId, content: impl Into<Vec<u8>>) -> &mut Self {
        self.objects.insert(
            id,
            GraphValue::Stream {
                id,
                dict: GraphMap::new(),
            },
        );
        self.streams.insert(id, content.into());
        self
    }
}

impl ObjectSource for MemoryGraph {
    fn resolve(&self, id: ObjectId) -> Result<GraphValue> {
        self.objects
            .get(&id)
            .cloned()
            .ok_or(XfaError::UnresolvedObject(id))
    }

    fn stream_bytes(&self, id: ObjectId) -> Result<Vec<u8>> {
        match self.streams.get(&id) {
            Some(bytes) => Ok(bytes.clone()),
            None if self.objects.contains_key(&id) => Err(XfaError::NotAStream(id)),
            None => Err(XfaError::UnresolvedObject(id)),
        }
    }
}
