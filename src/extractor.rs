use crate::graph::{GraphValue, ObjectSource};
use crate::signature::PayloadSignature;
use crate::{Result, XfaError};

/// Picks the form-data stream out of the value stored under `/XFA`.
///
/// The `/XFA` entry is normally an array alternating packet names and stream
/// references (`[(preamble) 10 0 R (config) 11 0 R (datasets) 12 0 R ...]`).
/// Streams are read one at a time, in order, and reading stops at the first
/// one whose bytes satisfy the [`PayloadSignature`].
pub struct PayloadExtractor<'a, S: ObjectSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: ObjectSource + ?Sized> PayloadExtractor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Extract the payload from a located `/XFA` value.
    ///
    /// Besides the usual array, a single stream (the whole XDP document in one
    /// object) is accepted as a one-element candidate list.
    pub fn extract(&self, located: &GraphValue, signature: &PayloadSignature) -> Result<String> {
        let candidates = match located {
            GraphValue::Sequence(items) => items.as_slice(),
            single @ (GraphValue::Reference(_) | GraphValue::Stream { .. }) => {
                std::slice::from_ref(single)
            }
            _ => {
                return Err(XfaError::PayloadNotFound(
                    "XFA entry is neither an array nor a stream".into(),
                ))
            }
        };

        self.extract_from(candidates, signature)
    }

    /// Return the first candidate stream matching `signature`, decoded as
    /// UTF-8. Names and other direct values in `candidates` are skipped, as
    /// are references whose content cannot be read.
    pub fn extract_from(
        &self,
        candidates: &[GraphValue],
        signature: &PayloadSignature,
    ) -> Result<String> {
        for candidate in candidates {
            let id = match candidate {
                GraphValue::Reference(id) | GraphValue::Stream { id, .. } => *id,
                _ => continue,
            };

            let bytes = match self.source.stream_bytes(id) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("skipping XFA candidate {} {} R: {e}", id.0, id.1);
                    continue;
                }
            };

            if signature.matches(&bytes) {
                log::info!("XFA payload found in object {} {} R ({} bytes)", id.0, id.1, bytes.len());
                return Ok(String::from_utf8(bytes)?);
            }

            log::debug!("XFA candidate {} {} R does not match the signature", id.0, id.1);
        }

        Err(XfaError::PayloadNotFound(format!(
            "none of {} XFA entries matched the payload signature",
            candidates.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use lopdf::ObjectId;
    use std::cell::RefCell;

    const DATASETS: &str = "<xfa:datasets xmlns:xfa=\"http://www.xfa.org/schema/xfa-data/1.0/\"><xfa:data/></xfa:datasets>";

    /// Records every stream read so laziness can be asserted.
    struct Recording {
        inner: MemoryGraph,
        reads: RefCell<Vec<ObjectId>>,
    }

    impl ObjectSource for Recording {
        fn resolve(&self, id: ObjectId) -> Result<GraphValue> {
            self.inner.resolve(id)
        }

        fn stream_bytes(&self, id: ObjectId) -> Result<Vec<u8>> {
            self.reads.borrow_mut().push(id);
            self.inner.stream_bytes(id)
        }
    }

    fn xfa_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph
            .insert_stream((10, 0), b"<xdp:xdp xmlns:xdp=\"http://ns.adobe.com/xdp/\">".to_vec())
            .insert_stream((11, 0), b"<template xmlns=\"http://www.xfa.org/schema/xfa-template/3.3/\"/>".to_vec())
            .insert_stream((12, 0), DATASETS.as_bytes().to_vec())
            .insert_stream((13, 0), b"</xdp:xdp>".to_vec());
        graph
    }

    fn xfa_array() -> GraphValue {
        GraphValue::Sequence(vec![
            GraphValue::from("preamble"),
            GraphValue::Reference((10, 0)),
            GraphValue::from("template"),
            GraphValue::Reference((11, 0)),
            GraphValue::from("datasets"),
            GraphValue::Reference((12, 0)),
            GraphValue::from("postamble"),
            GraphValue::Reference((13, 0)),
        ])
    }

    #[test]
    fn returns_first_matching_stream() {
        let graph = xfa_graph();
        let xml = PayloadExtractor::new(&graph)
            .extract(&xfa_array(), &PayloadSignature::default())
            .unwrap();
        assert_eq!(xml, DATASETS);
    }

    #[test]
    fn stops_reading_after_the_match() {
        let source = Recording {
            inner: xfa_graph(),
            reads: RefCell::new(Vec::new()),
        };

        PayloadExtractor::new(&source)
            .extract(&xfa_array(), &PayloadSignature::default())
            .unwrap();

        assert_eq!(*source.reads.borrow(), vec![(10, 0), (11, 0), (12, 0)]);
    }

    #[test]
    fn scalars_only_is_payload_not_found() {
        let graph = MemoryGraph::new();
        let located = GraphValue::Sequence(vec![GraphValue::from("Mock XFA Data")]);

        let err = PayloadExtractor::new(&graph)
            .extract(&located, &PayloadSignature::default())
            .unwrap_err();
        assert!(matches!(err, XfaError::PayloadNotFound(_)));
    }

    #[test]
    fn unreadable_candidates_are_skipped() {
        let mut graph = MemoryGraph::new();
        graph
            .insert((20, 0), GraphValue::from("not a stream"))
            .insert_stream((21, 0), DATASETS.as_bytes().to_vec());
        let located = GraphValue::Sequence(vec![
            GraphValue::Reference((99, 0)),
            GraphValue::Reference((20, 0)),
            GraphValue::Reference((21, 0)),
        ]);

        let xml = PayloadExtractor::new(&graph)
            .extract(&located, &PayloadSignature::default())
            .unwrap();
        assert_eq!(xml, DATASETS);
    }

    #[test]
    fn single_stream_entry_is_a_candidate() {
        let graph = xfa_graph();
        let xml = PayloadExtractor::new(&graph)
            .extract(&GraphValue::Reference((12, 0)), &PayloadSignature::default())
            .unwrap();
        assert_eq!(xml, DATASETS);
    }

    #[test]
    fn scalar_entry_is_payload_not_found() {
        let graph = xfa_graph();
        let err = PayloadExtractor::new(&graph)
            .extract(&GraphValue::from("oops"), &PayloadSignature::default())
            .unwrap_err();
        assert!(matches!(err, XfaError::PayloadNotFound(_)));
    }

    #[test]
    fn no_match_is_payload_not_found() {
        let graph = xfa_graph();
        let signature = PayloadSignature::Prefix(b"%never".to_vec());
        let err = PayloadExtractor::new(&graph)
            .extract(&xfa_array(), &signature)
            .unwrap_err();
        assert!(matches!(err, XfaError::PayloadNotFound(_)));
    }

    #[test]
    fn invalid_utf8_in_matching_stream_is_an_encoding_error() {
        let mut graph = MemoryGraph::new();
        let mut bytes = b"<xfa:datasets xmlns:xfa=\"x\">".to_vec();
        bytes.push(0xff);
        graph.insert_stream((1, 0), bytes);

        let err = PayloadExtractor::new(&graph)
            .extract(&GraphValue::Reference((1, 0)), &PayloadSignature::default())
            .unwrap_err();
        assert!(matches!(err, XfaError::Encoding(_)));
    }
}
