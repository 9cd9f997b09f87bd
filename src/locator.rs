use crate::graph::{GraphMap, GraphValue, ObjectSource};
use lopdf::ObjectId;
use std::borrow::Cow;
use std::collections::HashSet;

/// Depth-first key search over an object graph.
///
/// Keys are visited in the order the mapping stores them and a key is checked
/// before its value is descended into, so a shallow match always beats a deep
/// one. References are resolved through the [`ObjectSource`] as they are
/// reached; one that fails to resolve is skipped rather than ending the
/// search.
pub struct PayloadLocator<'a, S: ObjectSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: ObjectSource + ?Sized> PayloadLocator<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Return the value stored under `needle`, resolved one level if it is a
    /// reference, or `None` when no reachable mapping contains the key.
    ///
    /// ```
    /// use xfaconvert::{GraphValue, MemoryGraph, PayloadLocator};
    ///
    /// let graph = MemoryGraph::new();
    /// let root = GraphValue::map([
    ///     ("/Root", GraphValue::map([("/XFA", GraphValue::from("deep"))])),
    ///     ("/XFA", GraphValue::from("shallow")),
    /// ]);
    ///
    /// // "/Root" is first in key order, so its subtree is searched first.
    /// let found = PayloadLocator::new(&graph).find("/XFA", root.as_map().unwrap());
    /// assert_eq!(found, Some(GraphValue::from("deep")));
    /// ```
    pub fn find(&self, needle: &str, haystack: &GraphMap) -> Option<GraphValue> {
        let mut entered = HashSet::new();
        self.search(needle, haystack, &mut entered)
    }

    fn search(
        &self,
        needle: &str,
        haystack: &GraphMap,
        entered: &mut HashSet<ObjectId>,
    ) -> Option<GraphValue> {
        for (key, raw) in haystack {
            let value = match raw {
                GraphValue::Reference(id) => match self.source.resolve(*id) {
                    Ok(resolved) => Cow::Owned(resolved),
                    Err(e) => {
                        log::debug!("skipping key {key}: {e}");
                        continue;
                    }
                },
                direct => Cow::Borrowed(direct),
            };

            if key == needle {
                return Some(value.into_owned());
            }

            // Back-links such as /Parent make the graph cyclic.
            if let GraphValue::Reference(id) = raw {
                if !entered.insert(*id) {
                    continue;
                }
            }

            if let Some(map) = value.as_map() {
                if let Some(found) = self.search(needle, map, entered) {
                    return Some(found);
                }
            }
        }

        None
    }
}
