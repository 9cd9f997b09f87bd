use crate::{Result, XfaError};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{LocalName, ResolveResult};
use quick_xml::NsReader;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

// ── TreeNode ─────────────────────────────────────────────────────────────────

/// Generic nested representation of an XML document.
///
/// Maps keep document order. Serializing a map (to JSON or YAML) emits its
/// keys sorted, so output is reproducible however the XML was laid out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Text of an element with no children and no attributes; `None` when the
    /// element is empty.
    Leaf(Option<String>),
    /// Values of a tag repeated under one parent, in document order.
    List(Vec<TreeNode>),
    Map(IndexMap<String, TreeNode>),
}

impl TreeNode {
    pub fn leaf(text: impl Into<String>) -> Self {
        TreeNode::Leaf(Some(text.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TreeNode::Leaf(None))
    }

    /// `true` when the node carries no data at all: a null leaf, an empty
    /// list, or a map whose every entry is null (a document whose root
    /// element is empty).
    pub fn is_empty(&self) -> bool {
        match self {
            TreeNode::Leaf(text) => text.is_none(),
            TreeNode::List(items) => items.is_empty(),
            TreeNode::Map(map) => map.values().all(TreeNode::is_null),
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, TreeNode>> {
        match self {
            TreeNode::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` when this node is a map.
    pub fn get(&self, key: &str) -> Option<&TreeNode> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TreeNode::Leaf(text) => text.serialize(serializer),
            TreeNode::List(items) => items.serialize(serializer),
            TreeNode::Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

// ── TreeBuilder ──────────────────────────────────────────────────────────────

/// Turns XML text into a [`TreeNode`].
///
/// Each element becomes:
/// - a leaf holding its text, when it has neither child elements nor
///   attributes;
/// - otherwise a map of its children by tag name, where a repeated tag turns
///   into a list, followed by its attributes. An attribute whose name equals a
///   child tag replaces that child's entry.
///
/// Names bound to a namespace are keyed as `{uri}local`, so
/// `<xfa:data xmlns:xfa="http://www.xfa.org/schema/xfa-data/1.0/">` becomes
/// `{http://www.xfa.org/schema/xfa-data/1.0/}data`. Unprefixed names outside
/// any default namespace stay as written.
///
/// The returned tree is a map with the root element's tag as its only key.
pub struct TreeBuilder;

impl TreeBuilder {
    /// Parse `xml` into a tree.
    ///
    /// ```
    /// use xfaconvert::{TreeBuilder, TreeNode};
    ///
    /// let tree = TreeBuilder::parse("<root><item>a</item><item>b</item></root>").unwrap();
    /// assert_eq!(
    ///     tree.get("root").and_then(|r| r.get("item")),
    ///     Some(&TreeNode::List(vec![TreeNode::leaf("a"), TreeNode::leaf("b")]))
    /// );
    /// ```
    pub fn parse(xml: &str) -> Result<TreeNode> {
        let mut reader = NsReader::from_str(xml);
        let mut open: Vec<Frame> = Vec::new();
        let mut root: Option<(String, TreeNode)> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    Self::reject_second_root(&open, &root)?;
                    open.push(Frame::open(&reader, &start)?);
                }
                Ok(Event::Empty(start)) => {
                    Self::reject_second_root(&open, &root)?;
                    let (name, node) = Frame::open(&reader, &start)?.finish();
                    Self::attach(&mut open, &mut root, name, node);
                }
                Ok(Event::End(_)) => {
                    let frame = open
                        .pop()
                        .ok_or_else(|| malformed("closing tag without an open element"))?;
                    let (name, node) = frame.finish();
                    Self::attach(&mut open, &mut root, name, node);
                }
                Ok(Event::Text(text)) => {
                    let text = text.unescape().map_err(malformed)?;
                    Self::push_text(&mut open, &text)?;
                }
                Ok(Event::CData(data)) => {
                    let bytes = data.into_inner();
                    Self::push_text(&mut open, &String::from_utf8_lossy(&bytes))?;
                }
                Ok(Event::Eof) => break,
                // Declarations, comments, processing instructions, doctype.
                Ok(_) => {}
                Err(e) => {
                    return Err(malformed(format!(
                        "{e} (at byte {})",
                        reader.buffer_position()
                    )))
                }
            }
        }

        if let Some(frame) = open.last() {
            return Err(malformed(format!("unclosed element <{}>", frame.name)));
        }

        let (name, node) = root.ok_or_else(|| malformed("no root element"))?;
        Ok(TreeNode::Map(IndexMap::from([(name, node)])))
    }

    fn reject_second_root(open: &[Frame], root: &Option<(String, TreeNode)>) -> Result<()> {
        if open.is_empty() && root.is_some() {
            return Err(malformed("content after the root element"));
        }
        Ok(())
    }

    fn push_text(open: &mut [Frame], text: &str) -> Result<()> {
        match open.last_mut() {
            Some(frame) => frame.text.push_str(text),
            None if text.trim().is_empty() => {}
            None => return Err(malformed("text outside the root element")),
        }
        Ok(())
    }

    fn attach(
        open: &mut [Frame],
        root: &mut Option<(String, TreeNode)>,
        name: String,
        node: TreeNode,
    ) {
        match open.last_mut() {
            Some(parent) => parent.add_child(name, node),
            None => *root = Some((name, node)),
        }
    }
}

/// An element whose end tag has not been read yet.
struct Frame {
    name: String,
    attributes: Vec<(String, String)>,
    children: IndexMap<String, TreeNode>,
    text: String,
}

impl Frame {
    fn open(reader: &NsReader<&[u8]>, start: &BytesStart) -> Result<Self> {
        let (ns, local) = reader.resolve_element(start.name());
        let name = expanded_name(ns, local)?;

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            // Namespace declarations are not attributes.
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let (ns, local) = reader.resolve_attribute(attr.key);
            let key = expanded_name(ns, local)?;
            let value = attr.unescape_value().map_err(malformed)?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            children: IndexMap::new(),
            text: String::new(),
        })
    }

    fn add_child(&mut self, name: String, node: TreeNode) {
        match self.children.get_mut(&name) {
            Some(TreeNode::List(items)) => items.push(node),
            Some(existing) => {
                let first = std::mem::replace(existing, TreeNode::Leaf(None));
                *existing = TreeNode::List(vec![first, node]);
            }
            None => {
                self.children.insert(name, node);
            }
        }
    }

    fn finish(self) -> (String, TreeNode) {
        if self.children.is_empty() && self.attributes.is_empty() {
            let text = Some(self.text).filter(|t| !t.is_empty());
            return (self.name, TreeNode::Leaf(text));
        }

        let mut map = self.children;
        for (key, value) in self.attributes {
            map.insert(key, TreeNode::Leaf(Some(value)));
        }
        (self.name, TreeNode::Map(map))
    }
}

/// `{uri}local` for a bound name, the bare local name otherwise.
fn expanded_name(ns: ResolveResult, local: LocalName) -> Result<String> {
    let local = String::from_utf8_lossy(local.as_ref());
    match ns {
        ResolveResult::Bound(uri) if !uri.as_ref().is_empty() => Ok(format!(
            "{{{}}}{local}",
            String::from_utf8_lossy(uri.as_ref())
        )),
        ResolveResult::Bound(_) | ResolveResult::Unbound => Ok(local.into_owned()),
        ResolveResult::Unknown(prefix) => Err(malformed(format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn malformed(reason: impl Display) -> XfaError {
    XfaError::MalformedXml(reason.to_string())
}
