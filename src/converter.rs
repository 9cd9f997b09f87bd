use crate::flatten::{cell_text, Flattener};
use crate::tree::{TreeBuilder, TreeNode};
use crate::{ConverterConfig, Result, XfaError};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

// ── OutputFormat ─────────────────────────────────────────────────────────────

/// Target representation of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Xml,
    Yaml,
    Csv,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Json,
        OutputFormat::Xml,
        OutputFormat::Yaml,
        OutputFormat::Csv,
    ];

    /// File extension, also the name accepted by [`FromStr`].
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = XfaError;

    fn from_str(s: &str) -> Result<Self> {
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.extension() == s)
            .ok_or_else(|| XfaError::UnsupportedFormat(s.to_owned()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ── FormatConverter ──────────────────────────────────────────────────────────

/// Converts an extracted XFA payload into the supported text formats.
///
/// Every method works from the raw XML, so each call is independent and
/// nothing is cached between them.
///
/// ```
/// use xfaconvert::FormatConverter;
///
/// let converter = FormatConverter::new("<root><data>value</data></root>");
/// assert_eq!(converter.to_csv().unwrap(), "root_data\nvalue\n");
/// assert_eq!(converter.to_yaml().unwrap(), "root:\n  data: value\n");
/// ```
#[derive(Debug, Clone)]
pub struct FormatConverter {
    xml: String,
    config: ConverterConfig,
}

impl FormatConverter {
    pub fn new(xml: impl Into<String>) -> Self {
        Self::with_config(xml, ConverterConfig::default())
    }

    pub fn with_config(xml: impl Into<String>, config: ConverterConfig) -> Self {
        Self {
            xml: xml.into(),
            config,
        }
    }

    /// The payload exactly as extracted.
    pub fn raw_xml(&self) -> &str {
        &self.xml
    }

    /// Parse the payload into a tree.
    pub fn tree(&self) -> Result<TreeNode> {
        TreeBuilder::parse(&self.xml)
    }

    /// Dispatch on an output kind given by name (`"json"`, `"xml"`, `"yaml"`
    /// or `"csv"`). Any other name fails with
    /// [`XfaError::UnsupportedFormat`].
    pub fn convert(&self, kind: &str) -> Result<String> {
        self.convert_to(kind.parse()?)
    }

    pub fn convert_to(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => self.to_json(),
            OutputFormat::Xml => self.to_xml(),
            OutputFormat::Yaml => self.to_yaml(),
            OutputFormat::Csv => self.to_csv(),
        }
    }

    /// The payload re-indented, behind a UTF-8 XML declaration. Comments,
    /// processing instructions and the input's own declaration are dropped.
    ///
    /// Only whitespace between elements is rewritten. Text inside a leaf,
    /// blank or not, is written back unchanged, and a leaf with no content
    /// is written as an empty element.
    pub fn to_xml(&self) -> Result<String> {
        // Same well-formedness rules as the other formats.
        TreeBuilder::parse(&self.xml)?;

        let mut reader = Reader::from_str(&self.xml);
        let mut out = Reindenter::new(self.config.xml_indent);

        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_)) => {}
                Ok(event) => out.push(event)?,
                Err(e) => return Err(XfaError::MalformedXml(e.to_string())),
            }
        }

        let body = String::from_utf8(out.finish())?;
        Ok(format!("{XML_DECLARATION}{body}"))
    }

    /// The tree as JSON with keys sorted at every level.
    pub fn to_json(&self) -> Result<String> {
        let tree = self.tree()?;
        if tree.is_empty() {
            return Err(XfaError::EmptyPayload);
        }

        let indent = " ".repeat(self.config.json_indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        tree.serialize(&mut serializer)?;

        Ok(String::from_utf8(out)?)
    }

    /// The JSON output re-read as a generic value and written as block YAML.
    pub fn to_yaml(&self) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(&self.to_json()?)?;
        Ok(serde_yaml::to_string(&value)?)
    }

    /// A header row of flattened key paths and one row of values.
    ///
    /// The tree is re-read from the JSON output, so columns come out in
    /// sorted key order.
    pub fn to_csv(&self) -> Result<String> {
        let tree: TreeNode = serde_json::from_str(&self.to_json()?)?;
        let record = Flattener::new(self.config.flatten_separator.as_str()).flatten(&tree);
        if record.is_empty() {
            return Err(XfaError::EmptyPayload);
        }

        let cells = record.values().map(cell_text).collect::<Result<Vec<_>>>()?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(record.keys())?;
        writer.write_record(&cells)?;

        let bytes = writer.into_inner().map_err(|e| XfaError::Io(e.into_error()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

// ── XML re-indentation ───────────────────────────────────────────────────────

/// Feeds parsed events to an indenting [`Writer`], holding back each start
/// tag until it is known whether the element is a leaf.
///
/// The writer breaks the line before every tag that does not follow text, so
/// an element with no text of its own would otherwise gain a newline between
/// its tags.
struct Reindenter {
    writer: Writer<Vec<u8>>,
    /// Start tag not yet written, with any blank text read after it.
    held: Option<(BytesStart<'static>, String)>,
}

impl Reindenter {
    fn new(indent: usize) -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', indent),
            held: None,
        }
    }

    fn push(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Start(start) => {
                self.release(false)?;
                self.held = Some((start.into_owned(), String::new()));
            }
            Event::Empty(empty) => {
                self.release(false)?;
                self.write(Event::Empty(empty))?;
            }
            Event::End(end) => match self.held.take() {
                Some((start, blank)) if blank.is_empty() => self.write(Event::Empty(start))?,
                Some((start, blank)) => {
                    self.write(Event::Start(start))?;
                    self.write(Event::Text(BytesText::from_escaped(blank)))?;
                    self.write(Event::End(end))?;
                }
                None => self.write(Event::End(end))?,
            },
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {
                // Blank text counts only while the element is still a leaf.
                if let Some((_, blank)) = self.held.as_mut() {
                    blank.push_str(&String::from_utf8_lossy(&text));
                }
            }
            other => {
                self.release(true)?;
                self.write(other)?;
            }
        }
        Ok(())
    }

    /// Write the held start tag once the element turns out to have content.
    /// Blank text read so far belongs to that content only when it is text;
    /// before a child element it is indentation.
    fn release(&mut self, keep_blank: bool) -> Result<()> {
        if let Some((start, blank)) = self.held.take() {
            self.write(Event::Start(start))?;
            if keep_blank && !blank.is_empty() {
                self.write(Event::Text(BytesText::from_escaped(blank)))?;
            }
        }
        Ok(())
    }

    fn write(&mut self, event: Event) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| XfaError::MalformedXml(e.to_string()))
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "<root><data>value</data></root>";

    #[test]
    fn format_names_parse() {
        for format in OutputFormat::ALL {
            assert_eq!(format.extension().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
        assert!(matches!(
            "JSON".parse::<OutputFormat>(),
            Err(XfaError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let err = FormatConverter::new(SAMPLE).convert("bogus").unwrap_err();
        assert!(matches!(err, XfaError::UnsupportedFormat(ref kind) if kind == "bogus"));
    }

    #[test]
    fn json_is_sorted_and_indented() {
        let json = FormatConverter::new("<root><b>2</b><a>1</a></root>")
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            "{\n    \"root\": {\n        \"a\": \"1\",\n        \"b\": \"2\"\n    }\n}"
        );
    }

    #[test]
    fn json_is_deterministic() {
        let xml = r#"<form z="1"><b><x>1</x><x>2</x></b><a/><c>3</c></form>"#;
        let first = FormatConverter::new(xml).to_json().unwrap();
        let second = FormatConverter::new(xml).to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn json_indent_is_configurable() {
        let config = ConverterConfig {
            json_indent: 2,
            ..Default::default()
        };
        let json = FormatConverter::with_config(SAMPLE, config).to_json().unwrap();
        assert_eq!(json, "{\n  \"root\": {\n    \"data\": \"value\"\n  }\n}");
    }

    #[test]
    fn yaml_is_block_style() {
        let yaml = FormatConverter::new(SAMPLE).to_yaml().unwrap();
        assert_eq!(yaml, "root:\n  data: value\n");

        let yaml = FormatConverter::new("<root><item>a</item><item>b</item></root>")
            .to_yaml()
            .unwrap();
        assert!(!yaml.contains('['), "flow style in {yaml:?}");
        assert!(yaml.contains("- a\n"));
    }

    #[test]
    fn csv_is_header_and_one_row() {
        assert_eq!(
            FormatConverter::new(SAMPLE).to_csv().unwrap(),
            "root_data\nvalue\n"
        );
    }

    #[test]
    fn csv_columns_are_sorted_and_quoted() {
        let csv = FormatConverter::new("<root><b>x, y</b><a>line\nbreak</a><c/></root>")
            .to_csv()
            .unwrap();
        assert_eq!(csv, "root_a,root_b,root_c\n\"line\nbreak\",\"x, y\",\n");
    }

    #[test]
    fn csv_keeps_lists_in_one_cell() {
        let csv = FormatConverter::new("<root><item>a</item><item>b</item></root>")
            .to_csv()
            .unwrap();
        assert_eq!(csv, "root_item\n\"[\"\"a\"\",\"\"b\"\"]\"\n");
    }

    #[test]
    fn csv_separator_is_configurable() {
        let config = ConverterConfig {
            flatten_separator: ".".into(),
            ..Default::default()
        };
        let csv = FormatConverter::with_config(SAMPLE, config).to_csv().unwrap();
        assert_eq!(csv, "root.data\nvalue\n");
    }

    #[test]
    fn empty_tree_is_empty_payload() {
        let converter = FormatConverter::new("<root/>");
        assert!(matches!(converter.convert("csv"), Err(XfaError::EmptyPayload)));
        assert!(matches!(converter.convert("json"), Err(XfaError::EmptyPayload)));
        assert!(matches!(converter.convert("yaml"), Err(XfaError::EmptyPayload)));
    }

    #[test]
    fn malformed_payload_fails_every_format() {
        let converter = FormatConverter::new("<root><a></root>");
        for format in OutputFormat::ALL {
            assert!(
                matches!(converter.convert_to(format), Err(XfaError::MalformedXml(_))),
                "{format} accepted malformed XML"
            );
        }
    }

    #[test]
    fn xml_is_reindented_behind_a_declaration() {
        let xml = FormatConverter::new(
            "<?xml version=\"1.0\"?><!-- c --><root><a>1</a><b><c>2</c></b></root>",
        )
        .to_xml()
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>"));
        assert_eq!(xml.matches("<?xml").count(), 1);
        assert!(xml.contains("\n  <a>1</a>\n"));
        assert!(xml.contains("\n    <c>2</c>\n"));
        assert!(!xml.contains("<!--"));
        assert!(xml.ends_with("</root>"));
    }

    #[test]
    fn xml_leaves_keep_their_content() {
        let xml = FormatConverter::new("<root><b></b><c> </c><d>x</d></root>")
            .to_xml()
            .unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>\n  <b/>\n  <c> </c>\n  <d>x</d>\n</root>"
        );
    }

    #[test]
    fn xml_output_parses_to_the_same_tree() {
        for input in [
            "<root><b></b><c> </c><d>x</d></root>",
            "<root>\n  <a>\n    <b/>\n  </a>\n  <a>  </a>\n  <e f=\"1\"></e>\n</root>",
            "<form><!-- note --><field></field><text><![CDATA[ <raw> ]]></text></form>",
        ] {
            let converter = FormatConverter::new(input);
            let reindented = FormatConverter::new(converter.to_xml().unwrap());
            assert_eq!(reindented.tree().unwrap(), converter.tree().unwrap(), "{input:?}");
        }
    }

    #[test]
    fn xml_does_not_require_data() {
        // Only the tree-based formats reject an empty payload.
        let xml = FormatConverter::new("<root/>").to_xml().unwrap();
        assert!(xml.ends_with("<root/>"));
    }
}
