//! # xfaconvert
//!
//! A Rust library for pulling XFA form data out of PDF documents and turning it
//! into XML, JSON, YAML or CSV.
//!
//! ## What this crate does
//!
//! 1. **Locate the payload.** Searches the PDF object graph for the `/XFA`
//!    entry of the interactive form.
//! 2. **Extract the payload.** Resolves the candidate streams one by one and
//!    keeps the first whose bytes match the configured [`PayloadSignature`].
//! 3. **Build a tree.** Parses the XML into a [`TreeNode`] map, promoting
//!    repeated sibling tags to lists.
//! 4. **Serialize.** Writes the tree as sorted JSON, block YAML, or a
//!    flattened two-line CSV table; or re-indents the raw XML.
//!
//! ## Quick example
//!
//! ```no_run
//! use xfaconvert::{OutputFormat, XfaDocument};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let form = XfaDocument::from_path("form.pdf")?;
//!
//! println!("{}", form.to_json()?);
//!
//! // Writes form.pdf.csv next to the input.
//! form.save(OutputFormat::Csv)?;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

mod converter;
mod credentials;
mod document;
mod extractor;
mod flatten;
mod graph;
mod locator;
mod pdf_utils;
mod signature;
mod tree;

pub use converter::{FormatConverter, OutputFormat};
pub use credentials::{CredentialProvider, NoPassword, StaticPassword};
pub use document::XfaDocument;
pub use extractor::PayloadExtractor;
pub use flatten::{FlatRecord, Flattener};
pub use graph::{GraphMap, GraphValue, MemoryGraph, ObjectSource};
pub use locator::PayloadLocator;
pub use signature::PayloadSignature;
pub use tree::{TreeBuilder, TreeNode};

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration for [`XfaDocument`] and [`FormatConverter`].
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Key searched for in the object graph. PDF names keep their leading
    /// slash, so the default is `"/XFA"`.
    pub xfa_key: String,

    /// Matcher deciding which candidate stream holds the form data.
    pub signature: PayloadSignature,

    /// Joins nested keys when flattening for CSV output.
    pub flatten_separator: String,

    /// Spaces per nesting level in JSON output.
    pub json_indent: usize,

    /// Spaces per nesting level in re-serialized XML output.
    pub xml_indent: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            xfa_key: "/XFA".into(),
            signature: PayloadSignature::default(),
            flatten_separator: "_".into(),
            json_indent: 4,
            xml_indent: 2,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
#[derive(Error, Debug)]
pub enum XfaError {
    /// No `/XFA` entry was found, or none of its streams matched the signature.
    #[error("No XFA data found in PDF: {0}")]
    PayloadNotFound(String),

    /// The extracted payload is not well-formed XML.
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// The payload parsed to a tree that carries no data.
    #[error("XFA payload is empty")]
    EmptyPayload,

    /// An output kind other than xml, json, yaml or csv was requested.
    #[error("Invalid output format '{0}'. Please use 'json', 'xml', 'yaml', or 'csv'.")]
    UnsupportedFormat(String),

    /// The document is encrypted and no password was supplied.
    #[error("PDF is encrypted and no password was supplied")]
    PasswordRequired,

    /// The supplied password does not open the document.
    #[error("The supplied password does not open the PDF")]
    WrongPassword,

    /// The matching stream is not valid UTF-8.
    #[error("XFA payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// An indirect reference points at an object the graph does not hold.
    #[error("Object {0:?} cannot be resolved")]
    UnresolvedObject(lopdf::ObjectId),

    /// A payload candidate resolved to something other than a stream.
    #[error("Object {0:?} is not a stream")]
    NotAStream(lopdf::ObjectId),

    /// `save` was called on a document that was not loaded from a file.
    #[error("Document was not loaded from a file; use save_to with an explicit path")]
    NoSourcePath,

    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying lopdf parser returned an error.
    #[error("PDF parse error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The CSV writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, XfaError>;
