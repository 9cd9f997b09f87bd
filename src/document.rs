use crate::credentials::{CredentialProvider, NoPassword};
use crate::extractor::PayloadExtractor;
use crate::graph::GraphValue;
use crate::locator::PayloadLocator;
use crate::pdf_utils::trailer_map;
use crate::{ConverterConfig, FormatConverter, OutputFormat, Result, XfaError};
use lopdf::Document;
use std::path::{Path, PathBuf};

// ── XfaDocument ──────────────────────────────────────────────────────────────

/// Entry point for extracting and converting the XFA data of a PDF.
///
/// # Creating a document
///
/// ```no_run
/// use xfaconvert::{ConverterConfig, PayloadSignature, StaticPassword, XfaDocument};
///
/// // From a file path
/// let a = XfaDocument::from_path("form.pdf").unwrap();
///
/// // From an in-memory buffer
/// let bytes = std::fs::read("form.pdf").unwrap();
/// let b = XfaDocument::from_bytes(&bytes).unwrap();
///
/// // Encrypted, with a custom payload matcher
/// let cfg = ConverterConfig {
///     signature: PayloadSignature::xfa_prefix(),
///     ..Default::default()
/// };
/// let c = XfaDocument::open("locked.pdf", cfg, &StaticPassword("s3cret".into())).unwrap();
/// ```
pub struct XfaDocument {
    document: Document,
    config: ConverterConfig,
    source_path: Option<PathBuf>,
}

impl XfaDocument {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Load a PDF from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, ConverterConfig::default(), &NoPassword)
    }

    /// Load a PDF from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::open_bytes(data, ConverterConfig::default(), &NoPassword)
    }

    /// Load a PDF from the file system with a custom [`ConverterConfig`].
    pub fn with_config<P: AsRef<Path>>(path: P, config: ConverterConfig) -> Result<Self> {
        Self::open(path, config, &NoPassword)
    }

    /// Load a PDF from the file system, asking `credentials` for a password
    /// if the document is encrypted.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: ConverterConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self> {
        let path = path.as_ref();
        let document = unlock(Document::load(path)?, credentials, |password| {
            Document::load_with_password(path, password)
        })?;

        Ok(Self {
            document,
            config,
            source_path: Some(path.to_path_buf()),
        })
    }

    /// Load a PDF from memory, asking `credentials` for a password if the
    /// document is encrypted.
    pub fn open_bytes(
        data: &[u8],
        config: ConverterConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self> {
        let document = unlock(Document::load_mem(data)?, credentials, |password| {
            Document::load_mem_with_password(data, password)
        })?;

        Ok(Self {
            document,
            config,
            source_path: None,
        })
    }

    /// Wrap a document that is already loaded and readable.
    pub fn from_document(document: Document, config: ConverterConfig) -> Self {
        Self {
            document,
            config,
            source_path: None,
        }
    }

    // ── Extraction ────────────────────────────────────────────────────────────

    /// The value stored under [`ConverterConfig::xfa_key`], searched for from
    /// the trailer dictionary, or `None` if the document has no XFA form.
    pub fn locate_xfa(&self) -> Option<GraphValue> {
        PayloadLocator::new(&self.document).find(&self.config.xfa_key, &trailer_map(&self.document))
    }

    /// The XFA form data as XML text, exactly as stored in the PDF.
    ///
    /// Fails with [`XfaError::PayloadNotFound`] if there is no XFA entry or
    /// none of its streams matches [`ConverterConfig::signature`].
    pub fn xml_payload(&self) -> Result<String> {
        let located = self.locate_xfa().ok_or_else(|| {
            XfaError::PayloadNotFound(format!("no {} entry in the document", self.config.xfa_key))
        })?;

        PayloadExtractor::new(&self.document).extract(&located, &self.config.signature)
    }

    /// A [`FormatConverter`] over the extracted payload.
    pub fn converter(&self) -> Result<FormatConverter> {
        Ok(FormatConverter::with_config(
            self.xml_payload()?,
            self.config.clone(),
        ))
    }

    // ── Conversion ────────────────────────────────────────────────────────────

    pub fn to_xml(&self) -> Result<String> {
        self.converter()?.to_xml()
    }

    pub fn to_json(&self) -> Result<String> {
        self.converter()?.to_json()
    }

    pub fn to_yaml(&self) -> Result<String> {
        self.converter()?.to_yaml()
    }

    pub fn to_csv(&self) -> Result<String> {
        self.converter()?.to_csv()
    }

    /// Convert to the format named by `kind`. An unknown name fails with
    /// [`XfaError::UnsupportedFormat`] before anything is read from the PDF.
    pub fn convert(&self, kind: &str) -> Result<String> {
        self.convert_to(kind.parse()?)
    }

    pub fn convert_to(&self, format: OutputFormat) -> Result<String> {
        self.converter()?.convert_to(format)
    }

    // ── Output ────────────────────────────────────────────────────────────────

    /// Write the converted data next to the source file as
    /// `<file name>.<extension>` (e.g. `form.pdf.json`) and return that path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use xfaconvert::{OutputFormat, XfaDocument};
    ///
    /// let form = XfaDocument::from_path("form.pdf").unwrap();
    /// let written = form.save(OutputFormat::Yaml).unwrap();
    /// assert!(written.ends_with("form.pdf.yaml"));
    /// ```
    pub fn save(&self, format: OutputFormat) -> Result<PathBuf> {
        let source = self.source_path.as_ref().ok_or(XfaError::NoSourcePath)?;

        let mut name = source.as_os_str().to_owned();
        name.push(".");
        name.push(format.extension());
        let dest = PathBuf::from(name);

        self.save_to(&dest, format)?;
        Ok(dest)
    }

    /// Write the converted data to `path`. Conversion finishes before the
    /// file is created, so a failed conversion leaves nothing behind.
    pub fn save_to<P: AsRef<Path>>(&self, path: P, format: OutputFormat) -> Result<()> {
        let text = self.convert_to(format)?;
        std::fs::write(path.as_ref(), text)?;
        log::info!("wrote {format} output to {}", path.as_ref().display());
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Returns a reference to the underlying [`lopdf::Document`].
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Returns a reference to the active [`ConverterConfig`].
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// The file the document was loaded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

// ── Decryption ───────────────────────────────────────────────────────────────

/// Return a readable document, loading it again with a password if needed.
///
/// lopdf decrypts a document whose user password is empty while loading it
/// and drops `/Encrypt` from the trailer. A document that still reports
/// encryption could not be opened that way, and holds nothing but its
/// encryption dictionary until `reload` is called with the right password.
fn unlock<F>(
    document: Document,
    credentials: &dyn CredentialProvider,
    reload: F,
) -> Result<Document>
where
    F: FnOnce(&str) -> lopdf::Result<Document>,
{
    if !document.is_encrypted() {
        if document.was_encrypted() {
            log::debug!("document opened with the empty user password");
        }
        return Ok(document);
    }

    let password = credentials.password().ok_or(XfaError::PasswordRequired)?;
    match reload(&password) {
        Ok(document) => {
            log::info!("document decrypted with the supplied password");
            Ok(document)
        }
        Err(lopdf::Error::InvalidPassword) => Err(XfaError::WrongPassword),
        Err(e) => Err(e.into()),
    }
}
