//! Encoding/decoding for DMX documents.
//!
//! A codec serves one encoding name and a set of versions. The header line
//! at the start of every stream names the encoding and version, and the
//! registry uses it to pick the codec.
//!
//! Two codecs are built in:
//! - [`binary`]: versions 1, 2, 3, 4, 5 and 9
//! - [`keyvalues2`]: version 1

pub mod binary;
pub mod header;
pub mod keyvalues2;
pub mod primitives;

use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_ELEMENTS;
use crate::model::Document;

pub use binary::BinaryCodec;
pub use header::Header;
pub use keyvalues2::KeyValues2Codec;
pub use primitives::{Reader, Writer};

/// An encoder/decoder for one encoding name.
pub trait Codec: Send + Sync {
    /// Encoding name as it appears in the header.
    fn encoding(&self) -> &'static str;

    /// Versions this codec reads and writes.
    fn versions(&self) -> &'static [i32];

    /// Encodes the document, header included.
    fn encode(&self, document: &Document, version: i32) -> Result<Vec<u8>, EncodeError>;

    /// Decodes the body that follows an already-parsed header.
    fn decode(&self, header: &Header, body: &[u8], options: &LoadOptions) -> Result<Document, DecodeError>;
}

/// When attribute values are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Every value is decoded during load.
    #[default]
    Eager,
    /// Values are decoded on first access where the codec supports it.
    Deferred,
}

/// Options for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub mode: LoadMode,
    /// Maximum number of elements in the loaded document.
    pub max_elements: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mode: LoadMode::Eager,
            max_elements: MAX_ELEMENTS,
        }
    }
}

impl LoadOptions {
    pub fn deferred() -> Self {
        Self {
            mode: LoadMode::Deferred,
            ..Self::default()
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Maps (encoding, version) pairs to codecs.
///
/// Later registrations take precedence over earlier ones for the same pair.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in codecs.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BinaryCodec);
        registry.register(KeyValues2Codec);
        registry
    }

    pub fn register(&mut self, codec: impl Codec + 'static) {
        self.codecs.push(Arc::new(codec));
    }

    /// Finds the codec serving `encoding` at `version`.
    pub fn find(&self, encoding: &str, version: i32) -> Option<Arc<dyn Codec>> {
        self.codecs
            .iter()
            .rev()
            .find(|c| c.encoding() == encoding && c.versions().contains(&version))
            .cloned()
    }

    /// Every (encoding, version) pair served, in registration order.
    pub fn targets(&self) -> Vec<(&'static str, i32)> {
        let mut targets = Vec::new();
        for codec in &self.codecs {
            for &version in codec.versions() {
                if !targets.contains(&(codec.encoding(), version)) {
                    targets.push((codec.encoding(), version));
                }
            }
        }
        targets
    }

    /// Reads the header, selects a codec and decodes.
    pub fn load(&self, data: &[u8], options: &LoadOptions) -> Result<Document, DecodeError> {
        let (header, body) = Header::parse(data)?;
        let codec = self
            .find(&header.encoding, header.encoding_version)
            .ok_or_else(|| DecodeError::UnknownCodec {
                encoding: header.encoding.clone(),
                version: header.encoding_version,
            })?;
        tracing::debug!(
            encoding = %header.encoding,
            version = header.encoding_version,
            format = %header.format,
            bytes = data.len(),
            mode = ?options.mode,
            "decoding document"
        );
        let document = codec.decode(&header, &data[body..], options)?;
        tracing::debug!(elements = document.len(), "decoded document");
        Ok(document)
    }

    /// Encodes with the codec serving `encoding` at `version`.
    pub fn save(&self, document: &Document, encoding: &str, version: i32) -> Result<Vec<u8>, EncodeError> {
        let codec = self.find(encoding, version).ok_or_else(|| EncodeError::UnknownCodec {
            encoding: encoding.to_string(),
            version,
        })?;
        let bytes = codec.encode(document, version)?;
        tracing::debug!(
            encoding,
            version,
            elements = document.len(),
            bytes = bytes.len(),
            "encoded document"
        );
        Ok(bytes)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("targets", &self.targets())
            .finish()
    }
}

lazy_static! {
    static ref GLOBAL: RwLock<CodecRegistry> = RwLock::new(CodecRegistry::builtin());
}

/// Adds a codec to the process-wide registry. Codecs cannot be removed.
pub fn register_codec(codec: impl Codec + 'static) {
    GLOBAL.write().register(codec);
}

/// A snapshot of the process-wide registry.
pub fn global_registry() -> CodecRegistry {
    GLOBAL.read().clone()
}

/// Decodes with the process-wide registry and default options.
pub fn load(data: &[u8]) -> Result<Document, DecodeError> {
    load_with(data, &LoadOptions::default())
}

pub fn load_with(data: &[u8], options: &LoadOptions) -> Result<Document, DecodeError> {
    global_registry().load(data, options)
}

/// Encodes with the process-wide registry.
pub fn save(document: &Document, encoding: &str, version: i32) -> Result<Vec<u8>, EncodeError> {
    global_registry().save(document, encoding, version)
}

/// Reads and decodes a file.
pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Document, DecodeError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| DecodeError::Io(format!("{}: {e}", path.display())))?;
    load_with(&data, options)
}

/// Encodes and writes a file.
pub fn save_file(
    document: &Document,
    path: impl AsRef<Path>,
    encoding: &str,
    version: i32,
) -> Result<(), EncodeError> {
    let path = path.as_ref();
    let bytes = save(document, encoding, version)?;
    std::fs::write(path, bytes).map_err(|e| EncodeError::Io(format!("{}: {e}", path.display())))
}

impl Document {
    /// Encodes with the encoding and version recorded on the document.
    pub fn save(&self) -> Result<Vec<u8>, EncodeError> {
        save(self, &self.encoding(), self.encoding_version())
    }
}
