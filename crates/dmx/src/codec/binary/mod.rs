//! The binary DMX encoding.
//!
//! Layout after the header line (and its NUL):
//! - v9: prefix attribute blocks
//! - v2+: string dictionary
//! - element index: class, name and GUID of every element
//! - element bodies: per element an attribute count, then name, type ID and
//!   value for each attribute
//!
//! Element references are indices into the element index, `-1` for null or
//! `-2` followed by a GUID string for elements outside the stream.

pub mod decode;
pub mod dictionary;
pub mod encode;
pub mod types;
pub mod value;

pub use dictionary::{DictionaryBuilder, StringTable};
pub use types::{Layout, SUPPORTED_VERSIONS};

use crate::codec::{Codec, Header, LoadOptions};
use crate::error::{DecodeError, EncodeError};
use crate::model::Document;

/// Encoding name used in headers.
pub const ENCODING: &str = "binary";

/// Codec for binary versions 1, 2, 3, 4, 5 and 9.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encoding(&self) -> &'static str {
        ENCODING
    }

    fn versions(&self) -> &'static [i32] {
        SUPPORTED_VERSIONS
    }

    fn encode(&self, document: &Document, version: i32) -> Result<Vec<u8>, EncodeError> {
        encode::encode_document(document, version)
    }

    fn decode(&self, header: &Header, body: &[u8], options: &LoadOptions) -> Result<Document, DecodeError> {
        decode::decode_document(header, body, options)
    }
}
