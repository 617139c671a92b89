//! The keyvalues2 text encoding.
//!
//! ```text
//! <!-- dmx encoding keyvalues2 1 format dmx 1 -->
//! "DmElement"
//! {
//!     "id" "elementid" "5e0a6b1c-8e7f-4c43-9f5e-0d8f6a1b2c3d"
//!     "name" "string" "root"
//!     "scale" "float" "1.5"
//!     "mesh" "DmeMesh"
//!     {
//!         "id" "elementid" "..."
//!         "name" "string" "body"
//!     }
//!     "material" "element" "..."
//!     "weights" "float_array" [ "0.5", "0.5" ]
//! }
//! ```
//!
//! Elements referenced once are nested where they are used; the root and
//! shared elements are top-level blocks referenced by GUID.

pub mod decode;
pub mod encode;
pub mod lexer;
pub mod value;

use crate::codec::{Codec, Header, LoadOptions};
use crate::error::{DecodeError, EncodeError};
use crate::model::Document;

/// Encoding name used in headers.
pub const ENCODING: &str = "keyvalues2";

pub(crate) const VERSIONS: &[i32] = &[1];

/// Codec for keyvalues2 version 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValues2Codec;

impl Codec for KeyValues2Codec {
    fn encoding(&self) -> &'static str {
        ENCODING
    }

    fn versions(&self) -> &'static [i32] {
        VERSIONS
    }

    fn encode(&self, document: &Document, version: i32) -> Result<Vec<u8>, EncodeError> {
        encode::encode_document(document, version)
    }

    fn decode(&self, header: &Header, body: &[u8], options: &LoadOptions) -> Result<Document, DecodeError> {
        decode::decode_document(header, body, options)
    }
}
