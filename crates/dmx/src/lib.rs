//! DMX: typed attribute graphs with binary and keyvalues2 codecs.
//!
//! This crate provides the in-memory document model and the codecs for the
//! DMX (Data Model eXchange) container used to move scene, model and
//! animation data between tools.
//!
//! # Overview
//!
//! A [`Document`] owns a set of [`Element`]s. Each element has a GUID, a
//! name, a class name and an ordered list of typed attributes. Attributes
//! that hold elements store their IDs, so graphs may contain cycles and
//! references to elements that live elsewhere (stubs).
//!
//! - **Thread-safe**: elements, arrays and documents are shared handles
//!   guarded by reader/writer locks
//! - **Deferred loading**: binary documents can decode attribute values on
//!   first access
//! - **Versioned**: binary versions 1, 2, 3, 4, 5 and 9, and keyvalues2 text
//!
//! # Quick Start
//!
//! ```rust
//! use dmx::{Document, Vector3};
//!
//! let doc = Document::new();
//! let root = doc.create_element("scene", None, Some("DmeScene")).unwrap();
//! let camera = doc
//!     .build("camera")
//!     .class_name("DmeCamera")
//!     .attr("fov", 60.0f32)
//!     .attr("position", Vector3::new(0.0, 1.5, -4.0))
//!     .finish()
//!     .unwrap();
//! root.set_element("camera", Some(&camera)).unwrap();
//!
//! // Encode to binary v5
//! let bytes = dmx::save(&doc, "binary", 5).unwrap();
//!
//! // Decode back
//! let loaded = dmx::load(&bytes).unwrap();
//! let camera = loaded.root().unwrap().get_element("camera").unwrap().unwrap();
//! assert_eq!(camera.get_as::<f32>("fov").unwrap(), Some(60.0));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Documents, elements, values and arrays
//! - [`codec`]: Header parsing, the codec registry and both encodings
//! - [`error`]: Error types
//! - [`limits`]: Size limits for decoding
//!
//! # Wire Format
//!
//! Every stream starts with a header line naming its encoding:
//!
//! ```text
//! <!-- dmx encoding binary 5 format model 18 -->
//! ```
//!
//! [`load`] reads the header and dispatches to the codec registered for that
//! encoding and version.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;

// Re-export commonly used types at crate root
pub use codec::{
    global_registry, load, load_file, load_with, register_codec, save, save_file, Codec,
    CodecRegistry, Header, LoadMode, LoadOptions,
};
pub use error::{DecodeError, DmxError, EncodeError, ErrorKind};
pub use model::{
    Array, ArrayChange, AttributeChange, Color, Document, DocumentOptions, Element, ElementArray,
    ElementBuilder, ElementId, Matrix, QAngle, Quaternion, RegistryChange, RemovalMode, Scalar,
    StubResolver, Subscription, Time, Value, ValueKind, ValueType, Vector2, Vector3, Vector4,
    DEFAULT_CLASS_NAME,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
