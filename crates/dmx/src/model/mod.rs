//! Data model types for DMX documents.
//!
//! This module contains the in-memory graph:
//! - Identifiers (GUIDs)
//! - Typed values and arrays
//! - Elements and their attributes
//! - Documents (element registry, root, deferred source)
//! - Builders and change notifications

mod attribute;
pub mod array;
pub mod builder;
pub mod document;
pub mod element;
pub mod id;
pub mod notify;
pub mod value;

pub(crate) use attribute::Deferred;

pub use array::{Array, ElementArray};
pub use builder::ElementBuilder;
pub use document::{Document, DocumentOptions, RemovalMode, StubResolver};
pub use element::{DEFAULT_CLASS_NAME, Element};
pub use id::ElementId;
pub use notify::{ArrayChange, AttributeChange, RegistryChange, Subscription};
pub use value::{
    Color, Matrix, QAngle, Quaternion, Scalar, Time, Value, ValueKind, ValueType, Vector2,
    Vector3, Vector4,
};
