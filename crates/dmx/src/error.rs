//! Error types for DMX graph operations, decoding and encoding.

use thiserror::Error;

use crate::model::{ElementId, ValueType};

/// Failure categories shared by every error type in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Two elements in one document share an ID.
    IdentityCollision,
    /// An element was parented across documents outside of an import.
    OwnershipViolation,
    /// A value type is not legal for the active encoding/version.
    UnsupportedType,
    /// Missing header, truncated data, unknown type ID or unknown codec.
    MalformedStream,
    /// A deferred attribute could not be materialized.
    DeferredLoadFailure,
    /// The operation is disabled by document configuration.
    Disallowed,
    /// Attribute access on a stub element.
    StubAccess,
    /// A configured size limit was exceeded.
    LimitExceeded,
}

/// Error raised by operations on the in-memory graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DmxError {
    #[error("element {id} already exists in this document")]
    IdentityCollision { id: ElementId },

    #[error("element {id} belongs to another document ({context}); use import_element")]
    OwnershipViolation { id: ElementId, context: &'static str },

    #[error("operation not allowed: {context}")]
    Disallowed { context: &'static str },

    #[error("element {id} is a stub and has no attributes")]
    StubAccess { id: ElementId },

    #[error("document element limit of {max} reached")]
    ElementLimit { max: usize },

    #[error("element {id} is not a member of this document")]
    NotAMember { id: ElementId },

    #[error("attribute {name:?} on element {element} has type {actual}, expected {expected}")]
    TypeMismatch {
        element: ElementId,
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("deferred load of attribute {attribute:?} on element {element} via {codec} failed: {source}")]
    DeferredLoad {
        attribute: String,
        element: ElementId,
        codec: String,
        source: Box<DecodeError>,
    },
}

impl DmxError {
    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DmxError::IdentityCollision { .. } => ErrorKind::IdentityCollision,
            DmxError::OwnershipViolation { .. } | DmxError::NotAMember { .. } => {
                ErrorKind::OwnershipViolation
            }
            DmxError::Disallowed { .. } => ErrorKind::Disallowed,
            DmxError::StubAccess { .. } => ErrorKind::StubAccess,
            DmxError::ElementLimit { .. } => ErrorKind::LimitExceeded,
            DmxError::TypeMismatch { .. } => ErrorKind::UnsupportedType,
            DmxError::DeferredLoad { .. } => ErrorKind::DeferredLoadFailure,
        }
    }
}

/// Error during decoding of either wire encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("invalid DMX header: {found:?}")]
    InvalidHeader { found: String },

    #[error("no codec registered for encoding {encoding:?} version {version}")]
    UnknownCodec { encoding: String, version: i32 },

    #[error("unexpected end of input while reading {context} at offset {offset}")]
    UnexpectedEof { context: &'static str, offset: usize },

    #[error("unknown attribute type ID {type_id} at offset {offset}")]
    UnknownTypeId { type_id: u8, offset: usize },

    #[error("string dictionary index {index} out of bounds (size: {size}) at offset {offset}")]
    StringIndexOutOfBounds {
        index: usize,
        size: usize,
        offset: usize,
    },

    #[error("element index {index} out of bounds (size: {size}) at offset {offset}")]
    ElementIndexOutOfBounds {
        index: i32,
        size: usize,
        offset: usize,
    },

    #[error("invalid UTF-8 in {field} at offset {offset}")]
    InvalidUtf8 { field: &'static str, offset: usize },

    #[error("invalid element GUID {text:?}")]
    InvalidGuid { text: String },

    #[error("invalid bool value {value} at offset {offset} (expected 0 or 1)")]
    InvalidBool { value: u8, offset: usize },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("element {id} is defined twice in the stream")]
    DuplicateElement { id: ElementId },

    #[error("element values are not allowed in {context}")]
    ElementNotAllowed { context: &'static str },

    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unknown attribute type {name:?} on line {line}")]
    UnknownTypeName { name: String, line: usize },

    #[error("invalid {value_type} value {text:?} on line {line}")]
    InvalidValue {
        value_type: ValueType,
        text: String,
        line: usize,
    },

    #[error("deferred source is no longer available")]
    SourceUnavailable,

    #[error("i/o error: {0}")]
    Io(String),

    #[error(transparent)]
    Model(#[from] DmxError),
}

impl DecodeError {
    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::DuplicateElement { .. } => ErrorKind::IdentityCollision,
            DecodeError::LengthExceedsLimit { .. } => ErrorKind::LimitExceeded,
            DecodeError::SourceUnavailable => ErrorKind::DeferredLoadFailure,
            DecodeError::Model(inner) => inner.kind(),
            _ => ErrorKind::MalformedStream,
        }
    }
}

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{value_type} values cannot be written by {encoding} version {version}")]
    UnsupportedType {
        value_type: ValueType,
        encoding: &'static str,
        version: i32,
    },

    #[error("no codec registered for encoding {encoding:?} version {version}")]
    UnknownCodec { encoding: String, version: i32 },

    #[error("string dictionary has {count} entries, version {version} allows {max}")]
    TooManyStrings {
        count: usize,
        max: usize,
        version: i32,
    },

    #[error("document has {count} elements, maximum is {max}")]
    TooManyElements { count: usize, max: usize },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("string {text:?} is missing from the dictionary; the graph changed during encoding")]
    MissingString { text: String },

    #[error("document has no root element")]
    NoRoot,

    #[error("i/o error: {0}")]
    Io(String),

    #[error(transparent)]
    Model(#[from] DmxError),
}

impl EncodeError {
    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            EncodeError::UnknownCodec { .. } | EncodeError::NoRoot => ErrorKind::Disallowed,
            EncodeError::TooManyStrings { .. }
            | EncodeError::TooManyElements { .. }
            | EncodeError::LengthExceedsLimit { .. } => ErrorKind::LimitExceeded,
            EncodeError::MissingString { .. } | EncodeError::Io(_) => ErrorKind::MalformedStream,
            EncodeError::Model(inner) => inner.kind(),
        }
    }
}
