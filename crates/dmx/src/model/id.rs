//! GUID identifiers for elements.
//!
//! Element IDs are 16 raw bytes on the binary wire and a hyphenated
//! lowercase UUID in text.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::DecodeError;

/// Identity of an element, immutable once the element is constructed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(Uuid);

impl ElementId {
    /// The all-zero ID.
    pub const NIL: ElementId = ElementId(Uuid::nil());

    /// Generates a random (v4) ID.
    pub fn random() -> Self {
        ElementId(Uuid::new_v4())
    }

    /// Wraps 16 raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        ElementId(Uuid::from_bytes(bytes))
    }

    /// Returns the raw 16 bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Parses hyphenated or simple hex form.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        Uuid::parse_str(text.trim())
            .map(ElementId)
            .map_err(|_| DecodeError::InvalidGuid { text: text.to_string() })
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0.hyphenated())
    }
}

impl FromStr for ElementId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementId::parse(s)
    }
}

impl From<Uuid> for ElementId {
    fn from(uuid: Uuid) -> Self {
        ElementId(uuid)
    }
}

impl From<[u8; 16]> for ElementId {
    fn from(bytes: [u8; 16]) -> Self {
        ElementId::from_bytes(bytes)
    }
}
