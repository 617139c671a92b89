//! Per-version wire layout: type-ID tables and string storage rules.

use crate::model::{ValueKind, ValueType};

use ValueKind as K;

/// Binary versions this crate reads and writes.
pub const SUPPORTED_VERSIONS: &[i32] = &[1, 2, 3, 4, 5, 9];

/// Versions 1 and 2: slot 6 is reserved (no time type).
const TABLE_V1: &[Option<ValueKind>] = &[
    Some(K::Element),
    Some(K::Int),
    Some(K::Float),
    Some(K::Bool),
    Some(K::String),
    Some(K::Binary),
    None,
    Some(K::Color),
    Some(K::Vector2),
    Some(K::Vector3),
    Some(K::Vector4),
    Some(K::QAngle),
    Some(K::Quaternion),
    Some(K::Matrix),
];

const TABLE_V3: &[Option<ValueKind>] = &[
    Some(K::Element),
    Some(K::Int),
    Some(K::Float),
    Some(K::Bool),
    Some(K::String),
    Some(K::Binary),
    Some(K::Time),
    Some(K::Color),
    Some(K::Vector2),
    Some(K::Vector3),
    Some(K::Vector4),
    Some(K::QAngle),
    Some(K::Quaternion),
    Some(K::Matrix),
];

const TABLE_V9: &[Option<ValueKind>] = &[
    Some(K::Element),
    Some(K::Int),
    Some(K::Float),
    Some(K::Bool),
    Some(K::String),
    Some(K::Binary),
    Some(K::Time),
    Some(K::Color),
    Some(K::Vector2),
    Some(K::Vector3),
    Some(K::Vector4),
    Some(K::QAngle),
    Some(K::Quaternion),
    Some(K::Matrix),
    Some(K::UInt64),
    Some(K::UInt8),
];

/// Everything that differs between binary versions.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub version: i32,
    table: &'static [Option<ValueKind>],
    array_base: u8,
}

impl Layout {
    /// Returns the layout for a supported version.
    pub fn for_version(version: i32) -> Option<Layout> {
        let (table, array_base) = match version {
            1 | 2 => (TABLE_V1, TABLE_V1.len()),
            3..=5 => (TABLE_V3, TABLE_V3.len()),
            9 => (TABLE_V9, 2 * TABLE_V9.len()),
            _ => return None,
        };
        Some(Layout {
            version,
            table,
            array_base: array_base as u8,
        })
    }

    /// Wire type ID for `value_type`, or `None` if this version lacks it.
    pub fn type_id(&self, value_type: ValueType) -> Option<u8> {
        let index = self
            .table
            .iter()
            .position(|slot| *slot == Some(value_type.kind))? as u8;
        Some(if value_type.is_array {
            index + 1 + self.array_base
        } else {
            index + 1
        })
    }

    /// Value type for a wire type ID.
    pub fn value_type(&self, type_id: u8) -> Option<ValueType> {
        let len = self.table.len() as u8;
        let (index, is_array) = if (1..=len).contains(&type_id) {
            (type_id - 1, false)
        } else if type_id > self.array_base && type_id <= self.array_base + len {
            (type_id - 1 - self.array_base, true)
        } else {
            return None;
        };
        let kind = self.table[index as usize]?;
        Some(ValueType { kind, is_array })
    }

    /// Whether a string dictionary precedes the element index.
    pub fn has_dictionary(&self) -> bool {
        self.version >= 2
    }

    /// Dictionary entry count is u32 (else u16).
    pub fn wide_dictionary_count(&self) -> bool {
        self.version >= 4
    }

    /// References into the dictionary are u32 (else u16).
    pub fn wide_dictionary_index(&self) -> bool {
        self.version >= 5
    }

    /// Element names and string values go through the dictionary.
    pub fn values_in_dictionary(&self) -> bool {
        self.version >= 4
    }

    /// Whether prefix attribute blocks follow the header.
    pub fn has_prefix(&self) -> bool {
        self.version >= 9
    }
}
