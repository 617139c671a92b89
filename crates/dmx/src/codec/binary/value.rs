//! Attribute value encoding/decoding for the binary format.

use rustc_hash::FxHashMap;

use crate::codec::binary::dictionary::{DictionaryBuilder, StringTable};
use crate::codec::binary::types::Layout;
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_ARRAY_LEN, MAX_BINARY_LEN, MAX_STRING_LEN};
use crate::model::{
    Array, Color, Document, ElementArray, ElementId, Matrix, QAngle, Quaternion, Time, Value,
    ValueKind, ValueType, Vector2, Vector3, Vector4,
};

/// Element reference to nothing.
pub const NULL_REFERENCE: i32 = -1;

/// Element reference by GUID string to an element outside the stream.
pub const STUB_REFERENCE: i32 = -2;

/// Encoded size of fixed-width kinds.
fn fixed_size(kind: ValueKind) -> Option<usize> {
    Some(match kind {
        ValueKind::Int | ValueKind::Float | ValueKind::Time | ValueKind::Color => 4,
        ValueKind::Bool | ValueKind::UInt8 => 1,
        ValueKind::Vector2 | ValueKind::UInt64 => 8,
        ValueKind::Vector3 | ValueKind::QAngle => 12,
        ValueKind::Vector4 | ValueKind::Quaternion => 16,
        ValueKind::Matrix => 64,
        ValueKind::Element | ValueKind::String | ValueKind::Binary => return None,
    })
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes values given the stream's string table and element index.
pub struct ValueReader<'t> {
    pub layout: Layout,
    /// String values are dictionary indices rather than inline text.
    pub strings_in_dictionary: bool,
    pub strings: &'t StringTable,
    pub elements: &'t [ElementId],
}

impl ValueReader<'_> {
    /// Reads one value of `value_type`.
    pub fn read(
        &self,
        reader: &mut Reader<'_>,
        value_type: ValueType,
        document: &Document,
    ) -> Result<Value, DecodeError> {
        if value_type.is_array {
            self.read_array(reader, value_type.kind, document)
        } else {
            self.read_scalar(reader, value_type.kind, document)
        }
    }

    fn read_scalar(
        &self,
        reader: &mut Reader<'_>,
        kind: ValueKind,
        document: &Document,
    ) -> Result<Value, DecodeError> {
        Ok(match kind {
            ValueKind::Element => Value::Element(self.read_reference(reader, document)?),
            ValueKind::Int => Value::Int(reader.read_i32("int")?),
            ValueKind::Float => Value::Float(reader.read_f32("float")?),
            ValueKind::Bool => Value::Bool(reader.read_bool("bool")?),
            ValueKind::String => Value::String(self.read_string(reader)?),
            ValueKind::Binary => Value::Binary(reader.read_blob(MAX_BINARY_LEN, "binary")?),
            ValueKind::Time => Value::Time(read_time(reader)?),
            ValueKind::Color => Value::Color(read_color(reader)?),
            ValueKind::Vector2 => Value::Vector2(read_vector2(reader)?),
            ValueKind::Vector3 => Value::Vector3(read_vector3(reader)?),
            ValueKind::Vector4 => Value::Vector4(read_vector4(reader)?),
            ValueKind::QAngle => Value::QAngle(read_qangle(reader)?),
            ValueKind::Quaternion => Value::Quaternion(read_quaternion(reader)?),
            ValueKind::Matrix => Value::Matrix(read_matrix(reader)?),
            ValueKind::UInt64 => Value::UInt64(reader.read_u64("uint64")?),
            ValueKind::UInt8 => Value::UInt8(reader.read_u8("uint8")?),
        })
    }

    fn read_array(
        &self,
        reader: &mut Reader<'_>,
        kind: ValueKind,
        document: &Document,
    ) -> Result<Value, DecodeError> {
        let count = reader.read_count(MAX_ARRAY_LEN, "array_count")?;
        Ok(match kind {
            ValueKind::Element => {
                let ids = read_items(reader, count, |r| self.read_reference(r, document))?;
                Value::ElementArray(ElementArray::from_ids_unchecked(document, ids))
            }
            ValueKind::Int => Value::IntArray(collect_array(reader, count, |r| r.read_i32("int"))?),
            ValueKind::Float => Value::FloatArray(collect_array(reader, count, |r| r.read_f32("float"))?),
            ValueKind::Bool => Value::BoolArray(collect_array(reader, count, |r| r.read_bool("bool"))?),
            ValueKind::String => Value::StringArray(collect_array(reader, count, |r| self.read_string(r))?),
            ValueKind::Binary => Value::BinaryArray(collect_array(reader, count, |r| {
                r.read_blob(MAX_BINARY_LEN, "binary")
            })?),
            ValueKind::Time => Value::TimeArray(collect_array(reader, count, read_time)?),
            ValueKind::Color => Value::ColorArray(collect_array(reader, count, read_color)?),
            ValueKind::Vector2 => Value::Vector2Array(collect_array(reader, count, read_vector2)?),
            ValueKind::Vector3 => Value::Vector3Array(collect_array(reader, count, read_vector3)?),
            ValueKind::Vector4 => Value::Vector4Array(collect_array(reader, count, read_vector4)?),
            ValueKind::QAngle => Value::QAngleArray(collect_array(reader, count, read_qangle)?),
            ValueKind::Quaternion => {
                Value::QuaternionArray(collect_array(reader, count, read_quaternion)?)
            }
            ValueKind::Matrix => Value::MatrixArray(collect_array(reader, count, read_matrix)?),
            ValueKind::UInt64 => Value::UInt64Array(collect_array(reader, count, |r| r.read_u64("uint64"))?),
            ValueKind::UInt8 => Value::UInt8Array(collect_array(reader, count, |r| r.read_u8("uint8"))?),
        })
    }

    fn read_string(&self, reader: &mut Reader<'_>) -> Result<String, DecodeError> {
        if self.strings_in_dictionary {
            self.strings.read_ref(reader, "string").map(str::to_owned)
        } else {
            reader.read_cstr(MAX_STRING_LEN, "string")
        }
    }

    /// Reads an element reference, registering a stub for GUID references
    /// to elements the document does not have yet.
    pub fn read_reference(
        &self,
        reader: &mut Reader<'_>,
        document: &Document,
    ) -> Result<Option<ElementId>, DecodeError> {
        let offset = reader.position();
        match reader.read_i32("element_ref")? {
            NULL_REFERENCE => Ok(None),
            STUB_REFERENCE => {
                let text = reader.read_cstr(64, "element_guid")?;
                let id = ElementId::parse(&text)?;
                document.get_or_create_stub(id)?;
                Ok(Some(id))
            }
            index => usize::try_from(index)
                .ok()
                .and_then(|i| self.elements.get(i))
                .map(|id| Some(*id))
                .ok_or(DecodeError::ElementIndexOutOfBounds {
                    index,
                    size: self.elements.len(),
                    offset,
                }),
        }
    }

    /// Advances past one value without decoding it.
    pub fn skip(&self, reader: &mut Reader<'_>, value_type: ValueType) -> Result<(), DecodeError> {
        if value_type.is_array {
            let count = reader.read_count(MAX_ARRAY_LEN, "array_count")?;
            if let Some(size) = fixed_size(value_type.kind) {
                return reader.skip(count * size, "array_items");
            }
            for _ in 0..count {
                self.skip_scalar(reader, value_type.kind)?;
            }
            Ok(())
        } else {
            self.skip_scalar(reader, value_type.kind)
        }
    }

    fn skip_scalar(&self, reader: &mut Reader<'_>, kind: ValueKind) -> Result<(), DecodeError> {
        if let Some(size) = fixed_size(kind) {
            return reader.skip(size, kind.name());
        }
        match kind {
            ValueKind::Element => {
                if reader.read_i32("element_ref")? == STUB_REFERENCE {
                    reader.skip_cstr("element_guid")?;
                }
                Ok(())
            }
            ValueKind::String if self.strings_in_dictionary => {
                reader.skip(self.strings.index_width(), "string")
            }
            ValueKind::String => reader.skip_cstr("string"),
            _ => {
                let len = reader.read_count(MAX_BINARY_LEN, "binary")?;
                reader.skip(len, "binary")
            }
        }
    }
}

fn read_items<T>(
    reader: &mut Reader<'_>,
    count: usize,
    mut item: impl FnMut(&mut Reader<'_>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    // Every item takes at least one byte, so the remaining length bounds
    // the allocation for hostile counts.
    let mut items = Vec::with_capacity(count.min(reader.remaining_len()));
    for _ in 0..count {
        items.push(item(reader)?);
    }
    Ok(items)
}

fn collect_array<T: Clone + Send + Sync + 'static>(
    reader: &mut Reader<'_>,
    count: usize,
    item: impl FnMut(&mut Reader<'_>) -> Result<T, DecodeError>,
) -> Result<Array<T>, DecodeError> {
    read_items(reader, count, item).map(Array::from_vec)
}

fn read_time(reader: &mut Reader<'_>) -> Result<Time, DecodeError> {
    reader.read_i32("time").map(Time::from_ticks)
}

fn read_color(reader: &mut Reader<'_>) -> Result<Color, DecodeError> {
    let b = reader.read_bytes(4, "color")?;
    Ok(Color::new(b[0], b[1], b[2], b[3]))
}

fn read_vector2(reader: &mut Reader<'_>) -> Result<Vector2, DecodeError> {
    Ok(Vector2::new(reader.read_f32("vector2")?, reader.read_f32("vector2")?))
}

fn read_vector3(reader: &mut Reader<'_>) -> Result<Vector3, DecodeError> {
    Ok(Vector3::new(
        reader.read_f32("vector3")?,
        reader.read_f32("vector3")?,
        reader.read_f32("vector3")?,
    ))
}

fn read_vector4(reader: &mut Reader<'_>) -> Result<Vector4, DecodeError> {
    Ok(Vector4::new(
        reader.read_f32("vector4")?,
        reader.read_f32("vector4")?,
        reader.read_f32("vector4")?,
        reader.read_f32("vector4")?,
    ))
}

fn read_qangle(reader: &mut Reader<'_>) -> Result<QAngle, DecodeError> {
    Ok(QAngle::new(
        reader.read_f32("qangle")?,
        reader.read_f32("qangle")?,
        reader.read_f32("qangle")?,
    ))
}

fn read_quaternion(reader: &mut Reader<'_>) -> Result<Quaternion, DecodeError> {
    Ok(Quaternion::new(
        reader.read_f32("quaternion")?,
        reader.read_f32("quaternion")?,
        reader.read_f32("quaternion")?,
        reader.read_f32("quaternion")?,
    ))
}

fn read_matrix(reader: &mut Reader<'_>) -> Result<Matrix, DecodeError> {
    let mut values = [0f32; 16];
    for value in &mut values {
        *value = reader.read_f32("matrix")?;
    }
    Ok(Matrix::from_row_major(values))
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes values against the scraped dictionary and element index.
pub struct ValueWriter<'t> {
    pub layout: Layout,
    pub strings_in_dictionary: bool,
    pub dictionary: &'t DictionaryBuilder,
    pub indices: &'t FxHashMap<ElementId, i32>,
}

impl ValueWriter<'_> {
    /// Wire type ID for a value, failing if this version lacks its type.
    pub fn type_id(&self, value_type: ValueType) -> Result<u8, EncodeError> {
        self.layout
            .type_id(value_type)
            .ok_or(EncodeError::UnsupportedType {
                value_type,
                encoding: "binary",
                version: self.layout.version,
            })
    }

    /// Writes a value body (no type byte).
    pub fn write(&self, writer: &mut Writer, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Element(id) => self.write_reference(writer, *id),
            Value::Int(v) => writer.write_i32(*v),
            Value::Float(v) => writer.write_f32(*v),
            Value::Bool(v) => writer.write_bool(*v),
            Value::String(v) => self.write_string(writer, v)?,
            Value::Binary(v) => write_blob(writer, v)?,
            Value::Time(v) => writer.write_i32(v.ticks()),
            Value::Color(v) => write_color(writer, v),
            Value::Vector2(v) => write_vector2(writer, v),
            Value::Vector3(v) => write_vector3(writer, v),
            Value::Vector4(v) => write_vector4(writer, v),
            Value::QAngle(v) => write_qangle(writer, v),
            Value::Quaternion(v) => write_quaternion(writer, v),
            Value::Matrix(v) => write_matrix(writer, v),
            Value::UInt64(v) => writer.write_u64(*v),
            Value::UInt8(v) => writer.write_u8(*v),

            Value::ElementArray(a) => {
                let ids = a.ids();
                writer.write_count(ids.len(), "array_count")?;
                for id in ids {
                    self.write_reference(writer, id);
                }
            }
            Value::IntArray(a) => write_array(writer, a, |w, v| w.write_i32(*v))?,
            Value::FloatArray(a) => write_array(writer, a, |w, v| w.write_f32(*v))?,
            Value::BoolArray(a) => write_array(writer, a, |w, v| w.write_bool(*v))?,
            Value::StringArray(a) => try_write_array(writer, a, |w, v| self.write_string(w, v))?,
            Value::BinaryArray(a) => try_write_array(writer, a, |w, v| write_blob(w, v))?,
            Value::TimeArray(a) => write_array(writer, a, |w, v| w.write_i32(v.ticks()))?,
            Value::ColorArray(a) => write_array(writer, a, |w, v| write_color(w, v))?,
            Value::Vector2Array(a) => write_array(writer, a, |w, v| write_vector2(w, v))?,
            Value::Vector3Array(a) => write_array(writer, a, |w, v| write_vector3(w, v))?,
            Value::Vector4Array(a) => write_array(writer, a, |w, v| write_vector4(w, v))?,
            Value::QAngleArray(a) => write_array(writer, a, |w, v| write_qangle(w, v))?,
            Value::QuaternionArray(a) => write_array(writer, a, |w, v| write_quaternion(w, v))?,
            Value::MatrixArray(a) => write_array(writer, a, |w, v| write_matrix(w, v))?,
            Value::UInt64Array(a) => write_array(writer, a, |w, v| w.write_u64(*v))?,
            Value::UInt8Array(a) => write_array(writer, a, |w, v| w.write_u8(*v))?,
        }
        Ok(())
    }

    fn write_string(&self, writer: &mut Writer, text: &str) -> Result<(), EncodeError> {
        if self.strings_in_dictionary {
            self.dictionary.write_ref(writer, &self.layout, text)
        } else {
            writer.write_cstr(text);
            Ok(())
        }
    }

    /// Writes an index for elements in this stream, a GUID for anything else.
    pub fn write_reference(&self, writer: &mut Writer, id: Option<ElementId>) {
        match id {
            None => writer.write_i32(NULL_REFERENCE),
            Some(id) => match self.indices.get(&id) {
                Some(&index) => writer.write_i32(index),
                None => {
                    writer.write_i32(STUB_REFERENCE);
                    writer.write_cstr(&id.to_string());
                }
            },
        }
    }
}

fn write_array<T: Clone + Send + Sync + 'static>(
    writer: &mut Writer,
    array: &Array<T>,
    mut item: impl FnMut(&mut Writer, &T),
) -> Result<(), EncodeError> {
    try_write_array(writer, array, |w, v| {
        item(w, v);
        Ok(())
    })
}

fn try_write_array<T: Clone + Send + Sync + 'static>(
    writer: &mut Writer,
    array: &Array<T>,
    mut item: impl FnMut(&mut Writer, &T) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    array.with_items(|items| {
        writer.write_count(items.len(), "array_count")?;
        for value in items {
            item(writer, value)?;
        }
        Ok(())
    })
}

fn write_blob(writer: &mut Writer, bytes: &[u8]) -> Result<(), EncodeError> {
    writer.write_count(bytes.len(), "binary")?;
    writer.write_bytes(bytes);
    Ok(())
}

fn write_color(writer: &mut Writer, c: &Color) {
    writer.write_bytes(&[c.r, c.g, c.b, c.a]);
}

fn write_vector2(writer: &mut Writer, v: &Vector2) {
    writer.write_f32(v.x);
    writer.write_f32(v.y);
}

fn write_vector3(writer: &mut Writer, v: &Vector3) {
    writer.write_f32(v.x);
    writer.write_f32(v.y);
    writer.write_f32(v.z);
}

fn write_vector4(writer: &mut Writer, v: &Vector4) {
    writer.write_f32(v.x);
    writer.write_f32(v.y);
    writer.write_f32(v.z);
    writer.write_f32(v.w);
}

fn write_qangle(writer: &mut Writer, q: &QAngle) {
    writer.write_f32(q.pitch);
    writer.write_f32(q.yaw);
    writer.write_f32(q.roll);
}

fn write_quaternion(writer: &mut Writer, q: &Quaternion) {
    writer.write_f32(q.x);
    writer.write_f32(q.y);
    writer.write_f32(q.z);
    writer.write_f32(q.w);
}

fn write_matrix(writer: &mut Writer, m: &Matrix) {
    for value in m.to_row_major() {
        writer.write_f32(value);
    }
}
