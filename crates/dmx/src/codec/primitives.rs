//! Primitive encoding/decoding for the DMX binary format.
//!
//! Fixed-width little-endian integers and floats, NUL-terminated strings
//! and raw 16-byte GUIDs.

use crate::error::DecodeError;
use crate::model::ElementId;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking. Errors carry the absolute offset of the read.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Creates a reader positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof {
                context,
                offset: self.pos,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads exactly N bytes into an array.
    #[inline]
    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Advances past n bytes.
    pub fn skip(&mut self, n: usize, context: &'static str) -> Result<(), DecodeError> {
        self.read_bytes(n, context).map(|_| ())
    }

    #[inline]
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>(context)?[0])
    }

    #[inline]
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        self.read_array(context).map(u16::from_le_bytes)
    }

    #[inline]
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        self.read_array(context).map(u32::from_le_bytes)
    }

    #[inline]
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        self.read_array(context).map(i32::from_le_bytes)
    }

    #[inline]
    pub fn read_u64(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        self.read_array(context).map(u64::from_le_bytes)
    }

    #[inline]
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        self.read_array(context).map(f32::from_le_bytes)
    }

    /// Reads a bool byte; anything other than 0 or 1 is rejected.
    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, DecodeError> {
        let offset = self.pos;
        match self.read_u8(context)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { value, offset }),
        }
    }

    /// Reads a non-negative int32 count, checked against `max`.
    pub fn read_count(&mut self, max: usize, field: &'static str) -> Result<usize, DecodeError> {
        let raw = self.read_i32(field)?;
        let len = usize::try_from(raw).map_err(|_| DecodeError::LengthExceedsLimit {
            field,
            len: usize::MAX,
            max,
        })?;
        if len > max {
            return Err(DecodeError::LengthExceedsLimit { field, len, max });
        }
        Ok(len)
    }

    /// Reads a 16-byte GUID.
    #[inline]
    pub fn read_id(&mut self, context: &'static str) -> Result<ElementId, DecodeError> {
        self.read_array::<16>(context).map(ElementId::from_bytes)
    }

    /// Reads a NUL-terminated UTF-8 string, consuming the terminator.
    pub fn read_cstr(&mut self, max_len: usize, field: &'static str) -> Result<String, DecodeError> {
        let start = self.pos;
        let rest = &self.data[start.min(self.data.len())..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::UnexpectedEof {
                context: field,
                offset: start,
            })?;
        if len > max_len {
            return Err(DecodeError::LengthExceedsLimit { field, len, max: max_len });
        }
        let text = std::str::from_utf8(&rest[..len])
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field, offset: start })?;
        self.pos = start + len + 1;
        Ok(text)
    }

    /// Advances past a NUL-terminated string.
    pub fn skip_cstr(&mut self, field: &'static str) -> Result<(), DecodeError> {
        let start = self.pos;
        let rest = &self.data[start.min(self.data.len())..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::UnexpectedEof {
                context: field,
                offset: start,
            })?;
        self.pos = start + len + 1;
        Ok(())
    }

    /// Reads an int32 length-prefixed byte blob.
    pub fn read_blob(&mut self, max_len: usize, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_count(max_len, field)?;
        Ok(self.read_bytes(len, field)?.to_vec())
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Writes an int32 count. Lengths above `i32::MAX` are rejected.
    pub fn write_count(&mut self, len: usize, field: &'static str) -> Result<(), crate::error::EncodeError> {
        let count = i32::try_from(len).map_err(|_| crate::error::EncodeError::LengthExceedsLimit {
            field,
            len,
            max: i32::MAX as usize,
        })?;
        self.write_i32(count);
        Ok(())
    }

    /// Writes a NUL-terminated string. Interior NULs truncate on read, so
    /// the string is cut at the first one.
    pub fn write_cstr(&mut self, text: &str) {
        let bytes = text.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.write_bytes(&bytes[..end]);
        self.write_u8(0);
    }

    pub fn write_id(&mut self, id: ElementId) {
        self.write_bytes(id.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_roundtrip() {
        let mut writer = Writer::new();
        writer.write_u8(7);
        writer.write_u16(0xBEEF);
        writer.write_i32(-2);
        writer.write_u64(u64::MAX - 1);
        writer.write_f32(1.5);
        writer.write_cstr("hello");
        let id = ElementId::random();
        writer.write_id(id);

        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u8("a").unwrap(), 7);
        assert_eq!(reader.read_u16("b").unwrap(), 0xBEEF);
        assert_eq!(reader.read_i32("c").unwrap(), -2);
        assert_eq!(reader.read_u64("d").unwrap(), u64::MAX - 1);
        assert_eq!(reader.read_f32("e").unwrap(), 1.5);
        assert_eq!(reader.read_cstr(64, "f").unwrap(), "hello");
        assert_eq!(reader.read_id("g").unwrap(), id);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_eof_reports_offset() {
        let bytes = [1u8, 2, 3];
        let mut reader = Reader::new(&bytes);
        reader.read_u8("first").unwrap();
        let err = reader.read_i32("count").unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEof { context: "count", offset: 1 });
    }

    #[test]
    fn test_unterminated_string() {
        let bytes = b"abc";
        let err = Reader::new(bytes).read_cstr(64, "name").unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { context: "name", offset: 0 }));
    }

    #[test]
    fn test_negative_count_rejected() {
        let bytes = (-5i32).to_le_bytes();
        let err = Reader::new(&bytes).read_count(100, "array").unwrap_err();
        assert!(matches!(err, DecodeError::LengthExceedsLimit { field: "array", .. }));
    }

    #[test]
    fn test_invalid_bool() {
        let err = Reader::new(&[2u8]).read_bool("flag").unwrap_err();
        assert_eq!(err, DecodeError::InvalidBool { value: 2, offset: 0 });
    }
}
