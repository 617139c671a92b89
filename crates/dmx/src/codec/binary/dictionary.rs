//! The binary string dictionary.
//!
//! From version 2 the body starts with a deduplicated string table; names
//! and (from version 4) string values are written as indices into it.
//! The entry count is u16 before version 4 and u32 after; each index is u16
//! before version 5 and u32 after.

use rustc_hash::FxHashMap;

use crate::codec::binary::types::Layout;
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_DICT_SIZE, MAX_STRING_LEN};

// =============================================================================
// DECODING
// =============================================================================

/// String table read from a stream.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<String>,
    wide_index: bool,
}

impl StringTable {
    /// Reads the table, or returns an empty one for versions without it.
    pub fn read(reader: &mut Reader<'_>, layout: &Layout) -> Result<Self, DecodeError> {
        if !layout.has_dictionary() {
            return Ok(Self::default());
        }
        let count = if layout.wide_dictionary_count() {
            reader.read_u32("dictionary_count")? as usize
        } else {
            reader.read_u16("dictionary_count")? as usize
        };
        if count > MAX_DICT_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "dictionary_count",
                len: count,
                max: MAX_DICT_SIZE,
            });
        }
        let mut strings = Vec::with_capacity(count.min(reader.remaining_len()));
        for _ in 0..count {
            strings.push(reader.read_cstr(MAX_STRING_LEN, "dictionary_entry")?);
        }
        Ok(Self {
            strings,
            wide_index: layout.wide_dictionary_index(),
        })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Reads an index and returns the string it refers to.
    pub fn read_ref(&self, reader: &mut Reader<'_>, context: &'static str) -> Result<&str, DecodeError> {
        let offset = reader.position();
        let index = if self.wide_index {
            reader.read_u32(context)? as usize
        } else {
            reader.read_u16(context)? as usize
        };
        self.strings
            .get(index)
            .map(String::as_str)
            .ok_or(DecodeError::StringIndexOutOfBounds {
                index,
                size: self.strings.len(),
                offset,
            })
    }

    /// Width in bytes of one index.
    pub fn index_width(&self) -> usize {
        if self.wide_index { 4 } else { 2 }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Builds the string table during encoding.
///
/// Strings are numbered in first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct DictionaryBuilder {
    strings: Vec<String>,
    indices: FxHashMap<String, u32>,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or gets the index for a string.
    pub fn add(&mut self, text: &str) -> u32 {
        if let Some(&index) = self.indices.get(text) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(text.to_owned());
        self.indices.insert(text.to_owned(), index);
        index
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Largest table a version can address.
    fn capacity(layout: &Layout) -> usize {
        if layout.wide_dictionary_index() {
            MAX_DICT_SIZE
        } else if layout.wide_dictionary_count() {
            u16::MAX as usize + 1
        } else {
            u16::MAX as usize
        }
    }

    /// Writes the count and entries.
    pub fn write(&self, writer: &mut Writer, layout: &Layout) -> Result<(), EncodeError> {
        let max = Self::capacity(layout);
        if self.strings.len() > max {
            return Err(EncodeError::TooManyStrings {
                count: self.strings.len(),
                max,
                version: layout.version,
            });
        }
        if layout.wide_dictionary_count() {
            writer.write_u32(self.strings.len() as u32);
        } else {
            writer.write_u16(self.strings.len() as u16);
        }
        for text in &self.strings {
            writer.write_cstr(text);
        }
        Ok(())
    }

    /// Writes the index of a string that was added during the scrape.
    pub fn write_ref(&self, writer: &mut Writer, layout: &Layout, text: &str) -> Result<(), EncodeError> {
        let index = *self.indices.get(text).ok_or(EncodeError::MissingString {
            text: text.to_owned(),
        })?;
        if layout.wide_dictionary_index() {
            writer.write_u32(index);
        } else {
            writer.write_u16(index as u16);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_in_insertion_order() {
        let mut builder = DictionaryBuilder::new();
        assert_eq!(builder.add("DmElement"), 0);
        assert_eq!(builder.add("name"), 1);
        assert_eq!(builder.add("DmElement"), 0);
        assert_eq!(builder.strings(), ["DmElement", "name"]);
    }

    #[test]
    fn test_index_width_by_version() {
        for (version, count_width, index_width) in [(2, 2, 2), (4, 4, 2), (5, 4, 4)] {
            let layout = Layout::for_version(version).unwrap();
            let mut builder = DictionaryBuilder::new();
            builder.add("a");
            builder.add("b");

            let mut writer = Writer::new();
            builder.write(&mut writer, &layout).unwrap();
            assert_eq!(writer.len(), count_width + 4);
            builder.write_ref(&mut writer, &layout, "b").unwrap();
            assert_eq!(writer.len(), count_width + 4 + index_width);

            let bytes = writer.into_bytes();
            let mut reader = Reader::new(&bytes);
            let table = StringTable::read(&mut reader, &layout).unwrap();
            assert_eq!(table.len(), 2);
            assert_eq!(table.read_ref(&mut reader, "ref").unwrap(), "b");
        }
    }

    #[test]
    fn test_index_out_of_bounds() {
        let layout = Layout::for_version(5).unwrap();
        let mut writer = Writer::new();
        writer.write_u32(1);
        writer.write_cstr("only");
        writer.write_u32(3);
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        let table = StringTable::read(&mut reader, &layout).unwrap();
        let err = table.read_ref(&mut reader, "ref").unwrap_err();
        assert!(matches!(err, DecodeError::StringIndexOutOfBounds { index: 3, size: 1, .. }));
    }

    #[test]
    fn test_too_many_strings_for_narrow_count() {
        let layout = Layout::for_version(2).unwrap();
        let mut builder = DictionaryBuilder::new();
        for i in 0..=u16::MAX as u32 {
            builder.add(&i.to_string());
        }
        let err = builder.write(&mut Writer::new(), &layout).unwrap_err();
        assert!(matches!(err, EncodeError::TooManyStrings { version: 2, .. }));
    }
}
