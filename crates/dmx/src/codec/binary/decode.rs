//! Binary decoding.

use std::sync::Arc;

use crate::codec::binary::dictionary::StringTable;
use crate::codec::binary::types::Layout;
use crate::codec::binary::value::ValueReader;
use crate::codec::binary::ENCODING;
use crate::codec::primitives::Reader;
use crate::codec::{Header, LoadMode, LoadOptions};
use crate::error::DecodeError;
use crate::limits::{MAX_ATTRIBUTES, MAX_PREFIX_BLOCKS, MAX_STRING_LEN};
use crate::model::document::DeferredSource;
use crate::model::{
    Deferred, Document, DocumentOptions, Element, ElementId, Value, ValueKind, ValueType,
};

/// Decodes a binary body into a new document.
pub fn decode_document(header: &Header, body: &[u8], options: &LoadOptions) -> Result<Document, DecodeError> {
    let layout = Layout::for_version(header.encoding_version).ok_or_else(|| DecodeError::UnknownCodec {
        encoding: header.encoding.clone(),
        version: header.encoding_version,
    })?;
    let document = Document::with_options(DocumentOptions {
        max_elements: options.max_elements,
        allow_random_ids: true,
    });
    document.set_format(header.format.clone(), header.format_version);
    document.set_encoding(ENCODING, header.encoding_version);

    let mut reader = Reader::new(body);
    if layout.has_prefix() {
        let prefix = read_prefix(&mut reader, &layout, &document)?;
        document.replace_prefix_attributes(prefix);
    }

    let strings = StringTable::read(&mut reader, &layout)?;
    let (elements, ids) = read_element_index(&mut reader, &layout, &strings, &document, options)?;

    let values = ValueReader {
        layout,
        strings_in_dictionary: layout.values_in_dictionary(),
        strings: &strings,
        elements: &ids,
    };
    let mut deferred = 0usize;
    for element in &elements {
        deferred += read_attributes(&mut reader, &values, element, &document, options.mode)?;
    }

    let string_count = strings.len();
    document.set_root(elements.first())?;
    if deferred > 0 {
        document.set_deferred_source(Box::new(BinarySource {
            data: Arc::from(body),
            layout,
            strings,
            elements: ids,
        }));
    }
    tracing::debug!(
        version = layout.version,
        elements = elements.len(),
        strings = string_count,
        deferred,
        "decoded binary body"
    );
    Ok(document)
}

/// Reads v9 prefix blocks. Only the first block is kept.
fn read_prefix(
    reader: &mut Reader<'_>,
    layout: &Layout,
    document: &Document,
) -> Result<Vec<(String, Value)>, DecodeError> {
    let empty = StringTable::default();
    let values = ValueReader {
        layout: *layout,
        strings_in_dictionary: false,
        strings: &empty,
        elements: &[],
    };

    let blocks = reader.read_count(MAX_PREFIX_BLOCKS, "prefix_block_count")?;
    let mut kept = Vec::new();
    for block in 0..blocks {
        let count = reader.read_count(MAX_ATTRIBUTES, "prefix_attribute_count")?;
        for _ in 0..count {
            let name = reader.read_cstr(MAX_STRING_LEN, "prefix_attribute_name")?;
            let value_type = read_type(reader, layout)?;
            if value_type.kind == ValueKind::Element {
                return Err(DecodeError::ElementNotAllowed {
                    context: "prefix attributes",
                });
            }
            let value = values.read(reader, value_type, document)?;
            if block == 0 {
                kept.push((name, value));
            }
        }
    }
    if blocks > 1 {
        tracing::warn!(blocks, "ignoring prefix blocks after the first");
    }
    Ok(kept)
}

fn read_type(reader: &mut Reader<'_>, layout: &Layout) -> Result<ValueType, DecodeError> {
    let offset = reader.position();
    let type_id = reader.read_u8("attribute_type")?;
    layout
        .value_type(type_id)
        .ok_or(DecodeError::UnknownTypeId { type_id, offset })
}

/// Reads a name that is a dictionary index when `via_dictionary`, inline
/// text otherwise.
fn read_name(
    reader: &mut Reader<'_>,
    strings: &StringTable,
    via_dictionary: bool,
    field: &'static str,
) -> Result<String, DecodeError> {
    if via_dictionary {
        strings.read_ref(reader, field).map(str::to_owned)
    } else {
        reader.read_cstr(MAX_STRING_LEN, field)
    }
}

/// Reads the element index and registers every element before any
/// attribute is parsed, so forward and cyclic references find real elements.
fn read_element_index(
    reader: &mut Reader<'_>,
    layout: &Layout,
    strings: &StringTable,
    document: &Document,
    options: &LoadOptions,
) -> Result<(Vec<Element>, Vec<ElementId>), DecodeError> {
    let count = reader.read_count(options.max_elements, "element_count")?;
    let mut elements = Vec::with_capacity(count.min(reader.remaining_len() / 17));
    let mut ids = Vec::with_capacity(elements.capacity());
    for _ in 0..count {
        let class_name = read_name(reader, strings, layout.has_dictionary(), "element_class")?;
        let name = read_name(reader, strings, layout.values_in_dictionary(), "element_name")?;
        let id = reader.read_id("element_id")?;
        elements.push(document.define_element(id, name, class_name)?);
        ids.push(id);
    }
    Ok((elements, ids))
}

/// Reads one element's attributes. Returns how many were deferred.
fn read_attributes(
    reader: &mut Reader<'_>,
    values: &ValueReader<'_>,
    element: &Element,
    document: &Document,
    mode: LoadMode,
) -> Result<usize, DecodeError> {
    let count = reader.read_count(MAX_ATTRIBUTES, "attribute_count")?;
    let mut deferred = 0;
    for _ in 0..count {
        let name = read_name(reader, values.strings, values.layout.has_dictionary(), "attribute_name")?;
        let value_type = read_type(reader, &values.layout)?;

        // Element references are always read eagerly so stubs for GUID
        // references exist as soon as the load returns.
        if mode == LoadMode::Deferred && value_type.kind != ValueKind::Element {
            let offset = reader.position();
            values.skip(reader, value_type)?;
            element.insert_pending(name, Deferred { offset, value_type });
            deferred += 1;
        } else {
            let value = values.read(reader, value_type, document)?;
            element.insert_unchecked(name, value);
        }
    }
    Ok(deferred)
}

/// Retained stream used to decode deferred attributes.
struct BinarySource {
    data: Arc<[u8]>,
    layout: Layout,
    strings: StringTable,
    elements: Vec<ElementId>,
}

impl DeferredSource for BinarySource {
    fn codec_name(&self) -> &str {
        ENCODING
    }

    fn read_value(&mut self, document: &Document, deferred: Deferred) -> Result<Value, DecodeError> {
        let mut reader = Reader::at(&self.data, deferred.offset);
        let values = ValueReader {
            layout: self.layout,
            strings_in_dictionary: self.layout.values_in_dictionary(),
            strings: &self.strings,
            elements: &self.elements,
        };
        values.read(&mut reader, deferred.value_type, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::binary::encode::encode_document;
    use crate::codec::primitives::Writer;
    use crate::error::ErrorKind;

    fn decode_bytes(bytes: &[u8], options: &LoadOptions) -> Result<Document, DecodeError> {
        let (header, body) = Header::parse(bytes)?;
        decode_document(&header, &bytes[body..], options)
    }

    fn sample() -> Document {
        let doc = Document::new();
        let root = doc.create_element("root", None, Some("DmeRoot")).unwrap();
        let child = doc.create_element("child", None, None).unwrap();
        root.set_element("child", Some(&child)).unwrap();
        child.set_element("parent", Some(&root)).unwrap();
        child.set("label", "leaf").unwrap();
        child.set("weights", vec![0.25f32, 0.5, 0.25]).unwrap();
        doc
    }

    #[test]
    fn test_cycle_survives() {
        let doc = sample();
        for version in [1, 2, 3, 4, 5, 9] {
            let bytes = encode_document(&doc, version).unwrap();
            let loaded = decode_bytes(&bytes, &LoadOptions::default()).unwrap();
            let root = loaded.root().unwrap();
            assert_eq!(root.class_name(), "DmeRoot");
            let child = root.get_element("child").unwrap().unwrap();
            assert!(child.get_element("parent").unwrap().unwrap().ptr_eq(&root));
            assert_eq!(child.get_as::<String>("label").unwrap(), Some("leaf".into()));
        }
    }

    #[test]
    fn test_deferred_values_match_eager() {
        let doc = sample();
        let bytes = encode_document(&doc, 5).unwrap();
        let loaded = decode_bytes(&bytes, &LoadOptions::deferred()).unwrap();
        let child = loaded.root().unwrap().get_element("child").unwrap().unwrap();
        assert!(child.is_deferred("weights"));
        assert_eq!(
            child.value_type("weights").unwrap(),
            Some(ValueType::array(ValueKind::Float))
        );
        assert_eq!(child.get_array::<f32>("weights").unwrap().unwrap().to_vec(), vec![0.25, 0.5, 0.25]);
        assert!(!child.is_deferred("weights"));
        assert!(loaded.has_deferred_source());
    }

    #[test]
    fn test_release_source_fails_pending_reads() {
        let doc = sample();
        let bytes = encode_document(&doc, 9).unwrap();
        let loaded = decode_bytes(&bytes, &LoadOptions::deferred()).unwrap();
        loaded.release_deferred_source();
        let child = loaded.root().unwrap().get_element("child").unwrap().unwrap();
        let err = child.get("label").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeferredLoadFailure);
    }

    #[test]
    fn test_truncated_stream() {
        let doc = sample();
        let bytes = encode_document(&doc, 5).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        let err = decode_bytes(cut, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_unknown_type_id() {
        let mut writer = Writer::new();
        writer.write_bytes(format!("{}\n", Header::new("binary", 1, "dmx", 1)).as_bytes());
        writer.write_u8(0);
        writer.write_i32(1);
        writer.write_cstr("DmElement");
        writer.write_cstr("root");
        writer.write_id(ElementId::random());
        writer.write_i32(1);
        writer.write_cstr("bad");
        writer.write_u8(7);
        let bytes = writer.into_bytes();
        let err = decode_bytes(&bytes, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTypeId { type_id: 7, .. }));
    }

    #[test]
    fn test_duplicate_index_entry() {
        let id = ElementId::random();
        let mut writer = Writer::new();
        writer.write_bytes(format!("{}\n", Header::new("binary", 1, "dmx", 1)).as_bytes());
        writer.write_u8(0);
        writer.write_i32(2);
        for _ in 0..2 {
            writer.write_cstr("DmElement");
            writer.write_cstr("twin");
            writer.write_id(id);
        }
        let err = decode_bytes(&writer.into_bytes(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdentityCollision);
    }

    #[test]
    fn test_element_limit() {
        let doc = sample();
        let bytes = encode_document(&doc, 5).unwrap();
        let options = LoadOptions {
            max_elements: 1,
            ..LoadOptions::default()
        };
        let err = decode_bytes(&bytes, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }
}
