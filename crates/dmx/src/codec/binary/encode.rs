//! Binary encoding.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::codec::binary::dictionary::DictionaryBuilder;
use crate::codec::binary::types::Layout;
use crate::codec::binary::value::ValueWriter;
use crate::codec::binary::ENCODING;
use crate::codec::primitives::Writer;
use crate::codec::Header;
use crate::error::EncodeError;
use crate::model::{Document, Element, ElementId, Value};

/// An element scheduled for output with its attribute snapshot.
struct Entry {
    element: Element,
    attributes: Vec<(String, Value)>,
}

/// Encodes a document, header included.
///
/// Only elements reachable from the root are written. They are numbered
/// in depth-first pre-order, so the root is always index 0. References to
/// stubs (or to anything else outside that set) are written by GUID.
pub fn encode_document(document: &Document, version: i32) -> Result<Vec<u8>, EncodeError> {
    let layout = Layout::for_version(version).ok_or_else(|| EncodeError::UnknownCodec {
        encoding: ENCODING.to_string(),
        version,
    })?;
    let root = document.root().ok_or(EncodeError::NoRoot)?;
    let entries = collect(document, &root)?;
    if entries.len() > i32::MAX as usize {
        return Err(EncodeError::TooManyElements {
            count: entries.len(),
            max: i32::MAX as usize,
        });
    }
    let prefix = if layout.has_prefix() {
        document.prefix_attributes()
    } else {
        Vec::new()
    };
    check_types(&entries, &prefix, &layout)?;
    let dictionary = scrape_strings(&entries, &layout);

    let indices: FxHashMap<ElementId, i32> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.element.id(), i as i32))
        .collect();

    let mut writer = Writer::with_capacity(64 + entries.len() * 64);
    let header = Header::new(ENCODING, version, document.format(), document.format_version());
    writer.write_bytes(header.to_string().as_bytes());
    writer.write_u8(b'\n');
    writer.write_u8(0);

    if layout.has_prefix() {
        write_prefix(&mut writer, &layout, &prefix)?;
    }
    if layout.has_dictionary() {
        dictionary.write(&mut writer, &layout)?;
    }

    let values = ValueWriter {
        layout,
        strings_in_dictionary: layout.values_in_dictionary(),
        dictionary: &dictionary,
        indices: &indices,
    };

    writer.write_count(entries.len(), "element_count")?;
    for entry in &entries {
        let element = &entry.element;
        write_name(&mut writer, &values, &element.class_name(), layout.has_dictionary())?;
        write_name(&mut writer, &values, &element.name(), layout.values_in_dictionary())?;
        writer.write_id(element.id());
    }

    for entry in &entries {
        writer.write_count(entry.attributes.len(), "attribute_count")?;
        for (name, value) in &entry.attributes {
            write_name(&mut writer, &values, name, layout.has_dictionary())?;
            writer.write_u8(values.type_id(value.value_type())?);
            values.write(&mut writer, value)?;
        }
    }

    tracing::debug!(
        version,
        elements = entries.len(),
        strings = dictionary.len(),
        bytes = writer.len(),
        "encoded binary body"
    );
    Ok(writer.into_bytes())
}

/// Walks the graph depth-first from `root`, visiting each non-stub element
/// once. Attribute snapshots are taken here so the output is consistent
/// even if the graph is mutated during encoding.
fn collect(document: &Document, root: &Element) -> Result<Vec<Entry>, EncodeError> {
    let mut visited = FxHashSet::default();
    let mut stack = vec![root.clone()];
    let mut entries = Vec::new();

    while let Some(element) = stack.pop() {
        if element.is_stub() || !visited.insert(element.id()) {
            continue;
        }
        let attributes = element.values_for_encode()?;
        let children: Vec<Element> = attributes
            .iter()
            .flat_map(|(_, value)| value.element_ids())
            .filter(|id| !visited.contains(id))
            .filter_map(|id| document.element(id))
            .collect();
        // Reversed so the first reference is popped first.
        stack.extend(children.into_iter().rev());
        entries.push(Entry { element, attributes });
    }
    Ok(entries)
}

/// Fails on the first value whose type this version cannot write.
fn check_types(entries: &[Entry], prefix: &[(String, Value)], layout: &Layout) -> Result<(), EncodeError> {
    let unsupported = |value: &Value| EncodeError::UnsupportedType {
        value_type: value.value_type(),
        encoding: ENCODING,
        version: layout.version,
    };
    for (_, value) in prefix {
        if value.is_element_typed() || layout.type_id(value.value_type()).is_none() {
            return Err(unsupported(value));
        }
    }
    for entry in entries {
        for (_, value) in &entry.attributes {
            if layout.type_id(value.value_type()).is_none() {
                return Err(unsupported(value));
            }
        }
    }
    Ok(())
}

/// Builds the dictionary in element visiting order.
fn scrape_strings(entries: &[Entry], layout: &Layout) -> DictionaryBuilder {
    let mut dictionary = DictionaryBuilder::new();
    if !layout.has_dictionary() {
        return dictionary;
    }
    let with_values = layout.values_in_dictionary();
    for entry in entries {
        dictionary.add(&entry.element.class_name());
        if with_values {
            dictionary.add(&entry.element.name());
        }
        for (name, value) in &entry.attributes {
            dictionary.add(name);
            if !with_values {
                continue;
            }
            match value {
                Value::String(text) => {
                    dictionary.add(text);
                }
                Value::StringArray(array) => array.with_items(|items| {
                    for text in items {
                        dictionary.add(text);
                    }
                }),
                _ => {}
            }
        }
    }
    dictionary
}

fn write_prefix(writer: &mut Writer, layout: &Layout, prefix: &[(String, Value)]) -> Result<(), EncodeError> {
    let no_strings = DictionaryBuilder::new();
    let no_elements = FxHashMap::default();
    let values = ValueWriter {
        layout: *layout,
        strings_in_dictionary: false,
        dictionary: &no_strings,
        indices: &no_elements,
    };
    writer.write_count(1, "prefix_block_count")?;
    writer.write_count(prefix.len(), "prefix_attribute_count")?;
    for (name, value) in prefix {
        writer.write_cstr(name);
        writer.write_u8(values.type_id(value.value_type())?);
        values.write(writer, value)?;
    }
    Ok(())
}

fn write_name(
    writer: &mut Writer,
    values: &ValueWriter<'_>,
    text: &str,
    via_dictionary: bool,
) -> Result<(), EncodeError> {
    if via_dictionary {
        values.dictionary.write_ref(writer, &values.layout, text)
    } else {
        writer.write_cstr(text);
        Ok(())
    }
}
