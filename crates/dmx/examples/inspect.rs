//! Simple inspector for DMX files.
//!
//! Usage: `cargo run --example inspect -- <file> [--deferred]`
//!
//! Set `RUST_LOG=dmx=debug` to see codec tracing.

use std::fs;

use dmx::{Element, ElementId, Header, LoadOptions, Value};
use rustc_hash::FxHashSet;
use tracing_subscriber::EnvFilter;

/// Attributes printed per element before truncating.
const MAX_ATTRIBUTES_SHOWN: usize = 12;

fn format_value(v: &Value) -> String {
    match v {
        Value::Element(None) => "null".to_string(),
        Value::Element(Some(id)) => format!("-> {}", id),
        Value::String(s) => {
            let preview: String = s.chars().take(60).collect();
            if s.chars().count() > 60 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Binary(b) => format!("BINARY[{}]", b.len()),
        Value::Time(t) => format!("{}s", t.as_secs_f64()),
        Value::Color(c) => format!("rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a),
        Value::Matrix(_) => "MATRIX".to_string(),
        Value::ElementArray(a) => format!("ELEMENTS[{}]", a.len()),
        other if other.is_array() => {
            format!("{}[{}]", other.value_type(), other.array_len().unwrap_or(0))
        }
        other => format!("{:?}", other),
    }
}

fn print_element(element: &Element, depth: usize, seen: &mut FxHashSet<ElementId>) {
    let indent = "  ".repeat(depth);
    if element.is_stub() {
        println!("{}<stub {}>", indent, element.id());
        return;
    }
    if !seen.insert(element.id()) {
        println!("{}{} \"{}\" (see above)", indent, element.class_name(), element.name());
        return;
    }
    println!("{}{} \"{}\" {}", indent, element.class_name(), element.name(), element.id());

    let attributes = match element.attributes() {
        Ok(attributes) => attributes,
        Err(e) => {
            println!("{}  <error: {}>", indent, e);
            return;
        }
    };
    for (name, value) in attributes.iter().take(MAX_ATTRIBUTES_SHOWN) {
        println!("{}  .{} = {}", indent, name, format_value(value));
    }
    if attributes.len() > MAX_ATTRIBUTES_SHOWN {
        println!("{}  ... and {} more attributes", indent, attributes.len() - MAX_ATTRIBUTES_SHOWN);
    }

    let Some(document) = element.document() else {
        return;
    };
    for (_, value) in &attributes {
        for id in value.element_ids() {
            if let Some(child) = document.element(id) {
                print_element(&child, depth + 1, seen);
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "scene.dmx".to_string());
    let deferred = args.any(|a| a == "--deferred");

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let (header, body_offset) = Header::parse(&data).expect("Failed to parse header");
    println!("\n=== Header ===");
    println!("Encoding: {} {}", header.encoding, header.encoding_version);
    println!("Format: {} {}", header.format, header.format_version);
    println!("Body starts at byte {}", body_offset);

    let options = if deferred {
        LoadOptions::deferred()
    } else {
        LoadOptions::default()
    };
    let doc = dmx::load_with(&data, &options).expect("Failed to decode");

    let stubs = doc.elements().iter().filter(|e| e.is_stub()).count();
    println!("\n=== Elements ({}) ===", doc.len());
    println!("  Real: {}", doc.len() - stubs);
    println!("  Stubs: {}", stubs);

    let prefix = doc.prefix_attributes();
    if !prefix.is_empty() {
        println!("\n=== Prefix Attributes ({}) ===", prefix.len());
        for (name, value) in &prefix {
            println!("  {} = {}", name, format_value(value));
        }
    }

    println!("\n=== Tree ===");
    match doc.root() {
        Some(root) => print_element(&root, 0, &mut FxHashSet::default()),
        None => println!("(no root)"),
    }
}
