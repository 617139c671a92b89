//! keyvalues2 encoding.

use rustc_hash::FxHashMap;

use crate::codec::keyvalues2::lexer::escape;
use crate::codec::keyvalues2::value::{format_array, format_scalar, is_single_line};
use crate::codec::keyvalues2::{ENCODING, VERSIONS};
use crate::codec::Header;
use crate::error::EncodeError;
use crate::limits::MAX_NESTING_DEPTH;
use crate::model::{Document, Element, ElementId, Value};

/// Encodes a document as keyvalues2 text, header included.
///
/// The root and every element referenced two or more times are written as
/// top-level blocks. An element referenced exactly once is written inline
/// where it is used. Every other reference is a `"element" "<guid>"` token.
pub fn encode_document(document: &Document, version: i32) -> Result<Vec<u8>, EncodeError> {
    if !VERSIONS.contains(&version) {
        return Err(EncodeError::UnknownCodec {
            encoding: ENCODING.to_string(),
            version,
        });
    }
    let root = document.root().ok_or(EncodeError::NoRoot)?;
    let plan = Plan::build(document, &root)?;

    let header = Header::new(ENCODING, version, document.format(), document.format_version());
    let mut out = TextWriter {
        out: format!("{header}\n"),
        plan: &plan,
    };
    for (i, id) in plan.top_level.iter().enumerate() {
        if i > 0 {
            out.out.push('\n');
        }
        let entry = &plan.entries[id];
        out.line(0, &quote(&entry.element.class_name()));
        out.body(*id, 0, 0)?;
    }

    tracing::debug!(
        elements = plan.entries.len(),
        top_level = plan.top_level.len(),
        bytes = out.out.len(),
        "encoded keyvalues2 body"
    );
    Ok(out.out.into_bytes())
}

struct Entry {
    element: Element,
    attributes: Vec<(String, Value)>,
}

/// Reference counts over everything reachable from the root.
struct Plan {
    root: ElementId,
    entries: FxHashMap<ElementId, Entry>,
    counts: FxHashMap<ElementId, usize>,
    top_level: Vec<ElementId>,
}

impl Plan {
    fn build(document: &Document, root: &Element) -> Result<Plan, EncodeError> {
        let mut entries = FxHashMap::default();
        let mut counts: FxHashMap<ElementId, usize> = FxHashMap::default();
        let mut order = Vec::new();
        let mut stack = vec![root.clone()];

        while let Some(element) = stack.pop() {
            let id = element.id();
            if entries.contains_key(&id) {
                continue;
            }
            let attributes = element.values_for_encode()?;
            let mut children = Vec::new();
            for target in attributes.iter().flat_map(|(_, value)| value.element_ids()) {
                *counts.entry(target).or_insert(0) += 1;
                if target != id && !entries.contains_key(&target) {
                    if let Some(child) = document.element(target).filter(|c| !c.is_stub()) {
                        children.push(child);
                    }
                }
            }
            stack.extend(children.into_iter().rev());
            order.push(id);
            entries.insert(id, Entry { element, attributes });
        }

        let root = root.id();
        let top_level = order
            .into_iter()
            .filter(|id| *id == root || counts.get(id).copied().unwrap_or(0) >= 2)
            .collect();
        Ok(Plan {
            root,
            entries,
            counts,
            top_level,
        })
    }

    /// True if `id` is written in place of its single reference.
    fn is_inline(&self, id: ElementId) -> bool {
        id != self.root && self.counts.get(&id) == Some(&1) && self.entries.contains_key(&id)
    }
}

struct TextWriter<'p> {
    out: String,
    plan: &'p Plan,
}

impl TextWriter<'_> {
    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Appends a comma to the line just written.
    fn comma(&mut self) {
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out.push_str(",\n");
    }

    /// Writes `{ .. }` for an element whose class line is already out.
    /// `depth` counts enclosing inline definitions.
    fn body(&mut self, id: ElementId, indent: usize, depth: usize) -> Result<(), EncodeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(EncodeError::LengthExceedsLimit {
                field: "element nesting",
                len: depth,
                max: MAX_NESTING_DEPTH,
            });
        }
        let plan = self.plan;
        let entry = &plan.entries[&id];
        self.line(indent, "{");
        self.line(indent + 1, &format!("\"id\" \"elementid\" \"{id}\""));
        self.line(indent + 1, &format!("\"name\" \"string\" {}", quote(&entry.element.name())));
        for (name, value) in &entry.attributes {
            self.attribute(name, value, indent + 1, depth)?;
        }
        self.line(indent, "}");
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &Value, indent: usize, depth: usize) -> Result<(), EncodeError> {
        let key = quote(name);
        let type_name = quote(&value.value_type().to_string());
        match value {
            Value::Element(Some(target)) if self.plan.is_inline(*target) => {
                let class_name = self.plan.entries[target].element.class_name();
                self.line(indent, &format!("{key} {}", quote(&class_name)));
                self.body(*target, indent, depth + 1)?;
            }
            Value::Element(target) => {
                self.line(indent, &format!("{key} \"element\" {}", reference(*target)));
            }
            Value::ElementArray(array) => {
                self.line(indent, &format!("{key} {type_name}"));
                self.line(indent, "[");
                let ids = array.ids();
                for (i, target) in ids.iter().enumerate() {
                    match target {
                        Some(target) if self.plan.is_inline(*target) => {
                            let class_name = self.plan.entries[target].element.class_name();
                            self.line(indent + 1, &quote(&class_name));
                            self.body(*target, indent + 1, depth + 1)?;
                        }
                        _ => self.line(indent + 1, &format!("\"element\" {}", reference(*target))),
                    }
                    if i + 1 < ids.len() {
                        self.comma();
                    }
                }
                self.line(indent, "]");
            }
            _ if value.is_array() => {
                let items: Vec<String> = format_array(value)
                    .unwrap_or_default()
                    .iter()
                    .map(|item| quote(item))
                    .collect();
                if is_single_line(value.value_type().kind) {
                    let joined = if items.is_empty() {
                        String::from(" ")
                    } else {
                        format!(" {} ", items.join(", "))
                    };
                    self.line(indent, &format!("{key} {type_name} [{joined}]"));
                } else {
                    self.line(indent, &format!("{key} {type_name}"));
                    self.line(indent, "[");
                    for (i, item) in items.iter().enumerate() {
                        self.line(indent + 1, item);
                        if i + 1 < items.len() {
                            self.comma();
                        }
                    }
                    self.line(indent, "]");
                }
            }
            _ => {
                let text = format_scalar(value).unwrap_or_default();
                self.line(indent, &format!("{key} {type_name} {}", quote(&text)));
            }
        }
        Ok(())
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", escape(text))
}

fn reference(target: Option<ElementId>) -> String {
    match target {
        Some(id) => format!("\"{id}\""),
        None => String::from("\"\""),
    }
}
