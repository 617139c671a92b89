//! Builder API for ergonomic element construction.
//!
//! # Example
//!
//! ```rust
//! use dmx::{Document, Vector3};
//!
//! let doc = Document::new();
//! let mesh = doc
//!     .build("mesh")
//!     .class_name("DmeMesh")
//!     .attr("visible", true)
//!     .attr("origin", Vector3::new(0.0, 1.0, 0.0))
//!     .finish()
//!     .unwrap();
//! let scene = doc
//!     .build("scene")
//!     .element("mesh", &mesh)
//!     .finish()
//!     .unwrap();
//! assert!(scene.get_element("mesh").unwrap().unwrap().ptr_eq(&mesh));
//! ```

use crate::error::DmxError;
use crate::model::{Document, Element, ElementId, Value};

enum Pending {
    Value(Value),
    Element(Option<Element>),
}

/// Fluent constructor returned by [`Document::build`].
///
/// Nothing is registered until [`ElementBuilder::finish`].
#[must_use = "an element is only created by `finish`"]
pub struct ElementBuilder {
    document: Document,
    name: String,
    class_name: Option<String>,
    id: Option<ElementId>,
    attributes: Vec<(String, Pending)>,
}

impl ElementBuilder {
    pub(crate) fn new(document: Document, name: String) -> Self {
        Self {
            document,
            name,
            class_name: None,
            id: None,
            attributes: Vec::new(),
        }
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Uses an explicit ID instead of a random one.
    pub fn id(mut self, id: ElementId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), Pending::Value(value.into())));
        self
    }

    /// Adds an element reference; unowned targets are adopted on finish.
    pub fn element(mut self, name: impl Into<String>, target: &Element) -> Self {
        self.attributes
            .push((name.into(), Pending::Element(Some(target.clone()))));
        self
    }

    pub fn null_element(mut self, name: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Pending::Element(None)));
        self
    }

    /// Registers the element and sets its attributes in order.
    ///
    /// If an attribute is rejected the element stays registered with the
    /// attributes set so far.
    pub fn finish(self) -> Result<Element, DmxError> {
        let element = self
            .document
            .create_element(self.name, self.id, self.class_name.as_deref())?;
        for (name, pending) in self.attributes {
            match pending {
                Pending::Value(value) => element.set(name, value)?,
                Pending::Element(target) => element.set_element(name, target.as_ref())?,
            }
        }
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_build_with_explicit_id() {
        let doc = Document::new();
        let id = ElementId::random();
        let e = doc
            .build("node")
            .id(id)
            .class_name("DmeNode")
            .attr("count", 3i32)
            .null_element("parent")
            .finish()
            .unwrap();
        assert_eq!(e.id(), id);
        assert_eq!(e.class_name(), "DmeNode");
        assert_eq!(e.attribute_names().unwrap(), vec!["count", "parent"]);
        assert_eq!(e.get("parent").unwrap(), Some(Value::Element(None)));
    }

    #[test]
    fn test_build_rejects_foreign_reference() {
        let doc = Document::new();
        let other = Document::new();
        let foreign = other.create_element("f", None, None).unwrap();
        let err = doc.build("node").element("child", &foreign).finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OwnershipViolation);
    }
}
