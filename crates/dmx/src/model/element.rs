//! Elements: identity-bearing nodes owning an ordered attribute mapping.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::DmxError;
use crate::limits::MAX_ATTRIBUTES;
use crate::model::attribute::{Attribute, AttributeMap, Deferred};
use crate::model::document::DocumentShared;
use crate::model::notify::{AttributeChange, Observers, Subscription};
use crate::model::{Array, Document, ElementArray, ElementId, Scalar, Value, ValueKind, ValueType};

/// Class name given to elements created without one.
pub const DEFAULT_CLASS_NAME: &str = "DmElement";

pub(crate) struct ElementInner {
    id: ElementId,
    name: RwLock<String>,
    class_name: RwLock<String>,
    stub: AtomicBool,
    attributes: RwLock<AttributeMap>,
    owner: RwLock<Weak<DocumentShared>>,
    observers: Observers<AttributeChange>,
}

/// Shared handle to a graph node.
///
/// Clones refer to the same node. Element-valued attributes store IDs, and
/// resolve them through the owning [`Document`].
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

impl Element {
    pub(crate) fn new_real(id: ElementId, name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self::with_state(id, name.into(), class_name.into(), false)
    }

    pub(crate) fn new_stub(id: ElementId) -> Self {
        Self::with_state(id, String::new(), DEFAULT_CLASS_NAME.to_string(), true)
    }

    fn with_state(id: ElementId, name: String, class_name: String, stub: bool) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                id,
                name: RwLock::new(name),
                class_name: RwLock::new(class_name),
                stub: AtomicBool::new(stub),
                attributes: RwLock::new(AttributeMap::default()),
                owner: RwLock::new(Weak::new()),
                observers: Observers::new(),
            }),
        }
    }

    pub fn id(&self) -> ElementId {
        self.inner.id
    }

    pub fn name(&self) -> String {
        self.inner.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.inner.name.write() = name.into();
    }

    pub fn class_name(&self) -> String {
        self.inner.class_name.read().clone()
    }

    pub fn set_class_name(&self, class_name: impl Into<String>) {
        *self.inner.class_name.write() = class_name.into();
    }

    /// True for placeholders whose definition lies outside the current load.
    pub fn is_stub(&self) -> bool {
        self.inner.stub.load(Ordering::Acquire)
    }

    /// The owning document, or `None` for unowned elements.
    pub fn document(&self) -> Option<Document> {
        self.inner.owner.read().upgrade().map(Document::from_shared)
    }

    pub fn is_owned_by(&self, document: &Document) -> bool {
        std::ptr::eq(self.inner.owner.read().as_ptr(), Arc::as_ptr(&document.shared))
    }

    /// True if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of attributes; always zero for stubs.
    pub fn len(&self) -> usize {
        self.inner.attributes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.attributes.read().contains(name)
    }

    fn ensure_not_stub(&self) -> Result<(), DmxError> {
        if self.is_stub() {
            return Err(DmxError::StubAccess { id: self.id() });
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Arc<Attribute>> {
        self.inner.attributes.read().get(name).cloned()
    }

    fn snapshot(&self) -> Vec<Arc<Attribute>> {
        self.inner.attributes.read().iter().cloned().collect()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Attribute names in insertion order.
    pub fn attribute_names(&self) -> Result<Vec<String>, DmxError> {
        self.ensure_not_stub()?;
        Ok(self.inner.attributes.read().names())
    }

    /// Type of an attribute; does not trigger a deferred load.
    pub fn value_type(&self, name: &str) -> Result<Option<ValueType>, DmxError> {
        self.ensure_not_stub()?;
        Ok(self.attribute(name).map(|a| a.value_type()))
    }

    /// True if the attribute exists and its value has not been decoded yet.
    pub fn is_deferred(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|a| a.is_pending())
    }

    /// Reads an attribute value, resolving deferred values and giving the
    /// document's stub resolver a chance to replace referenced stubs.
    pub fn get(&self, name: &str) -> Result<Option<Value>, DmxError> {
        self.ensure_not_stub()?;
        let Some(attribute) = self.attribute(name) else {
            return Ok(None);
        };
        let value = attribute.load(self)?;
        self.resolve_stub_references(&value);
        Ok(Some(value))
    }

    /// Reads a scalar attribute as `T`.
    pub fn get_as<T: Scalar>(&self, name: &str) -> Result<Option<T>, DmxError> {
        match self.get(name)? {
            None => Ok(None),
            Some(value) => T::from_value(&value)
                .map(Some)
                .ok_or_else(|| self.mismatch(name, ValueType::scalar(T::KIND), &value)),
        }
    }

    /// Reads an array attribute holding `T` items.
    pub fn get_array<T: Scalar>(&self, name: &str) -> Result<Option<Array<T>>, DmxError> {
        match self.get(name)? {
            None => Ok(None),
            Some(value) => T::array_from_value(&value)
                .map(Some)
                .ok_or_else(|| self.mismatch(name, ValueType::array(T::KIND), &value)),
        }
    }

    /// Reads an element reference and resolves it through the document.
    pub fn get_element(&self, name: &str) -> Result<Option<Element>, DmxError> {
        match self.get(name)? {
            None | Some(Value::Element(None)) => Ok(None),
            Some(Value::Element(Some(id))) => Ok(self.document().and_then(|d| d.element(id))),
            Some(other) => Err(self.mismatch(name, ValueType::scalar(ValueKind::Element), &other)),
        }
    }

    pub fn get_element_array(&self, name: &str) -> Result<Option<ElementArray>, DmxError> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::ElementArray(array)) => Ok(Some(array)),
            Some(other) => Err(self.mismatch(name, ValueType::array(ValueKind::Element), &other)),
        }
    }

    /// Every attribute in insertion order, resolving deferred values.
    pub fn attributes(&self) -> Result<Vec<(String, Value)>, DmxError> {
        self.ensure_not_stub()?;
        let mut out = Vec::with_capacity(self.len());
        for attribute in self.snapshot() {
            let value = attribute.load(self)?;
            self.resolve_stub_references(&value);
            out.push((attribute.name().to_string(), value));
        }
        Ok(out)
    }

    /// Forces every deferred attribute to be decoded.
    pub fn resolve_all(&self) -> Result<(), DmxError> {
        if self.is_stub() {
            return Ok(());
        }
        for attribute in self.snapshot() {
            attribute.load(self)?;
        }
        Ok(())
    }

    fn mismatch(&self, name: &str, expected: ValueType, actual: &Value) -> DmxError {
        DmxError::TypeMismatch {
            element: self.id(),
            name: name.to_string(),
            expected,
            actual: actual.value_type(),
        }
    }

    fn resolve_stub_references(&self, value: &Value) {
        if !value.is_element_typed() {
            return;
        }
        if let Some(document) = self.document() {
            for id in value.element_ids() {
                document.try_resolve_stub(id);
            }
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Sets an attribute, replacing any existing value in place.
    ///
    /// Element references must point at members of this element's document,
    /// and element arrays must be bound to it.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<(), DmxError> {
        let name = name.into();
        let value = value.into();
        self.ensure_not_stub()?;
        self.check_references(&value)?;

        let change = {
            let mut attributes = self.inner.attributes.write();
            if attributes.len() >= MAX_ATTRIBUTES && !attributes.contains(&name) {
                return Err(DmxError::Disallowed {
                    context: "attribute limit reached",
                });
            }
            match attributes.insert(Attribute::resolved(name.clone(), value)) {
                Some(_) => AttributeChange::Replaced { name },
                None => AttributeChange::Added { name },
            }
        };
        self.inner.observers.emit(&change);
        Ok(())
    }

    /// Sets an element reference, adopting `target` if it is unowned.
    pub fn set_element(&self, name: impl Into<String>, target: Option<&Element>) -> Result<(), DmxError> {
        self.ensure_not_stub()?;
        let id = match (target, self.document()) {
            (None, _) => None,
            (Some(target), Some(document)) => Some(document.admit(target, "attribute assignment")?),
            (Some(target), None) => Some(target.id()),
        };
        self.set(name, Value::Element(id))
    }

    /// Removes an attribute, returning its value.
    pub fn remove(&self, name: &str) -> Result<Option<Value>, DmxError> {
        self.ensure_not_stub()?;
        let Some(attribute) = self.attribute(name) else {
            return Ok(None);
        };
        let value = attribute.load(self)?;
        if self.inner.attributes.write().remove(name).is_none() {
            return Ok(None);
        }
        self.inner.observers.emit(&AttributeChange::Removed {
            name: name.to_string(),
        });
        Ok(Some(value))
    }

    fn check_references(&self, value: &Value) -> Result<(), DmxError> {
        let Some(document) = self.document() else {
            return Ok(());
        };
        match value {
            Value::Element(Some(id)) if !document.contains(*id) => Err(DmxError::NotAMember { id: *id }),
            Value::ElementArray(array) if !array.is_bound_to(&document) => Err(DmxError::OwnershipViolation {
                id: self.id(),
                context: "element array bound to another document",
            }),
            _ => Ok(()),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&AttributeChange) + Send + Sync + 'static) -> Subscription {
        self.inner.observers.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.inner.observers.unsubscribe(subscription)
    }

    // =========================================================================
    // Crate internals
    // =========================================================================

    pub(crate) fn set_owner(&self, owner: Weak<DocumentShared>) {
        *self.inner.owner.write() = owner;
    }

    pub(crate) fn clear_owner(&self) {
        *self.inner.owner.write() = Weak::new();
    }

    /// Turns a stub into a real element in place; references by ID see it.
    pub(crate) fn promote_stub(&self, name: String, class_name: String) {
        self.set_name(name);
        self.set_class_name(class_name);
        self.inner.stub.store(false, Ordering::Release);
    }

    /// Inserts without stub or ownership checks (decoders and import only).
    pub(crate) fn insert_unchecked(&self, name: String, value: Value) {
        self.inner.attributes.write().insert(Attribute::resolved(name, value));
    }

    pub(crate) fn insert_pending(&self, name: String, deferred: Deferred) {
        self.inner.attributes.write().insert(Attribute::pending(name, deferred));
    }

    /// Attributes as (name, value) for encoders. Deferred values are
    /// resolved; stub resolution is skipped so encoding never mutates the graph.
    pub(crate) fn values_for_encode(&self) -> Result<Vec<(String, Value)>, DmxError> {
        let mut out = Vec::with_capacity(self.len());
        for attribute in self.snapshot() {
            out.push((attribute.name().to_string(), attribute.load(self)?));
        }
        Ok(out)
    }

    /// IDs referenced from element-typed attributes, in attribute order.
    pub(crate) fn referenced_ids(&self) -> Result<Vec<ElementId>, DmxError> {
        let mut ids = Vec::new();
        for attribute in self.snapshot() {
            if attribute.value_type().kind == ValueKind::Element {
                ids.extend(attribute.load(self)?.element_ids());
            }
        }
        Ok(ids)
    }

    /// Rewrites references to `id` as null.
    pub(crate) fn null_references(&self, id: ElementId) -> Result<usize, DmxError> {
        let mut count = 0;
        let mut changed = Vec::new();
        for attribute in self.snapshot() {
            if attribute.value_type().kind != ValueKind::Element {
                continue;
            }
            match attribute.load(self)? {
                Value::Element(Some(target)) if target == id => {
                    attribute.store(Value::Element(None));
                    changed.push(attribute.name().to_string());
                    count += 1;
                }
                Value::ElementArray(array) => count += array.null_out(id),
                _ => {}
            }
        }
        for name in changed {
            self.inner.observers.emit(&AttributeChange::Replaced { name });
        }
        Ok(count)
    }

    /// Re-binds element arrays to `document` after adoption.
    pub(crate) fn rebind_element_arrays(&self, document: &Document) -> Result<(), DmxError> {
        for attribute in self.snapshot() {
            if attribute.value_type() != ValueType::array(ValueKind::Element) {
                continue;
            }
            if let Value::ElementArray(array) = attribute.load(self)? {
                if !array.is_bound_to(document) {
                    attribute.store(Value::ElementArray(ElementArray::from_ids_unchecked(
                        document,
                        array.ids(),
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id())
            .field("name", &*self.inner.name.read())
            .field("class_name", &*self.inner.class_name.read())
            .field("stub", &self.is_stub())
            .finish()
    }
}
