//! Documents: the element registry, root, metadata and deferred source.
//!
//! A document stores its elements in an index-addressed arena (slot vector
//! plus an ID to slot map). Attribute values refer to elements by ID, so a
//! cyclic graph is just a set of IDs and replacing a registry slot retargets
//! every reference to that ID at once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{DecodeError, DmxError};
use crate::limits::MAX_ELEMENTS;
use crate::model::attribute::Deferred;
use crate::model::builder::ElementBuilder;
use crate::model::element::DEFAULT_CLASS_NAME;
use crate::model::notify::{Observers, RegistryChange, Subscription};
use crate::model::{Element, ElementArray, ElementId, Value};

/// Callback consulted when a read encounters a reference to a stub.
pub type StubResolver = Arc<dyn Fn(ElementId) -> Option<Element> + Send + Sync>;

/// How [`Document::remove_element`] patches references to the removed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    /// References keep the ID and now point at a stub.
    MakeStubs,
    /// References become null.
    MakeNulls,
}

/// Construction-time document settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    pub max_elements: usize,
    pub allow_random_ids: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            max_elements: MAX_ELEMENTS,
            allow_random_ids: true,
        }
    }
}

/// Backing stream for deferred attribute values.
pub(crate) trait DeferredSource: Send {
    fn codec_name(&self) -> &str;

    fn read_value(&mut self, document: &Document, deferred: Deferred) -> Result<Value, DecodeError>;
}

#[derive(Debug, Clone)]
struct Metadata {
    format: String,
    format_version: i32,
    encoding: String,
    encoding_version: i32,
}

#[derive(Default)]
struct Registry {
    slots: Vec<Option<Element>>,
    index: FxHashMap<ElementId, usize>,
    root: Option<ElementId>,
    root_assigned: bool,
}

impl Registry {
    fn get(&self, id: ElementId) -> Option<&Element> {
        self.index.get(&id).and_then(|&i| self.slots[i].as_ref())
    }

    fn insert(&mut self, element: Element) {
        self.index.insert(element.id(), self.slots.len());
        self.slots.push(Some(element));
    }

    fn replace(&mut self, element: Element) -> Option<Element> {
        let &i = self.index.get(&element.id())?;
        self.slots[i].replace(element)
    }

    fn remove(&mut self, id: ElementId) -> Option<Element> {
        let i = self.index.remove(&id)?;
        let removed = self.slots[i].take();
        let tombstones = self.slots.len() - self.index.len();
        if tombstones > 64 && tombstones * 2 > self.slots.len() {
            self.compact();
        }
        removed
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(element) = slot {
                self.index.insert(element.id(), i);
            }
        }
    }

    fn elements(&self) -> Vec<Element> {
        self.slots.iter().flatten().cloned().collect()
    }
}

/// What an import does with one foreign element.
enum ImportTarget {
    /// Already present locally; returned unchanged.
    Existing(Element),
    /// A local stub filled in place.
    Promote(Element),
    Create,
    /// A foreign stub copied as a stub.
    Stub,
}

struct PlannedCopy {
    id: ElementId,
    name: String,
    class_name: String,
    target: ImportTarget,
    attributes: Vec<(String, Value)>,
}

/// Foreign elements read by an import, in visiting order, plus the
/// reference targets that need local stubs.
#[derive(Default)]
struct ImportPlan {
    copies: Vec<PlannedCopy>,
    stubs: Vec<ElementId>,
    seen: FxHashSet<ElementId>,
}

pub(crate) struct DocumentShared {
    registry: RwLock<Registry>,
    meta: RwLock<Metadata>,
    allow_random_ids: AtomicBool,
    max_elements: usize,
    prefix: RwLock<Vec<(String, Value)>>,
    deferred: Mutex<Option<Box<dyn DeferredSource>>>,
    stub_resolver: RwLock<Option<StubResolver>>,
    observers: Observers<RegistryChange>,
}

/// Shared handle to a DMX document.
///
/// Clones refer to the same document. The document exclusively owns its
/// elements; each element ID appears at most once.
#[derive(Clone)]
pub struct Document {
    pub(crate) shared: Arc<DocumentShared>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_options(DocumentOptions::default())
    }

    pub fn with_options(options: DocumentOptions) -> Self {
        Self {
            shared: Arc::new(DocumentShared {
                registry: RwLock::new(Registry::default()),
                meta: RwLock::new(Metadata {
                    format: "dmx".to_string(),
                    format_version: 1,
                    encoding: "binary".to_string(),
                    encoding_version: 5,
                }),
                allow_random_ids: AtomicBool::new(options.allow_random_ids),
                max_elements: options.max_elements,
                prefix: RwLock::new(Vec::new()),
                deferred: Mutex::new(None),
                stub_resolver: RwLock::new(None),
                observers: Observers::new(),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<DocumentShared>) -> Self {
        Self { shared }
    }

    /// True if both handles refer to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn format(&self) -> String {
        self.shared.meta.read().format.clone()
    }

    pub fn format_version(&self) -> i32 {
        self.shared.meta.read().format_version
    }

    pub fn set_format(&self, format: impl Into<String>, version: i32) {
        let mut meta = self.shared.meta.write();
        meta.format = format.into();
        meta.format_version = version;
    }

    /// Encoding the document was loaded from, or will be saved with by
    /// [`Document::save`].
    pub fn encoding(&self) -> String {
        self.shared.meta.read().encoding.clone()
    }

    pub fn encoding_version(&self) -> i32 {
        self.shared.meta.read().encoding_version
    }

    pub fn set_encoding(&self, encoding: impl Into<String>, version: i32) {
        let mut meta = self.shared.meta.write();
        meta.encoding = encoding.into();
        meta.encoding_version = version;
    }

    pub fn allow_random_ids(&self) -> bool {
        self.shared.allow_random_ids.load(Ordering::Relaxed)
    }

    pub fn set_allow_random_ids(&self, allow: bool) {
        self.shared.allow_random_ids.store(allow, Ordering::Relaxed);
    }

    pub fn max_elements(&self) -> usize {
        self.shared.max_elements
    }

    // =========================================================================
    // Registry reads
    // =========================================================================

    pub fn root(&self) -> Option<Element> {
        let registry = self.shared.registry.read();
        registry.root.and_then(|id| registry.get(id).cloned())
    }

    /// Sets or clears the root. The root must be a member.
    pub fn set_root(&self, root: Option<&Element>) -> Result<(), DmxError> {
        let id = root.map(Element::id);
        {
            let mut registry = self.shared.registry.write();
            if let Some(root) = root {
                if !registry.get(root.id()).is_some_and(|e| e.ptr_eq(root)) {
                    return Err(DmxError::NotAMember { id: root.id() });
                }
            }
            registry.root_assigned = true;
            if registry.root == id {
                return Ok(());
            }
            registry.root = id;
        }
        self.shared.observers.emit(&RegistryChange::RootChanged { root: id });
        Ok(())
    }

    /// Number of registered elements, stubs included.
    pub fn len(&self) -> usize {
        self.shared.registry.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered element in registration order.
    pub fn elements(&self) -> Vec<Element> {
        self.shared.registry.read().elements()
    }

    pub fn element(&self, id: ElementId) -> Option<Element> {
        self.shared.registry.read().get(id).cloned()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.shared.registry.read().index.contains_key(&id)
    }

    // =========================================================================
    // Element factories
    // =========================================================================

    /// Creates and registers an element. Without an explicit `id` a random
    /// one is generated, which requires [`Document::allow_random_ids`].
    pub fn create_element(
        &self,
        name: impl Into<String>,
        id: Option<ElementId>,
        class_name: Option<&str>,
    ) -> Result<Element, DmxError> {
        let id = match id {
            Some(id) => id,
            None if self.allow_random_ids() => ElementId::random(),
            None => {
                return Err(DmxError::Disallowed {
                    context: "random element ids are disabled for this document",
                });
            }
        };
        let element = Element::new_real(id, name, class_name.unwrap_or(DEFAULT_CLASS_NAME));
        self.register(&element)?;
        Ok(element)
    }

    /// Creates and registers a placeholder for an element defined elsewhere.
    pub fn create_stub_element(&self, id: ElementId) -> Result<Element, DmxError> {
        let stub = Element::new_stub(id);
        self.register(&stub)?;
        Ok(stub)
    }

    /// Starts a fluent element construction.
    pub fn build(&self, name: impl Into<String>) -> ElementBuilder {
        ElementBuilder::new(self.clone(), name.into())
    }

    // =========================================================================
    // Import and removal
    // =========================================================================

    /// Copies an element owned by another document into this one.
    ///
    /// The copy keeps the original's ID. If `deep`, every element reachable
    /// from `foreign` is copied too; otherwise references to elements this
    /// document lacks become stubs. When an element with the same ID already
    /// exists it is returned unchanged, unless it is a stub and `overwrite`
    /// is set, in which case the stub is filled in place and every existing
    /// reference to it sees the imported attributes.
    pub fn import_element(&self, foreign: &Element, deep: bool, overwrite: bool) -> Result<Element, DmxError> {
        // Everything is read from the foreign graph before this document is
        // touched, so a failed read leaves it unchanged.
        let mut plan = ImportPlan::default();
        self.plan_copy(foreign, deep, overwrite, &mut plan)?;
        let imported = self.apply_import(foreign.id(), plan)?;
        tracing::debug!(id = %foreign.id(), deep, overwrite, "imported element");
        Ok(imported)
    }

    fn plan_copy(&self, foreign: &Element, deep: bool, overwrite: bool, plan: &mut ImportPlan) -> Result<(), DmxError> {
        let id = foreign.id();
        if !plan.seen.insert(id) {
            return Ok(());
        }

        let target = match self.element(id) {
            Some(existing) if existing.ptr_eq(foreign) => ImportTarget::Existing(existing),
            Some(existing) if existing.is_stub() && overwrite && !foreign.is_stub() => ImportTarget::Promote(existing),
            Some(existing) => ImportTarget::Existing(existing),
            None if foreign.is_stub() => ImportTarget::Stub,
            None => ImportTarget::Create,
        };
        let copies_attributes = matches!(target, ImportTarget::Promote(_) | ImportTarget::Create);
        let slot = plan.copies.len();
        plan.copies.push(PlannedCopy {
            id,
            name: foreign.name(),
            class_name: foreign.class_name(),
            target,
            attributes: Vec::new(),
        });
        if !copies_attributes {
            return Ok(());
        }

        let source = foreign.document();
        let values = foreign.values_for_encode()?;
        let mut attributes = Vec::with_capacity(values.len());
        for (name, value) in values {
            for referenced in value.element_ids() {
                self.plan_reference(referenced, source.as_ref(), deep, overwrite, plan)?;
            }
            let local = match value {
                Value::Element(reference) => Value::Element(reference),
                Value::ElementArray(array) => Value::ElementArray(ElementArray::from_ids_unchecked(self, array.ids())),
                other => other.deep_clone(),
            };
            attributes.push((name, local));
        }
        plan.copies[slot].attributes = attributes;
        Ok(())
    }

    fn plan_reference(
        &self,
        id: ElementId,
        source: Option<&Document>,
        deep: bool,
        overwrite: bool,
        plan: &mut ImportPlan,
    ) -> Result<(), DmxError> {
        if plan.seen.contains(&id) {
            return Ok(());
        }
        if deep {
            if let Some(foreign) = source.and_then(|d| d.element(id)) {
                return self.plan_copy(&foreign, deep, overwrite, plan);
            }
        }
        plan.seen.insert(id);
        if !self.contains(id) {
            plan.stubs.push(id);
        }
        Ok(())
    }

    /// Registers new elements (undoing them all if one fails), then fills
    /// promoted stubs. Returns the local element for `head`.
    fn apply_import(&self, head: ElementId, plan: ImportPlan) -> Result<Element, DmxError> {
        let new_count = plan.stubs.len()
            + plan
                .copies
                .iter()
                .filter(|c| matches!(c.target, ImportTarget::Create | ImportTarget::Stub))
                .count();
        if self.len() + new_count > self.shared.max_elements {
            return Err(DmxError::ElementLimit {
                max: self.shared.max_elements,
            });
        }

        let (root_before, root_assigned_before) = {
            let registry = self.shared.registry.read();
            (registry.root, registry.root_assigned)
        };
        let mut registered = Vec::with_capacity(new_count);
        let mut locals = Vec::with_capacity(plan.copies.len());
        let mut outcome = Ok(());
        for copy in &plan.copies {
            let local = match &copy.target {
                ImportTarget::Existing(existing) | ImportTarget::Promote(existing) => existing.clone(),
                ImportTarget::Stub => Element::new_stub(copy.id),
                ImportTarget::Create => {
                    let element = Element::new_real(copy.id, copy.name.clone(), copy.class_name.clone());
                    for (name, value) in &copy.attributes {
                        element.insert_unchecked(name.clone(), value.clone());
                    }
                    element
                }
            };
            if matches!(copy.target, ImportTarget::Stub | ImportTarget::Create) {
                if let Err(err) = self.register(&local) {
                    outcome = Err(err);
                    break;
                }
                registered.push(local.clone());
            }
            locals.push(local);
        }
        if outcome.is_ok() {
            for &id in &plan.stubs {
                let stub = Element::new_stub(id);
                match self.register(&stub) {
                    Ok(()) => registered.push(stub),
                    Err(DmxError::IdentityCollision { .. }) => {}
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                }
            }
        }
        if let Err(err) = outcome {
            self.unregister_import(&registered, root_before, root_assigned_before);
            return Err(err);
        }

        for copy in plan.copies {
            if let ImportTarget::Promote(existing) = copy.target {
                existing.promote_stub(copy.name, copy.class_name);
                for (name, value) in copy.attributes {
                    existing.insert_unchecked(name, value);
                }
                self.shared.observers.emit(&RegistryChange::Replaced { id: copy.id });
            }
        }
        locals
            .into_iter()
            .find(|local| local.id() == head)
            .ok_or(DmxError::NotAMember { id: head })
    }

    /// Drops elements registered by an import that failed part way.
    fn unregister_import(&self, registered: &[Element], root: Option<ElementId>, root_assigned: bool) {
        let root_changed = {
            let mut registry = self.shared.registry.write();
            for element in registered {
                if registry.get(element.id()).is_some_and(|e| e.ptr_eq(element)) {
                    registry.remove(element.id());
                }
                element.clear_owner();
            }
            let changed = registry.root != root;
            registry.root = root;
            registry.root_assigned = root_assigned;
            changed
        };
        for element in registered {
            self.shared.observers.emit(&RegistryChange::Removed { id: element.id() });
        }
        if root_changed {
            self.shared.observers.emit(&RegistryChange::RootChanged { root });
        }
        tracing::debug!(undone = registered.len(), "rolled back failed import");
    }

    /// Removes an element from the registry, leaving it unowned.
    ///
    /// Deferred values of the removed element are resolved first so it stays
    /// readable after removal.
    pub fn remove_element(&self, element: &Element, mode: RemovalMode) -> Result<(), DmxError> {
        let id = element.id();
        element.resolve_all()?;

        let root_cleared = {
            let mut registry = self.shared.registry.write();
            if !registry.get(id).is_some_and(|e| e.ptr_eq(element)) {
                return Err(DmxError::NotAMember { id });
            }
            registry.remove(id);
            let cleared = registry.root == Some(id);
            if cleared {
                registry.root = None;
            }
            cleared
        };
        element.clear_owner();
        self.shared.observers.emit(&RegistryChange::Removed { id });
        if root_cleared {
            self.shared.observers.emit(&RegistryChange::RootChanged { root: None });
        }

        let others = self.elements();
        match mode {
            RemovalMode::MakeNulls => {
                let mut patched = 0;
                for other in &others {
                    patched += other.null_references(id)?;
                }
                tracing::debug!(%id, patched, "removed element, references nulled");
            }
            RemovalMode::MakeStubs => {
                let mut referenced = false;
                for other in &others {
                    if other.referenced_ids()?.contains(&id) {
                        referenced = true;
                        break;
                    }
                }
                if referenced {
                    self.create_stub_element(id)?;
                }
                tracing::debug!(%id, referenced, "removed element, references stubbed");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Stub resolution
    // =========================================================================

    /// Installs the callback used to replace stubs on read.
    pub fn set_stub_resolver(&self, resolver: impl Fn(ElementId) -> Option<Element> + Send + Sync + 'static) {
        *self.shared.stub_resolver.write() = Some(Arc::new(resolver));
    }

    pub fn clear_stub_resolver(&self) {
        *self.shared.stub_resolver.write() = None;
    }

    /// Asks the stub resolver for a real element with `id`. A successful
    /// answer is imported over the stub; `None` leaves it for the next read.
    pub(crate) fn try_resolve_stub(&self, id: ElementId) {
        let Some(stub) = self.element(id).filter(Element::is_stub) else {
            return;
        };
        let Some(resolver) = self.shared.stub_resolver.read().clone() else {
            return;
        };
        match resolver(id) {
            Some(found) if found.id() == id && !found.ptr_eq(&stub) => {
                match self.import_element(&found, false, true) {
                    Ok(_) => tracing::trace!(%id, "resolved stub"),
                    Err(err) => tracing::warn!(%id, error = %err, "stub resolution failed"),
                }
            }
            Some(found) => {
                tracing::warn!(%id, returned = %found.id(), "stub resolver returned a different element");
            }
            None => tracing::trace!(%id, "stub left unresolved"),
        }
    }

    // =========================================================================
    // Prefix attributes
    // =========================================================================

    /// Document-level attributes written before the element data (binary v9).
    pub fn prefix_attributes(&self) -> Vec<(String, Value)> {
        self.shared.prefix.read().clone()
    }

    /// Sets a prefix attribute. Element-typed values are not allowed.
    pub fn set_prefix_attribute(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<(), DmxError> {
        let name = name.into();
        let value = value.into();
        if value.is_element_typed() {
            return Err(DmxError::Disallowed {
                context: "element values in prefix attributes",
            });
        }
        let mut prefix = self.shared.prefix.write();
        match prefix.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => prefix.push((name, value)),
        }
        Ok(())
    }

    pub fn remove_prefix_attribute(&self, name: &str) -> Option<Value> {
        let mut prefix = self.shared.prefix.write();
        let i = prefix.iter().position(|(n, _)| n == name)?;
        Some(prefix.remove(i).1)
    }

    pub(crate) fn replace_prefix_attributes(&self, attributes: Vec<(String, Value)>) {
        *self.shared.prefix.write() = attributes;
    }

    // =========================================================================
    // Deferred loading
    // =========================================================================

    /// Decodes every deferred attribute of every element.
    pub fn resolve_all(&self) -> Result<(), DmxError> {
        for element in self.elements() {
            element.resolve_all()?;
        }
        Ok(())
    }

    /// Drops the stream backing deferred attributes. Attributes that were
    /// never read fail with a deferred-load error afterwards.
    pub fn release_deferred_source(&self) {
        if self.shared.deferred.lock().take().is_some() {
            tracing::debug!("released deferred source");
        }
    }

    pub fn has_deferred_source(&self) -> bool {
        self.shared.deferred.lock().is_some()
    }

    pub(crate) fn set_deferred_source(&self, source: Box<dyn DeferredSource>) {
        *self.shared.deferred.lock() = Some(source);
    }

    /// Decodes one deferred value. Only one thread reads the stream at a time.
    pub(crate) fn read_deferred(
        &self,
        deferred: Deferred,
        attribute: &str,
        element: ElementId,
    ) -> Result<Value, DmxError> {
        let mut guard = self.shared.deferred.lock();
        let Some(source) = guard.as_mut() else {
            return Err(DmxError::DeferredLoad {
                attribute: attribute.to_string(),
                element,
                codec: "none".to_string(),
                source: Box::new(DecodeError::SourceUnavailable),
            });
        };
        source
            .read_value(self, deferred)
            .map_err(|err| DmxError::DeferredLoad {
                attribute: attribute.to_string(),
                element,
                codec: source.codec_name().to_string(),
                source: Box::new(err),
            })
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers an element. The ID check, limit check and insertion happen
    /// under one lock. The first non-stub ever registered becomes root.
    pub(crate) fn register(&self, element: &Element) -> Result<(), DmxError> {
        let id = element.id();
        let root_changed = {
            let mut registry = self.shared.registry.write();
            if registry.index.contains_key(&id) {
                return Err(DmxError::IdentityCollision { id });
            }
            if registry.index.len() >= self.shared.max_elements {
                return Err(DmxError::ElementLimit {
                    max: self.shared.max_elements,
                });
            }
            registry.insert(element.clone());
            element.set_owner(Arc::downgrade(&self.shared));
            if !registry.root_assigned && !element.is_stub() {
                registry.root = Some(id);
                registry.root_assigned = true;
                true
            } else {
                false
            }
        };
        self.shared.observers.emit(&RegistryChange::Added { id });
        if root_changed {
            self.shared.observers.emit(&RegistryChange::RootChanged { root: Some(id) });
        }
        Ok(())
    }

    /// Returns the element with `id`, registering a stub if there is none.
    pub(crate) fn get_or_create_stub(&self, id: ElementId) -> Result<Element, DmxError> {
        if let Some(existing) = self.element(id) {
            return Ok(existing);
        }
        match self.create_stub_element(id) {
            Err(DmxError::IdentityCollision { .. }) => self.element(id).ok_or(DmxError::NotAMember { id }),
            other => other,
        }
    }

    /// Registers an element read from a stream. A stub already registered
    /// under the same ID (from an earlier forward reference) is promoted in
    /// place; a real one is a duplicate definition.
    pub(crate) fn define_element(
        &self,
        id: ElementId,
        name: String,
        class_name: String,
    ) -> Result<Element, DecodeError> {
        match self.element(id) {
            Some(existing) if existing.is_stub() => {
                existing.promote_stub(name, class_name);
                self.shared.observers.emit(&RegistryChange::Replaced { id });
                Ok(existing)
            }
            Some(_) => Err(DecodeError::DuplicateElement { id }),
            None => {
                let element = Element::new_real(id, name, class_name);
                self.register(&element)?;
                Ok(element)
            }
        }
    }

    /// Returns the ID under which `element` may be referenced from this
    /// document, adopting it first if it is unowned.
    pub(crate) fn admit(&self, element: &Element, context: &'static str) -> Result<ElementId, DmxError> {
        let id = element.id();
        if element.is_owned_by(self) {
            return match self.element(id) {
                Some(registered) if registered.ptr_eq(element) => Ok(id),
                _ => Err(DmxError::NotAMember { id }),
            };
        }
        if element.document().is_some() {
            return Err(DmxError::OwnershipViolation { id, context });
        }
        self.adopt(element)?;
        Ok(id)
    }

    /// Takes ownership of an unowned element. A same-ID stub is swapped out
    /// for it; references it holds to elements this document lacks become
    /// stubs.
    fn adopt(&self, element: &Element) -> Result<(), DmxError> {
        let id = element.id();
        match self.element(id) {
            Some(existing) if existing.is_stub() && !element.is_stub() => {
                {
                    let mut registry = self.shared.registry.write();
                    registry.replace(element.clone());
                    element.set_owner(Arc::downgrade(&self.shared));
                }
                existing.clear_owner();
                self.shared.observers.emit(&RegistryChange::Replaced { id });
            }
            Some(_) => return Err(DmxError::IdentityCollision { id }),
            None => self.register(element)?,
        }

        element.rebind_element_arrays(self)?;
        let mut stubs = 0;
        for referenced in element.referenced_ids()? {
            if !self.contains(referenced) {
                self.get_or_create_stub(referenced)?;
                stubs += 1;
            }
        }
        tracing::debug!(%id, stubs, "adopted unowned element");
        Ok(())
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn subscribe(&self, handler: impl Fn(&RegistryChange) + Send + Sync + 'static) -> Subscription {
        self.shared.observers.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.shared.observers.unsubscribe(subscription)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.shared.meta.read().clone();
        let registry = self.shared.registry.read();
        f.debug_struct("Document")
            .field("format", &meta.format)
            .field("format_version", &meta.format_version)
            .field("encoding", &meta.encoding)
            .field("encoding_version", &meta.encoding_version)
            .field("elements", &registry.index.len())
            .field("root", &registry.root)
            .finish()
    }
}
