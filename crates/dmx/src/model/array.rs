//! Thread-safe homogeneous array containers.
//!
//! [`Array`] is a shared handle: clones see the same items. Each array has
//! its own reader/writer lock and emits [`ArrayChange`] notifications.
//! [`ElementArray`] is bound to one document and enforces ownership on
//! insert.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::error::DmxError;
use crate::model::document::DocumentShared;
use crate::model::notify::{ArrayChange, Observers, Subscription};
use crate::model::{Document, Element, ElementId};

struct ArrayShared<T> {
    items: RwLock<Vec<T>>,
    observers: Observers<ArrayChange>,
}

/// Ordered, thread-safe, homogeneous sequence.
pub struct Array<T> {
    shared: Arc<ArrayShared<T>>,
}

impl<T: Clone + Send + Sync + 'static> Array<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            shared: Arc::new(ArrayShared {
                items: RwLock::new(items),
                observers: Observers::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.shared.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.shared.items.read().get(index).cloned()
    }

    /// Copies the items out.
    pub fn to_vec(&self) -> Vec<T> {
        self.shared.items.read().clone()
    }

    /// Runs `f` against the items under the read lock.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.shared.items.read())
    }

    pub fn push(&self, value: T) {
        let index = {
            let mut items = self.shared.items.write();
            items.push(value);
            items.len() - 1
        };
        self.shared.observers.emit(&ArrayChange::Added { index, count: 1 });
    }

    pub fn extend(&self, values: impl IntoIterator<Item = T>) {
        let (index, count) = {
            let mut items = self.shared.items.write();
            let start = items.len();
            items.extend(values);
            (start, items.len() - start)
        };
        if count > 0 {
            self.shared.observers.emit(&ArrayChange::Added { index, count });
        }
    }

    /// Inserts at `index`; returns false if `index > len`.
    pub fn insert(&self, index: usize, value: T) -> bool {
        {
            let mut items = self.shared.items.write();
            if index > items.len() {
                return false;
            }
            items.insert(index, value);
        }
        self.shared.observers.emit(&ArrayChange::Added { index, count: 1 });
        true
    }

    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.shared.items.write();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.shared.observers.emit(&ArrayChange::Removed { index, count: 1 });
        Some(removed)
    }

    /// Replaces the item at `index`, returning the previous one.
    pub fn replace(&self, index: usize, value: T) -> Option<T> {
        let old = {
            let items = self.shared.items.upgradable_read();
            if index >= items.len() {
                return None;
            }
            let mut items = RwLockUpgradableReadGuard::upgrade(items);
            std::mem::replace(&mut items[index], value)
        };
        self.shared.observers.emit(&ArrayChange::Replaced { index });
        Some(old)
    }

    /// Replaces every item.
    pub fn reset(&self, values: Vec<T>) {
        *self.shared.items.write() = values;
        self.shared.observers.emit(&ArrayChange::Reset);
    }

    pub fn clear(&self) {
        self.reset(Vec::new());
    }

    /// True if both handles share storage.
    pub fn ptr_eq(&self, other: &Array<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Copies the items into fresh storage with no subscribers.
    pub fn deep_clone(&self) -> Array<T> {
        Array::from_vec(self.to_vec())
    }

    pub fn subscribe(&self, handler: impl Fn(&ArrayChange) + Send + Sync + 'static) -> Subscription {
        self.shared.observers.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.shared.observers.unsubscribe(subscription)
    }
}

impl<T> Clone for Array<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Array<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> From<Vec<T>> for Array<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T: PartialEq> PartialEq for Array<T> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.shared, &other.shared) {
            return true;
        }
        // Both locks are taken in address order so `a == b` and `b == a`
        // on different threads cannot wait on each other.
        let (first, second) = if Arc::as_ptr(&self.shared) < Arc::as_ptr(&other.shared) {
            (&self.shared, &other.shared)
        } else {
            (&other.shared, &self.shared)
        };
        let first = first.items.read();
        let second = second.items.read();
        *first == *second
    }
}

impl<T: fmt::Debug> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.shared.items.read().iter()).finish()
    }
}

// =============================================================================
// ELEMENT ARRAY
// =============================================================================

/// Array of element references bound to one document.
///
/// Inserted elements must be owned by the array's document or be unowned
/// (in which case they are adopted); anything else is an
/// [`DmxError::OwnershipViolation`].
#[derive(Clone)]
pub struct ElementArray {
    items: Array<Option<ElementId>>,
    document: Weak<DocumentShared>,
}

impl ElementArray {
    /// Creates an empty array bound to `document`.
    pub fn new(document: &Document) -> Self {
        Self {
            items: Array::new(),
            document: Arc::downgrade(&document.shared),
        }
    }

    /// Builds an array from elements, adopting unowned ones.
    pub fn from_elements<'a>(
        document: &Document,
        elements: impl IntoIterator<Item = &'a Element>,
    ) -> Result<Self, DmxError> {
        let array = Self::new(document);
        for element in elements {
            array.push(element)?;
        }
        Ok(array)
    }

    /// Builds an array from IDs without membership checks (decoders only).
    pub(crate) fn from_ids_unchecked(document: &Document, ids: Vec<Option<ElementId>>) -> Self {
        Self {
            items: Array::from_vec(ids),
            document: Arc::downgrade(&document.shared),
        }
    }

    /// The document this array is bound to, if it is still alive.
    pub fn document(&self) -> Option<Document> {
        self.document.upgrade().map(Document::from_shared)
    }

    pub(crate) fn is_bound_to(&self, document: &Document) -> bool {
        std::ptr::eq(self.document.as_ptr(), Arc::as_ptr(&document.shared))
    }

    fn bound_document(&self) -> Result<Document, DmxError> {
        self.document().ok_or(DmxError::Disallowed {
            context: "element array's document has been dropped",
        })
    }

    fn admit(&self, element: Option<&Element>) -> Result<Option<ElementId>, DmxError> {
        match element {
            None => Ok(None),
            Some(element) => self
                .bound_document()?
                .admit(element, "element array insert")
                .map(Some),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The ID at `index`; the inner `None` is a null reference.
    pub fn get(&self, index: usize) -> Option<Option<ElementId>> {
        self.items.get(index)
    }

    /// Resolves the element at `index` through the bound document.
    pub fn element(&self, index: usize) -> Option<Element> {
        let id = self.items.get(index).flatten()?;
        self.document()?.element(id)
    }

    pub fn ids(&self) -> Vec<Option<ElementId>> {
        self.items.to_vec()
    }

    /// Resolves every item; null or dangling references come back as `None`.
    pub fn elements(&self) -> Vec<Option<Element>> {
        let ids = self.items.to_vec();
        let Some(document) = self.document() else {
            return vec![None; ids.len()];
        };
        ids.into_iter()
            .map(|id| id.and_then(|id| document.element(id)))
            .collect()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.items.with_items(|items| items.contains(&Some(id)))
    }

    pub fn push(&self, element: &Element) -> Result<(), DmxError> {
        let id = self.admit(Some(element))?;
        self.items.push(id);
        Ok(())
    }

    pub fn push_null(&self) {
        self.items.push(None);
    }

    /// Pushes a reference by ID; the ID must belong to the bound document.
    pub fn push_id(&self, id: Option<ElementId>) -> Result<(), DmxError> {
        if let Some(id) = id {
            let document = self.bound_document()?;
            if !document.contains(id) {
                return Err(DmxError::NotAMember { id });
            }
        }
        self.items.push(id);
        Ok(())
    }

    /// Inserts at `index`; returns `Ok(false)` if `index > len`.
    pub fn insert(&self, index: usize, element: Option<&Element>) -> Result<bool, DmxError> {
        let id = self.admit(element)?;
        Ok(self.items.insert(index, id))
    }

    pub fn remove(&self, index: usize) -> Option<Option<ElementId>> {
        self.items.remove(index)
    }

    /// Replaces the reference at `index`, returning the previous one.
    pub fn replace(
        &self,
        index: usize,
        element: Option<&Element>,
    ) -> Result<Option<Option<ElementId>>, DmxError> {
        let id = self.admit(element)?;
        Ok(self.items.replace(index, id))
    }

    pub fn clear(&self) {
        self.items.clear();
    }

    /// Rewrites every reference to `id` as null. Returns the number rewritten.
    pub(crate) fn null_out(&self, id: ElementId) -> usize {
        let positions: Vec<usize> = self.items.with_items(|items| {
            items
                .iter()
                .enumerate()
                .filter(|(_, item)| **item == Some(id))
                .map(|(i, _)| i)
                .collect()
        });
        for &index in &positions {
            self.items.replace(index, None);
        }
        positions.len()
    }

    pub fn ptr_eq(&self, other: &ElementArray) -> bool {
        self.items.ptr_eq(&other.items)
    }

    /// Copies the references into fresh storage bound to the same document.
    pub fn deep_clone(&self) -> ElementArray {
        Self {
            items: self.items.deep_clone(),
            document: self.document.clone(),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&ArrayChange) + Send + Sync + 'static) -> Subscription {
        self.items.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.items.unsubscribe(subscription)
    }
}

impl PartialEq for ElementArray {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Debug for ElementArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementArray").field(&self.items).finish()
    }
}
