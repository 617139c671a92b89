//! Attribute storage with deferred value resolution.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;

use crate::error::DmxError;
use crate::model::{Element, Value, ValueType};

/// Location of a value that has not been decoded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deferred {
    /// Byte offset of the value within the document's backing stream.
    pub offset: usize,
    pub value_type: ValueType,
}

#[derive(Debug)]
enum Slot {
    Pending(Deferred),
    Resolved(Value),
}

/// A named value owned by one element.
#[derive(Debug)]
pub(crate) struct Attribute {
    name: String,
    slot: RwLock<Slot>,
}

impl Attribute {
    pub fn resolved(name: String, value: Value) -> Self {
        Self {
            name,
            slot: RwLock::new(Slot::Resolved(value)),
        }
    }

    pub fn pending(name: String, deferred: Deferred) -> Self {
        Self {
            name,
            slot: RwLock::new(Slot::Pending(deferred)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the value, known even before a deferred value is read.
    pub fn value_type(&self) -> ValueType {
        match &*self.slot.read() {
            Slot::Pending(deferred) => deferred.value_type,
            Slot::Resolved(value) => value.value_type(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(&*self.slot.read(), Slot::Pending(_))
    }

    /// Returns the value, decoding it through the owner's document on first
    /// access. Concurrent readers observe a single resolution.
    pub fn load(&self, owner: &Element) -> Result<Value, DmxError> {
        if let Slot::Resolved(value) = &*self.slot.read() {
            return Ok(value.clone());
        }

        // Only one upgradable guard exists at a time, so whoever holds it
        // either sees the value resolved by a previous holder or resolves it.
        let slot = self.slot.upgradable_read();
        let deferred = match &*slot {
            Slot::Resolved(value) => return Ok(value.clone()),
            Slot::Pending(deferred) => *deferred,
        };

        let value = match owner.document() {
            Some(document) => document.read_deferred(deferred, &self.name, owner.id())?,
            None => {
                return Err(DmxError::DeferredLoad {
                    attribute: self.name.clone(),
                    element: owner.id(),
                    codec: String::from("none"),
                    source: Box::new(crate::error::DecodeError::SourceUnavailable),
                });
            }
        };

        let mut slot = RwLockUpgradableReadGuard::upgrade(slot);
        *slot = Slot::Resolved(value.clone());
        tracing::trace!(
            attribute = %self.name,
            element = %owner.id(),
            offset = deferred.offset,
            "resolved deferred attribute"
        );
        Ok(value)
    }

    /// Returns the value if it has already been resolved.
    pub fn peek(&self) -> Option<Value> {
        match &*self.slot.read() {
            Slot::Resolved(value) => Some(value.clone()),
            Slot::Pending(_) => None,
        }
    }

    pub fn store(&self, value: Value) {
        *self.slot.write() = Slot::Resolved(value);
    }
}

/// Ordered name to attribute mapping. Names are unique and insertion order
/// is preserved; replacing a value keeps its position.
#[derive(Debug, Default)]
pub(crate) struct AttributeMap {
    entries: Vec<Arc<Attribute>>,
    index: FxHashMap<String, usize>,
}

impl AttributeMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Inserts or replaces by name, returning the replaced attribute.
    pub fn insert(&mut self, attribute: Attribute) -> Option<Arc<Attribute>> {
        let attribute = Arc::new(attribute);
        match self.index.get(attribute.name()) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i], attribute)),
            None => {
                self.index.insert(attribute.name().to_string(), self.entries.len());
                self.entries.push(attribute);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Attribute>> {
        let i = self.index.remove(name)?;
        let removed = self.entries.remove(i);
        for entry in &self.entries[i..] {
            if let Some(slot) = self.index.get_mut(entry.name()) {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|a| a.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_order_on_replace_and_remove() {
        let mut map = AttributeMap::default();
        map.insert(Attribute::resolved("a".into(), Value::Int(1)));
        map.insert(Attribute::resolved("b".into(), Value::Int(2)));
        map.insert(Attribute::resolved("c".into(), Value::Int(3)));

        let replaced = map.insert(Attribute::resolved("a".into(), Value::Int(10)));
        assert_eq!(replaced.unwrap().peek(), Some(Value::Int(1)));
        assert_eq!(map.names(), vec!["a", "b", "c"]);

        map.remove("a");
        assert_eq!(map.names(), vec!["b", "c"]);
        assert_eq!(map.get("c").unwrap().peek(), Some(Value::Int(3)));
        assert!(map.remove("zzz").is_none());
    }

    #[test]
    fn test_pending_reports_type() {
        let attr = Attribute::pending(
            "weights".into(),
            Deferred {
                offset: 12,
                value_type: ValueType::array(crate::model::ValueKind::Float),
            },
        );
        assert!(attr.is_pending());
        assert!(attr.value_type().is_array);
        assert_eq!(attr.peek(), None);
    }
}
