//! Keyed references between simulation objects.
//!
//! Objects never own each other. A vehicle points at its city, home
//! building and owner through a [`StateRef`], which is nothing more than
//! the key of the target in its owning [`Registry`]. Clearing a reference
//! is always safe and a reference to a removed object simply stops
//! resolving.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A reference-by-key to an object of type `T` held in a [`Registry<T>`].
///
/// The default reference is empty. Equality, ordering and hashing only look
/// at the key, so references can be used as map keys.
pub struct StateRef<T> {
    id: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateRef<T> {
    /// Create a reference to the object with the given key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            _marker: PhantomData,
        }
    }

    /// The empty reference.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            id: None,
            _marker: PhantomData,
        }
    }

    /// The referenced key, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether this reference points at nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.id.is_none()
    }

    /// Drop the target, leaving the reference empty.
    pub fn clear(&mut self) {
        self.id = None;
    }
}

impl<T> Default for StateRef<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for StateRef<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for StateRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for StateRef<T> {}

impl<T> PartialOrd for StateRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for StateRef<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> Hash for StateRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for StateRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "StateRef({id})"),
            None => f.write_str("StateRef(<empty>)"),
        }
    }
}

impl<T> fmt::Display for StateRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id().unwrap_or("<empty>"))
    }
}

impl<T> From<&str> for StateRef<T> {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<T> Serialize for StateRef<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for StateRef<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            id: Option::<String>::deserialize(deserializer)?,
            _marker: PhantomData,
        })
    }
}

/// Owning collection of simulation objects, keyed by string identifier.
///
/// Iteration is always in key order so that every system visits objects
/// in the same sequence on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Registry<T> {
    items: BTreeMap<String, T>,
}

impl<T> Registry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    /// Insert an object under `id`, returning a reference to it.
    ///
    /// Replaces any object previously stored under the same key.
    pub fn insert(&mut self, id: impl Into<String>, item: T) -> StateRef<T> {
        let id = id.into();
        self.items.insert(id.clone(), item);
        StateRef::new(id)
    }

    /// Remove and return the object behind `r`.
    pub fn remove(&mut self, r: &StateRef<T>) -> Option<T> {
        r.id().and_then(|id| self.items.remove(id))
    }

    /// Resolve a reference.
    #[must_use]
    pub fn get(&self, r: &StateRef<T>) -> Option<&T> {
        r.id().and_then(|id| self.items.get(id))
    }

    /// Resolve a reference mutably.
    pub fn get_mut(&mut self, r: &StateRef<T>) -> Option<&mut T> {
        r.id().and_then(|id| self.items.get_mut(id))
    }

    /// Look an object up by raw key.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    /// Whether `r` resolves to a live object.
    #[must_use]
    pub fn contains(&self, r: &StateRef<T>) -> bool {
        self.get(r).is_some()
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All references, in key order.
    #[must_use]
    pub fn refs(&self) -> Vec<StateRef<T>> {
        self.items.keys().map(StateRef::new).collect()
    }

    /// Iterate over `(reference, object)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (StateRef<T>, &T)> {
        self.items.iter().map(|(k, v)| (StateRef::new(k.as_str()), v))
    }

    /// Iterate over objects in key order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    /// Iterate mutably over objects in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    /// The `index`-th reference in key order.
    #[must_use]
    pub fn nth_ref(&self, index: usize) -> Option<StateRef<T>> {
        self.items.keys().nth(index).map(StateRef::new)
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget(u32);

    #[test]
    fn test_empty_reference_resolves_to_nothing() {
        let mut reg = Registry::new();
        reg.insert("W1", Widget(1));
        let r: StateRef<Widget> = StateRef::default();
        assert!(r.is_empty());
        assert!(reg.get(&r).is_none());
    }

    #[test]
    fn test_reference_stops_resolving_after_removal() {
        let mut reg = Registry::new();
        let r = reg.insert("W1", Widget(1));
        assert_eq!(reg.get(&r), Some(&Widget(1)));
        assert_eq!(reg.remove(&r), Some(Widget(1)));
        assert!(!reg.contains(&r));
    }

    #[test]
    fn test_clear_reference() {
        let mut r: StateRef<Widget> = StateRef::new("W1");
        r.clear();
        assert_eq!(r, StateRef::empty());
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let mut reg = Registry::new();
        reg.insert("B", Widget(2));
        reg.insert("A", Widget(1));
        reg.insert("C", Widget(3));
        let ids: Vec<_> = reg.refs().iter().map(|r| r.to_string()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(reg.nth_ref(1), Some(StateRef::new("B")));
    }

    #[test]
    fn test_references_compare_by_key() {
        let a: StateRef<Widget> = StateRef::new("X");
        let b: StateRef<Widget> = "X".into();
        assert_eq!(a, b);
        assert!(StateRef::<Widget>::empty() < a);
    }
}
