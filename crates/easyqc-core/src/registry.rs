//! Ordinal registries: ordered sequences addressed by 1-based position.
//!
//! Module definitions, score definitions, and tag definitions are stored on
//! disk as JSON objects keyed `"1".."N"`. In memory they are a plain `Vec`,
//! so the keys are always a contiguous run with no gaps and insertion order
//! equals key order. Serialization converts between the two shapes.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RegistryError;

/// An ordered collection addressed by 1-based ordinal keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinalRegistry<T> {
    entries: Vec<T>,
}

impl<T> Default for OrdinalRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> OrdinalRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries; also the largest key.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at 1-based `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        index.checked_sub(1).and_then(|i| self.entries.get_mut(i))
    }

    /// Insert `value` at 1-based `index`.
    ///
    /// An occupied index shifts that entry and everything after it up by
    /// one. `len + 1` appends. An empty registry always places the value at
    /// key 1. Any other index is rejected and the registry is unchanged.
    pub fn insert(&mut self, index: usize, value: T) -> Result<(), RegistryError> {
        if self.entries.is_empty() {
            self.entries.push(value);
            tracing::debug!("inserted first entry at index 1");
            return Ok(());
        }
        let max = self.entries.len() + 1;
        if index == 0 || index > max {
            return Err(RegistryError::IndexOutOfRange { index, max });
        }
        if index <= self.entries.len() {
            tracing::debug!("shifting entries {}..={} up by one", index, self.entries.len());
        }
        self.entries.insert(index - 1, value);
        Ok(())
    }

    /// Append `value` after the last entry and return its key.
    pub fn push(&mut self, value: T) -> usize {
        self.entries.push(value);
        self.entries.len()
    }

    /// Remove the entry at 1-based `index`, compacting later entries down.
    ///
    /// A missing index is logged and leaves the registry unchanged.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index == 0 || index > self.entries.len() {
            tracing::warn!("index {} to remove does not exist", index);
            return None;
        }
        let removed = self.entries.remove(index - 1);
        tracing::debug!("removed index {} and renumbered {} entries", index, self.entries.len());
        Some(removed)
    }

    /// Iterate `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries.iter().enumerate().map(|(i, v)| (i + 1, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.entries.iter_mut().enumerate().map(|(i, v)| (i + 1, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Keys `1..=len`.
    pub fn keys(&self) -> impl Iterator<Item = usize> {
        1..=self.entries.len()
    }

    /// Key of the first entry matching `pred`.
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.entries.iter().position(|v| pred(v)).map(|i| i + 1)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

impl<T> From<Vec<T>> for OrdinalRegistry<T> {
    fn from(entries: Vec<T>) -> Self {
        Self { entries }
    }
}

impl<T> FromIterator<T> for OrdinalRegistry<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<T: Serialize> Serialize for OrdinalRegistry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrdinalRegistry<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RegistryVisitor(PhantomData))
    }
}

struct RegistryVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for RegistryVisitor<T> {
    type Value = OrdinalRegistry<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object keyed by positive integers, or an array")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut keyed: Vec<(usize, T)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            let ordinal: usize = key
                .trim()
                .parse()
                .map_err(|_| de::Error::custom(format!("non-numeric registry key '{key}'")))?;
            keyed.push((ordinal, value));
        }
        // Gapped or unordered keys are compacted into key order.
        keyed.sort_by_key(|(k, _)| *k);
        Ok(keyed.into_iter().map(|(_, v)| v).collect())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(value) = access.next_element()? {
            entries.push(value);
        }
        Ok(OrdinalRegistry::from(entries))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(OrdinalRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(values: &[&'static str]) -> OrdinalRegistry<&'static str> {
        values.iter().copied().collect()
    }

    fn assert_contiguous<T>(r: &OrdinalRegistry<T>) {
        let keys: Vec<usize> = r.iter().map(|(k, _)| k).collect();
        let expected: Vec<usize> = (1..=r.len()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn insert_into_empty_lands_at_one() {
        let mut r = OrdinalRegistry::new();
        r.insert(7, "a").unwrap();
        assert_eq!(r.get(1), Some(&"a"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn insert_at_occupied_index_shifts_up() {
        let mut r = reg(&["a", "b", "c"]);
        r.insert(2, "x").unwrap();
        assert_eq!(r.as_slice(), &["a", "x", "b", "c"]);
        assert_contiguous(&r);
    }

    #[test]
    fn insert_front_and_append() {
        let mut r = reg(&["a", "b"]);
        r.insert(1, "f").unwrap();
        r.insert(4, "z").unwrap();
        assert_eq!(r.as_slice(), &["f", "a", "b", "z"]);
    }

    #[test]
    fn insert_past_end_is_rejected_unchanged() {
        let mut r = reg(&["a", "b"]);
        let err = r.insert(5, "x").unwrap_err();
        assert_eq!(err, RegistryError::IndexOutOfRange { index: 5, max: 3 });
        assert!(r.insert(0, "x").is_err());
        assert_eq!(r.as_slice(), &["a", "b"]);
    }

    #[test]
    fn remove_compacts_and_preserves_order() {
        let mut r = reg(&["a", "b", "c", "d"]);
        assert_eq!(r.remove(2), Some("b"));
        assert_eq!(r.as_slice(), &["a", "c", "d"]);
        assert_eq!(r.get(2), Some(&"c"));
        assert_contiguous(&r);
    }

    #[test]
    fn remove_missing_index_is_noop() {
        let mut r = reg(&["a"]);
        assert_eq!(r.remove(3), None);
        assert_eq!(r.remove(0), None);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn contiguity_holds_across_mixed_operations() {
        let mut r = OrdinalRegistry::new();
        for (i, op) in [3usize, 1, 2, 1, 5, 2, 4, 1].iter().enumerate() {
            if i % 3 == 2 {
                r.remove(*op);
            } else {
                let at = (*op).min(r.len() + 1);
                r.insert(at, i).unwrap();
            }
            assert_contiguous(&r);
        }
    }

    #[test]
    fn serializes_as_string_keyed_object() {
        let r = reg(&["a", "b"]);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"1":"a","2":"b"}"#);
    }

    #[test]
    fn deserializes_numerically_sorted_and_compacted() {
        let r: OrdinalRegistry<String> =
            serde_json::from_str(r#"{"10":"j","2":"b","1":"a","5":"e"}"#).unwrap();
        assert_eq!(r.as_slice(), &["a", "b", "e", "j"]);
        assert_contiguous(&r);

        let from_array: OrdinalRegistry<u32> = serde_json::from_str("[4,5]").unwrap();
        assert_eq!(from_array.get(2), Some(&5));

        let empty: OrdinalRegistry<u32> = serde_json::from_str("null").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn rejects_non_numeric_keys() {
        let bad = serde_json::from_str::<OrdinalRegistry<u32>>(r#"{"one":1}"#);
        assert!(bad.is_err());
    }
}
