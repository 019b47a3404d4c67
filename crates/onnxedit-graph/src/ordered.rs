//! Insertion-ordered, name-keyed map
//!
//! ONNX keeps attributes and initializers as ordered lists, and export must
//! write them back in the order they were read. Entries live in a `Vec`; a
//! side index gives name lookup. The index is rebuilt whenever entries shift.

use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V: PartialEq> PartialEq for OrderedMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        let i = self.position(name)?;
        Some(&mut self.entries[i].1)
    }

    /// Set `name` to `value`. An existing entry keeps its position; a new one
    /// is appended. Returns the replaced value.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        let name = name.into();
        match self.position(&name) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Insert at `idx` (clamped to the end), shifting later entries back.
    /// Any existing entry with the same name is removed first.
    pub fn insert_at(&mut self, idx: usize, name: impl Into<String>, value: V) {
        let name = name.into();
        self.remove(&name);
        let idx = idx.min(self.entries.len());
        self.entries.insert(idx, (name, value));
        self.reindex();
    }

    pub fn get_or_insert_with(&mut self, name: &str, make: impl FnOnce() -> V) -> &mut V {
        let i = match self.position(name) {
            Some(i) => i,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[i].1
    }

    /// Remove `name`, keeping the order of the remaining entries.
    pub fn remove(&mut self, name: &str) -> Option<V> {
        let i = self.position(name)?;
        let (_, value) = self.entries.remove(i);
        self.reindex();
        Some(value)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &V) -> bool) {
        self.entries.retain(|(name, value)| keep(name, value));
        self.reindex();
    }

    pub fn first(&self) -> Option<(&str, &V)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, (name, _)) in self.entries.iter().enumerate() {
            self.index.insert(name.clone(), i);
        }
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_position_of_existing_entries() {
        let mut map: OrderedMap<i32> = [("a".to_string(), 1), ("b".to_string(), 2)].into_iter().collect();
        assert_eq!(map.insert("a", 10), Some(1));
        map.insert("c", 3);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(map.get("a"), Some(&10));
    }

    #[test]
    fn remove_and_insert_at_reindex() {
        let mut map: OrderedMap<i32> = OrderedMap::new();
        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            map.insert(name, i as i32);
        }
        assert_eq!(map.remove("a"), Some(0));
        assert_eq!(map.position("c"), Some(1));
        map.insert_at(0, "z", 9);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "b", "c"]);
        map.insert_at(99, "b", 5);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "c", "b"]);
        map.retain(|_, v| *v != 9);
        assert_eq!(map.first(), Some(("c", &2)));
        assert_eq!(map.position("b"), Some(1));
    }
}
