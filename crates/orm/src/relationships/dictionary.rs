//! Relation Dictionaries - Stable grouping of records by key
//!
//! Every relation's match phase turns flat query results into a dictionary
//! keyed by the column that ties them to a parent, then looks parents up in
//! it. Grouping keeps the input order within each key.

use std::collections::HashMap;

use super::keys::DictionaryKey;

/// Mapping from an encoded key to the ordered records sharing it
#[derive(Debug, Clone)]
pub struct Dictionary<T> {
    entries: HashMap<DictionaryKey, Vec<T>>,
}

impl<T> Default for Dictionary<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> Dictionary<T> {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`
    pub fn insert(&mut self, key: DictionaryKey, value: T) {
        self.entries.entry(key).or_default().push(value);
    }

    /// All values recorded under `key`, in insertion order
    pub fn get(&self, key: &DictionaryKey) -> Option<&[T]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// The first value recorded under `key`
    pub fn first(&self, key: &DictionaryKey) -> Option<&T> {
        self.entries.get(key).and_then(|values| values.first())
    }

    /// Check if any value is recorded under `key`
    pub fn contains_key(&self, key: &DictionaryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the dictionary has no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of grouped values
    pub fn value_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl<T: Clone> Dictionary<T> {
    /// Clone the values under `key`, or an empty list when absent
    pub fn cloned(&self, key: &DictionaryKey) -> Vec<T> {
        self.get(key).map(<[T]>::to_vec).unwrap_or_default()
    }
}

/// Group `records` by the key produced by `mapper`.
///
/// Records for which `mapper` yields `None` (typically a missing foreign key)
/// are left out. Composite keys must already be encoded into a single
/// [`DictionaryKey`] by the mapper.
pub fn map_to_dictionary<I, T, F>(records: I, mut mapper: F) -> Dictionary<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Option<(DictionaryKey, T)>,
{
    let mut dictionary = Dictionary::new();
    for record in records {
        match mapper(record) {
            Some((key, value)) => dictionary.insert(key, value),
            None => tracing::trace!("Record without a usable key left out of the dictionary"),
        }
    }
    dictionary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grouping_is_stable() {
        let records = vec![
            (1, "a"),
            (2, "b"),
            (1, "c"),
            (1, "d"),
            (2, "e"),
        ];

        let dictionary = map_to_dictionary(records, |(owner, name)| {
            Some((DictionaryKey::from_value(&json!(owner)), name))
        });

        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.get(&DictionaryKey::from_value(&json!(1))), Some(&["a", "c", "d"][..]));
        assert_eq!(dictionary.get(&DictionaryKey::from_value(&json!(2))), Some(&["b", "e"][..]));
        assert_eq!(dictionary.value_count(), 5);
    }

    #[test]
    fn test_records_without_key_are_skipped() {
        let records = vec![Some(1), None, Some(1)];
        let dictionary = map_to_dictionary(records, |owner| {
            owner.map(|owner| (DictionaryKey::from_value(&json!(owner)), owner))
        });

        assert_eq!(dictionary.value_count(), 2);
    }

    #[test]
    fn test_first_and_cloned() {
        let mut dictionary = Dictionary::new();
        let key = DictionaryKey::encode(&[json!(1), json!("x")]);
        dictionary.insert(key.clone(), 10);
        dictionary.insert(key.clone(), 11);

        assert_eq!(dictionary.first(&key), Some(&10));
        assert_eq!(dictionary.cloned(&key), vec![10, 11]);

        let missing = DictionaryKey::encode(&[json!(1)]);
        assert!(dictionary.first(&missing).is_none());
        assert!(dictionary.cloned(&missing).is_empty());
        assert!(!dictionary.contains_key(&missing));
    }
}
