//! Normalized Store - Per-model flat tables keyed by primary key
//!
//! A `Store` is an explicit handle: independent stores never share state,
//! and one store can be shared across threads behind an `Arc`. Tables keep
//! insertion order, so unordered queries return records in the order they
//! were first written.

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::error::{ModelError, ModelResult};
use crate::model::{Database, Element, ModelDefinition};
use crate::relationships::DictionaryKey;
use crate::schema::NormalizedData;

/// One model's records keyed by encoded primary key
pub type Table = IndexMap<DictionaryKey, Element>;

/// Outcome of writing a batch of records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Records that did not exist before
    pub inserted: usize,
    /// Records merged into or replacing an existing record
    pub updated: usize,
}

/// In-memory normalized store
#[derive(Debug, Default)]
pub struct Store {
    tables: DashMap<String, Table>,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Write normalized tables into the store.
    ///
    /// Every entity is checked against `database` before anything is
    /// written, so a failing commit leaves the store untouched. Only
    /// declared attributes and primary key fields are kept. With `merge`,
    /// fields are merged into an existing record with the same key, and
    /// HasManyBy key arrays collect the keys of both records; otherwise the
    /// record is replaced.
    pub fn commit(&self, database: &Database, data: NormalizedData, merge: bool) -> ModelResult<CommitStats> {
        let mut tables = Vec::new();
        for (entity, table) in data.into_entities() {
            let definition = database.model(&entity)?;
            let rows: Vec<(DictionaryKey, Element)> = table
                .into_iter()
                .map(|(key, record)| (key, declared_fields(definition, record)))
                .collect();
            tables.push((entity, rows));
        }

        let mut stats = CommitStats::default();
        for (entity, rows) in tables {
            self.write(database, &entity, rows, merge, &mut stats);
        }

        tracing::debug!(
            "Committed {} new and {} existing record(s)",
            stats.inserted,
            stats.updated
        );
        Ok(stats)
    }

    /// Insert flat records of `entity`, keyed by its primary key.
    ///
    /// Fails without writing anything if any record lacks its primary key.
    pub fn insert(&self, database: &Database, entity: &str, records: Vec<Element>, merge: bool) -> ModelResult<CommitStats> {
        let definition = database.model(entity)?;

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let key = DictionaryKey::of(&record, definition.key_spec()).ok_or_else(|| {
                ModelError::MissingPrimaryKey {
                    entity: entity.to_string(),
                    path: format!("{}[{}]", entity, index),
                }
            })?;
            rows.push((key, declared_fields(definition, record)));
        }

        let mut stats = CommitStats::default();
        self.write(database, entity, rows, merge, &mut stats);
        Ok(stats)
    }

    fn write(
        &self,
        database: &Database,
        entity: &str,
        rows: Vec<(DictionaryKey, Element)>,
        merge: bool,
        stats: &mut CommitStats,
    ) {
        let mut table = self.tables.entry(entity.to_string()).or_default();
        for (key, record) in rows {
            match table.get_mut(&key) {
                Some(existing) => {
                    if merge {
                        database.merge_record(entity, existing, record);
                    } else {
                        *existing = record;
                    }
                    stats.updated += 1;
                }
                None => {
                    table.insert(key, record);
                    stats.inserted += 1;
                }
            }
        }
    }

    /// All records of `entity`, in table order
    pub fn all(&self, entity: &str) -> Vec<Element> {
        self.tables
            .get(entity)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One record of `entity` by encoded primary key
    pub fn find(&self, entity: &str, key: &DictionaryKey) -> Option<Element> {
        self.tables.get(entity).and_then(|table| table.get(key).cloned())
    }

    /// Number of records of `entity`
    pub fn count(&self, entity: &str) -> usize {
        self.tables.get(entity).map_or(0, |table| table.len())
    }

    /// Entities with a table, in no particular order
    pub fn entities(&self) -> Vec<String> {
        self.tables.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Remove every record of `entity`, returning how many were removed
    pub fn flush(&self, entity: &str) -> usize {
        self.tables.remove(entity).map_or(0, |(_, table)| table.len())
    }

    /// Remove one record, returning it
    pub fn delete(&self, entity: &str, key: &DictionaryKey) -> Option<Element> {
        self.tables
            .get_mut(entity)
            .and_then(|mut table| table.shift_remove(key))
    }

    /// Remove every table
    pub fn clear(&self) {
        self.tables.clear();
    }
}

/// Keep only the fields stored on records of `definition`
fn declared_fields(definition: &ModelDefinition, record: Element) -> Element {
    record
        .into_iter()
        .filter(|(field, _)| definition.declares(field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn element(value: Value) -> Element {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn database() -> Database {
        Database::builder()
            .register(ModelDefinition::new("users").attr("name").attr("age"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_insert_keeps_declared_fields() {
        let store = Store::new();
        let stats = store
            .insert(
                &database(),
                "users",
                vec![element(json!({ "id": 1, "name": "Ann", "extra": true }))],
                true,
            )
            .unwrap();

        assert_eq!(stats.inserted, 1);
        let stored = store.find("users", &DictionaryKey::from_value(&json!(1))).unwrap();
        assert_eq!(Value::Object(stored), json!({ "id": 1, "name": "Ann" }));
    }

    #[test]
    fn test_merge_and_replace() {
        let database = database();
        let store = Store::new();
        store
            .insert(&database, "users", vec![element(json!({ "id": 1, "name": "Ann", "age": 30 }))], true)
            .unwrap();

        let stats = store
            .insert(&database, "users", vec![element(json!({ "id": 1, "age": 31 }))], true)
            .unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(
            Value::Object(store.all("users").remove(0)),
            json!({ "id": 1, "name": "Ann", "age": 31 })
        );

        store
            .insert(&database, "users", vec![element(json!({ "id": 1, "age": 32 }))], false)
            .unwrap();
        assert_eq!(Value::Object(store.all("users").remove(0)), json!({ "id": 1, "age": 32 }));
    }

    #[test]
    fn test_insert_without_key_writes_nothing() {
        let store = Store::new();
        let err = store
            .insert(
                &database(),
                "users",
                vec![element(json!({ "id": 1 })), element(json!({ "name": "no key" }))],
                true,
            )
            .unwrap_err();

        assert!(matches!(err, ModelError::MissingPrimaryKey { .. }));
        assert_eq!(store.count("users"), 0);
    }

    #[test]
    fn test_independent_stores() {
        let database = database();
        let first = Store::new();
        let second = Store::new();
        first
            .insert(&database, "users", vec![element(json!({ "id": 1 }))], true)
            .unwrap();

        assert_eq!(first.count("users"), 1);
        assert_eq!(second.count("users"), 0);
        assert_eq!(first.flush("users"), 1);
        assert_eq!(first.count("users"), 0);
    }

    #[test]
    fn test_delete_keeps_order() {
        let database = database();
        let store = Store::new();
        store
            .insert(
                &database,
                "users",
                vec![
                    element(json!({ "id": 1 })),
                    element(json!({ "id": 2 })),
                    element(json!({ "id": 3 })),
                ],
                true,
            )
            .unwrap();

        assert!(store.delete("users", &DictionaryKey::from_value(&json!(2))).is_some());
        let ids: Vec<Value> = store.all("users").into_iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(3)]);
    }

    #[test]
    fn test_merge_collects_key_arrays() {
        use crate::relationships::Relation;

        let database = Database::builder()
            .register(
                ModelDefinition::new("clusters")
                    .relation("nodes", Relation::has_many_by("clusters", "nodes", "cluster_ids", "id").unwrap()),
            )
            .register(ModelDefinition::new("nodes").attr("cluster_ids"))
            .build()
            .unwrap();
        let store = Store::new();
        let key = DictionaryKey::from_value(&json!(10));

        store
            .insert(&database, "nodes", vec![element(json!({ "id": 10, "cluster_ids": [1] }))], true)
            .unwrap();
        store
            .insert(&database, "nodes", vec![element(json!({ "id": 10, "cluster_ids": [2] }))], true)
            .unwrap();
        assert_eq!(
            store.find("nodes", &key).and_then(|node| node.get("cluster_ids").cloned()),
            Some(json!([1, 2]))
        );

        store
            .insert(&database, "nodes", vec![element(json!({ "id": 10, "cluster_ids": [3] }))], false)
            .unwrap();
        assert_eq!(
            store.find("nodes", &key).and_then(|node| node.get("cluster_ids").cloned()),
            Some(json!([3]))
        );
    }
}
