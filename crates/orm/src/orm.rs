//! ORM entry point tying the model registry, a store and the configuration
//! together

use std::sync::Arc;

use serde_json::Value;

use crate::config::OrmConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::{Database, Element, Model};
use crate::query::Query;
use crate::schema::{NormalizedData, Normalizer};
use crate::store::{CommitStats, Store};

/// A registry of models bound to one store
#[derive(Debug, Clone)]
pub struct Orm {
    database: Arc<Database>,
    store: Arc<Store>,
    config: Arc<OrmConfig>,
}

impl Orm {
    /// Bind `database` to a fresh store with the default configuration
    pub fn new(database: Database) -> Self {
        Self {
            database: Arc::new(database),
            store: Arc::new(Store::new()),
            config: Arc::new(OrmConfig::default()),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: OrmConfig) -> ModelResult<Self> {
        config.validate()?;
        self.config = Arc::new(config);
        Ok(self)
    }

    /// Share an existing store
    pub fn with_store(mut self, store: Arc<Store>) -> Self {
        self.store = store;
        self
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// Normalize a nested payload of `entity` without storing it
    pub fn normalize(&self, entity: &str, payload: &Value) -> ModelResult<NormalizedData> {
        Normalizer::new(&self.database, &self.config).normalize(entity, payload)
    }

    /// Normalize a nested payload and commit every resulting table.
    ///
    /// Returns the key reference(s) of the root record(s). Nothing is written
    /// when normalization fails.
    pub fn save(&self, entity: &str, payload: &Value) -> ModelResult<Value> {
        let data = self.normalize(entity, payload)?;
        let result = data.result().clone();
        let stats = self
            .store
            .commit(&self.database, data, self.config.merge_on_save)?;

        tracing::info!(
            "Saved '{}': {} inserted, {} updated",
            entity,
            stats.inserted,
            stats.updated
        );
        Ok(result)
    }

    /// Insert flat records of `entity` without normalizing them
    pub fn insert(&self, entity: &str, records: Vec<Element>) -> ModelResult<CommitStats> {
        self.store
            .insert(&self.database, entity, records, self.config.merge_on_save)
    }

    /// Start a query on `entity`
    pub fn query(&self, entity: &str) -> ModelResult<Query> {
        Query::new(
            Arc::clone(&self.database),
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            entity,
        )
    }

    /// Build an instance of `entity` from a raw record, nested relations
    /// included, without touching the store
    pub fn make(&self, entity: &str, raw: &Value) -> ModelResult<Model> {
        match raw {
            Value::Object(record) => self.database.new_instance(entity, record),
            other => Err(ModelError::Serialization(format!(
                "Cannot build '{}' from {}",
                entity, other
            ))),
        }
    }

    /// Remove every record of `entity`
    pub fn flush(&self, entity: &str) -> usize {
        self.store.flush(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelDefinition, RelationValue};
    use crate::relationships::Relation;
    use serde_json::json;

    fn orm() -> Orm {
        let database = Database::builder()
            .register(
                ModelDefinition::new("users")
                    .attr("name")
                    .relation("posts", Relation::has_many("users", "posts", "user_id", "id").unwrap()),
            )
            .register(ModelDefinition::new("posts").attr("user_id").attr("title"))
            .build()
            .unwrap();
        Orm::new(database)
    }

    #[test]
    fn test_save_returns_root_references() {
        let orm = orm();
        let result = orm
            .save("users", &json!([{ "id": 1, "posts": [{ "id": 10 }] }, { "id": 2 }]))
            .unwrap();

        assert_eq!(result, json!([1, 2]));
        assert_eq!(orm.store().count("users"), 2);
        assert_eq!(orm.store().count("posts"), 1);
    }

    #[test]
    fn test_failed_save_writes_nothing() {
        let orm = orm();
        let err = orm
            .save("users", &json!({ "id": 1, "posts": [{ "id": 10 }, { "title": "no key" }] }))
            .unwrap_err();

        assert!(matches!(err, ModelError::MissingPrimaryKey { .. }));
        assert_eq!(orm.store().count("users"), 0);
        assert_eq!(orm.store().count("posts"), 0);
    }

    #[test]
    fn test_make_does_not_touch_store() {
        let orm = orm();
        let user = orm
            .make("users", &json!({ "id": 1, "posts": [{ "id": 10, "title": "Hi" }] }))
            .unwrap();

        let posts = user.relation("posts").and_then(RelationValue::as_many).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(orm.store().count("posts"), 0);
    }

    #[test]
    fn test_with_config_validates() {
        let err = orm()
            .with_config(OrmConfig::default().with_max_depth(0))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_shared_store() {
        let first = orm();
        let second = orm().with_store(Arc::clone(first.store()));
        first.save("users", &json!({ "id": 1 })).unwrap();
        assert_eq!(second.query("users").unwrap().count(), 1);
    }
}
