//! Query execution against the in-memory store

use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::loading::EagerLoader;
use crate::model::{Element, Model};
use crate::relationships::DictionaryKey;

use super::builder::Query;
use super::types::WhereCondition;

impl Query {
    /// Execute the query and load every requested relation
    pub fn get(&self) -> ModelResult<Vec<Model>> {
        self.fetch(true)
    }

    /// Execute the query; eager loads only run when `with_relations` is set
    pub fn fetch(&self, with_relations: bool) -> ModelResult<Vec<Model>> {
        let records = self.select();
        let mut models = Vec::with_capacity(records.len());
        for record in &records {
            models.push(self.database.new_instance(&self.entity, record)?);
        }

        if with_relations && !self.eager_loads.is_empty() && !models.is_empty() {
            let stats = EagerLoader::new(self).load(&mut models)?;
            tracing::debug!(
                "Loaded {} relation(s) for {} '{}' record(s): {} related record(s), depth {}",
                stats.relations_loaded,
                models.len(),
                self.entity,
                stats.records_loaded,
                stats.depth_loaded
            );
        }

        Ok(models)
    }

    /// Execute the query and return the first result
    pub fn first(&self) -> ModelResult<Option<Model>> {
        let models = self.clone().limit(1).get()?;
        Ok(models.into_iter().next())
    }

    /// Find one record by primary key; composite keys take an array in key
    /// order
    pub fn find(&self, key: Value) -> ModelResult<Option<Model>> {
        let definition = self.database.model(&self.entity)?;
        let spec = definition.key_spec();

        let parts = match (spec.is_composite(), key) {
            (false, key) => vec![key],
            (true, Value::Array(parts)) if parts.len() == spec.len() => parts,
            (true, key) => {
                return Err(ModelError::Query(format!(
                    "Key {} does not match the composite primary key {} of '{}'",
                    key, spec, self.entity
                )))
            }
        };

        let mut query = self.clone();
        query.where_conditions.push(WhereCondition::TupleIn {
            columns: spec.fields().to_vec(),
            keys: std::iter::once(DictionaryKey::encode(&parts)).collect(),
        });
        query.first()
    }

    /// Number of records matching the conditions
    pub fn count(&self) -> usize {
        let mut query = self.clone();
        query.limit_count = None;
        query.offset_value = None;
        query.select().len()
    }

    /// Filter, sort and page the raw records
    fn select(&self) -> Vec<Element> {
        let mut records: Vec<Element> = self
            .store
            .all(&self.entity)
            .into_iter()
            .filter(|record| self.where_conditions.iter().all(|c| c.matches(record)))
            .collect();

        if !self.order_by.is_empty() {
            records.sort_by(|left, right| self.compare_records(left, right));
        }

        let offset = self.offset_value.unwrap_or(0);
        let limit = self.limit_count.unwrap_or(usize::MAX);
        records.into_iter().skip(offset).take(limit).collect()
    }
}
