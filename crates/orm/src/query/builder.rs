//! Query Builder - Core builder implementation

use std::fmt;
use std::sync::Arc;

use crate::config::OrmConfig;
use crate::error::ModelResult;
use crate::model::Database;
use crate::store::Store;

use super::types::{OrderDirection, WhereCondition};
use super::with::EagerLoads;

/// Query over one model type's flat table in a [`Store`]
#[derive(Clone)]
pub struct Query {
    pub(crate) database: Arc<Database>,
    pub(crate) store: Arc<Store>,
    pub(crate) config: Arc<OrmConfig>,
    pub(crate) entity: String,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<usize>,
    pub(crate) offset_value: Option<usize>,
    pub(crate) eager_loads: EagerLoads,
}

impl Query {
    /// Create a new query for `entity`
    pub fn new(
        database: Arc<Database>,
        store: Arc<Store>,
        config: Arc<OrmConfig>,
        entity: &str,
    ) -> ModelResult<Self> {
        database.model(entity)?;

        Ok(Self {
            database,
            store,
            config,
            entity: entity.to_string(),
            where_conditions: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            eager_loads: EagerLoads::new(),
        })
    }

    /// The queried model type
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The model registry
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// The store queried
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// Relations to load with the results
    pub fn eager_loads(&self) -> &EagerLoads {
        &self.eager_loads
    }

    /// A fresh query on another model sharing the same registry and store
    pub fn new_query(&self, entity: &str) -> ModelResult<Self> {
        Query::new(
            Arc::clone(&self.database),
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            entity,
        )
    }

    /// This query retargeted at another model: conditions, ordering and
    /// paging are kept, nested eager loads are kept where the target model
    /// declares them
    pub fn for_entity(&self, entity: &str) -> ModelResult<Self> {
        let definition = self.database.model(entity)?;
        let mut query = self.clone();
        query.entity = entity.to_string();
        query.eager_loads = self.eager_loads.retain_declared(definition);
        Ok(query)
    }

    /// Replace the eager-load tree
    pub(crate) fn with_eager_loads(mut self, eager_loads: EagerLoads) -> Self {
        self.eager_loads = eager_loads;
        self
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &self.entity)
            .field("where_conditions", &self.where_conditions)
            .field("order_by", &self.order_by)
            .field("limit_count", &self.limit_count)
            .field("offset_value", &self.offset_value)
            .field("eager_loads", &self.eager_loads)
            .finish()
    }
}
