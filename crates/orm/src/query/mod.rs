//! Query Module - Fluent queries over the in-memory store
//!
//! Relations only talk to queries through [`RelationQuery`]; [`Query`] is the
//! implementation backed by a [`Store`](crate::store::Store).

pub mod builder;
pub mod execution;
pub mod ordering;
pub mod types;
pub mod where_clause;
pub mod with;

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::Model;

// Re-export main types and builder
pub use builder::Query;
pub use types::{OrderDirection, QueryOperator, WhereCondition};
pub use with::{Constraint, EagerLoad, EagerLoads};

/// The query capabilities relations depend on during eager loading
pub trait RelationQuery: Sized {
    /// The model type this query reads
    fn entity(&self) -> &str;

    /// A fresh query on another model, without conditions or eager loads
    fn new_query(&self, entity: &str) -> ModelResult<Self>;

    /// This query, with its conditions and eager loads, aimed at another model
    fn for_entity(&self, entity: &str) -> ModelResult<Self>;

    /// Keep records whose `field` equals `value`
    fn where_eq(self, field: &str, value: Value) -> Self;

    /// Keep records whose `field` equals one of `values`
    fn where_in(self, field: &str, values: Vec<Value>) -> Self;

    /// Keep records whose `fields`, read together, equal one of `tuples`
    fn where_tuple_in(self, fields: &[String], tuples: Vec<Vec<Value>>) -> Self;

    /// Keep records whose array `field` holds one of `values`
    fn where_contains_any(self, field: &str, values: Vec<Value>) -> Self;

    /// Execute; nested eager loads run only when `with_relations` is set
    fn get(&self, with_relations: bool) -> ModelResult<Vec<Model>>;
}

impl RelationQuery for Query {
    fn entity(&self) -> &str {
        Query::entity(self)
    }

    fn new_query(&self, entity: &str) -> ModelResult<Self> {
        Query::new_query(self, entity)
    }

    fn for_entity(&self, entity: &str) -> ModelResult<Self> {
        Query::for_entity(self, entity)
    }

    fn where_eq(self, field: &str, value: Value) -> Self {
        Query::where_eq(self, field, value)
    }

    fn where_in(self, field: &str, values: Vec<Value>) -> Self {
        Query::where_in(self, field, values)
    }

    fn where_tuple_in(self, fields: &[String], tuples: Vec<Vec<Value>>) -> Self {
        Query::where_tuple_in(self, fields, tuples)
    }

    fn where_contains_any(self, field: &str, values: Vec<Value>) -> Self {
        Query::where_contains_any(self, field, values)
    }

    fn get(&self, with_relations: bool) -> ModelResult<Vec<Model>> {
        self.fetch(with_relations)
    }
}
