//! # elif-store-orm: Relation resolution over a normalized in-memory store
//!
//! Models are declared up front with their attributes and relations and
//! validated into a [`Database`]. Nested payloads are normalized into flat
//! per-model tables held by a [`Store`]; queries read those tables back and
//! eager load relations onto the results by matching keys through
//! dictionaries, one sub-query per relation.
//!
//! ```no_run
//! use elif_store_orm::{Database, ModelDefinition, Orm, Relation};
//! use serde_json::json;
//!
//! # fn main() -> elif_store_orm::ModelResult<()> {
//! let database = Database::builder()
//!     .register(
//!         ModelDefinition::new("users")
//!             .attr("name")
//!             .relation("posts", Relation::has_many("users", "posts", "user_id", "id")?),
//!     )
//!     .register(ModelDefinition::new("posts").attr("user_id").attr("title"))
//!     .build()?;
//!
//! let orm = Orm::new(database);
//! orm.save("users", &json!({ "id": 1, "name": "Ann", "posts": [{ "id": 10, "title": "Hi" }] }))?;
//!
//! let users = orm.query("users")?.with("posts").get()?;
//! assert_eq!(users[0].relation("posts").map(|posts| posts.len()), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod loading;
pub mod model;
pub mod orm;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod store;

// Re-export core types
pub use config::OrmConfig;
pub use error::*;
pub use loading::{EagerLoadStats, EagerLoader};
pub use model::*;
pub use orm::Orm;
pub use query::{
    Constraint, EagerLoad, EagerLoads, OrderDirection, Query, QueryOperator, RelationQuery,
    WhereCondition,
};
pub use relationships::{
    map_to_dictionary, Dictionary, DictionaryKey, KeyPairs, Relation, RelationKind, PIVOT,
};
pub use schema::{NormalizationSchema, NormalizedData, Normalizer, SchemaBuilder};
pub use store::{CommitStats, Store, Table};
