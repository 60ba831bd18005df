//! Model System - Model definitions, instances and the model registry
//!
//! - `primary_key`: single and composite key specifications
//! - `instance`: model instances with attribute values and relation slots
//! - `definition`: declared fields and relations of a model type
//! - `database`: validated, immutable registry of model definitions

pub mod database;
pub mod definition;
pub mod instance;
pub mod primary_key;

// Re-export main types for convenience
pub use database::{Database, DatabaseBuilder};
pub use definition::{Attribute, Field, ModelDefinition};
pub use instance::{Element, Model, RelationValue};
pub use primary_key::KeySpec;
