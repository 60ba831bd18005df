//! Normalization Schema Builder - Declarative description of nested data
//!
//! Relations describe the shape of the data nested under them through the
//! builder; the normalizer walks the resulting schema.

use std::fmt;

/// How the data nested under one relation field normalizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationSchema {
    /// A root record of the given model
    Entity(String),
    /// A single related record
    One { entity: String, parent: String },
    /// An array of related records
    Many { entity: String, parent: String },
    /// A single record whose model is chosen by the parent's type field
    Union {
        entities: Vec<String>,
        type_field: String,
        parent: String,
    },
}

impl NormalizationSchema {
    /// Returns true if the nested value is expected to be an array
    pub fn is_many(&self) -> bool {
        matches!(self, NormalizationSchema::Many { .. })
    }

    /// Model types the nested data may belong to
    pub fn entities(&self) -> Vec<&str> {
        match self {
            NormalizationSchema::Entity(entity)
            | NormalizationSchema::One { entity, .. }
            | NormalizationSchema::Many { entity, .. } => vec![entity.as_str()],
            NormalizationSchema::Union { entities, .. } => {
                entities.iter().map(String::as_str).collect()
            }
        }
    }
}

impl fmt::Display for NormalizationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationSchema::Entity(entity) => write!(f, "{}", entity),
            NormalizationSchema::One { entity, .. } => write!(f, "one({})", entity),
            NormalizationSchema::Many { entity, .. } => write!(f, "many({})", entity),
            NormalizationSchema::Union { entities, type_field, .. } => {
                write!(f, "union({} by {})", entities.join("|"), type_field)
            }
        }
    }
}

/// Factory handed to each relation's `define`
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        SchemaBuilder
    }

    /// Schema for a root record of `entity`
    pub fn entity(&self, entity: &str) -> NormalizationSchema {
        NormalizationSchema::Entity(entity.to_string())
    }

    /// Schema for a single nested record of `entity` under `parent`
    pub fn one(&self, entity: &str, parent: &str) -> NormalizationSchema {
        NormalizationSchema::One {
            entity: entity.to_string(),
            parent: parent.to_string(),
        }
    }

    /// Schema for an array of nested records of `entity` under `parent`
    pub fn many(&self, entity: &str, parent: &str) -> NormalizationSchema {
        NormalizationSchema::Many {
            entity: entity.to_string(),
            parent: parent.to_string(),
        }
    }

    /// Schema for a nested record whose model is named by the parent's
    /// `type_field`
    pub fn union<S: AsRef<str>>(
        &self,
        entities: &[S],
        type_field: &str,
        parent: &str,
    ) -> NormalizationSchema {
        NormalizationSchema::Union {
            entities: entities.iter().map(|e| e.as_ref().to_string()).collect(),
            type_field: type_field.to_string(),
            parent: parent.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shapes() {
        let builder = SchemaBuilder::new();
        assert_eq!(builder.one("profiles", "users").to_string(), "one(profiles)");
        assert!(builder.many("posts", "users").is_many());

        let union = builder.union(&["posts", "videos"], "commentable_type", "comments");
        assert_eq!(union.entities(), vec!["posts", "videos"]);
        assert_eq!(union.to_string(), "union(posts|videos by commentable_type)");
    }
}
