//! Relation Contract - Closed set of relation kinds with one dispatch surface
//!
//! Every relation kind implements the same operations: `related_entities`,
//! `define`, `attach`, `add_eager_constraints`, `match_models` and `make`.
//! `Relation` dispatches each of them with an exhaustive match, so adding a
//! kind forces every operation to handle it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::model::{Database, Element, KeySpec, Model, ModelDefinition, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::belongs_to::BelongsTo;
use super::belongs_to_many::BelongsToMany;
use super::has_many::HasMany;
use super::has_many_by::HasManyBy;
use super::has_many_through::HasManyThrough;
use super::has_one::HasOne;
use super::morph_many::MorphMany;
use super::morph_one::MorphOne;
use super::morph_to::MorphTo;

/// Relation slot holding the pivot row on records loaded through a
/// many-to-many relation
pub const PIVOT: &str = "pivot";

/// Defines the kind of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// One-to-one, foreign key on the related model
    HasOne,
    /// One-to-many, foreign key on the related model
    HasMany,
    /// Inverse of HasOne/HasMany, foreign key on the parent
    BelongsTo,
    /// One-to-many where each related record lists its parents' keys
    HasManyBy,
    /// One-to-many reached through an intermediate model
    HasManyThrough,
    /// Many-to-many through a pivot model
    BelongsToMany,
    /// Polymorphic one-to-one
    MorphOne,
    /// Polymorphic one-to-many
    MorphMany,
    /// Inverse polymorphic relationship
    MorphTo,
}

impl RelationKind {
    /// Returns true if this relationship kind is polymorphic
    pub fn is_polymorphic(self) -> bool {
        matches!(self, Self::MorphOne | Self::MorphMany | Self::MorphTo)
    }

    /// Returns true if this relationship kind resolves to a collection
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            Self::HasMany
                | Self::HasManyBy
                | Self::HasManyThrough
                | Self::BelongsToMany
                | Self::MorphMany
        )
    }

    /// Returns true if this relationship kind requires a pivot model
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::BelongsToMany)
    }
}

/// A declared association between a parent model and its related model(s)
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    HasOne(HasOne),
    HasMany(HasMany),
    BelongsTo(BelongsTo),
    HasManyBy(HasManyBy),
    HasManyThrough(HasManyThrough),
    BelongsToMany(BelongsToMany),
    MorphOne(MorphOne),
    MorphMany(MorphMany),
    MorphTo(MorphTo),
}

impl Relation {
    /// Parent has one related record holding `foreign_key` = parent's `local_key`
    pub fn has_one(
        parent: &str,
        related: &str,
        foreign_key: impl Into<KeySpec>,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        HasOne::new(parent, related, foreign_key, local_key).map(Relation::HasOne)
    }

    /// Parent has many related records holding `foreign_key` = parent's `local_key`
    pub fn has_many(
        parent: &str,
        related: &str,
        foreign_key: impl Into<KeySpec>,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        HasMany::new(parent, related, foreign_key, local_key).map(Relation::HasMany)
    }

    /// Parent holds `foreign_key` referencing the related `owner_key`
    pub fn belongs_to(
        parent: &str,
        related: &str,
        foreign_key: impl Into<KeySpec>,
        owner_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        BelongsTo::new(parent, related, foreign_key, owner_key).map(Relation::BelongsTo)
    }

    /// Related records list their parents' `local_key` values in the array
    /// field `foreign_key`
    pub fn has_many_by(
        parent: &str,
        related: &str,
        foreign_key: impl Into<KeySpec>,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        HasManyBy::new(parent, related, foreign_key, local_key).map(Relation::HasManyBy)
    }

    /// Parent reaches related records through an intermediate model
    pub fn has_many_through(
        parent: &str,
        related: &str,
        through: &str,
        first_key: impl Into<KeySpec>,
        second_key: impl Into<KeySpec>,
        local_key: impl Into<KeySpec>,
        second_local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        HasManyThrough::new(
            parent,
            related,
            through,
            first_key,
            second_key,
            local_key,
            second_local_key,
        )
        .map(Relation::HasManyThrough)
    }

    /// Many-to-many relation recorded in `pivot` rows
    pub fn belongs_to_many(
        parent: &str,
        related: &str,
        pivot: &str,
        foreign_pivot_key: impl Into<KeySpec>,
        related_pivot_key: impl Into<KeySpec>,
        parent_key: impl Into<KeySpec>,
        related_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        BelongsToMany::new(
            parent,
            related,
            pivot,
            foreign_pivot_key,
            related_pivot_key,
            parent_key,
            related_key,
        )
        .map(Relation::BelongsToMany)
    }

    /// Polymorphic one-to-one, discriminated by `type_field` on the related model
    pub fn morph_one(
        parent: &str,
        related: &str,
        id: impl Into<KeySpec>,
        type_field: &str,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        MorphOne::new(parent, related, id, type_field, local_key).map(Relation::MorphOne)
    }

    /// Polymorphic one-to-many, discriminated by `type_field` on the related model
    pub fn morph_many(
        parent: &str,
        related: &str,
        id: impl Into<KeySpec>,
        type_field: &str,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        MorphMany::new(parent, related, id, type_field, local_key).map(Relation::MorphMany)
    }

    /// Inverse polymorphic relation: the parent's `type_field` names which of
    /// `relateds` its `id` points into
    pub fn morph_to<I, S>(
        parent: &str,
        relateds: I,
        id: impl Into<KeySpec>,
        type_field: &str,
        owner_key: impl Into<KeySpec>,
    ) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MorphTo::new(parent, relateds, id, type_field, owner_key).map(Relation::MorphTo)
    }

    /// The kind of this relation
    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::HasOne(_) => RelationKind::HasOne,
            Relation::HasMany(_) => RelationKind::HasMany,
            Relation::BelongsTo(_) => RelationKind::BelongsTo,
            Relation::HasManyBy(_) => RelationKind::HasManyBy,
            Relation::HasManyThrough(_) => RelationKind::HasManyThrough,
            Relation::BelongsToMany(_) => RelationKind::BelongsToMany,
            Relation::MorphOne(_) => RelationKind::MorphOne,
            Relation::MorphMany(_) => RelationKind::MorphMany,
            Relation::MorphTo(_) => RelationKind::MorphTo,
        }
    }

    /// Returns true if the relation resolves to a collection
    pub fn is_collection(&self) -> bool {
        self.kind().is_collection()
    }

    /// The model declaring this relation
    pub fn parent_entity(&self) -> &str {
        match self {
            Relation::HasOne(r) => r.parent(),
            Relation::HasMany(r) => r.parent(),
            Relation::BelongsTo(r) => r.parent(),
            Relation::HasManyBy(r) => r.parent(),
            Relation::HasManyThrough(r) => r.parent(),
            Relation::BelongsToMany(r) => r.parent(),
            Relation::MorphOne(r) => r.parent(),
            Relation::MorphMany(r) => r.parent(),
            Relation::MorphTo(r) => r.parent(),
        }
    }

    /// Every model type this relation can resolve to
    pub fn related_entities(&self) -> Vec<&str> {
        match self {
            Relation::HasOne(r) => r.related_entities(),
            Relation::HasMany(r) => r.related_entities(),
            Relation::BelongsTo(r) => r.related_entities(),
            Relation::HasManyBy(r) => r.related_entities(),
            Relation::HasManyThrough(r) => r.related_entities(),
            Relation::BelongsToMany(r) => r.related_entities(),
            Relation::MorphOne(r) => r.related_entities(),
            Relation::MorphMany(r) => r.related_entities(),
            Relation::MorphTo(r) => r.related_entities(),
        }
    }

    /// The pivot model of a many-to-many relation
    pub fn pivot_entity(&self) -> Option<&str> {
        match self {
            Relation::BelongsToMany(r) => Some(r.pivot()),
            _ => None,
        }
    }

    /// The parent field naming the related model of a MorphTo relation
    pub fn morph_type_field(&self) -> Option<&str> {
        match self {
            Relation::MorphTo(r) => Some(r.type_field()),
            _ => None,
        }
    }

    /// Describe how data nested under this relation normalizes
    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        match self {
            Relation::HasOne(r) => r.define(schema),
            Relation::HasMany(r) => r.define(schema),
            Relation::BelongsTo(r) => r.define(schema),
            Relation::HasManyBy(r) => r.define(schema),
            Relation::HasManyThrough(r) => r.define(schema),
            Relation::BelongsToMany(r) => r.define(schema),
            Relation::MorphOne(r) => r.define(schema),
            Relation::MorphMany(r) => r.define(schema),
            Relation::MorphTo(r) => r.define(schema),
        }
    }

    /// Copy the relational keys between a parent record and one of its
    /// nested child records. `child_entity` is the model the child record
    /// was resolved to.
    pub fn attach(&self, record: &mut Element, child: &mut Element, child_entity: &str) {
        match self {
            Relation::HasOne(r) => r.attach(record, child),
            Relation::HasMany(r) => r.attach(record, child),
            Relation::BelongsTo(r) => r.attach(record, child),
            Relation::HasManyBy(r) => r.attach(record, child),
            Relation::HasManyThrough(r) => r.attach(record, child),
            Relation::BelongsToMany(r) => r.attach(record, child),
            Relation::MorphOne(r) => r.attach(record, child),
            Relation::MorphMany(r) => r.attach(record, child),
            Relation::MorphTo(r) => r.attach(record, child, child_entity),
        }
    }

    /// Narrow `query` to the related rows reachable from `models`
    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, models: &[Model]) -> ModelResult<Q> {
        match self {
            Relation::HasOne(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::HasMany(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::BelongsTo(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::HasManyBy(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::HasManyThrough(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::BelongsToMany(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::MorphOne(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::MorphMany(r) => Ok(r.add_eager_constraints(query, models)),
            Relation::MorphTo(r) => Ok(r.add_eager_constraints(query, models)),
        }
    }

    /// Run `query` and assign the `name` slot on every model in `models`
    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        match self {
            Relation::HasOne(r) => r.match_models(name, models, query),
            Relation::HasMany(r) => r.match_models(name, models, query),
            Relation::BelongsTo(r) => r.match_models(name, models, query),
            Relation::HasManyBy(r) => r.match_models(name, models, query),
            Relation::HasManyThrough(r) => r.match_models(name, models, query),
            Relation::BelongsToMany(r) => r.match_models(name, models, query),
            Relation::MorphOne(r) => r.match_models(name, models, query),
            Relation::MorphMany(r) => r.match_models(name, models, query),
            Relation::MorphTo(r) => r.match_models(name, models, query),
        }
    }

    /// Build related instances from raw data without touching any store.
    ///
    /// `morph_type` names the related model for MorphTo relations and is
    /// ignored by every other kind.
    pub fn make(&self, database: &Database, raw: Option<&Value>, morph_type: Option<&str>) -> ModelResult<RelationValue> {
        match self {
            Relation::HasOne(r) => r.make(database, raw),
            Relation::HasMany(r) => r.make(database, raw),
            Relation::BelongsTo(r) => r.make(database, raw),
            Relation::HasManyBy(r) => r.make(database, raw),
            Relation::HasManyThrough(r) => r.make(database, raw),
            Relation::BelongsToMany(r) => r.make(database, raw),
            Relation::MorphOne(r) => r.make(database, raw),
            Relation::MorphMany(r) => r.make(database, raw),
            Relation::MorphTo(r) => r.make(database, raw, morph_type),
        }
    }

    /// Check the relation against the registered models
    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        match self {
            Relation::HasOne(r) => r.validate(database),
            Relation::HasMany(r) => r.validate(database),
            Relation::BelongsTo(r) => r.validate(database),
            Relation::HasManyBy(r) => r.validate(database),
            Relation::HasManyThrough(r) => r.validate(database),
            Relation::BelongsToMany(r) => r.validate(database),
            Relation::MorphOne(r) => r.validate(database),
            Relation::MorphMany(r) => r.validate(database),
            Relation::MorphTo(r) => r.validate(database),
        }
    }
}

/// Look up a model a relation refers to, reporting absence as a
/// configuration error
pub(crate) fn registered<'a>(database: &'a Database, entity: &str) -> ModelResult<&'a ModelDefinition> {
    database.get(entity).ok_or_else(|| {
        ModelError::Configuration(format!("Model '{}' is not registered", entity))
    })
}

/// Reject an empty polymorphic type field
pub(crate) fn require_type_field(type_field: &str) -> ModelResult<String> {
    if type_field.is_empty() {
        return Err(ModelError::Configuration(
            "Polymorphic relations require a type field".to_string(),
        ));
    }
    Ok(type_field.to_string())
}

/// Build a to-one slot from raw data
pub(crate) fn make_one(database: &Database, related: &str, raw: Option<&Value>) -> ModelResult<RelationValue> {
    match raw {
        None | Some(Value::Null) => Ok(RelationValue::Null),
        Some(Value::Object(element)) => {
            Ok(RelationValue::One(Box::new(database.new_instance(related, element)?)))
        }
        Some(other) => Err(ModelError::Relationship(format!(
            "Expected a record of '{}', got {}",
            related, other
        ))),
    }
}

/// Build a to-many slot from raw data
pub(crate) fn make_many(database: &Database, related: &str, raw: Option<&Value>) -> ModelResult<RelationValue> {
    make_many_with(database, related, raw, |_, _| Ok(()))
}

/// Build a to-many slot from raw data, post-processing each instance with
/// its raw record
pub(crate) fn make_many_with<F>(
    database: &Database,
    related: &str,
    raw: Option<&Value>,
    mut finish: F,
) -> ModelResult<RelationValue>
where
    F: FnMut(&mut Model, &Element) -> ModelResult<()>,
{
    match raw {
        None | Some(Value::Null) => Ok(RelationValue::Many(Vec::new())),
        Some(Value::Array(items)) => {
            let mut models = Vec::with_capacity(items.len());
            for item in items {
                let Value::Object(element) = item else {
                    return Err(ModelError::Relationship(format!(
                        "Expected a record of '{}', got {}",
                        related, item
                    )));
                };
                let mut model = database.new_instance(related, element)?;
                finish(&mut model, element)?;
                models.push(model);
            }
            Ok(RelationValue::Many(models))
        }
        Some(other) => Err(ModelError::Relationship(format!(
            "Expected an array of '{}' records, got {}",
            related, other
        ))),
    }
}

/// Clone `results[i]` for each index in `positions`, in result order and
/// without repeats
pub(crate) fn ordered_results(results: &[Model], mut positions: Vec<usize>) -> Vec<Model> {
    positions.sort_unstable();
    positions.dedup();
    positions.into_iter().map(|index| results[index].clone()).collect()
}
