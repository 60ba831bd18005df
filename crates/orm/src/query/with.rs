//! Query WITH Methods - Eager-load tree for a query
//!
//! `with("posts.comments")` records a tree of relation names to load with the
//! results. Each node may carry a constraint closure that is applied to the
//! sub-query of that relation before its eager constraints.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::model::{Database, ModelDefinition};

use super::builder::Query;

/// Closure narrowing the sub-query of one eager-loaded relation
pub type Constraint = Arc<dyn Fn(Query) -> Query + Send + Sync>;

/// One relation to load, with its constraint and nested loads
#[derive(Clone, Default)]
pub struct EagerLoad {
    constraint: Option<Constraint>,
    nested: EagerLoads,
}

impl EagerLoad {
    /// The constraint applied to this relation's sub-query
    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    /// Relations to load on the related records
    pub fn nested(&self) -> &EagerLoads {
        &self.nested
    }
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoad")
            .field("constrained", &self.constraint.is_some())
            .field("nested", &self.nested)
            .finish()
    }
}

/// Ordered tree of relation names to load
#[derive(Clone, Default, Debug)]
pub struct EagerLoads {
    entries: IndexMap<String, EagerLoad>,
}

impl EagerLoads {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level relations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up a top-level relation
    pub fn get(&self, name: &str) -> Option<&EagerLoad> {
        self.entries.get(name)
    }

    /// Iterate top-level relations in the order they were requested
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EagerLoad)> {
        self.entries.iter().map(|(name, load)| (name.as_str(), load))
    }

    /// Depth of the deepest path
    pub fn depth(&self) -> usize {
        self.entries
            .values()
            .map(|load| 1 + load.nested.depth())
            .max()
            .unwrap_or(0)
    }

    /// Add a path of relation names, creating intermediate nodes
    pub fn add_path(&mut self, segments: &[&str], constraint: Option<Constraint>) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };

        let entry = self.entries.entry(first.to_string()).or_default();
        if rest.is_empty() {
            if constraint.is_some() {
                entry.constraint = constraint;
            }
        } else {
            entry.nested.add_path(rest, constraint);
        }
    }

    /// Add every relation of `definition`, descending `depth` levels
    pub(crate) fn add_all(&mut self, database: &Database, definition: &ModelDefinition, depth: usize) {
        if depth == 0 {
            return;
        }

        for (name, relation) in definition.relations() {
            let entry = self.entries.entry(name.to_string()).or_default();
            for related in relation.related_entities() {
                if let Some(related) = database.get(related) {
                    entry.nested.add_all(database, related, depth - 1);
                }
            }
        }
    }

    /// Copy of this tree keeping only the top-level relations `definition`
    /// declares
    pub(crate) fn retain_declared(&self, definition: &ModelDefinition) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|(name, _)| {
                let declared = definition.get_relation(name).is_some();
                if !declared {
                    tracing::trace!(
                        "Dropping eager load '{}' not declared on '{}'",
                        name,
                        definition.entity()
                    );
                }
                declared
            })
            .map(|(name, load)| (name.clone(), load.clone()))
            .collect();
        Self { entries }
    }
}

impl Query {
    /// Eager load a relation; dotted paths load nested relations
    pub fn with(mut self, path: &str) -> Self {
        let segments = self.path_segments(path);
        self.eager_loads.add_path(&segments, None);
        self
    }

    /// Eager load a relation, narrowing its sub-query with `constraint`
    pub fn with_constraint<F>(mut self, path: &str, constraint: F) -> Self
    where
        F: Fn(Query) -> Query + Send + Sync + 'static,
    {
        let segments = self.path_segments(path);
        self.eager_loads.add_path(&segments, Some(Arc::new(constraint)));
        self
    }

    /// Eager load every relation of the queried model
    pub fn with_all(self) -> Self {
        self.with_all_recursive(1)
    }

    /// Eager load every relation, and theirs, `depth` levels deep
    pub fn with_all_recursive(mut self, depth: usize) -> Self {
        let depth = depth.min(self.config.max_depth);
        if let Some(definition) = self.database.get(&self.entity) {
            self.eager_loads.add_all(&self.database, definition, depth);
        }
        self
    }

    fn path_segments<'a>(&self, path: &'a str) -> Vec<&'a str> {
        let mut segments: Vec<&str> = path
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();

        if segments.len() > self.config.max_depth {
            tracing::warn!(
                "Eager load path '{}' is deeper than {} level(s), truncating",
                path,
                self.config.max_depth
            );
            segments.truncate(self.config.max_depth);
        }

        segments
    }
}
