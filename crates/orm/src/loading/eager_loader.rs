use crate::{
    error::{ModelError, OrmResult},
    model::Model,
    query::{EagerLoad, Query},
    relationships::Relation,
};

/// Statistics about one eager loading pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EagerLoadStats {
    /// Relations matched at the top level
    pub relations_loaded: usize,
    /// Related records assigned across all relation slots
    pub records_loaded: usize,
    /// Depth of the eager-load tree
    pub depth_loaded: usize,
}

/// Resolves the eager-load tree of a query onto its results.
///
/// For each requested relation the loader builds a sub-query on the related
/// model carrying the nested loads, applies the caller's constraint, lets the
/// relation narrow it to the parents' keys and hands it to the relation's
/// match phase. Nested relations load when the relation runs its sub-query.
pub struct EagerLoader<'q> {
    query: &'q Query,
}

impl<'q> EagerLoader<'q> {
    /// Create a loader for the eager loads of `query`
    pub fn new(query: &'q Query) -> Self {
        Self { query }
    }

    /// Assign every requested relation slot on `models`
    pub fn load(&self, models: &mut [Model]) -> OrmResult<EagerLoadStats> {
        let database = self.query.database();
        let definition = database.model(self.query.entity())?;
        let eager_loads = self.query.eager_loads();

        let mut stats = EagerLoadStats {
            depth_loaded: eager_loads.depth(),
            ..EagerLoadStats::default()
        };

        for (name, load) in eager_loads.iter() {
            let relation = definition.get_relation(name).ok_or_else(|| {
                ModelError::Relationship(format!(
                    "Relation '{}' is not defined on '{}'",
                    name,
                    definition.entity()
                ))
            })?;

            self.load_relation(name, relation, load, models)?;

            stats.relations_loaded += 1;
            stats.records_loaded += models
                .iter()
                .filter_map(|model| model.relation(name))
                .map(|value| value.len())
                .sum::<usize>();
        }

        Ok(stats)
    }

    fn load_relation(
        &self,
        name: &str,
        relation: &Relation,
        load: &EagerLoad,
        models: &mut [Model],
    ) -> OrmResult<()> {
        let related = relation
            .related_entities()
            .first()
            .copied()
            .ok_or_else(|| ModelError::Relationship(format!("Relation '{}' has no related model", name)))?;

        let mut query = self
            .query
            .new_query(related)?
            .with_eager_loads(load.nested().clone());
        if let Some(constraint) = load.constraint() {
            query = constraint(query);
        }

        let query = relation.add_eager_constraints(query, models)?;
        tracing::trace!(
            "Eager loading '{}' ({:?}) for {} '{}' record(s)",
            name,
            relation.kind(),
            models.len(),
            self.query.entity()
        );

        relation.match_models(name, models, query)
    }
}
