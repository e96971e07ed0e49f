//! # Relation Merge
//!
//! Builds the correlated sub-query behind `where_has`-style predicates.
//!
//! The sub-query itself carries no scopes. The related entity's own scoped
//! query (its scopes plus the relation's intrinsic constraints) is merged in
//! as one nested group, with the bindings travelling along inside the tree.
//! The outer query only ever sees a single EXISTS leaf, which the facade
//! routes into the user subtree, so its own scope group is untouched.

use super::builder::TenantQueryBuilder;
use super::entity::Entity;
use crate::error::Result;
use crate::query_builder::{Connector, Filterable, QueryBuilder};
use std::fmt;
use std::sync::Arc;

/// Constraint applied to the related facade whenever the relation is queried
pub type RelationConstraint = Arc<dyn Fn(TenantQueryBuilder) -> TenantQueryBuilder + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// `related.foreign_key = parent.local_key`
    HasMany { foreign_key: String, local_key: String },
    HasOne { foreign_key: String, local_key: String },
    /// `related.owner_key = parent.foreign_key`
    BelongsTo { foreign_key: String, owner_key: String },
}

#[derive(Clone)]
pub struct Relation {
    related: Arc<dyn Entity>,
    kind: RelationKind,
    constraints: Vec<RelationConstraint>,
}

impl Relation {
    pub fn has_many(related: Arc<dyn Entity>, foreign_key: &str, local_key: &str) -> Self {
        Self::new(
            related,
            RelationKind::HasMany {
                foreign_key: foreign_key.to_string(),
                local_key: local_key.to_string(),
            },
        )
    }

    pub fn has_one(related: Arc<dyn Entity>, foreign_key: &str, local_key: &str) -> Self {
        Self::new(
            related,
            RelationKind::HasOne {
                foreign_key: foreign_key.to_string(),
                local_key: local_key.to_string(),
            },
        )
    }

    pub fn belongs_to(related: Arc<dyn Entity>, foreign_key: &str, owner_key: &str) -> Self {
        Self::new(
            related,
            RelationKind::BelongsTo {
                foreign_key: foreign_key.to_string(),
                owner_key: owner_key.to_string(),
            },
        )
    }

    fn new(related: Arc<dyn Entity>, kind: RelationKind) -> Self {
        Self {
            related,
            kind,
            constraints: Vec::new(),
        }
    }

    /// Add an intrinsic filter, e.g. only `status = 'active'` comments
    pub fn constrain<F>(mut self, constraint: F) -> Self
    where
        F: Fn(TenantQueryBuilder) -> TenantQueryBuilder + Send + Sync + 'static,
    {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn related(&self) -> &Arc<dyn Entity> {
        &self.related
    }

    pub fn kind(&self) -> &RelationKind {
        &self.kind
    }

    /// Correlated sub-query selecting related rows of `parent`
    ///
    /// `constraint` runs against an unscoped facade over the related table;
    /// the related entity's scopes come back in through the merged relation
    /// query instead.
    pub fn existence_query<F>(&self, parent: &QueryBuilder, constraint: F) -> Result<QueryBuilder>
    where
        F: FnOnce(TenantQueryBuilder) -> TenantQueryBuilder,
    {
        let related = Arc::clone(&self.related);
        let table = related.table().to_string();
        let base = if table == parent.table() {
            related
                .new_base_query()
                .from_as(&table, &format!("{table}_related"))
        } else {
            related.new_base_query()
        };

        let scoped = TenantQueryBuilder::scoped(base.clone(), Arc::clone(&related), Vec::new())?;
        let relation_query = self
            .constraints
            .iter()
            .fold(scoped, |query, apply| apply(query))
            .into_base_query();

        let excluded = related.registry().scope_names(related.as_ref());
        let unscoped = TenantQueryBuilder::scoped(base.clone(), Arc::clone(&related), excluded)?;
        let constrained = constraint(unscoped).into_base_query();

        let (first, second) = self.correlation(base.qualifier(), parent.qualifier());
        let mut has = base.where_column(&first, "=", &second);
        has.merge_joins(constrained.joins());
        if !constrained.wheres().is_empty() {
            has.add_nested_where_query(&constrained, Connector::And);
        }
        merge_into(&mut has, &relation_query);
        Ok(has)
    }

    fn correlation(&self, related: &str, parent: &str) -> (String, String) {
        match &self.kind {
            RelationKind::HasMany {
                foreign_key,
                local_key,
            }
            | RelationKind::HasOne {
                foreign_key,
                local_key,
            } => (
                format!("{related}.{foreign_key}"),
                format!("{parent}.{local_key}"),
            ),
            RelationKind::BelongsTo {
                foreign_key,
                owner_key,
            } => (
                format!("{related}.{owner_key}"),
                format!("{parent}.{foreign_key}"),
            ),
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("related", &self.related.entity_name())
            .field("kind", &self.kind)
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

/// Copy a relation query's joins and predicates into `target` as one nested group
pub fn merge_into(target: &mut QueryBuilder, relation_query: &QueryBuilder) {
    target.merge_joins(relation_query.joins());
    if !relation_query.wheres().is_empty() {
        target.add_nested_where_query(relation_query, Connector::And);
    }
}
