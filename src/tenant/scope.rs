//! # Scopes
//!
//! A scope contributes predicates to every query against an entity type and
//! can be stripped again for escape-hatch queries.
//!
//! Scopes write through the plain [`QueryBuilder`], never through the tenant
//! facade, so their predicates land directly in the top-level group. The
//! registry then regroups whatever a scope appended: inline scopes whose
//! additions are pure AND-chains are flattened into the top level, every
//! other scope's additions become one nested group. A scope that uses OR can
//! therefore never change how its neighbours bind.

use super::builder::CallHandler;
use super::entity::Entity;
use crate::query_builder::QueryBuilder;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub trait Scope: Send + Sync {
    /// Unique name within an entity type
    fn name(&self) -> &str;

    /// Append this scope's predicates and structural clauses
    fn apply(&self, query: QueryBuilder, entity: &dyn Entity) -> QueryBuilder;

    /// Strip what `apply` added from an already-built query
    fn remove(&self, _query: &mut QueryBuilder, _entity: &dyn Entity) {}

    /// Whether AND-only additions may be flattened into the top level
    fn is_inline(&self) -> bool {
        false
    }

    /// Before-create hook over the attributes of a new row
    fn creating(&self, _entity: &dyn Entity, _attributes: &mut Map<String, Value>) {}

    /// Builder macros this scope installs on every facade of the entity
    fn macros(&self) -> Vec<(String, CallHandler)> {
        Vec::new()
    }
}

impl fmt::Debug for dyn Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name())
            .field("inline", &self.is_inline())
            .finish()
    }
}

type ScopeFn = dyn Fn(QueryBuilder, &dyn Entity) -> QueryBuilder + Send + Sync;

/// Anonymous scope backed by a closure
#[derive(Clone)]
pub struct ClosureScope {
    name: String,
    apply: Arc<ScopeFn>,
}

impl ClosureScope {
    pub fn new<F>(name: &str, apply: F) -> Self
    where
        F: Fn(QueryBuilder, &dyn Entity) -> QueryBuilder + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            apply: Arc::new(apply),
        }
    }
}

impl fmt::Debug for ClosureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureScope")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Scope for ClosureScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, query: QueryBuilder, entity: &dyn Entity) -> QueryBuilder {
        (self.apply)(query, entity)
    }
}
