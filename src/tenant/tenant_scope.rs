//! # Tenant Scope
//!
//! Restricts every query to the current tenant(s), one equality per tenant
//! column the entity declares, and stamps tenant ids onto new rows.

use super::entity::Entity;
use super::scope::Scope;
use crate::query_builder::{Condition, Filterable, QueryBuilder};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Registry name of the tenant scope
pub const TENANT_SCOPE: &str = "tenant";

#[derive(Debug, Default)]
pub struct TenantScope {
    tenants: RwLock<BTreeMap<String, Value>>,
    raw_clauses: bool,
}

impl TenantScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `table.column = 'id'` literals instead of bound parameters
    pub fn with_raw_clauses(mut self) -> Self {
        self.raw_clauses = true;
        self
    }

    /// Set the current tenant id for a column
    pub fn add_tenant(&self, column: &str, id: impl Into<Value>) {
        let id = id.into();
        debug!(column = %column, tenant = %id, "Tenant added");
        self.tenants.write().insert(column.to_string(), id);
    }

    pub fn remove_tenant(&self, column: &str) -> Option<Value> {
        self.tenants.write().remove(column)
    }

    pub fn tenant(&self, column: &str) -> Option<Value> {
        self.tenants.read().get(column).cloned()
    }

    pub fn tenants(&self) -> BTreeMap<String, Value> {
        self.tenants.read().clone()
    }

    pub fn has_tenants(&self) -> bool {
        !self.tenants.read().is_empty()
    }

    /// Literal clause for one tenant column; single quotes in the id are doubled
    pub fn tenant_where_clause(table: &str, column: &str, id: &Value) -> String {
        let id = match id {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        format!("{}.{} = '{}'", table, column, id.replace('\'', "''"))
    }

    /// Tenant ids that apply to this entity, in column order
    fn entity_tenants(&self, entity: &dyn Entity) -> Vec<(String, Value)> {
        let tenants = self.tenants.read();
        entity
            .tenant_columns()
            .into_iter()
            .filter_map(|column| tenants.get(&column).cloned().map(|id| (column, id)))
            .collect()
    }
}

impl Scope for TenantScope {
    fn name(&self) -> &str {
        TENANT_SCOPE
    }

    fn apply(&self, query: QueryBuilder, entity: &dyn Entity) -> QueryBuilder {
        let qualifier = query.qualifier().to_string();
        self.entity_tenants(entity)
            .into_iter()
            .fold(query, |query, (column, id)| {
                if self.raw_clauses {
                    let clause = Self::tenant_where_clause(&qualifier, &column, &id);
                    query.where_raw(&clause, Vec::new())
                } else {
                    query.where_(&format!("{qualifier}.{column}"), "=", id)
                }
            })
    }

    fn remove(&self, query: &mut QueryBuilder, entity: &dyn Entity) {
        let qualifier = query.qualifier().to_string();
        let tenants = self.entity_tenants(entity);
        let removed = query.remove_where_leaves(|condition| {
            tenants.iter().any(|(column, id)| match condition {
                Condition::Basic {
                    column: candidate,
                    operator,
                    value,
                } => {
                    *candidate == format!("{qualifier}.{column}") && operator == "=" && value == id
                }
                Condition::Raw { sql, .. } => {
                    *sql == Self::tenant_where_clause(&qualifier, column, id)
                }
                _ => false,
            })
        });
        debug!(entity = %entity.entity_name(), removed, "Tenant predicates removed");
    }

    fn is_inline(&self) -> bool {
        true
    }

    fn creating(&self, entity: &dyn Entity, attributes: &mut Map<String, Value>) {
        for (column, id) in self.entity_tenants(entity) {
            attributes.entry(column).or_insert(id);
        }
    }
}
