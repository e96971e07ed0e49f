//! # Entity Capabilities
//!
//! What the scoping layer needs to know about a queried entity type. Every
//! method except [`Entity::table`] has a default, so a plain table-backed
//! entity only names its table and lists its global scopes.

use super::builder::CallHandler;
use super::registry::ScopeRegistry;
use super::relation::Relation;
use super::scope::Scope;
use crate::config::TenantQueryConfig;
use crate::query_builder::QueryBuilder;
use std::sync::Arc;

pub trait Entity: Send + Sync + 'static {
    /// Primary table name
    fn table(&self) -> &str;

    /// Registry key and the name used in not-found errors
    fn entity_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn key_name(&self) -> &str {
        "id"
    }

    /// Columns the tenant scope filters on
    fn tenant_columns(&self) -> Vec<String> {
        TenantQueryConfig::global().default_tenant_columns.clone()
    }

    /// Timestamp column for soft deletes; `None` disables them
    fn soft_delete_column(&self) -> Option<String> {
        None
    }

    /// Scopes registered for this entity type when it first boots, in order
    fn global_scopes(&self) -> Vec<Arc<dyn Scope>> {
        Vec::new()
    }

    fn relation(&self, _name: &str) -> Option<Relation> {
        None
    }

    /// Named local scope, looked up by normalized method name (`active`, `ofkind`)
    fn local_scope(&self, _name: &str) -> Option<CallHandler> {
        None
    }

    fn registry(&self) -> &'static ScopeRegistry {
        ScopeRegistry::global()
    }

    /// Unscoped base query over this entity's table
    fn new_base_query(&self) -> QueryBuilder {
        QueryBuilder::new(self.table())
    }
}
