//! Shared fixtures for the integration tests.
//!
//! Every [`TestEntity`] gets a unique entity name and its own leaked scope
//! registry, so tests can boot, register and suspend scopes in parallel
//! without seeing each other.

#![allow(dead_code)]

pub mod strategies;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tenant_query::prelude::*;
use tenant_query::query_builder::{normalize_method, Grammar};
use tenant_query::tenant::CallHandler;

static NEXT_ENTITY: AtomicUsize = AtomicUsize::new(0);

pub struct TestEntity {
    name: String,
    table: String,
    scopes: Vec<Arc<dyn Scope>>,
    soft_deletes: bool,
    relations: HashMap<String, Relation>,
    local_scopes: HashMap<String, CallHandler>,
    registry: &'static ScopeRegistry,
}

impl TestEntity {
    pub fn new(table: &str) -> Self {
        let id = NEXT_ENTITY.fetch_add(1, Ordering::Relaxed);
        Self {
            name: format!("{table}#{id}"),
            table: table.to_string(),
            scopes: Vec::new(),
            soft_deletes: false,
            relations: HashMap::new(),
            local_scopes: HashMap::new(),
            registry: Box::leak(Box::new(ScopeRegistry::new())),
        }
    }

    pub fn with_scope(mut self, scope: Arc<dyn Scope>) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn with_tenants(self, tenants: &Arc<TenantScope>) -> Self {
        self.with_scope(Arc::clone(tenants) as Arc<dyn Scope>)
    }

    pub fn with_soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self
    }

    pub fn with_relation(mut self, name: &str, relation: Relation) -> Self {
        self.relations.insert(name.to_string(), relation);
        self
    }

    pub fn with_local_scope<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(TenantQueryBuilder, &[Value]) -> Result<CallOutcome> + Send + Sync + 'static,
    {
        self.local_scopes
            .insert(normalize_method(name), Arc::new(handler));
        self
    }

    pub fn into_arc(self) -> Arc<dyn Entity> {
        Arc::new(self)
    }
}

impl Entity for TestEntity {
    fn table(&self) -> &str {
        &self.table
    }

    fn entity_name(&self) -> &str {
        &self.name
    }

    fn tenant_columns(&self) -> Vec<String> {
        vec!["tenant_id".to_string()]
    }

    fn soft_delete_column(&self) -> Option<String> {
        self.soft_deletes.then(|| "deleted_at".to_string())
    }

    fn global_scopes(&self) -> Vec<Arc<dyn Scope>> {
        self.scopes.clone()
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        self.relations.get(name).cloned()
    }

    fn local_scope(&self, name: &str) -> Option<CallHandler> {
        self.local_scopes.get(name).cloned()
    }

    fn registry(&self) -> &'static ScopeRegistry {
        self.registry
    }
}

/// Tenant scope with `tenant_id = 1`, bound as a parameter
pub fn tenant_one() -> Arc<TenantScope> {
    let tenants = Arc::new(TenantScope::new());
    tenants.add_tenant("tenant_id", 1);
    tenants
}

/// Tenant scope with `tenant_id = 1`, written as a literal clause
pub fn raw_tenant_one() -> Arc<TenantScope> {
    let tenants = Arc::new(TenantScope::new().with_raw_clauses());
    tenants.add_tenant("tenant_id", 1);
    tenants
}

/// SELECT text with `?` placeholders
pub fn question_sql(query: &TenantQueryBuilder) -> String {
    Grammar::new(PlaceholderStyle::Question)
        .compile_select(query.base_query())
        .sql
}

/// SELECT text with `$n` placeholders
pub fn dollar_sql(query: &TenantQueryBuilder) -> String {
    Grammar::new(PlaceholderStyle::Dollar)
        .compile_select(query.base_query())
        .sql
}
