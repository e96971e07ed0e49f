//! # Scope Registry
//!
//! Process-wide, per-entity-type ordered scope lists. Entity types boot
//! lazily on first use; after that the registry is read-mostly.
//!
//! ## Suspension
//!
//! [`ScopeRegistry::suspend`] disables a scope by name for every entity
//! until the returned guard drops. Guards nest and are released on every
//! exit path, including `?` returns and unwinding panics.
//!
//! ```rust,ignore
//! let registry = ScopeRegistry::global();
//! let query = {
//!     let _suspended = registry.suspend(TENANT_SCOPE);
//!     TenantQueryBuilder::new_query(entity)?
//! };
//! ```

use super::entity::Entity;
use super::scope::Scope;
use super::soft_delete::SoftDeletingScope;
use crate::error::Result;
use crate::query_builder::{Connector, QueryBuilder};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

static GLOBAL_REGISTRY: OnceLock<ScopeRegistry> = OnceLock::new();

#[derive(Debug, Default)]
pub struct ScopeRegistry {
    scopes: RwLock<HashMap<String, Vec<Arc<dyn Scope>>>>,
    booted: RwLock<HashSet<String>>,
    suspended: Mutex<HashMap<String, usize>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every entity that does not supply its own
    pub fn global() -> &'static ScopeRegistry {
        GLOBAL_REGISTRY.get_or_init(ScopeRegistry::new)
    }

    /// Register a scope for an entity type; returns false if the name is taken
    pub fn register(&self, entity_name: &str, scope: Arc<dyn Scope>) -> bool {
        let mut scopes = self.scopes.write();
        let entry = scopes.entry(entity_name.to_string()).or_default();
        if entry.iter().any(|existing| existing.name() == scope.name()) {
            return false;
        }
        info!(entity = %entity_name, scope = %scope.name(), "Scope registered");
        entry.push(scope);
        true
    }

    /// Register the entity's declared scopes, then soft deletes, once per type
    pub fn boot(&self, entity: &dyn Entity) {
        let name = entity.entity_name();
        if self.booted.read().contains(name) {
            return;
        }

        let mut booted = self.booted.write();
        if !booted.insert(name.to_string()) {
            return;
        }
        for scope in entity.global_scopes() {
            self.register(name, scope);
        }
        if entity.soft_delete_column().is_some() {
            self.register(name, Arc::new(SoftDeletingScope));
        }
        debug!(entity = %name, "Entity booted");
    }

    /// Scopes for an entity in registration order
    pub fn scopes_for(&self, entity: &dyn Entity) -> Vec<Arc<dyn Scope>> {
        self.boot(entity);
        self.scopes
            .read()
            .get(entity.entity_name())
            .cloned()
            .unwrap_or_default()
    }

    pub fn scope_names(&self, entity: &dyn Entity) -> Vec<String> {
        self.scopes_for(entity)
            .iter()
            .map(|scope| scope.name().to_string())
            .collect()
    }

    pub fn find(&self, entity: &dyn Entity, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes_for(entity)
            .into_iter()
            .find(|scope| scope.name() == name)
    }

    /// Apply every registered scope in order
    pub fn apply_all(&self, query: &mut QueryBuilder, entity: &dyn Entity) -> Result<Vec<String>> {
        self.apply_except(query, entity, &[])
    }

    /// Apply every registered scope not excluded or suspended, in order
    ///
    /// Returns the names of the scopes that were applied.
    pub fn apply_except(
        &self,
        query: &mut QueryBuilder,
        entity: &dyn Entity,
        excluded: &[String],
    ) -> Result<Vec<String>> {
        let mut applied = Vec::new();
        for scope in self.scopes_for(entity) {
            let name = scope.name();
            if excluded.iter().any(|excluded| excluded == name) {
                continue;
            }
            if self.is_suspended(name) {
                debug!(entity = %entity.entity_name(), scope = %name, "Scope suspended, skipping");
                continue;
            }
            apply_scope(query, scope.as_ref(), entity)?;
            applied.push(name.to_string());
        }
        Ok(applied)
    }

    /// Fresh query with every scope but `name` applied
    ///
    /// Built from scratch rather than subtracted from an existing tree; the
    /// skipped scope still gets its `remove` hook on the result.
    pub fn remove_one(&self, entity: &dyn Entity, name: &str) -> Result<QueryBuilder> {
        let mut query = entity.new_base_query();
        self.apply_except(&mut query, entity, &[name.to_string()])?;
        if let Some(scope) = self.find(entity, name) {
            scope.remove(&mut query, entity);
        }
        debug!(entity = %entity.entity_name(), scope = %name, "Scope removed");
        Ok(query)
    }

    /// Disable a scope process-wide until the guard drops
    pub fn suspend(&self, name: &str) -> ScopeSuspension<'_> {
        *self.suspended.lock().entry(name.to_string()).or_insert(0) += 1;
        debug!(scope = %name, "Scope suspended");
        ScopeSuspension {
            registry: self,
            name: name.to_string(),
        }
    }

    /// Run `f` with a scope suspended
    pub fn with_scope_suspended<T, F>(&self, name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _suspension = self.suspend(name);
        f()
    }

    pub fn is_suspended(&self, name: &str) -> bool {
        self.suspended.lock().get(name).is_some_and(|count| *count > 0)
    }

    /// Run every scope's before-create hook over new attributes
    pub fn creating(&self, entity: &dyn Entity, attributes: &mut Map<String, Value>) {
        for scope in self.scopes_for(entity) {
            if !self.is_suspended(scope.name()) {
                scope.creating(entity, attributes);
            }
        }
    }

    fn release(&self, name: &str) {
        let mut suspended = self.suspended.lock();
        if let Some(count) = suspended.get_mut(name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                suspended.remove(name);
            }
        }
        debug!(scope = %name, "Scope suspension released");
    }
}

/// Apply one scope and regroup what it appended
fn apply_scope(query: &mut QueryBuilder, scope: &dyn Scope, entity: &dyn Entity) -> Result<()> {
    let before = query.wheres().members().len();
    let mut scoped = scope.apply(query.clone(), entity);

    let mut wheres = scoped.wheres().clone();
    let added = wheres.split_off(before)?;
    if !added.is_empty() {
        if scope.is_inline() && added.is_conjunction() {
            wheres.extend_conjunction(added)?;
        } else {
            wheres.append_group(added, Connector::And);
        }
    }
    scoped.set_wheres(wheres);
    *query = scoped;
    Ok(())
}

/// Guard returned by [`ScopeRegistry::suspend`]
#[derive(Debug)]
#[must_use = "the scope is re-enabled as soon as the guard drops"]
pub struct ScopeSuspension<'a> {
    registry: &'a ScopeRegistry,
    name: String,
}

impl ScopeSuspension<'_> {
    pub fn scope_name(&self) -> &str {
        &self.name
    }
}

impl Drop for ScopeSuspension<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::{Filterable, Grammar, PlaceholderStyle};
    use crate::tenant::scope::ClosureScope;

    struct Widgets;

    impl Entity for Widgets {
        fn table(&self) -> &str {
            "widgets"
        }
    }

    fn sql(query: &QueryBuilder) -> String {
        Grammar::new(PlaceholderStyle::Question).compile_select(query).sql
    }

    #[test]
    fn test_register_is_idempotent_by_name() {
        let registry = ScopeRegistry::new();
        let name = Widgets.entity_name().to_string();
        let scope = Arc::new(ClosureScope::new("active", |q, _| q.where_("active", "=", true)));
        assert!(registry.register(&name, scope.clone()));
        assert!(!registry.register(&name, scope));
        assert_eq!(registry.scope_names(&Widgets), vec!["active"]);
    }

    #[test]
    fn test_disjunctive_scope_is_grouped() {
        let registry = ScopeRegistry::new();
        let name = Widgets.entity_name().to_string();
        registry.register(&name, Arc::new(ClosureScope::new("first", |q, _| q.where_("a", "=", 1))));
        registry.register(
            &name,
            Arc::new(ClosureScope::new("either", |q, _| {
                q.where_("b", "<>", 1).or_where("c", "=", 2)
            })),
        );

        let mut query = Widgets.new_base_query();
        let applied = registry.apply_all(&mut query, &Widgets).unwrap();
        assert_eq!(applied, vec!["first", "either"]);
        assert_eq!(sql(&query), "SELECT * FROM widgets WHERE a = ? AND (b <> ? OR c = ?)");
    }

    #[test]
    fn test_suspension_nests_and_releases() {
        let registry = ScopeRegistry::new();
        {
            let _outer = registry.suspend("tenant");
            {
                let _inner = registry.suspend("tenant");
                assert!(registry.is_suspended("tenant"));
            }
            assert!(registry.is_suspended("tenant"));
        }
        assert!(!registry.is_suspended("tenant"));
    }
}
