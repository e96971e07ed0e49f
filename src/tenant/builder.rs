//! # Tenant Query Builder
//!
//! Caller-facing facade over a scoped [`QueryBuilder`].
//!
//! ## Nesting policy
//!
//! Scopes write into the top-level WHERE group when the facade is created.
//! Caller predicates never do: the first predicate call creates a separate
//! *user subtree* (a fresh builder over the same table, with no scopes) and
//! every later predicate call is replayed against that subtree. After each
//! call the subtree's tree is copied by value into its slot in the parent:
//!
//! - with scope predicates present the subtree is one nested group joined
//!   with AND, so `tenant_id = 1` plus `where(foo = 2).or_where(bar = 3)`
//!   compiles to `tenant_id = 1 AND (foo = 2 OR bar = 3)`;
//! - with no scope predicates at all the subtree *is* the top-level group.
//!
//! Bindings are recomputed from the trees after every change.
//!
//! ## Dispatch by name
//!
//! [`TenantQueryBuilder::call`] resolves a method name in this order:
//! builder macros, the entity's local scopes, relation existence calls,
//! then the closed call set in [`crate::query_builder::calls`]. Predicate
//! calls go to the subtree, structural calls to the base query, and
//! terminal calls return a [`CallOutcome`] other than the builder.

use super::entity::Entity;
use super::tenant_scope::TENANT_SCOPE;
use crate::error::{Result, TenantQueryError};
use crate::logging::log_statement;
use crate::query_builder::{
    normalize_method, Connector, Filterable, GroupHandle, Join, QueryBuilder, QueryCall,
    Statement, StructuralCall, TerminalCall, WhereCall,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Handler behind a macro or local scope; its outcome becomes the call's result
pub type CallHandler =
    Arc<dyn Fn(TenantQueryBuilder, &[Value]) -> Result<CallOutcome> + Send + Sync>;

/// Result of a name-dispatched call
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Builder(TenantQueryBuilder),
    Statement(Statement),
    Sql(String),
    Bindings(Vec<Value>),
}

impl CallOutcome {
    pub fn into_builder(self) -> Result<TenantQueryBuilder> {
        match self {
            CallOutcome::Builder(builder) => Ok(builder),
            other => Err(other.mismatch("into_builder")),
        }
    }

    pub fn into_statement(self) -> Result<Statement> {
        match self {
            CallOutcome::Statement(statement) => Ok(statement),
            other => Err(other.mismatch("into_statement")),
        }
    }

    /// SQL text of a `to_sql` result or of any compiled statement
    pub fn into_sql(self) -> Result<String> {
        match self {
            CallOutcome::Sql(sql) => Ok(sql),
            CallOutcome::Statement(statement) => Ok(statement.sql),
            other => Err(other.mismatch("into_sql")),
        }
    }

    pub fn into_bindings(self) -> Result<Vec<Value>> {
        match self {
            CallOutcome::Bindings(bindings) => Ok(bindings),
            CallOutcome::Statement(statement) => Ok(statement.bindings),
            other => Err(other.mismatch("into_bindings")),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CallOutcome::Builder(_) => "a builder",
            CallOutcome::Statement(_) => "a statement",
            CallOutcome::Sql(_) => "SQL text",
            CallOutcome::Bindings(_) => "bindings",
        }
    }

    fn mismatch(&self, method: &str) -> TenantQueryError {
        TenantQueryError::invalid_arguments(method, format!("call returned {}", self.kind()))
    }
}

/// Where the user subtree lives in the top-level group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubtreeSlot {
    /// The subtree is the whole top-level group
    Spliced,
    Nested(GroupHandle),
}

#[derive(Debug, Clone)]
struct NestedWhere {
    query: QueryBuilder,
    slot: SubtreeSlot,
}

#[derive(Clone)]
pub struct TenantQueryBuilder {
    query: QueryBuilder,
    entity: Option<Arc<dyn Entity>>,
    nested: Option<NestedWhere>,
    macros: HashMap<String, CallHandler>,
    excluded_scopes: Vec<String>,
    applied_scopes: Vec<String>,
}

impl TenantQueryBuilder {
    /// Wrap a base query; no entity is bound until [`TenantQueryBuilder::set_model`]
    pub fn new(query: QueryBuilder) -> Self {
        Self {
            query,
            entity: None,
            nested: None,
            macros: HashMap::new(),
            excluded_scopes: Vec::new(),
            applied_scopes: Vec::new(),
        }
    }

    /// Bind the entity and install the macros its scopes provide
    pub fn set_model(mut self, entity: Arc<dyn Entity>) -> Self {
        for scope in entity.registry().scopes_for(entity.as_ref()) {
            for (name, handler) in scope.macros() {
                self.macros.entry(normalize_method(&name)).or_insert(handler);
            }
        }
        self.entity = Some(entity);
        self
    }

    /// New query with every registered scope applied
    pub fn new_query(entity: Arc<dyn Entity>) -> Result<Self> {
        let base = entity.new_base_query();
        Self::scoped(base, entity, Vec::new())
    }

    /// New query with every scope except `scope` applied
    pub fn new_query_without_scope(entity: Arc<dyn Entity>, scope: &str) -> Result<Self> {
        let base = entity.new_base_query();
        Self::scoped(base, entity, vec![scope.to_string()])
    }

    /// New query across all tenants; other scopes stay in place
    pub fn all_tenants(entity: Arc<dyn Entity>) -> Result<Self> {
        Self::new_query_without_scope(entity, TENANT_SCOPE)
    }

    /// New query with no scopes applied
    pub fn all_unscoped(entity: Arc<dyn Entity>) -> Result<Self> {
        let excluded = entity.registry().scope_names(entity.as_ref());
        let base = entity.new_base_query();
        Self::scoped(base, entity, excluded)
    }

    /// Apply the entity's scopes, minus `excluded`, to an explicit base query
    pub(crate) fn scoped(
        mut query: QueryBuilder,
        entity: Arc<dyn Entity>,
        excluded: Vec<String>,
    ) -> Result<Self> {
        let applied = entity
            .registry()
            .apply_except(&mut query, entity.as_ref(), &excluded)?;
        debug!(
            entity = %entity.entity_name(),
            applied = ?applied,
            excluded = ?excluded,
            "Scoped query created"
        );

        let mut builder = Self::new(query).set_model(entity);
        builder.excluded_scopes = excluded;
        builder.applied_scopes = applied;
        Ok(builder)
    }

    pub fn entity(&self) -> Result<&Arc<dyn Entity>> {
        self.entity.as_ref().ok_or(TenantQueryError::MissingEntity)
    }

    fn entity_label(&self) -> &str {
        self.entity
            .as_deref()
            .map_or("<unbound>", |entity| entity.entity_name())
    }

    pub fn base_query(&self) -> &QueryBuilder {
        &self.query
    }

    pub fn into_base_query(self) -> QueryBuilder {
        self.query
    }

    /// The user subtree, once a predicate call created it
    pub fn nested_query(&self) -> Option<&QueryBuilder> {
        self.nested.as_ref().map(|nested| &nested.query)
    }

    pub fn applied_scopes(&self) -> &[String] {
        &self.applied_scopes
    }

    pub fn excluded_scopes(&self) -> &[String] {
        &self.excluded_scopes
    }

    pub fn is_scoped(&self, scope: &str) -> bool {
        self.applied_scopes.iter().any(|name| name == scope)
    }

    // Scope toggles

    /// Drop one scope, rebuilding the scope predicates from scratch
    pub fn without_scope(mut self, scope: &str) -> Result<Self> {
        if self.excluded_scopes.iter().any(|name| name == scope) {
            return Ok(self);
        }
        self.excluded_scopes.push(scope.to_string());
        debug!(entity = %self.entity_label(), scope = %scope, "Scope excluded");
        self.rebuild()
    }

    pub fn without_scopes(mut self) -> Result<Self> {
        let entity = Arc::clone(self.entity()?);
        self.excluded_scopes = entity.registry().scope_names(entity.as_ref());
        self.rebuild()
    }

    /// Re-enable a previously excluded scope
    pub fn with_scope(mut self, scope: &str) -> Result<Self> {
        let before = self.excluded_scopes.len();
        self.excluded_scopes.retain(|name| name != scope);
        if self.excluded_scopes.len() == before {
            return Ok(self);
        }
        debug!(entity = %self.entity_label(), scope = %scope, "Scope restored");
        self.rebuild()
    }

    /// Re-apply scopes over an empty top level and re-attach the user subtree
    fn rebuild(mut self) -> Result<Self> {
        let entity = Arc::clone(self.entity()?);
        self.query.reset_wheres();
        self.applied_scopes = entity.registry().apply_except(
            &mut self.query,
            entity.as_ref(),
            &self.excluded_scopes,
        )?;
        if let Some(nested) = self.nested.as_mut() {
            nested.slot = attach_subtree(&mut self.query, &nested.query);
        }
        Ok(self)
    }

    // Nesting

    fn add_to_nested_query(mut self, call: WhereCall) -> Self {
        match self.nested.take() {
            Some(mut nested) => {
                nested.query = call.apply(nested.query);
                self.sync_subtree(&nested);
                self.nested = Some(nested);
            }
            None => {
                let subtree = call.apply(self.query.for_nested_where());
                if subtree.wheres().is_empty() {
                    return self;
                }
                let slot = attach_subtree(&mut self.query, &subtree);
                debug!(entity = %self.entity_label(), slot = ?slot, "User subtree created");
                self.nested = Some(NestedWhere {
                    query: subtree,
                    slot,
                });
            }
        }
        self
    }

    /// Copy the subtree into its slot by value
    fn sync_subtree(&mut self, nested: &NestedWhere) {
        match nested.slot {
            SubtreeSlot::Spliced => self.query.set_wheres(nested.query.wheres().clone()),
            SubtreeSlot::Nested(handle) => {
                // The handle was issued by this builder's own tree and members are
                // never removed while a subtree is attached.
                if let Err(err) = self.query.replace_nested_where(handle, &nested.query) {
                    panic!("user subtree detached from the top-level group: {err}");
                }
            }
        }
    }

    // Macros and local scopes

    /// Register a per-builder macro; its outcome replaces the call's result
    pub fn macro_<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(TenantQueryBuilder, &[Value]) -> Result<CallOutcome> + Send + Sync + 'static,
    {
        self.macros.insert(normalize_method(name), Arc::new(handler));
        self
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(&normalize_method(name))
    }

    /// Invoke one of the entity's local scopes
    pub fn scope(self, name: &str, args: &[Value]) -> Result<CallOutcome> {
        let entity = Arc::clone(self.entity()?);
        let handler = entity
            .local_scope(&normalize_method(name))
            .ok_or_else(|| TenantQueryError::unsupported(name))?;
        handler(self, args)
    }

    /// Dispatch a call by method name
    pub fn call(self, method: &str, args: &[Value]) -> Result<CallOutcome> {
        let entity = Arc::clone(self.entity()?);
        let key = normalize_method(method);

        if let Some(handler) = self.macros.get(&key).cloned() {
            debug!(entity = %entity.entity_name(), method = %method, "Dispatching macro");
            return handler(self, args);
        }
        if let Some(handler) = entity.local_scope(&key) {
            debug!(entity = %entity.entity_name(), method = %method, "Dispatching local scope");
            return handler(self, args);
        }

        let relation = match key.as_str() {
            "has" | "wherehas" => Some((Connector::And, false)),
            "orwherehas" => Some((Connector::Or, false)),
            "wheredoesnthave" => Some((Connector::And, true)),
            "orwheredoesnthave" => Some((Connector::Or, true)),
            _ => None,
        };
        if let Some((connector, negated)) = relation {
            let name = match args.first() {
                Some(Value::String(name)) => name.clone(),
                _ => {
                    return Err(TenantQueryError::invalid_arguments(
                        method,
                        "first argument must name a relation",
                    ))
                }
            };
            return self
                .relation_exists(&name, |q| q, connector, negated)
                .map(CallOutcome::Builder);
        }

        match QueryCall::parse(method, args)? {
            Some(QueryCall::Where(call)) => Ok(CallOutcome::Builder(self.add_to_nested_query(call))),
            Some(QueryCall::Structural(call)) => Ok(CallOutcome::Builder(self.apply_structural(call))),
            Some(QueryCall::Terminal(call)) => self.terminal(call),
            None => Err(TenantQueryError::unsupported(method)),
        }
    }

    // Structural pass-through

    fn apply_structural(mut self, call: StructuralCall) -> Self {
        self.query = call.apply(self.query);
        self
    }

    pub fn select(self, columns: &[&str]) -> Self {
        self.apply_structural(StructuralCall::Select(to_strings(columns)))
    }

    pub fn add_select(self, columns: &[&str]) -> Self {
        self.apply_structural(StructuralCall::AddSelect(to_strings(columns)))
    }

    pub fn distinct(self) -> Self {
        self.apply_structural(StructuralCall::Distinct)
    }

    pub fn join(self, join: Join) -> Self {
        self.apply_structural(StructuralCall::Join(join))
    }

    pub fn inner_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join(Join::inner(table, first, operator, second))
    }

    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join(Join::left(table, first, operator, second))
    }

    pub fn order_by(self, column: &str, direction: &str) -> Self {
        self.apply_structural(StructuralCall::OrderBy {
            column: column.to_string(),
            direction: direction.to_string(),
        })
    }

    pub fn group_by(self, columns: &[&str]) -> Self {
        self.apply_structural(StructuralCall::GroupBy(to_strings(columns)))
    }

    pub fn having(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.apply_structural(StructuralCall::Having {
            column: column.to_string(),
            operator: operator.to_string(),
            value: value.into(),
            connector: Connector::And,
        })
    }

    pub fn limit(self, limit: u64) -> Self {
        self.apply_structural(StructuralCall::Limit(limit))
    }

    pub fn offset(self, offset: u64) -> Self {
        self.apply_structural(StructuralCall::Offset(offset))
    }

    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        self.apply_structural(StructuralCall::ForPage { page, per_page })
    }

    // Relations

    /// Require at least one related row
    pub fn has(self, relation: &str) -> Result<Self> {
        self.relation_exists(relation, |q| q, Connector::And, false)
    }

    /// Require a related row matching `constraint`
    pub fn where_has<F>(self, relation: &str, constraint: F) -> Result<Self>
    where
        F: FnOnce(TenantQueryBuilder) -> TenantQueryBuilder,
    {
        self.relation_exists(relation, constraint, Connector::And, false)
    }

    pub fn or_where_has<F>(self, relation: &str, constraint: F) -> Result<Self>
    where
        F: FnOnce(TenantQueryBuilder) -> TenantQueryBuilder,
    {
        self.relation_exists(relation, constraint, Connector::Or, false)
    }

    /// Require that no related row matches `constraint`
    pub fn where_doesnt_have<F>(self, relation: &str, constraint: F) -> Result<Self>
    where
        F: FnOnce(TenantQueryBuilder) -> TenantQueryBuilder,
    {
        self.relation_exists(relation, constraint, Connector::And, true)
    }

    fn relation_exists<F>(
        self,
        name: &str,
        constraint: F,
        connector: Connector,
        negated: bool,
    ) -> Result<Self>
    where
        F: FnOnce(TenantQueryBuilder) -> TenantQueryBuilder,
    {
        let entity = Arc::clone(self.entity()?);
        let relation = entity
            .relation(name)
            .ok_or_else(|| TenantQueryError::RelationNotFound {
                entity: entity.entity_name().to_string(),
                relation: name.to_string(),
            })?;

        let query = relation.existence_query(&self.query, constraint)?;
        debug!(
            entity = %entity.entity_name(),
            relation = %name,
            related = %relation.related().entity_name(),
            negated,
            "Relation existence merged"
        );
        Ok(self.add_to_nested_query(WhereCall::Exists {
            query,
            connector,
            negated,
        }))
    }

    // Keys and terminals

    /// Filter by primary key; an array id becomes an IN list
    pub fn where_key(self, id: impl Into<Value>) -> Result<Self> {
        let entity = Arc::clone(self.entity()?);
        let column = format!("{}.{}", self.query.qualifier(), entity.key_name());
        Ok(match id.into() {
            Value::Array(ids) => self.where_in(&column, ids),
            id => self.where_(&column, "=", id),
        })
    }

    pub fn to_statement(&self) -> Statement {
        self.query.to_statement()
    }

    pub fn to_sql(&self) -> String {
        self.query.to_sql()
    }

    pub fn get_bindings(&self) -> Vec<Value> {
        self.query.get_bindings()
    }

    pub fn first_statement(&self) -> Statement {
        self.query.clone().limit(1).to_statement()
    }

    pub fn find_statement(&self, id: impl Into<Value>) -> Result<Statement> {
        Ok(self.clone().where_key(id)?.first_statement())
    }

    pub fn count_statement(&self) -> Statement {
        self.query.count_statement()
    }

    pub fn exists_statement(&self) -> Statement {
        self.query.exists_statement()
    }

    /// INSERT after every active scope's before-create hook ran
    pub fn insert_statement(&self, mut attributes: Map<String, Value>) -> Result<Statement> {
        let entity = self.entity()?;
        entity.registry().creating(entity.as_ref(), &mut attributes);
        Ok(self.query.insert_statement(&attributes))
    }

    pub fn update_statement(&self, values: &Map<String, Value>) -> Statement {
        self.query.update_statement(values)
    }

    /// DELETE, or an UPDATE stamping the soft-delete column when the entity has one
    pub fn delete_statement(&self) -> Result<Statement> {
        let entity = self.entity()?;
        Ok(match entity.soft_delete_column() {
            Some(column) => self.query.timestamp_update_statement(&column, Utc::now()),
            None => self.query.delete_statement(),
        })
    }

    fn terminal(self, call: TerminalCall) -> Result<CallOutcome> {
        let operation = call.name();
        let statement = match call {
            TerminalCall::ToSql => return Ok(CallOutcome::Sql(self.to_sql())),
            TerminalCall::GetBindings => return Ok(CallOutcome::Bindings(self.get_bindings())),
            TerminalCall::Get => self.to_statement(),
            TerminalCall::First => self.first_statement(),
            TerminalCall::Find(id) => self.find_statement(id)?,
            TerminalCall::Count => self.count_statement(),
            TerminalCall::Exists => self.exists_statement(),
            TerminalCall::Insert(attributes) => self.insert_statement(attributes)?,
            TerminalCall::Update(values) => self.update_statement(&values),
            TerminalCall::Delete => self.delete_statement()?,
        };
        log_statement(operation, Some(self.entity_label()), &statement);
        Ok(CallOutcome::Statement(statement))
    }

    /// Not-found error for `id`, tenant-specific when tenant scoping was active
    pub fn not_found_error(&self, id: &Value) -> TenantQueryError {
        let entity = self.entity_label().to_string();
        let id = match id {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        if self.is_scoped(TENANT_SCOPE) {
            TenantQueryError::TenantModelNotFound { entity, id }
        } else {
            TenantQueryError::ModelNotFound { entity, id }
        }
    }
}

impl Filterable for TenantQueryBuilder {
    fn route_where(self, call: WhereCall) -> Self {
        self.add_to_nested_query(call)
    }

    fn nested_builder(&self) -> QueryBuilder {
        self.query.for_nested_where()
    }
}

impl fmt::Debug for TenantQueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut macros: Vec<&String> = self.macros.keys().collect();
        macros.sort();
        f.debug_struct("TenantQueryBuilder")
            .field("entity", &self.entity_label())
            .field("query", &self.query)
            .field("nested", &self.nested)
            .field("macros", &macros)
            .field("applied_scopes", &self.applied_scopes)
            .field("excluded_scopes", &self.excluded_scopes)
            .finish()
    }
}

/// Put the subtree into the top level: spliced when nothing else is there
fn attach_subtree(query: &mut QueryBuilder, subtree: &QueryBuilder) -> SubtreeSlot {
    if query.wheres().is_empty() {
        query.set_wheres(subtree.wheres().clone());
        SubtreeSlot::Spliced
    } else {
        SubtreeSlot::Nested(query.add_nested_where_query(subtree, Connector::And))
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
