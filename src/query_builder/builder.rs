use super::bindings::{BindingSequence, ClauseKind};
use super::calls::WhereCall;
use super::conditions::{Condition, Connector, GroupHandle, PredicateGroup};
use super::filterable::Filterable;
use super::grammar::{Grammar, Statement};
use super::joins::Join;
use super::pagination::Pagination;
use crate::config::TenantQueryConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Base query builder
///
/// Owns the predicate tree for WHERE and HAVING plus the structural clauses
/// (columns, joins, grouping, ordering, paging). Structural setters consume
/// and return `self`; predicate primitives take `&mut self` so the scoping
/// layer can splice groups in place. Bindings are recomputed from the trees
/// after every predicate change and never accumulate on their own.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    alias: Option<String>,
    columns: Vec<String>,
    distinct: bool,
    joins: Vec<Join>,
    wheres: PredicateGroup,
    groups: Vec<String>,
    havings: PredicateGroup,
    orders: Vec<String>,
    pagination: Pagination,
    bindings: BindingSequence,
}

impl QueryBuilder {
    /// Create a new query builder for the given table
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: None,
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            wheres: PredicateGroup::new(),
            groups: Vec::new(),
            havings: PredicateGroup::new(),
            orders: Vec::new(),
            pagination: Pagination::default(),
            bindings: BindingSequence::new(),
        }
    }

    /// Fresh builder over the same FROM target, used for nested groups
    pub fn for_nested_where(&self) -> Self {
        let mut nested = Self::new(&self.table);
        nested.alias = self.alias.clone();
        nested
    }

    /// Switch the FROM target, dropping any alias
    pub fn from(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self.alias = None;
        self
    }

    /// Select from `table AS alias`
    pub fn from_as(mut self, table: &str, alias: &str) -> Self {
        self.table = table.to_string();
        self.alias = Some(alias.to_string());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name columns should be qualified with: the alias if set, else the table
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// FROM clause text
    pub fn from_clause(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.table, alias),
            None => self.table.clone(),
        }
    }

    /// Set specific columns to select
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Append columns to the current selection
    pub fn add_select(mut self, columns: &[&str]) -> Self {
        self.columns.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Use SELECT DISTINCT
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a JOIN clause
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add an INNER JOIN
    pub fn inner_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join(Join::inner(table, first, operator, second))
    }

    /// Add a LEFT JOIN
    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join(Join::left(table, first, operator, second))
    }

    /// Add a RIGHT JOIN
    pub fn right_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join(Join::right(table, first, operator, second))
    }

    /// Add a CROSS JOIN
    pub fn cross_join(self, table: &str) -> Self {
        self.join(Join::cross(table))
    }

    /// Add GROUP BY columns
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.groups.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Add a HAVING condition joined with AND
    pub fn having(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_having(column, operator, value.into(), Connector::And);
        self
    }

    /// Add a HAVING condition joined with OR
    pub fn or_having(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_having(column, operator, value.into(), Connector::Or);
        self
    }

    /// Add ORDER BY clause; the direction is normalized to upper case
    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        self.orders
            .push(format!("{} {}", column, direction.to_ascii_uppercase()));
        self
    }

    /// Add ORDER BY ASC
    pub fn order_asc(self, column: &str) -> Self {
        self.order_by(column, "ASC")
    }

    /// Add ORDER BY DESC
    pub fn order_desc(self, column: &str) -> Self {
        self.order_by(column, "DESC")
    }

    /// Remove all ORDER BY entries
    pub fn without_ordering(mut self) -> Self {
        self.orders.clear();
        self
    }

    /// Add LIMIT clause
    pub fn limit(mut self, limit: u64) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    /// Alias for [`QueryBuilder::limit`]
    pub fn take(self, limit: u64) -> Self {
        self.limit(limit)
    }

    /// Add OFFSET clause
    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.offset = Some(offset);
        self
    }

    /// Alias for [`QueryBuilder::offset`]
    pub fn skip(self, offset: u64) -> Self {
        self.offset(offset)
    }

    /// Page-based pagination (1-indexed)
    pub fn for_page(mut self, page: u64, per_page: u64) -> Self {
        self.pagination = Pagination::for_page(page, per_page);
        self
    }

    /// Remove LIMIT and OFFSET
    pub fn without_pagination(mut self) -> Self {
        self.pagination = Pagination::default();
        self
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn wheres(&self) -> &PredicateGroup {
        &self.wheres
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn havings(&self) -> &PredicateGroup {
        &self.havings
    }

    pub fn orders(&self) -> &[String] {
        &self.orders
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    // Predicate primitives. Each one keeps `bindings` in sync with the trees.

    /// Append a comparison; `NULL` with `=` or `<>` becomes IS [NOT] NULL
    pub fn add_where(&mut self, column: &str, operator: &str, value: Value, connector: Connector) {
        let condition = match (&value, operator) {
            (Value::Null, "=") => Condition::IsNull {
                column: column.to_string(),
            },
            (Value::Null, "<>" | "!=") => Condition::IsNotNull {
                column: column.to_string(),
            },
            _ => Condition::Basic {
                column: column.to_string(),
                operator: operator.to_string(),
                value,
            },
        };
        self.push_where(condition, connector);
    }

    pub fn add_where_column(&mut self, first: &str, operator: &str, second: &str, connector: Connector) {
        self.push_where(
            Condition::Column {
                first: first.to_string(),
                operator: operator.to_string(),
                second: second.to_string(),
            },
            connector,
        );
    }

    pub fn add_where_in(&mut self, column: &str, values: Vec<Value>, connector: Connector, negated: bool) {
        let column = column.to_string();
        let condition = if negated {
            Condition::NotIn { column, values }
        } else {
            Condition::In { column, values }
        };
        self.push_where(condition, connector);
    }

    pub fn add_where_between(
        &mut self,
        column: &str,
        low: Value,
        high: Value,
        connector: Connector,
        negated: bool,
    ) {
        let column = column.to_string();
        let condition = if negated {
            Condition::NotBetween { column, low, high }
        } else {
            Condition::Between { column, low, high }
        };
        self.push_where(condition, connector);
    }

    pub fn add_where_null(&mut self, column: &str, connector: Connector, negated: bool) {
        let column = column.to_string();
        let condition = if negated {
            Condition::IsNotNull { column }
        } else {
            Condition::IsNull { column }
        };
        self.push_where(condition, connector);
    }

    pub fn add_where_raw(&mut self, sql: &str, bindings: Vec<Value>, connector: Connector) {
        self.push_where(
            Condition::Raw {
                sql: sql.to_string(),
                bindings,
            },
            connector,
        );
    }

    pub fn add_where_exists(&mut self, query: QueryBuilder, connector: Connector, negated: bool) {
        let query = Box::new(query);
        let condition = if negated {
            Condition::NotExists { query }
        } else {
            Condition::Exists { query }
        };
        self.push_where(condition, connector);
    }

    /// Append another builder's WHERE tree as one nested group
    pub fn add_nested_where_query(&mut self, nested: &QueryBuilder, connector: Connector) -> GroupHandle {
        let handle = self.wheres.append_group(nested.wheres.clone(), connector);
        self.refresh_bindings();
        handle
    }

    /// Refresh a nested group from the current state of its source builder
    pub fn replace_nested_where(&mut self, handle: GroupHandle, nested: &QueryBuilder) -> Result<()> {
        self.wheres.replace_group(handle, nested.wheres.clone())?;
        self.refresh_bindings();
        Ok(())
    }

    /// Replace the whole WHERE tree
    pub fn set_wheres(&mut self, wheres: PredicateGroup) {
        self.wheres = wheres;
        self.refresh_bindings();
    }

    /// Drop every WHERE predicate, keeping the structural clauses
    pub fn reset_wheres(&mut self) {
        self.set_wheres(PredicateGroup::new());
    }

    /// Append the members of an AND-only group without nesting it
    pub fn extend_wheres_conjunction(&mut self, group: PredicateGroup) -> Result<()> {
        self.wheres.extend_conjunction(group)?;
        self.refresh_bindings();
        Ok(())
    }

    /// Drop top-level WHERE leaves matching `predicate`
    pub fn remove_where_leaves<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Condition) -> bool,
    {
        let removed = self.wheres.remove_leaves(predicate);
        self.refresh_bindings();
        removed
    }

    /// Add joins not already present
    pub fn merge_joins(&mut self, joins: &[Join]) {
        for join in joins {
            if !self.joins.contains(join) {
                self.joins.push(join.clone());
            }
        }
    }

    fn add_having(&mut self, column: &str, operator: &str, value: Value, connector: Connector) {
        self.havings.append_condition(
            Condition::Basic {
                column: column.to_string(),
                operator: operator.to_string(),
                value,
            },
            connector,
        );
        self.refresh_bindings();
    }

    fn push_where(&mut self, condition: Condition, connector: Connector) {
        self.wheres.append_condition(condition, connector);
        self.refresh_bindings();
    }

    fn refresh_bindings(&mut self) {
        self.bindings.set(ClauseKind::Where, self.wheres.bindings());
        self.bindings.set(ClauseKind::Having, self.havings.bindings());
    }

    /// Bound values in placeholder order
    pub fn get_bindings(&self) -> Vec<Value> {
        self.bindings.flatten()
    }

    /// Bound values keyed by clause
    pub fn get_raw_bindings(&self) -> &BindingSequence {
        &self.bindings
    }

    fn grammar() -> Grammar {
        Grammar::from_config(TenantQueryConfig::global())
    }

    /// Compile to a SELECT statement with the configured placeholder style
    pub fn to_statement(&self) -> Statement {
        Self::grammar().compile_select(self)
    }

    /// SQL text of [`QueryBuilder::to_statement`]
    pub fn to_sql(&self) -> String {
        self.to_statement().sql
    }

    pub fn count_statement(&self) -> Statement {
        Self::grammar().compile_count(self)
    }

    pub fn exists_statement(&self) -> Statement {
        Self::grammar().compile_exists(self)
    }

    pub fn insert_statement(&self, attributes: &Map<String, Value>) -> Statement {
        Self::grammar().compile_insert(self, attributes)
    }

    pub fn update_statement(&self, values: &Map<String, Value>) -> Statement {
        Self::grammar().compile_update(self, values)
    }

    pub fn timestamp_update_statement(&self, column: &str, stamp: DateTime<Utc>) -> Statement {
        Self::grammar().compile_timestamp_update(self, column, stamp)
    }

    pub fn delete_statement(&self) -> Statement {
        Self::grammar().compile_delete(self)
    }
}

impl Filterable for QueryBuilder {
    fn route_where(self, call: WhereCall) -> Self {
        call.apply(self)
    }

    fn nested_builder(&self) -> QueryBuilder {
        self.for_nested_where()
    }
}
