//! # Filterable
//!
//! The predicate-building surface shared by the base [`QueryBuilder`] and the
//! tenant-aware facade. Implementors only decide where a [`WhereCall`] goes;
//! every `where*` method is provided here on top of that.
//!
//! Closure forms (`where_group`, `where_exists`, ...) are evaluated eagerly
//! against a fresh builder from [`Filterable::nested_builder`], and the
//! finished sub-query travels inside the call.

use super::builder::QueryBuilder;
use super::calls::{parse_dynamic_where, WhereCall};
use super::conditions::Connector;
use crate::error::Result;
use serde_json::Value;

pub trait Filterable: Sized {
    /// Apply a predicate call to wherever this builder keeps its predicates
    fn route_where(self, call: WhereCall) -> Self;

    /// Fresh builder over the same FROM target, for closure-form predicates
    fn nested_builder(&self) -> QueryBuilder;

    /// `column operator value`, joined with AND
    fn where_(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.route_where(basic(column, operator, value.into(), Connector::And))
    }

    /// `column operator value`, joined with OR
    fn or_where(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.route_where(basic(column, operator, value.into(), Connector::Or))
    }

    /// Shorthand for `where_(column, "=", value)`
    fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_(column, "=", value)
    }

    fn where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.route_where(column(first, operator, second, Connector::And))
    }

    fn or_where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.route_where(column(first, operator, second, Connector::Or))
    }

    fn where_in<I>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.route_where(in_list(column, values, Connector::And, false))
    }

    fn or_where_in<I>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.route_where(in_list(column, values, Connector::Or, false))
    }

    fn where_not_in<I>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.route_where(in_list(column, values, Connector::And, true))
    }

    fn or_where_not_in<I>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.route_where(in_list(column, values, Connector::Or, true))
    }

    fn where_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.route_where(between(column, low.into(), high.into(), Connector::And, false))
    }

    fn or_where_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.route_where(between(column, low.into(), high.into(), Connector::Or, false))
    }

    fn where_not_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.route_where(between(column, low.into(), high.into(), Connector::And, true))
    }

    fn or_where_not_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.route_where(between(column, low.into(), high.into(), Connector::Or, true))
    }

    fn where_null(self, column: &str) -> Self {
        self.route_where(null(column, Connector::And, false))
    }

    fn or_where_null(self, column: &str) -> Self {
        self.route_where(null(column, Connector::Or, false))
    }

    fn where_not_null(self, column: &str) -> Self {
        self.route_where(null(column, Connector::And, true))
    }

    fn or_where_not_null(self, column: &str) -> Self {
        self.route_where(null(column, Connector::Or, true))
    }

    /// Raw SQL fragment; each `?` consumes one of `bindings`
    fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.route_where(raw(sql, bindings, Connector::And))
    }

    fn or_where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.route_where(raw(sql, bindings, Connector::Or))
    }

    /// Parenthesized group built by `f`, joined with AND
    fn where_group<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let query = f(self.nested_builder());
        self.route_where(WhereCall::Nested {
            query,
            connector: Connector::And,
        })
    }

    /// Parenthesized group built by `f`, joined with OR
    fn or_where_group<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let query = f(self.nested_builder());
        self.route_where(WhereCall::Nested {
            query,
            connector: Connector::Or,
        })
    }

    fn where_exists<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let query = f(self.nested_builder());
        self.route_where(exists(query, Connector::And, false))
    }

    fn or_where_exists<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let query = f(self.nested_builder());
        self.route_where(exists(query, Connector::Or, false))
    }

    fn where_not_exists<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let query = f(self.nested_builder());
        self.route_where(exists(query, Connector::And, true))
    }

    fn or_where_not_exists<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let query = f(self.nested_builder());
        self.route_where(exists(query, Connector::Or, true))
    }

    /// Compound equality from a method name, e.g. `whereBazOrBar` with `[6, 7]`
    fn where_dynamic(self, method: &str, params: &[Value]) -> Result<Self> {
        let clauses = parse_dynamic_where(method, params)?;
        Ok(self.route_where(WhereCall::Dynamic { clauses }))
    }
}

fn basic(column: &str, operator: &str, value: Value, connector: Connector) -> WhereCall {
    WhereCall::Basic {
        column: column.to_string(),
        operator: operator.to_string(),
        value,
        connector,
    }
}

fn column(first: &str, operator: &str, second: &str, connector: Connector) -> WhereCall {
    WhereCall::Column {
        first: first.to_string(),
        operator: operator.to_string(),
        second: second.to_string(),
        connector,
    }
}

fn in_list<I>(column: &str, values: I, connector: Connector, negated: bool) -> WhereCall
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    WhereCall::In {
        column: column.to_string(),
        values: values.into_iter().map(Into::into).collect(),
        connector,
        negated,
    }
}

fn between(column: &str, low: Value, high: Value, connector: Connector, negated: bool) -> WhereCall {
    WhereCall::Between {
        column: column.to_string(),
        low,
        high,
        connector,
        negated,
    }
}

fn null(column: &str, connector: Connector, negated: bool) -> WhereCall {
    WhereCall::Null {
        column: column.to_string(),
        connector,
        negated,
    }
}

fn raw(sql: &str, bindings: Vec<Value>, connector: Connector) -> WhereCall {
    WhereCall::Raw {
        sql: sql.to_string(),
        bindings,
        connector,
    }
}

fn exists(query: QueryBuilder, connector: Connector, negated: bool) -> WhereCall {
    WhereCall::Exists {
        query,
        connector,
        negated,
    }
}
