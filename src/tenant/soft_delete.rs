//! # Soft Deletes
//!
//! Entities that name a soft-delete column are filtered to rows where that
//! column is NULL. The scope installs `with_trashed`, `only_trashed`,
//! `without_trashed`, `restore` and `force_delete` macros on every facade of
//! such an entity.

use super::builder::{CallHandler, CallOutcome, TenantQueryBuilder};
use super::entity::Entity;
use super::scope::Scope;
use crate::error::Result;
use crate::query_builder::{Filterable, QueryBuilder};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Registry name of the soft-delete scope
pub const SOFT_DELETE_SCOPE: &str = "soft_deletes";

#[derive(Debug, Default, Clone, Copy)]
pub struct SoftDeletingScope;

impl SoftDeletingScope {
    /// `qualifier.column` for the facade's entity, if it soft-deletes
    fn qualified_column(builder: &TenantQueryBuilder) -> Result<Option<String>> {
        let entity = builder.entity()?;
        Ok(entity
            .soft_delete_column()
            .map(|column| format!("{}.{}", builder.base_query().qualifier(), column)))
    }

    fn with_trashed(builder: TenantQueryBuilder, _args: &[Value]) -> Result<CallOutcome> {
        builder.without_scope(SOFT_DELETE_SCOPE).map(CallOutcome::Builder)
    }

    fn only_trashed(builder: TenantQueryBuilder, _args: &[Value]) -> Result<CallOutcome> {
        let column = Self::qualified_column(&builder)?;
        let builder = builder.without_scope(SOFT_DELETE_SCOPE)?;
        Ok(CallOutcome::Builder(match column {
            Some(column) => builder.where_not_null(&column),
            None => builder,
        }))
    }

    fn without_trashed(builder: TenantQueryBuilder, _args: &[Value]) -> Result<CallOutcome> {
        let column = Self::qualified_column(&builder)?;
        let builder = builder.without_scope(SOFT_DELETE_SCOPE)?;
        Ok(CallOutcome::Builder(match column {
            Some(column) => builder.where_null(&column),
            None => builder,
        }))
    }

    /// UPDATE clearing the soft-delete column
    fn restore(builder: TenantQueryBuilder, _args: &[Value]) -> Result<CallOutcome> {
        let Some(column) = builder.entity()?.soft_delete_column() else {
            return Ok(CallOutcome::Builder(builder));
        };
        let builder = builder.without_scope(SOFT_DELETE_SCOPE)?;
        let mut values = Map::new();
        values.insert(column, Value::Null);
        Ok(CallOutcome::Statement(
            builder.base_query().update_statement(&values),
        ))
    }

    /// Hard DELETE, bypassing the soft-delete UPDATE
    fn force_delete(builder: TenantQueryBuilder, _args: &[Value]) -> Result<CallOutcome> {
        Ok(CallOutcome::Statement(builder.base_query().delete_statement()))
    }
}

impl Scope for SoftDeletingScope {
    fn name(&self) -> &str {
        SOFT_DELETE_SCOPE
    }

    fn apply(&self, query: QueryBuilder, entity: &dyn Entity) -> QueryBuilder {
        match entity.soft_delete_column() {
            Some(column) => {
                let qualified = format!("{}.{}", query.qualifier(), column);
                query.where_null(&qualified)
            }
            None => query,
        }
    }

    fn macros(&self) -> Vec<(String, CallHandler)> {
        let handlers: [(&str, CallHandler); 5] = [
            ("with_trashed", Arc::new(Self::with_trashed)),
            ("only_trashed", Arc::new(Self::only_trashed)),
            ("without_trashed", Arc::new(Self::without_trashed)),
            ("restore", Arc::new(Self::restore)),
            ("force_delete", Arc::new(Self::force_delete)),
        ];
        handlers
            .into_iter()
            .map(|(name, handler)| (name.to_string(), handler))
            .collect()
    }
}
