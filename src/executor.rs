//! # Statement Execution
//!
//! Runs compiled [`Statement`]s against PostgreSQL through `sqlx`. Statements
//! must be compiled with the dollar placeholder style.
//!
//! JSON bindings map to native parameter types: integers to `BIGINT`, other
//! numbers to `DOUBLE PRECISION`, strings to `TEXT` and arrays/objects to
//! `JSONB`. Strings are never sniffed for dates; statements that write a
//! timestamp cast their placeholder in the SQL text instead. NULL checks and
//! NULL values in INSERT and UPDATE are written as literals by the grammar.

use crate::error::Result;
use crate::logging::log_statement;
use crate::query_builder::Statement;
use crate::tenant::TenantQueryBuilder;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::types::Json;
use sqlx::Arguments;

/// Encode bindings as positional PostgreSQL arguments
pub fn bind_arguments(values: &[Value]) -> Result<PgArguments> {
    let mut arguments = PgArguments::default();
    for value in values {
        let added = match value {
            Value::Null => arguments.add(Option::<String>::None),
            Value::Bool(flag) => arguments.add(*flag),
            Value::Number(number) => match (number.as_i64(), number.as_f64()) {
                (Some(integer), _) => arguments.add(integer),
                (None, Some(float)) => arguments.add(float),
                (None, None) => arguments.add(Json(value.clone())),
            },
            Value::String(text) => arguments.add(text.clone()),
            Value::Array(_) | Value::Object(_) => arguments.add(Json(value.clone())),
        };
        added.map_err(sqlx::Error::Encode)?;
    }
    Ok(arguments)
}

impl Statement {
    pub async fn fetch_all(&self, pool: &PgPool) -> Result<Vec<PgRow>> {
        let arguments = bind_arguments(&self.bindings)?;
        Ok(sqlx::query_with(&self.sql, arguments).fetch_all(pool).await?)
    }

    pub async fn fetch_optional(&self, pool: &PgPool) -> Result<Option<PgRow>> {
        let arguments = bind_arguments(&self.bindings)?;
        Ok(sqlx::query_with(&self.sql, arguments)
            .fetch_optional(pool)
            .await?)
    }

    /// Execute and return the number of affected rows
    pub async fn execute(&self, pool: &PgPool) -> Result<u64> {
        let arguments = bind_arguments(&self.bindings)?;
        let result = sqlx::query_with(&self.sql, arguments).execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Fetch a single scalar, e.g. from a count statement
    pub async fn fetch_scalar_i64(&self, pool: &PgPool) -> Result<i64> {
        let arguments = bind_arguments(&self.bindings)?;
        Ok(sqlx::query_scalar_with::<_, i64, _>(&self.sql, arguments)
            .fetch_one(pool)
            .await?)
    }

    pub async fn fetch_bool(&self, pool: &PgPool) -> Result<bool> {
        let arguments = bind_arguments(&self.bindings)?;
        Ok(sqlx::query_scalar_with::<_, bool, _>(&self.sql, arguments)
            .fetch_one(pool)
            .await?)
    }
}

impl TenantQueryBuilder {
    pub async fn get(&self, pool: &PgPool) -> Result<Vec<PgRow>> {
        let statement = self.to_statement();
        log_statement("get", self.entity().ok().map(|e| e.entity_name()), &statement);
        statement.fetch_all(pool).await
    }

    pub async fn first(&self, pool: &PgPool) -> Result<Option<PgRow>> {
        let statement = self.first_statement();
        log_statement("first", self.entity().ok().map(|e| e.entity_name()), &statement);
        statement.fetch_optional(pool).await
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64> {
        let statement = self.count_statement();
        log_statement("count", self.entity().ok().map(|e| e.entity_name()), &statement);
        statement.fetch_scalar_i64(pool).await
    }

    pub async fn exists(&self, pool: &PgPool) -> Result<bool> {
        let statement = self.exists_statement();
        log_statement("exists", self.entity().ok().map(|e| e.entity_name()), &statement);
        statement.fetch_bool(pool).await
    }

    /// Fetch by primary key or fail
    ///
    /// When tenant scoping was active the error is
    /// [`crate::TenantQueryError::TenantModelNotFound`], since the row may
    /// exist for another tenant.
    pub async fn find_or_fail(&self, pool: &PgPool, id: impl Into<Value>) -> Result<PgRow> {
        let id = id.into();
        let statement = self.find_statement(id.clone())?;
        log_statement("find", self.entity().ok().map(|e| e.entity_name()), &statement);
        statement
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| self.not_found_error(&id))
    }
}
