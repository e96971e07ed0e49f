//! Tenant Query Builder Tests
//!
//! Name-based dispatch, macros, local scopes, scope toggles and the terminal
//! statements of the facade.

mod common;

use common::{dollar_sql, tenant_one, TestEntity};
use serde_json::Map;
use std::sync::Arc;
use tenant_query::prelude::*;

fn invoices() -> Arc<dyn Entity> {
    TestEntity::new("invoices")
        .with_tenants(&tenant_one())
        .with_local_scope("open", |builder, _args| {
            Ok(CallOutcome::Builder(builder.where_("status", "=", "open")))
        })
        .with_local_scope("of_kind", |builder, args| {
            let kind = args.first().cloned().unwrap_or(Value::Null);
            Ok(CallOutcome::Builder(builder.where_("kind", "=", kind)))
        })
        .into_arc()
}

fn soft_deleting_invoices() -> Arc<dyn Entity> {
    TestEntity::new("invoices")
        .with_tenants(&tenant_one())
        .with_soft_deletes()
        .into_arc()
}

fn call(builder: TenantQueryBuilder, method: &str, args: &[Value]) -> TenantQueryBuilder {
    builder.call(method, args).unwrap().into_builder().unwrap()
}

#[test]
fn test_where_calls_by_name_are_nested() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let query = call(query, "where", &[json!("status"), json!("="), json!("open")]);
    let query = call(query, "orWhere", &[json!("status"), json!("="), json!("overdue")]);

    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (status = $2 OR status = $3)"
    );
}

#[test]
fn test_dynamic_where_by_name() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let query = call(query, "whereStatusOrKind", &[json!("open"), json!("credit")]);

    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (status = $2 OR kind = $3)"
    );
    assert_eq!(
        query.get_bindings(),
        vec![json!(1), json!("open"), json!("credit")]
    );
}

#[test]
fn test_structural_calls_pass_through() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let query = call(query, "select", &[json!(["id", "total"])]);
    let query = call(query, "orderBy", &[json!("total"), json!("desc")]);
    let query = call(query, "limit", &[json!(5)]);

    assert_eq!(
        dollar_sql(&query),
        "SELECT id, total FROM invoices WHERE invoices.tenant_id = $1 ORDER BY total DESC LIMIT 5"
    );
    assert!(query.nested_query().is_none());
}

#[test]
fn test_for_page_by_name_saturates_offset() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let query = call(query, "forPage", &[json!(u64::MAX), json!(10)]);

    assert_eq!(
        dollar_sql(&query),
        format!(
            "SELECT * FROM invoices WHERE invoices.tenant_id = $1 LIMIT 10 OFFSET {}",
            u64::MAX
        )
    );
}

#[test]
fn test_terminal_calls_return_statements() {
    let query = TenantQueryBuilder::new_query(invoices())
        .unwrap()
        .where_("status", "=", "open");

    let count = query
        .clone()
        .call("count", &[])
        .unwrap()
        .into_statement()
        .unwrap();
    assert_eq!(
        count.sql,
        "SELECT COUNT(*) AS aggregate FROM invoices WHERE invoices.tenant_id = $1 AND status = $2"
    );
    assert_eq!(count.bindings, vec![json!(1), json!("open")]);

    let bindings = query
        .clone()
        .call("getBindings", &[])
        .unwrap()
        .into_bindings()
        .unwrap();
    assert_eq!(bindings, vec![json!(1), json!("open")]);

    let find = query.call("find", &[json!(42)]).unwrap().into_statement().unwrap();
    assert_eq!(
        find.sql,
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 \
         AND (status = $2 AND invoices.id = $3) LIMIT 1"
    );
}

#[test]
fn test_to_sql_outcome_is_not_a_builder() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let outcome = query.call("toSql", &[]).unwrap();

    assert!(matches!(outcome, CallOutcome::Sql(_)));
    let err = outcome.into_builder().unwrap_err();
    assert!(matches!(err, TenantQueryError::InvalidArguments { .. }));
}

#[test]
fn test_unknown_method_is_unsupported() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let err = query.call("frobnicate", &[]).unwrap_err();

    assert!(matches!(
        err,
        TenantQueryError::UnsupportedOperation { ref method } if method == "frobnicate"
    ));
}

#[test]
fn test_closure_forms_are_rejected_by_name() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let err = query.call("whereExists", &[]).unwrap_err();

    assert!(matches!(err, TenantQueryError::InvalidArguments { .. }));
}

#[test]
fn test_calls_without_entity_fail() {
    let query = TenantQueryBuilder::new(QueryBuilder::new("invoices"));
    let err = query
        .call("where", &[json!("a"), json!("="), json!(1)])
        .unwrap_err();

    assert!(matches!(err, TenantQueryError::MissingEntity));
}

#[test]
fn test_local_scopes_dispatch_by_name() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let query = call(query, "open", &[]);
    let query = call(query, "ofKind", &[json!("credit")]);

    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (status = $2 AND kind = $3)"
    );

    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let scoped = query.scope("of_kind", &[json!("debit")]).unwrap().into_builder().unwrap();
    assert_eq!(scoped.get_bindings(), vec![json!(1), json!("debit")]);
}

#[test]
fn test_macros_take_precedence() {
    let query = TenantQueryBuilder::new_query(invoices())
        .unwrap()
        .macro_("open", |builder, _args| {
            Ok(CallOutcome::Builder(builder.where_not_null("opened_at")))
        });

    assert!(query.has_macro("open"));
    let query = call(query, "open", &[]);
    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND opened_at IS NOT NULL"
    );
}

#[test]
fn test_scope_toggles_keep_user_predicates() {
    let query = TenantQueryBuilder::new_query(invoices())
        .unwrap()
        .where_("a", "=", 1)
        .or_where("b", "=", 2);

    let unscoped = query.without_scope(TENANT_SCOPE).unwrap();
    assert!(!unscoped.is_scoped(TENANT_SCOPE));
    assert_eq!(
        dollar_sql(&unscoped),
        "SELECT * FROM invoices WHERE a = $1 OR b = $2"
    );

    let unscoped = unscoped.or_where("c", "=", 3);
    let rescoped = unscoped.with_scope(TENANT_SCOPE).unwrap();
    assert_eq!(
        dollar_sql(&rescoped),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (a = $2 OR b = $3 OR c = $4)"
    );

    let rescoped = rescoped.where_("d", "=", 4);
    assert_eq!(
        dollar_sql(&rescoped),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 \
         AND (a = $2 OR b = $3 OR c = $4 AND d = $5)"
    );
}

#[test]
fn test_where_key_with_many_ids() {
    let query = TenantQueryBuilder::new_query(invoices())
        .unwrap()
        .where_key(json!([3, 4]))
        .unwrap();

    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND invoices.id IN ($2, $3)"
    );
}

#[test]
fn test_insert_stamps_tenant() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let mut attributes = Map::new();
    attributes.insert("total".to_string(), json!(100));

    let statement = query.insert_statement(attributes).unwrap();
    assert!(statement.sql.starts_with("INSERT INTO invoices ("));
    assert!(statement.sql.contains("tenant_id"));
    assert!(statement.sql.ends_with("VALUES ($1, $2)"));
    assert!(statement.bindings.contains(&json!(1)));
    assert!(statement.bindings.contains(&json!(100)));
}

#[test]
fn test_insert_writes_null_attributes_literally() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let mut attributes = Map::new();
    attributes.insert("tenant_id".to_string(), json!(1));
    attributes.insert("voided_at".to_string(), Value::Null);

    let statement = query.insert_statement(attributes).unwrap();
    assert!(statement.sql.contains("NULL"));
    assert_eq!(statement.bindings, vec![json!(1)]);
    assert_eq!(statement.placeholder_count(), 1);
}

#[test]
fn test_insert_keeps_explicit_tenant() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let mut attributes = Map::new();
    attributes.insert("tenant_id".to_string(), json!(9));

    let statement = query.insert_statement(attributes).unwrap();
    assert_eq!(statement.bindings, vec![json!(9)]);
}

#[test]
fn test_delete_is_soft_for_soft_deleting_entities() {
    let query = TenantQueryBuilder::new_query(soft_deleting_invoices())
        .unwrap()
        .where_("id", "=", 5);

    let statement = query.delete_statement().unwrap();
    assert_eq!(
        statement.sql,
        "UPDATE invoices SET deleted_at = $1::timestamptz WHERE invoices.tenant_id = $2 \
         AND invoices.deleted_at IS NULL AND id = $3"
    );
    assert!(statement.bindings[0].is_string());
    assert_eq!(statement.placeholder_count(), statement.bindings.len());
    assert_eq!(&statement.bindings[1..], &[json!(1), json!(5)]);

    let forced = query
        .call("forceDelete", &[])
        .unwrap()
        .into_statement()
        .unwrap();
    assert_eq!(
        forced.sql,
        "DELETE FROM invoices WHERE invoices.tenant_id = $1 \
         AND invoices.deleted_at IS NULL AND id = $2"
    );
}

#[test]
fn test_hard_delete_without_soft_deletes() {
    let query = TenantQueryBuilder::new_query(invoices()).unwrap();
    let statement = query.delete_statement().unwrap();

    assert_eq!(
        statement.sql,
        "DELETE FROM invoices WHERE invoices.tenant_id = $1"
    );
}

#[test]
fn test_only_trashed_and_restore() {
    let query = TenantQueryBuilder::new_query(soft_deleting_invoices()).unwrap();
    let trashed = call(query.clone(), "onlyTrashed", &[]);
    assert_eq!(
        dollar_sql(&trashed),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND invoices.deleted_at IS NOT NULL"
    );

    let restore = query.call("restore", &[]).unwrap().into_statement().unwrap();
    assert_eq!(
        restore.sql,
        "UPDATE invoices SET deleted_at = NULL WHERE invoices.tenant_id = $1"
    );
    assert_eq!(restore.bindings, vec![json!(1)]);
}

#[test]
fn test_not_found_error_depends_on_tenant_scoping() {
    let scoped = TenantQueryBuilder::new_query(invoices()).unwrap();
    assert!(matches!(
        scoped.not_found_error(&json!(42)),
        TenantQueryError::TenantModelNotFound { ref id, .. } if id == "42"
    ));

    let all = TenantQueryBuilder::all_tenants(invoices()).unwrap();
    assert!(matches!(
        all.not_found_error(&json!(42)),
        TenantQueryError::ModelNotFound { .. }
    ));
}

#[test]
fn test_model_identifier_restores_without_tenant_scope() {
    let entity = invoices();
    let identifier = ModelIdentifier::new(entity.as_ref(), 42);

    let restored = identifier.restore_query(Arc::clone(&entity)).unwrap();
    assert!(!restored.is_scoped(TENANT_SCOPE));
    assert_eq!(
        dollar_sql(&restored),
        "SELECT * FROM invoices WHERE invoices.id = $1"
    );
    assert!(!entity.registry().is_suspended(TENANT_SCOPE));

    let other = invoices();
    assert!(identifier.restore_query(other).is_err());
}
