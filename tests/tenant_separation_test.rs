//! Tenant Separation Tests
//!
//! An `or_where` from the caller must never widen a query past the tenant
//! clause.

mod common;

use common::{dollar_sql, question_sql, raw_tenant_one, tenant_one, TestEntity};
use std::sync::Arc;
use tenant_query::prelude::*;
use tenant_query::query_builder::Grammar;

#[test]
fn test_real_separation_query() {
    let entity = TestEntity::new("table").with_tenants(&raw_tenant_one()).into_arc();

    let reference = TenantQueryBuilder::all_tenants(Arc::clone(&entity))
        .unwrap()
        .where_raw("table.tenant_id = '1'", Vec::new())
        .where_group(|query| query.where_("foo", "=", 2).or_where("bar", "=", 3));

    let tenant_query = TenantQueryBuilder::new_query(entity)
        .unwrap()
        .where_("foo", "=", 2)
        .or_where("bar", "=", 3);

    assert_eq!(tenant_query.get_bindings(), vec![json!(2), json!(3)]);
    assert_eq!(question_sql(&reference), question_sql(&tenant_query));
}

#[test]
fn test_raw_disjunction_stays_behind_tenant_clause() {
    let entity = TestEntity::new("invoices").with_tenants(&tenant_one()).into_arc();

    let query = TenantQueryBuilder::new_query(Arc::clone(&entity))
        .unwrap()
        .where_raw("a = ? OR b = ?", vec![json!(2), json!(3)]);
    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (a = $2 OR b = $3)"
    );
    assert_eq!(query.get_bindings(), vec![json!(1), json!(2), json!(3)]);

    let query = TenantQueryBuilder::new_query(entity)
        .unwrap()
        .where_("c", "=", 4)
        .or_where_raw("a = ? OR b = ?", vec![json!(2), json!(3)]);
    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (c = $2 OR a = $3 OR b = $4)"
    );
}

#[test]
fn test_quoted_tenant_id_is_not_a_placeholder() {
    let tenants = Arc::new(TenantScope::new().with_raw_clauses());
    tenants.add_tenant("tenant_id", "acme?");
    let entity = TestEntity::new("invoices").with_tenants(&tenants).into_arc();

    let query = TenantQueryBuilder::new_query(entity)
        .unwrap()
        .where_("x", "=", 1);
    let statement = Grammar::new(PlaceholderStyle::Dollar).compile_select(query.base_query());

    assert_eq!(
        statement.sql,
        "SELECT * FROM invoices WHERE invoices.tenant_id = 'acme?' AND x = $1"
    );
    assert_eq!(statement.bindings, vec![json!(1)]);
    assert_eq!(statement.placeholder_numbers(), vec![1]);
}

#[test]
fn test_tenants_do_not_leak_across_entities() {
    let first = tenant_one();
    let second = Arc::new(TenantScope::new());
    second.add_tenant("tenant_id", 2);

    let invoices = TestEntity::new("invoices").with_tenants(&first).into_arc();
    let orders = TestEntity::new("orders").with_tenants(&second).into_arc();

    let invoices_query = TenantQueryBuilder::new_query(invoices)
        .unwrap()
        .or_where("status", "=", "open");
    let orders_query = TenantQueryBuilder::new_query(orders)
        .unwrap()
        .or_where("status", "=", "open");

    assert_eq!(
        dollar_sql(&invoices_query),
        "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND status = $2"
    );
    assert_eq!(invoices_query.get_bindings(), vec![json!(1), json!("open")]);
    assert_eq!(orders_query.get_bindings(), vec![json!(2), json!("open")]);
}

#[test]
fn test_tenant_change_applies_to_new_queries_only() {
    let tenants = tenant_one();
    let entity = TestEntity::new("invoices").with_tenants(&tenants).into_arc();

    let before = TenantQueryBuilder::new_query(Arc::clone(&entity)).unwrap();
    tenants.add_tenant("tenant_id", 7);
    let after = TenantQueryBuilder::new_query(entity).unwrap();

    assert_eq!(before.get_bindings(), vec![json!(1)]);
    assert_eq!(after.get_bindings(), vec![json!(7)]);
}

#[test]
fn test_multiple_tenant_columns_are_conjoined_inline() {
    struct Projects {
        tenants: Arc<TenantScope>,
        registry: &'static ScopeRegistry,
    }

    impl Entity for Projects {
        fn table(&self) -> &str {
            "projects"
        }

        fn tenant_columns(&self) -> Vec<String> {
            vec!["tenant_id".to_string(), "region_id".to_string()]
        }

        fn global_scopes(&self) -> Vec<Arc<dyn Scope>> {
            vec![Arc::clone(&self.tenants) as Arc<dyn Scope>]
        }

        fn registry(&self) -> &'static ScopeRegistry {
            self.registry
        }
    }

    let tenants = tenant_one();
    tenants.add_tenant("region_id", "eu");
    let entity: Arc<dyn Entity> = Arc::new(Projects {
        tenants,
        registry: Box::leak(Box::new(ScopeRegistry::new())),
    });

    let query = TenantQueryBuilder::new_query(entity)
        .unwrap()
        .where_("a", "=", 1)
        .or_where("b", "=", 2);

    assert_eq!(
        dollar_sql(&query),
        "SELECT * FROM projects WHERE projects.tenant_id = $1 \
         AND projects.region_id = $2 AND (a = $3 OR b = $4)"
    );
}
