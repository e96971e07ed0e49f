#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tenant Query
//!
//! Scope-safe predicate-tree query builder for multi-tenant data.
//!
//! ## Overview
//!
//! Queries against tenant-owned tables get their scoping predicates (tenant
//! ownership, soft deletes, any custom global scope) injected automatically.
//! Caller predicates are kept in a separate subtree that is inserted into the
//! scoped query as one group, so `A AND (B OR C)` can never degrade into
//! `A AND B OR C` however many calls, closures, relations or scopes pile up.
//!
//! ## Module Organization
//!
//! - [`query_builder`] - Predicate tree, bindings, SQL grammar and the base builder
//! - [`tenant`] - Entities, scopes, scope registry, nesting facade, relation merge
//! - [`executor`] - Execution of compiled statements through SQLx
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenant_query::prelude::*;
//!
//! struct Invoices {
//!     tenants: Arc<TenantScope>,
//! }
//!
//! impl Entity for Invoices {
//!     fn table(&self) -> &str {
//!         "invoices"
//!     }
//!
//!     fn global_scopes(&self) -> Vec<Arc<dyn Scope>> {
//!         vec![self.tenants.clone() as Arc<dyn Scope>]
//!     }
//! }
//!
//! let tenants = Arc::new(TenantScope::new());
//! tenants.add_tenant("tenant_id", 1);
//!
//! let query = TenantQueryBuilder::new_query(Arc::new(Invoices { tenants }))?
//!     .where_("status", "=", "open")
//!     .or_where("status", "=", "overdue");
//!
//! assert_eq!(
//!     query.to_sql(),
//!     "SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (status = $2 OR status = $3)"
//! );
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod query_builder;
pub mod tenant;

pub use config::TenantQueryConfig;
pub use error::{Result, TenantQueryError};
pub use query_builder::{Filterable, QueryBuilder, Statement};
pub use tenant::{Entity, Scope, ScopeRegistry, TenantQueryBuilder, TenantScope};

/// Everything needed to declare entities and build scoped queries
pub mod prelude {
    pub use crate::error::{Result, TenantQueryError};
    pub use crate::query_builder::{
        Connector, Filterable, PlaceholderStyle, QueryBuilder, Statement,
    };
    pub use crate::tenant::{
        CallOutcome, ClosureScope, Entity, ModelIdentifier, Relation, Scope, ScopeRegistry,
        SoftDeletingScope, TenantQueryBuilder, TenantScope, SOFT_DELETE_SCOPE, TENANT_SCOPE,
    };
    pub use serde_json::{json, Value};
}
