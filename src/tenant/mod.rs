//! # Tenant Scoping
//!
//! Entity-aware layer on top of [`crate::query_builder`]: scopes, the scope
//! registry, the nesting facade, relation existence and model identifiers.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use tenant_query::prelude::*;
//!
//! let tenants = Arc::new(TenantScope::new());
//! tenants.add_tenant("tenant_id", 1);
//!
//! // Entity::global_scopes returns vec![tenants.clone()]
//! let query = TenantQueryBuilder::new_query(invoices)?
//!     .where_("status", "=", "open")
//!     .or_where("status", "=", "overdue");
//! // SELECT * FROM invoices WHERE invoices.tenant_id = $1 AND (status = $2 OR status = $3)
//! ```

pub mod builder;
pub mod entity;
pub mod registry;
pub mod relation;
pub mod scope;
pub mod serialization;
pub mod soft_delete;
pub mod tenant_scope;

pub use builder::{CallHandler, CallOutcome, TenantQueryBuilder};
pub use entity::Entity;
pub use registry::{ScopeRegistry, ScopeSuspension};
pub use relation::{merge_into, Relation, RelationConstraint, RelationKind};
pub use scope::{ClosureScope, Scope};
pub use serialization::ModelIdentifier;
pub use soft_delete::{SoftDeletingScope, SOFT_DELETE_SCOPE};
pub use tenant_scope::{TenantScope, TENANT_SCOPE};
