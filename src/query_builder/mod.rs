//! # Query Builder System
//!
//! Base SQL builder with a predicate tree, positional bindings and a grammar
//! that compiles both into parameterized SQL.
//!
//! ## Key Components
//!
//! - [`builder`] - [`QueryBuilder`], owner of the WHERE/HAVING trees and structural clauses
//! - [`conditions`] - Leaf conditions, groups, connectors and group handles
//! - [`bindings`] - Bound values keyed by clause
//! - [`grammar`] - SQL compilation and placeholder numbering
//! - [`calls`] - Closed set of predicate/structural/terminal calls and name dispatch
//! - [`filterable`] - The `where*` surface shared with the tenant facade
//! - [`joins`] / [`pagination`] - Pass-through clause state
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use tenant_query::query_builder::{Filterable, QueryBuilder};
//!
//! let query = QueryBuilder::new("users")
//!     .where_("active", "=", true)
//!     .where_group(|q| q.where_("role", "=", "admin").or_where("role", "=", "owner"))
//!     .order_desc("created_at")
//!     .limit(20);
//! let statement = query.to_statement();
//! ```

pub mod bindings;
pub mod builder;
pub mod calls;
pub mod conditions;
pub mod filterable;
pub mod grammar;
pub mod joins;
pub mod pagination;

pub use bindings::{BindingSequence, ClauseKind};
pub use builder::QueryBuilder;
pub use calls::{
    normalize_method, DynamicClause, QueryCall, StructuralCall, TerminalCall, WhereCall,
};
pub use conditions::{Condition, Connector, GroupHandle, Member, Predicate, PredicateGroup};
pub use filterable::Filterable;
pub use grammar::{Grammar, PlaceholderStyle, Statement};
pub use joins::{Join, JoinConstraint, JoinType};
pub use pagination::Pagination;
