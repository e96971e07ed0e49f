//! # Model Identifiers
//!
//! Serializable references to rows, e.g. inside queued jobs. A reference is
//! restored with the tenant scope suspended: the job may run outside the
//! tenant context that created it, and the id alone already pins the row.

use super::builder::TenantQueryBuilder;
use super::entity::Entity;
use super::tenant_scope::TENANT_SCOPE;
use crate::error::{Result, TenantQueryError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIdentifier {
    pub entity: String,
    /// A single key or an array of keys
    pub id: Value,
}

impl ModelIdentifier {
    pub fn new(entity: &dyn Entity, id: impl Into<Value>) -> Self {
        Self {
            entity: entity.entity_name().to_string(),
            id: id.into(),
        }
    }

    /// Lookup query for the referenced row(s), built without tenant scoping
    ///
    /// Other scopes still apply. The suspension is lifted before this returns,
    /// whether or not building the query succeeded.
    pub fn restore_query(&self, entity: Arc<dyn Entity>) -> Result<TenantQueryBuilder> {
        if entity.entity_name() != self.entity {
            return Err(TenantQueryError::invalid_arguments(
                "restore_query",
                format!(
                    "identifier references {}, not {}",
                    self.entity,
                    entity.entity_name()
                ),
            ));
        }

        let registry = entity.registry();
        let _suspension = registry.suspend(TENANT_SCOPE);
        debug!(entity = %self.entity, id = %self.id, "Restoring model identifier");
        TenantQueryBuilder::new_query(entity)?.where_key(self.id.clone())
    }
}
