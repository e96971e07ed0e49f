//! # Error Types
//!
//! Structured errors for query building, scoping and execution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TenantQueryError {
    #[error("Call to undefined method {method}")]
    UnsupportedOperation { method: String },

    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },

    #[error("No query results for model [{entity}] {id}")]
    ModelNotFound { entity: String, id: String },

    /// Lookup failed under tenant scoping, so the row may exist for another tenant
    #[error("No query results for tenant-scoped model [{entity}] {id}")]
    TenantModelNotFound { entity: String, id: String },

    #[error("Predicate grouping invariant violated: {reason}")]
    GroupingInvariant { reason: String },

    #[error("Call to undefined relationship [{relation}] on model [{entity}]")]
    RelationNotFound { entity: String, relation: String },

    #[error("No entity bound to the builder; call set_model first")]
    MissingEntity,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TenantQueryError {
    pub fn unsupported(method: &str) -> Self {
        Self::UnsupportedOperation {
            method: method.to_string(),
        }
    }

    pub fn invalid_arguments(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// True for both not-found variants
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ModelNotFound { .. } | Self::TenantModelNotFound { .. }
        )
    }
}

impl From<config::ConfigError> for TenantQueryError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TenantQueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages() {
        let err = TenantQueryError::TenantModelNotFound {
            entity: "Invoice".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No query results for tenant-scoped model [Invoice] 42"
        );
        assert!(err.is_not_found());
        assert!(!TenantQueryError::MissingEntity.is_not_found());
    }

    #[test]
    fn test_unsupported_names_the_method() {
        assert_eq!(
            TenantQueryError::unsupported("foobar").to_string(),
            "Call to undefined method foobar"
        );
    }
}
