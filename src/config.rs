//! # Configuration
//!
//! Settings loaded through the `config` crate: an optional
//! `config/tenant_query.{toml,yaml,json}` file layered under `TENANT_QUERY_*`
//! environment variables. Every field has a default, so an empty environment
//! yields a working configuration.

use crate::error::{Result, TenantQueryError};
use crate::query_builder::PlaceholderStyle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Default config file location, without extension
pub const DEFAULT_CONFIG_FILE: &str = "config/tenant_query";

/// Prefix for environment overrides, e.g. `TENANT_QUERY_PLACEHOLDER_STYLE`
pub const ENV_PREFIX: &str = "TENANT_QUERY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantQueryConfig {
    /// Columns the tenant scope filters on when an entity does not name its own
    pub default_tenant_columns: Vec<String>,
    pub placeholder_style: PlaceholderStyle,
    /// Timestamp column used by soft-deleting entities
    pub soft_delete_column: String,
    pub log_format: LogFormat,
}

impl Default for TenantQueryConfig {
    fn default() -> Self {
        Self {
            default_tenant_columns: vec!["tenant_id".to_string()],
            placeholder_style: PlaceholderStyle::Dollar,
            soft_delete_column: "deleted_at".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

static GLOBAL_CONFIG: OnceLock<TenantQueryConfig> = OnceLock::new();

impl TenantQueryConfig {
    /// Load from the default file location plus environment overrides
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from a specific file only; the file must exist
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .build()?;
        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load an optional file (default location when `None`) layered under the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("default_tenant_columns"),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        debug!(
            placeholder_style = ?loaded.placeholder_style,
            tenant_columns = ?loaded.default_tenant_columns,
            "Configuration loaded"
        );
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_tenant_columns.is_empty()
            || self.default_tenant_columns.iter().any(|c| c.trim().is_empty())
        {
            return Err(TenantQueryError::Configuration {
                message: "default_tenant_columns must name at least one column".to_string(),
            });
        }
        if self.soft_delete_column.trim().is_empty() {
            return Err(TenantQueryError::Configuration {
                message: "soft_delete_column must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Process-wide configuration, loaded on first use
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static TenantQueryConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::from_env().unwrap_or_else(|err| {
                warn!(error = %err, "Configuration loading failed, using defaults");
                Self::default()
            })
        })
    }

    /// Install the process-wide configuration; only the first call wins
    pub fn init_global(config: TenantQueryConfig) -> Result<&'static TenantQueryConfig> {
        config.validate()?;
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| TenantQueryError::Configuration {
                message: "global configuration already initialized".to_string(),
            })?;
        Ok(Self::global())
    }
}
