//! Configuration management.
//!
//! A deployment picks exactly one backend. The choice and its settings come
//! from TOML:
//!
//! ```toml
//! backend = "relational"
//!
//! [relational]
//! uri = "data/app.db"
//! table = "books"
//! pool_size = 4
//! columns = [
//!     { name = "title", type = "TEXT" },
//!     { name = "year", type = "INTEGER" },
//! ]
//!
//! [logging]
//! format = "json"
//! ```

use crate::observability::LoggingConfig;
use crate::storage::{
    Adapter, DocumentAdapter, DocumentConfig, EmbeddedAdapter, EmbeddedConfig, RelationalAdapter,
    RelationalConfig,
};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process indexed store.
    Embedded,
    /// Remote document store.
    Document,
    /// Pooled relational engine.
    Relational,
}

impl BackendKind {
    /// Returns the configuration table name for this backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Document => "document",
            Self::Relational => "relational",
        }
    }
}

/// Storage configuration: the selected backend plus per-backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which backend [`Self::build_adapter`] constructs.
    pub backend: BackendKind,
    /// Embedded store settings.
    #[serde(default)]
    pub embedded: Option<EmbeddedConfig>,
    /// Document store settings.
    #[serde(default)]
    pub document: Option<DocumentConfig>,
    /// Relational store settings.
    #[serde(default)]
    pub relational: Option<RelationalConfig>,
    /// Logging settings for hosts that use [`crate::observability::init_logging`].
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StorageConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the text is not valid TOML or
    /// does not match the configuration schema.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            target: "config".to_string(),
            cause: e.to_string(),
        })
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            target: path.display().to_string(),
            cause: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Constructs the selected adapter. It still needs [`Adapter::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the selected backend has no settings table.
    pub fn build_adapter(&self) -> Result<Box<dyn Adapter>> {
        let missing = || {
            Error::InvalidInput(format!(
                "backend '{}' selected but [{}] is not configured",
                self.backend.as_str(),
                self.backend.as_str()
            ))
        };
        let adapter: Box<dyn Adapter> = match self.backend {
            BackendKind::Embedded => Box::new(EmbeddedAdapter::new(
                self.embedded.clone().ok_or_else(missing)?,
            )),
            BackendKind::Document => Box::new(DocumentAdapter::new(
                self.document.clone().ok_or_else(missing)?,
            )),
            BackendKind::Relational => Box::new(RelationalAdapter::new(
                self.relational.clone().ok_or_else(missing)?,
            )),
        };
        tracing::debug!(backend = adapter.backend(), "storage adapter configured");
        Ok(adapter)
    }
}
