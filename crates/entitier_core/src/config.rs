//! Runtime configuration for the service, the SQLite collaborator and logging.
//!
//! # Responsibility
//! - Define serde-deserializable settings with working defaults.
//! - Load settings from JSON text or files.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.

use crate::dal::sqlite::FOREIGN_KEY_VIOLATION_CODE;
use crate::logging::default_log_level;
use crate::mapper::Projection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default output parameter name carrying generated identifiers.
pub const DEFAULT_ID_RETURN_NAME: &str = "ID";
/// SQL Server error number for a delete blocked by a foreign key.
pub const SQL_SERVER_REFERENCE_CONSTRAINT_CODE: &str = "547";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Procedure service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name handed to the collaborator for generated-id retrieval.
    pub id_return_name: String,
    /// Collaborator error code reported as a referential-integrity violation.
    pub referential_integrity_code: String,
    pub projection: Projection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            id_return_name: DEFAULT_ID_RETURN_NAME.to_string(),
            referential_integrity_code: SQL_SERVER_REFERENCE_CONSTRAINT_CODE.to_string(),
            projection: Projection::Tolerant,
        }
    }
}

impl ServiceConfig {
    /// Defaults tuned for `SqliteDataAccess` error codes.
    pub fn sqlite() -> Self {
        Self {
            referential_integrity_code: FOREIGN_KEY_VIOLATION_CODE.to_string(),
            ..Self::default()
        }
    }
}

/// SQLite collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    /// Procedure name -> SQL statement.
    pub procedures: BTreeMap<String, String>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
            procedures: BTreeMap::new(),
        }
    }
}

/// Logging bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: String,
}

fn default_level() -> String {
    default_log_level().to_string()
}

impl LoggingConfig {
    pub fn new(log_dir: impl Into<String>) -> Self {
        Self {
            level: default_level(),
            log_dir: log_dir.into(),
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitierConfig {
    pub service: ServiceConfig,
    pub sqlite: SqliteConfig,
    pub logging: Option<LoggingConfig>,
}

impl EntitierConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}
