//! Data-context configuration.
//!
//! Settings arrive as string key/value pairs from an external source. The keys
//! understood here:
//!
//! | key | meaning |
//! |---|---|
//! | `CommitMode` | `"0"` caller-controlled, `"1"` immediate (required) |
//! | `Dialect` | relational dialect code, see [`Dialect::from_code`] (required) |
//! | `ConnectionStringKey` | name of the connection string (required) |
//! | `ConnectionStrings:<name>` | the connection string itself (required) |
//! | `TablePrefix` | prefix prepended to every table name (optional) |
//! | `CollectionPrefix` | prefix for document collections (optional) |

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::{Error, Result};

pub const COMMIT_MODE_KEY: &str = "CommitMode";
pub const DIALECT_KEY: &str = "Dialect";
pub const CONNECTION_STRING_KEY: &str = "ConnectionStringKey";
pub const CONNECTION_STRINGS_SECTION: &str = "ConnectionStrings";
pub const TABLE_PREFIX_KEY: &str = "TablePrefix";
pub const COLLECTION_PREFIX_KEY: &str = "CollectionPrefix";

/// A read-only source of string settings.
pub trait SettingsSource {
    fn setting(&self, key: &str) -> Option<String>;

    /// Like [`setting`](Self::setting), failing with `ConfigurationMissing`.
    fn required(&self, key: &str) -> Result<String> {
        self.setting(key).ok_or_else(|| Error::config_missing(key))
    }
}

impl SettingsSource for HashMap<String, String> {
    fn setting(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl SettingsSource for BTreeMap<String, String> {
    fn setting(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Settings read from the process environment.
///
/// A key such as `ConnectionStrings:main` is looked up as
/// `<prefix>ConnectionStrings__main`.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    prefix: String,
}

impl EnvSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider variables starting with `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace(':', "__"))
    }
}

impl SettingsSource for EnvSettings {
    fn setting(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

/// When changes become durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CommitMode {
    /// Every operation runs on its own connection, closed when it returns.
    #[default]
    Immediate,
    /// Operations open transactions that stay pending until `commit`/`rollback`.
    CallerControlled,
}

impl CommitMode {
    /// Parse the `CommitMode` setting.
    pub fn parse(flag: &str) -> Result<Self> {
        match flag.trim() {
            "1" => Ok(CommitMode::Immediate),
            "0" => Ok(CommitMode::CallerControlled),
            other => Err(Error::config_missing(format!(
                "{} (unrecognized value `{}`)",
                COMMIT_MODE_KEY, other
            ))),
        }
    }

    pub const fn is_immediate(self) -> bool {
        matches!(self, CommitMode::Immediate)
    }
}

/// Configuration for a relational data context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextConfig {
    /// Commit mode (default: immediate)
    pub commit_mode: CommitMode,
    /// SQL dialect
    pub dialect: Dialect,
    /// Resolved connection string
    #[serde(skip_serializing)]
    pub connection_string: String,
    /// Prefix prepended to every table name
    pub table_prefix: String,
}

impl ContextConfig {
    /// Create a configuration with immediate commits and no table prefix.
    pub fn new(dialect: Dialect, connection_string: impl Into<String>) -> Self {
        Self {
            commit_mode: CommitMode::Immediate,
            dialect,
            connection_string: connection_string.into(),
            table_prefix: String::new(),
        }
    }

    /// Set the commit mode.
    pub fn commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    /// Set the table prefix.
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Read the configuration from string settings.
    pub fn from_settings(settings: &impl SettingsSource) -> Result<Self> {
        let commit_mode = CommitMode::parse(&settings.required(COMMIT_MODE_KEY)?)?;
        let dialect = Dialect::parse_code(&settings.required(DIALECT_KEY)?)?;
        let name = settings.required(CONNECTION_STRING_KEY)?;
        let connection_string =
            settings.required(&format!("{}:{}", CONNECTION_STRINGS_SECTION, name))?;
        let table_prefix = settings.setting(TABLE_PREFIX_KEY).unwrap_or_default();

        Ok(Self {
            commit_mode,
            dialect,
            connection_string,
            table_prefix,
        })
    }

    /// Full table name for an unprefixed entity table.
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }
}

/// Configuration for a document data context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentConfig {
    /// Prefix prepended to every collection name
    pub collection_prefix: String,
}

impl DocumentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collection prefix.
    pub fn collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.collection_prefix = prefix.into();
        self
    }

    /// Read the configuration from string settings.
    pub fn from_settings(settings: &impl SettingsSource) -> Self {
        Self {
            collection_prefix: settings.setting(COLLECTION_PREFIX_KEY).unwrap_or_default(),
        }
    }

    /// Full collection name for an unprefixed entity table.
    pub fn collection_name(&self, table: &str) -> String {
        format!("{}{}", self.collection_prefix, table)
    }
}
