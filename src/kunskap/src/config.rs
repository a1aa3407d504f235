//! Invocation configuration: a flat, immutable mapping of named settings.
//!
//! The mapping is loaded once at process start from a TOML file whose top
//! level is a flat table of scalars, then overlaid with `KUNSKAP_<KEY>`
//! environment variables. Every value is kept as a string because the same
//! mapping feeds the SQL template placeholders.
//!
//! ```toml
//! billing_project_id = "acme-billing"
//! audit_logs_dataset_id = "audit_logs"
//! audit_logs_view_name = "commitment_usage_view"
//! output_dataset_id = "billing_out"
//! output_table_name = "commitment_cost"
//! create_view_sql_path = "sql/create_view.sql"
//! create_output_table_sql_file_path = "sql/create_output_table.sql"
//! ```
//!
//! Keys are only checked when a code path needs them ([`Config::require`]);
//! [`Config::validate`] checks the whole required set up front.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use indexmap::IndexMap;
use shared_utils::env::strip_prefixed_key;
use tracing::debug;

use crate::errors::ConfigError;

/// Environment variables with this prefix override file settings.
pub const ENV_PREFIX: &str = "KUNSKAP_";

/// Partition column used when `partition_field` is not configured.
pub const DEFAULT_PARTITION_FIELD: &str = "usage_start_time";

/// Job poll interval used when `job_poll_interval_ms` is not configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Well-known setting names.
pub mod keys {
    /// Project that owns the datasets and is billed for query jobs.
    pub const BILLING_PROJECT_ID: &str = "billing_project_id";
    /// Dataset holding the exported audit logs and the view.
    pub const AUDIT_LOGS_DATASET_ID: &str = "audit_logs_dataset_id";
    /// Name of the view over the audit logs.
    pub const AUDIT_LOGS_VIEW_NAME: &str = "audit_logs_view_name";
    /// Dataset receiving the transformation output.
    pub const OUTPUT_DATASET_ID: &str = "output_dataset_id";
    /// Table receiving the transformation output.
    pub const OUTPUT_TABLE_NAME: &str = "output_table_name";
    /// Path of the view-definition SQL template.
    pub const CREATE_VIEW_SQL_PATH: &str = "create_view_sql_path";
    /// Path of the transformation SQL template.
    pub const CREATE_OUTPUT_TABLE_SQL_FILE_PATH: &str = "create_output_table_sql_file_path";
    /// Timestamp column the output table is partitioned on.
    pub const PARTITION_FIELD: &str = "partition_field";
    /// Location query jobs run in (`US`, `EU`, a region).
    pub const LOCATION: &str = "location";
    /// Milliseconds between job status polls.
    pub const JOB_POLL_INTERVAL_MS: &str = "job_poll_interval_ms";

    /// Keys without which no invocation can succeed.
    pub const REQUIRED: [&str; 7] = [
        BILLING_PROJECT_ID,
        AUDIT_LOGS_DATASET_ID,
        AUDIT_LOGS_VIEW_NAME,
        OUTPUT_DATASET_ID,
        OUTPUT_TABLE_NAME,
        CREATE_VIEW_SQL_PATH,
        CREATE_OUTPUT_TABLE_SQL_FILE_PATH,
    ];
}

/// Immutable, ordered settings for one process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    vars: IndexMap<String, String>,
    base_dir: Option<PathBuf>,
}

impl Config {
    /// Builds a config from key/value pairs; later pairs win.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            base_dir: None,
        }
    }

    /// Parses a flat TOML table. Strings are taken verbatim; integers, floats
    /// and booleans are stringified; anything else is rejected.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(text)?;

        let mut vars = IndexMap::with_capacity(table.len());
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(ConfigError::UnsupportedValue {
                        key,
                        kind: other.type_str(),
                    });
                }
            };
            vars.insert(key, value);
        }

        Ok(Self {
            vars,
            base_dir: None,
        })
    }

    /// Reads and parses a TOML file. Relative template paths in it resolve
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml_str(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        debug!(path = %path.display(), settings = config.vars.len(), "loaded config");
        Ok(config)
    }

    /// Overlays `KUNSKAP_*` variables from `vars` (name, value) onto the
    /// mapping. Blank values are ignored.
    pub fn with_overrides(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in vars {
            let Some(key) = strip_prefixed_key(ENV_PREFIX, &name) else {
                continue;
            };
            // KUNSKAP_CONFIG names the file itself, not a setting.
            if key == "config" || value.trim().is_empty() {
                continue;
            }
            self.vars.insert(key, value);
        }
        self
    }

    /// [`Config::with_overrides`] applied to the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(std::env::vars())
    }

    /// Overrides the directory relative paths resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Optional lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Mandatory lookup; a missing key fails the calling code path.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// A required path setting, resolved against the config file directory
    /// when relative.
    pub fn resolve_path(&self, key: &str) -> Result<PathBuf, ConfigError> {
        let raw = Path::new(self.require(key)?);
        Ok(match &self.base_dir {
            Some(base) if raw.is_relative() => base.join(raw),
            _ => raw.to_path_buf(),
        })
    }

    /// Timestamp column for output partitioning.
    pub fn partition_field(&self) -> &str {
        self.get(keys::PARTITION_FIELD)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_PARTITION_FIELD)
    }

    /// Job location, if pinned.
    pub fn location(&self) -> Option<&str> {
        self.get(keys::LOCATION).filter(|l| !l.trim().is_empty())
    }

    /// Interval between job status polls.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        let Some(raw) = self.get(keys::JOB_POLL_INTERVAL_MS) else {
            return Ok(DEFAULT_POLL_INTERVAL);
        };
        match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
            Ok(_) => Err(ConfigError::InvalidValue {
                key: keys::JOB_POLL_INTERVAL_MS.to_string(),
                value: raw.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            Err(e) => Err(ConfigError::InvalidValue {
                key: keys::JOB_POLL_INTERVAL_MS.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Checks that every key in [`keys::REQUIRED`] is present and that
    /// optional typed settings parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<String> = keys::REQUIRED
            .iter()
            .filter(|k| self.get(k).is_none())
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }
        self.poll_interval()?;
        Ok(())
    }

    /// All settings in file order, overrides appended.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
