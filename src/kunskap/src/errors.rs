//! Error types for each step of an invocation.
//!
//! Every step returns its own typed error; [`PipelineError`] is what the
//! trigger handler matches on before logging and discarding it.

use std::path::PathBuf;

use query_engine::EngineError;
use thiserror::Error;

/// Problems with the configuration mapping.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting holds a table, array or other non-scalar value.
    #[error("setting '{key}' must be a string, number or boolean, found {kind}")]
    UnsupportedValue {
        /// Offending key.
        key: String,
        /// TOML type name of the value.
        kind: &'static str,
    },

    /// A key needed by the current code path is absent.
    #[error("missing configuration key '{0}'")]
    MissingKey(String),

    /// Several required keys are absent.
    #[error("missing configuration keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    /// A value is present but unusable.
    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Problems loading or rendering a SQL template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template file could not be read.
    #[error("failed to read SQL template {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The template names a placeholder with no configuration value.
    #[error("unknown placeholder '{{{name}}}' in SQL template")]
    UnknownPlaceholder {
        /// Placeholder name without braces.
        name: String,
    },

    /// Braces that do not form a placeholder or an escape.
    #[error("malformed SQL template at byte {offset}: {reason}")]
    Malformed {
        /// Byte offset of the offending brace.
        offset: usize,
        /// Short description.
        reason: &'static str,
    },
}

/// Failure of the view-upsert step.
#[derive(Debug, Error)]
pub enum ViewError {
    /// Configuration lookup failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Template load or render failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The query engine rejected a call.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Failure of the transformation step.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Configuration lookup failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Template load or render failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The query engine rejected a call or the job failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Failure of one invocation; the first failing step aborts the rest.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The view could not be created or updated.
    #[error("view upsert failed: {0}")]
    View(#[from] ViewError),
    /// The transformation query could not be run.
    #[error("transformation failed: {0}")]
    Transform(#[from] TransformError),
}
