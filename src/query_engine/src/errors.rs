use snafu::{Backtrace, Snafu};

/// Errors that can occur while constructing an engine client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Application-default credentials could not be discovered.
    #[snafu(display("Failed to initialize Google credentials: {source}"))]
    Credentials {
        source: gcp_auth::Error,
        backtrace: Backtrace,
    },

    /// The builder was finished without a project to bill jobs to.
    #[snafu(display("A billing project id is required"))]
    MissingProject { backtrace: Backtrace },
}

/// Errors returned by [`QueryEngine`](crate::QueryEngine) operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    /// Transport-level failure (connect, timeout, body decode).
    #[snafu(display("API request failed: {source}"))]
    Http {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The addressed dataset, table or job does not exist.
    #[snafu(display("Not found: {resource}"))]
    NotFound {
        resource: String,
        backtrace: Backtrace,
    },

    /// A create call collided with an existing resource.
    #[snafu(display("Already exists: {resource}"))]
    AlreadyExists {
        resource: String,
        backtrace: Backtrace,
    },

    /// The engine answered with a non-success status.
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// An access token could not be obtained.
    #[snafu(display("Authentication failed: {message}"))]
    Auth {
        message: String,
        backtrace: Backtrace,
    },

    /// The query job finished with an error result (syntax, permission, quota...).
    #[snafu(display("Job {job_id} failed ({reason}): {message}"))]
    JobFailed {
        job_id: String,
        reason: String,
        message: String,
        backtrace: Backtrace,
    },
}

impl EngineError {
    /// True for [`EngineError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }
}
