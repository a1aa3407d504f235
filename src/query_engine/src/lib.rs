//! Query-engine seam for the billing view refresher.
//!
//! [`QueryEngine`](engine::QueryEngine) is the one interface the job talks to.
//! Two implementations ship with the crate:
//!
//! - [`BigQueryClient`](bigquery::BigQueryClient), a thin REST client over the
//!   BigQuery v2 API, authenticated with application-default credentials.
//! - [`InMemoryEngine`](memory::InMemoryEngine), a recording fake used by tests
//!   and dry runs.
//!
//! [`jobs::run_query`] layers the submit-then-wait behaviour on top of any
//! engine.

pub mod bigquery;
pub mod engine;
pub mod errors;
pub mod jobs;
pub mod memory;
pub mod models;

pub use engine::QueryEngine;
pub use errors::{ClientInitError, EngineError};
