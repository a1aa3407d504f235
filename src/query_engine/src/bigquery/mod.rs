//! BigQuery v2 REST implementation of [`QueryEngine`](crate::QueryEngine).

pub mod auth;
pub mod client;
mod wire;

pub use auth::{Auth, BIGQUERY_SCOPE};
pub use client::{BigQueryClient, BigQueryClientBuilder, DEFAULT_BASE_URL};
