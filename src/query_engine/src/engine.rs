//! The query-engine abstraction.
//!
//! [`QueryEngine`] is the only surface the refresher needs from the managed
//! warehouse: dataset lookup, table listing, view create/patch, and query jobs.
//! It is object safe, so callers hold it as `Arc<dyn QueryEngine>` and choose
//! the concrete engine at startup.
//!
//! # Example
//!
//! ```rust
//! use query_engine::QueryEngine;
//! use query_engine::memory::InMemoryEngine;
//! use query_engine::models::DatasetReference;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ds = DatasetReference::new("billing", "audit_logs");
//! let engine = InMemoryEngine::new().with_dataset(ds.clone());
//! let engine: &dyn QueryEngine = &engine;
//! assert!(engine.list_tables(&ds).await.unwrap().is_empty());
//! # }
//! ```

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::{
    Dataset, DatasetReference, Job, JobReference, QueryJobConfig, Table, TableReference,
};

/// Operations the refresher performs against a managed query engine.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Fetches dataset metadata. Fails with [`EngineError::NotFound`] when the
    /// dataset does not exist.
    async fn get_dataset(&self, dataset: &DatasetReference) -> Result<Dataset, EngineError>;

    /// Lists every table and view in `dataset`, following pagination.
    async fn list_tables(
        &self,
        dataset: &DatasetReference,
    ) -> Result<Vec<TableReference>, EngineError>;

    /// Creates a table or view. Fails with [`EngineError::AlreadyExists`] on a
    /// name collision.
    async fn create_table(&self, table: &Table) -> Result<Table, EngineError>;

    /// Replaces only the query text of an existing view.
    async fn update_view_query(
        &self,
        view: &TableReference,
        query: &str,
    ) -> Result<Table, EngineError>;

    /// Submits a query job and returns as soon as the engine has accepted it.
    async fn insert_query_job(
        &self,
        sql: &str,
        config: &QueryJobConfig,
    ) -> Result<Job, EngineError>;

    /// Fetches the current state of a job.
    async fn get_job(&self, job: &JobReference) -> Result<Job, EngineError>;
}
