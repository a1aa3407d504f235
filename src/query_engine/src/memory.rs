//! In-memory [`QueryEngine`] that records every call.
//!
//! Jobs complete synchronously (optionally after a configurable number of
//! `RUNNING` polls) and their "contents" are the SQL text that produced them,
//! which is enough to observe truncate versus append semantics. Faults can be
//! injected per operation to exercise error paths.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::{
    engine::QueryEngine,
    errors::{AlreadyExistsSnafu, ApiSnafu, EngineError, NotFoundSnafu},
    models::{
        CreateDisposition, Dataset, DatasetReference, ErrorProto, Job, JobReference, JobState,
        JobStatus, QueryJobConfig, Table, TableReference, WriteDisposition,
    },
};

const MEMORY_PROJECT: &str = "in-memory";

/// Operations exposed by [`QueryEngine`], used to target injected faults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    GetDataset,
    ListTables,
    CreateTable,
    UpdateViewQuery,
    InsertQueryJob,
    GetJob,
}

/// One recorded call, in the order it reached the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
    GetDataset(DatasetReference),
    ListTables(DatasetReference),
    CreateTable(TableReference),
    UpdateViewQuery(TableReference),
    InsertQueryJob(String),
    GetJob(String),
}

impl EngineCall {
    pub fn operation(&self) -> Operation {
        match self {
            EngineCall::GetDataset(_) => Operation::GetDataset,
            EngineCall::ListTables(_) => Operation::ListTables,
            EngineCall::CreateTable(_) => Operation::CreateTable,
            EngineCall::UpdateViewQuery(_) => Operation::UpdateViewQuery,
            EngineCall::InsertQueryJob(_) => Operation::InsertQueryJob,
            EngineCall::GetJob(_) => Operation::GetJob,
        }
    }
}

/// A query job as it was submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedJob {
    pub job_id: String,
    pub sql: String,
    pub config: QueryJobConfig,
}

/// A stored table: its metadata plus one entry per write that landed in it.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredTable {
    pub table: Table,
    pub contents: Vec<String>,
}

#[derive(Default)]
struct State {
    datasets: IndexMap<DatasetReference, IndexMap<String, StoredTable>>,
    calls: Vec<EngineCall>,
    faults: HashMap<Operation, String>,
    submitted: Vec<SubmittedJob>,
    jobs: HashMap<String, (Job, u32)>,
    pending_polls: u32,
}

/// Recording fake engine. Cheap to construct; share it behind an `Arc`.
#[derive(Default)]
pub struct InMemoryEngine {
    state: Mutex<State>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`InMemoryEngine::add_dataset`].
    pub fn with_dataset(self, dataset: DatasetReference) -> Self {
        self.add_dataset(dataset);
        self
    }

    pub fn add_dataset(&self, dataset: DatasetReference) {
        self.state().datasets.entry(dataset).or_default();
    }

    /// Jobs report `RUNNING` for this many `get_job` polls before finishing.
    pub fn with_pending_polls(self, polls: u32) -> Self {
        self.state().pending_polls = polls;
        self
    }

    /// Makes the next call to `op` fail with an API error carrying `message`.
    /// The fault is consumed by that call.
    pub fn fail_next(&self, op: Operation, message: impl Into<String>) {
        self.state().faults.insert(op, message.into());
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    /// Number of calls received for `op`.
    pub fn call_count(&self, op: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == op)
            .count()
    }

    /// Query jobs in submission order.
    pub fn submitted_jobs(&self) -> Vec<SubmittedJob> {
        self.state().submitted.clone()
    }

    pub fn table(&self, reference: &TableReference) -> Option<StoredTable> {
        self.state()
            .datasets
            .get(&reference.dataset())
            .and_then(|tables| tables.get(&reference.table_id))
            .cloned()
    }

    /// Table ids in `dataset`, in creation order.
    pub fn table_ids(&self, dataset: &DatasetReference) -> Vec<String> {
        self.state()
            .datasets
            .get(dataset)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `call` and fires any fault armed for its operation.
    fn enter(&self, call: EngineCall) -> Result<MutexGuard<'_, State>, EngineError> {
        let mut state = self.state();
        let op = call.operation();
        state.calls.push(call);
        if let Some(message) = state.faults.remove(&op) {
            return ApiSnafu {
                status: 500u16,
                message,
            }
            .fail();
        }
        Ok(state)
    }
}

impl State {
    fn tables_mut(
        &mut self,
        dataset: &DatasetReference,
    ) -> Result<&mut IndexMap<String, StoredTable>, EngineError> {
        self.datasets.get_mut(dataset).ok_or_else(|| {
            NotFoundSnafu {
                resource: format!("Dataset {dataset}"),
            }
            .build()
        })
    }

    /// Applies a finished query to its destination; returns the error a real
    /// engine would attach to the job.
    fn write_destination(&mut self, sql: &str, config: &QueryJobConfig) -> Option<ErrorProto> {
        let destination = config.destination_table.as_ref()?;
        let tables = match self.datasets.get_mut(&destination.dataset()) {
            Some(tables) => tables,
            None => {
                return Some(ErrorProto {
                    reason: "notFound".into(),
                    location: None,
                    message: format!("Not found: Dataset {}", destination.dataset()),
                });
            }
        };

        if !tables.contains_key(&destination.table_id) {
            if config.create_disposition == Some(CreateDisposition::CreateNever) {
                return Some(ErrorProto {
                    reason: "notFound".into(),
                    location: None,
                    message: format!("Not found: Table {destination}"),
                });
            }
            let mut table = Table::new(destination.clone());
            table.time_partitioning = config.time_partitioning.clone();
            tables.insert(
                destination.table_id.clone(),
                StoredTable {
                    table,
                    contents: Vec::new(),
                },
            );
        }

        let Some(stored) = tables.get_mut(&destination.table_id) else {
            return None;
        };
        match config.write_disposition.unwrap_or(WriteDisposition::WriteEmpty) {
            WriteDisposition::WriteTruncate => {
                stored.contents.clear();
                stored.table.time_partitioning = config.time_partitioning.clone();
            }
            WriteDisposition::WriteAppend => {}
            WriteDisposition::WriteEmpty if stored.contents.is_empty() => {}
            WriteDisposition::WriteEmpty => {
                return Some(ErrorProto {
                    reason: "duplicate".into(),
                    location: None,
                    message: format!("Already Exists: Table {destination}"),
                });
            }
        }
        stored.contents.push(sql.to_string());
        None
    }
}

#[async_trait]
impl QueryEngine for InMemoryEngine {
    async fn get_dataset(&self, dataset: &DatasetReference) -> Result<Dataset, EngineError> {
        let state = self.enter(EngineCall::GetDataset(dataset.clone()))?;
        if !state.datasets.contains_key(dataset) {
            return NotFoundSnafu {
                resource: format!("Dataset {dataset}"),
            }
            .fail();
        }
        Ok(Dataset {
            dataset_reference: dataset.clone(),
            location: None,
        })
    }

    async fn list_tables(
        &self,
        dataset: &DatasetReference,
    ) -> Result<Vec<TableReference>, EngineError> {
        let mut state = self.enter(EngineCall::ListTables(dataset.clone()))?;
        let tables = state.tables_mut(dataset)?;
        Ok(tables.keys().map(|id| dataset.table(id.as_str())).collect())
    }

    async fn create_table(&self, table: &Table) -> Result<Table, EngineError> {
        let reference = &table.table_reference;
        let mut state = self.enter(EngineCall::CreateTable(reference.clone()))?;
        let tables = state.tables_mut(&reference.dataset())?;
        if tables.contains_key(&reference.table_id) {
            return AlreadyExistsSnafu {
                resource: format!("Table {reference}"),
            }
            .fail();
        }

        let mut created = table.clone();
        created.kind = Some(if table.view.is_some() { "VIEW" } else { "TABLE" }.to_string());
        tables.insert(
            reference.table_id.clone(),
            StoredTable {
                table: created.clone(),
                contents: Vec::new(),
            },
        );
        Ok(created)
    }

    async fn update_view_query(
        &self,
        view: &TableReference,
        query: &str,
    ) -> Result<Table, EngineError> {
        let mut state = self.enter(EngineCall::UpdateViewQuery(view.clone()))?;
        let tables = state.tables_mut(&view.dataset())?;
        let stored = tables.get_mut(&view.table_id).ok_or_else(|| {
            NotFoundSnafu {
                resource: format!("Table {view}"),
            }
            .build()
        })?;

        match stored.table.view.as_mut() {
            Some(definition) => definition.query = query.to_string(),
            None => {
                return ApiSnafu {
                    status: 400u16,
                    message: format!("{view} is not a view"),
                }
                .fail();
            }
        }
        Ok(stored.table.clone())
    }

    async fn insert_query_job(
        &self,
        sql: &str,
        config: &QueryJobConfig,
    ) -> Result<Job, EngineError> {
        let job_id = format!("job_{}", self.state().submitted.len() + 1);

        let mut state = self.enter(EngineCall::InsertQueryJob(job_id.clone()))?;
        state.submitted.push(SubmittedJob {
            job_id: job_id.clone(),
            sql: sql.to_string(),
            config: config.clone(),
        });

        let error_result = state.write_destination(sql, config);
        let pending = state.pending_polls;
        let job = Job {
            job_reference: JobReference {
                project_id: MEMORY_PROJECT.to_string(),
                job_id: job_id.clone(),
                location: None,
            },
            status: JobStatus {
                state: if pending == 0 {
                    JobState::Done
                } else {
                    JobState::Running
                },
                errors: error_result.iter().cloned().collect(),
                error_result,
            },
        };

        state.jobs.insert(job_id, (job.clone(), pending));
        if pending > 0 {
            let mut running = job;
            running.status.error_result = None;
            running.status.errors.clear();
            return Ok(running);
        }
        Ok(job)
    }

    async fn get_job(&self, job: &JobReference) -> Result<Job, EngineError> {
        let mut state = self.enter(EngineCall::GetJob(job.job_id.clone()))?;
        let (stored, remaining) = state.jobs.get_mut(&job.job_id).ok_or_else(|| {
            NotFoundSnafu {
                resource: format!("Job {}", job.job_id),
            }
            .build()
        })?;

        if *remaining > 0 {
            *remaining -= 1;
        }
        if *remaining == 0 {
            stored.status.state = JobState::Done;
            return Ok(stored.clone());
        }

        let mut running = stored.clone();
        running.status.state = JobState::Running;
        running.status.error_result = None;
        running.status.errors.clear();
        Ok(running)
    }
}
