//! Submit-and-wait helpers for query jobs.

use std::time::Duration;

use tracing::debug;

use crate::engine::QueryEngine;
use crate::errors::{EngineError, JobFailedSnafu};
use crate::models::{Job, QueryJobConfig};

/// How often [`run_query`] re-reads a running job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Submits `sql` and blocks until the engine reports the job as done.
///
/// There is no timeout and no retry: the call returns when the job finishes or
/// when a request to the engine fails. A finished job that carries an error
/// result is turned into [`EngineError::JobFailed`].
pub async fn run_query(
    engine: &dyn QueryEngine,
    sql: &str,
    config: &QueryJobConfig,
    poll: PollPolicy,
) -> Result<Job, EngineError> {
    let mut job = engine.insert_query_job(sql, config).await?;
    debug!(job_id = %job.id(), "query job submitted");

    while !job.status.is_done() {
        tokio::time::sleep(poll.interval).await;
        job = engine.get_job(&job.job_reference).await?;
        debug!(job_id = %job.id(), state = ?job.status.state, "polled query job");
    }

    if let Some(err) = &job.status.error_result {
        return JobFailedSnafu {
            job_id: job.id(),
            reason: err.reason.as_str(),
            message: err.message.as_str(),
        }
        .fail();
    }

    Ok(job)
}
