//! Local timer trigger.
//!
//! In production a scheduler publishes to a topic and the push subscription
//! hits [`crate::server`]. For local operation the same cadence can be driven
//! in-process with a cron expression (six fields, seconds first).

use std::sync::Arc;

use chrono::Utc;
use query_engine::QueryEngine;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::info;

use crate::{
    config::Config,
    handler::{EventContext, TriggerEvent, handle_trigger},
};

/// Event type reported for cron-driven invocations.
pub const SCHEDULE_EVENT_TYPE: &str = "kunskap.schedule";

/// Failures setting up or tearing down the scheduler.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The scheduler rejected the cron expression or failed to run.
    #[error("scheduler error: {0:?}")]
    Scheduler(JobSchedulerError),
    /// Waiting for Ctrl-C failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl From<JobSchedulerError> for ScheduleError {
    fn from(err: JobSchedulerError) -> Self {
        ScheduleError::Scheduler(err)
    }
}

/// Builds the cron job that invokes [`handle_trigger`].
pub fn scheduled_job(
    cron: &str,
    engine: Arc<dyn QueryEngine>,
    config: Arc<Config>,
) -> Result<Job, ScheduleError> {
    let job = Job::new_async(cron, move |uuid, _scheduler| {
        let engine = Arc::clone(&engine);
        let config = Arc::clone(&config);
        Box::pin(async move {
            let context = EventContext {
                event_id: Some(uuid.to_string()),
                timestamp: Some(Utc::now()),
                event_type: Some(SCHEDULE_EVENT_TYPE.to_string()),
                resource: None,
            };
            handle_trigger(engine.as_ref(), &config, &TriggerEvent::default(), &context).await;
        })
    })?;
    Ok(job)
}

/// Runs invocations on `cron` until Ctrl-C.
pub async fn run(
    cron: &str,
    engine: Arc<dyn QueryEngine>,
    config: Arc<Config>,
) -> Result<(), ScheduleError> {
    let mut scheduler = JobScheduler::new().await?;
    scheduler.add(scheduled_job(cron, engine, config)?).await?;
    scheduler.start().await?;
    info!(%cron, "scheduler started");

    tokio::signal::ctrl_c().await?;
    info!("shutting down scheduler");
    scheduler.shutdown().await?;
    Ok(())
}
