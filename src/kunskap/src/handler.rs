//! Trigger entry point.
//!
//! [`handle_trigger`] is what every trigger surface (Pub/Sub push, local
//! cron, one-shot CLI run) calls. It runs [`run_pipeline`] and contains all
//! failures in two domains:
//!
//! - inner: a [`PipelineError`] from either step is logged and discarded;
//! - outer: a panic anywhere in the invocation is caught and logged.
//!
//! Nothing is retried and nothing is returned to the host.

use std::{any::Any, panic::AssertUnwindSafe};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use indexmap::IndexMap;
use query_engine::{QueryEngine, models::Job};
use tracing::{debug, error, info};

use crate::{
    config::Config,
    errors::PipelineError,
    transform::execute_transformation_query,
    view::{ViewUpsert, upsert_view},
};

/// Event payload delivered by the trigger. Opaque to the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Raw message body.
    pub data: Vec<u8>,
    /// Message attributes.
    pub attributes: IndexMap<String, String>,
}

/// Metadata about the delivery. Only used for logging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventContext {
    /// Delivery id (Pub/Sub message id, scheduler job id, ...).
    pub event_id: Option<String>,
    /// When the event was published.
    pub timestamp: Option<DateTime<Utc>>,
    /// Kind of trigger, e.g. `google.pubsub.topic.publish`.
    pub event_type: Option<String>,
    /// Source resource, e.g. the subscription name.
    pub resource: Option<String>,
}

impl EventContext {
    /// Context for an operator-initiated run.
    pub fn manual() -> Self {
        Self {
            event_id: None,
            timestamp: Some(Utc::now()),
            event_type: Some("kunskap.manual".to_string()),
            resource: None,
        }
    }
}

/// What a successful invocation did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    /// Outcome of the view step.
    pub view: ViewUpsert,
    /// The finished transformation job.
    pub job: Job,
}

/// Runs the view upsert and then the transformation. The first error aborts
/// the remaining work; a view written before a failed transformation stays
/// written.
pub async fn run_pipeline(
    engine: &dyn QueryEngine,
    config: &Config,
) -> Result<PipelineReport, PipelineError> {
    let view = upsert_view(engine, config).await?;
    let job = execute_transformation_query(engine, config).await?;
    Ok(PipelineReport { view, job })
}

/// Handles one trigger event. Never fails and never panics outward.
pub async fn handle_trigger(
    engine: &dyn QueryEngine,
    config: &Config,
    event: &TriggerEvent,
    context: &EventContext,
) {
    let invocation = AssertUnwindSafe(async {
        let current_time = Utc::now();
        info!("Cloud Function was triggered on {current_time}");
        debug!(
            event_id = context.event_id.as_deref(),
            event_type = context.event_type.as_deref(),
            resource = context.resource.as_deref(),
            payload_bytes = event.data.len(),
            "trigger event"
        );

        match run_pipeline(engine, config).await {
            Ok(report) => debug!(
                view = %report.view.view(),
                job_id = report.job.id(),
                "invocation finished"
            ),
            Err(err) => error!("Transformation query failed due to {err}."),
        }
    });

    if let Err(panic) = invocation.catch_unwind().await {
        error!("{}", panic_message(panic.as_ref()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "invocation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let static_msg: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(static_msg.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "owned boom");
        assert_eq!(panic_message(other.as_ref()), "invocation panicked");
    }
}
