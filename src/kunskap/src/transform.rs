//! Runs the aggregation query into the partitioned output table.

use query_engine::{
    QueryEngine,
    jobs::{PollPolicy, run_query},
    models::{
        CreateDisposition, DatasetReference, Job, QueryJobConfig, TableReference,
        TimePartitioning, WriteDisposition,
    },
};
use tracing::info;

use crate::{
    config::{Config, keys},
    errors::TransformError,
    template::SqlTemplate,
};

/// Job settings for the transformation: replace the destination's contents
/// and partition it daily on `partition_field`, with no partition expiry.
pub fn build_job_config(destination: TableReference, partition_field: &str) -> QueryJobConfig {
    QueryJobConfig {
        destination_table: Some(destination),
        write_disposition: Some(WriteDisposition::WriteTruncate),
        create_disposition: Some(CreateDisposition::CreateIfNeeded),
        time_partitioning: Some(TimePartitioning::daily_on(partition_field)),
        use_legacy_sql: false,
    }
}

/// Executes the transformation query and waits for it to finish.
///
/// Returns the finished job. Any failure, including a job that completes
/// with an error, is returned to the caller without retrying; the output
/// table keeps its previous contents in that case.
pub async fn execute_transformation_query(
    engine: &dyn QueryEngine,
    config: &Config,
) -> Result<Job, TransformError> {
    let dataset_ref = DatasetReference::new(
        config.require(keys::BILLING_PROJECT_ID)?,
        config.require(keys::OUTPUT_DATASET_ID)?,
    );
    let table_name = config.require(keys::OUTPUT_TABLE_NAME)?;

    let dataset = engine.get_dataset(&dataset_ref).await?;
    let table_ref = dataset.dataset_reference.table(table_name);
    let job_config = build_job_config(table_ref, config.partition_field());

    let sql = SqlTemplate::load(config.resolve_path(keys::CREATE_OUTPUT_TABLE_SQL_FILE_PATH)?)?
        .render(config)?;
    let poll = PollPolicy {
        interval: config.poll_interval()?,
    };

    info!("Attempting query on all dates...");
    let job = run_query(engine, &sql, &job_config, poll).await?;
    info!("Transformation query complete. All partitions are updated.");
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_config_always_truncates() {
        let dest = DatasetReference::new("p", "out").table("costs");
        let cfg = build_job_config(dest.clone(), "usage_start_time");

        assert_eq!(cfg.write_disposition, Some(WriteDisposition::WriteTruncate));
        assert_ne!(cfg.write_disposition, Some(WriteDisposition::WriteAppend));
        assert_eq!(cfg.destination_table, Some(dest));
        assert!(!cfg.use_legacy_sql);
    }

    #[test]
    fn partitioning_has_field_and_no_expiration() {
        let cfg = build_job_config(DatasetReference::new("p", "o").table("t"), "event_ts");
        let tp = cfg.time_partitioning.unwrap();
        assert_eq!(tp.field.as_deref(), Some("event_ts"));
        assert_eq!(tp.expiration_ms, None);
    }
}
