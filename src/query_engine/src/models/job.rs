use serde::{Deserialize, Serialize};

use crate::models::{JobReference, TableReference};

/// What happens to existing rows in the destination table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    /// Discard the destination's contents before writing.
    WriteTruncate,
    /// Add rows to the destination.
    WriteAppend,
    /// Fail unless the destination is empty.
    WriteEmpty,
}

/// Whether the job may create a missing destination table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    #[default]
    CreateIfNeeded,
    CreateNever,
}

/// Partition granularity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionType {
    Hour,
    #[default]
    Day,
    Month,
    Year,
}

/// Time-based partitioning of a table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePartitioning {
    #[serde(rename = "type", default)]
    pub kind: PartitionType,
    /// Column to partition on. `None` partitions on ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Partition lifetime. `None` means partitions never expire.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::models::int64_string"
    )]
    pub expiration_ms: Option<i64>,
}

impl TimePartitioning {
    /// Daily partitions on `field` that never expire.
    pub fn daily_on(field: impl Into<String>) -> Self {
        Self {
            kind: PartitionType::Day,
            field: Some(field.into()),
            expiration_ms: None,
        }
    }
}

/// Destination and write behaviour for a query job.
///
/// Serialized as the `configuration.query` block of a job insert, minus the
/// query text itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJobConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_table: Option<TableReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_disposition: Option<CreateDisposition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_partitioning: Option<TimePartitioning>,
    #[serde(default)]
    pub use_legacy_sql: bool,
}

/// Lifecycle state of a job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Done,
}

/// Error detail attached to a failed job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub state: JobState,
    /// Set once a `DONE` job has failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
    /// Non-fatal errors are listed here too.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_reference: JobReference,
    #[serde(default)]
    pub status: JobStatus,
}

impl Job {
    pub fn id(&self) -> &str {
        &self.job_reference.job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispositions_use_api_spelling() {
        assert_eq!(
            serde_json::to_value(WriteDisposition::WriteTruncate).unwrap(),
            "WRITE_TRUNCATE"
        );
        assert_eq!(
            serde_json::to_value(CreateDisposition::CreateIfNeeded).unwrap(),
            "CREATE_IF_NEEDED"
        );
    }

    #[test]
    fn partitioning_without_expiration_omits_the_field() {
        let json = serde_json::to_value(TimePartitioning::daily_on("usage_start_time")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "DAY", "field": "usage_start_time" })
        );
    }

    #[test]
    fn expiration_is_read_from_int64_string() {
        let tp: TimePartitioning = serde_json::from_value(serde_json::json!({
            "type": "DAY",
            "expirationMs": "86400000"
        }))
        .unwrap();
        assert_eq!(tp.expiration_ms, Some(86_400_000));
        assert_eq!(tp.field, None);
    }

    #[test]
    fn done_job_with_error_result_parses() {
        let job: Job = serde_json::from_value(serde_json::json!({
            "jobReference": { "projectId": "p", "jobId": "j1", "location": "EU" },
            "status": {
                "state": "DONE",
                "errorResult": { "reason": "invalidQuery", "message": "Syntax error" },
                "errors": [{ "reason": "invalidQuery", "message": "Syntax error" }]
            }
        }))
        .unwrap();

        assert!(job.status.is_done());
        assert_eq!(job.id(), "j1");
        assert_eq!(job.status.error_result.unwrap().reason, "invalidQuery");
    }
}
