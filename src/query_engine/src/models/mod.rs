//! Resource models shared by every engine implementation.
//!
//! Field names follow the REST representation (camelCase on the wire), so the
//! same structs serve as request bodies for
//! [`BigQueryClient`](crate::bigquery::BigQueryClient) and as plain values for
//! [`InMemoryEngine`](crate::memory::InMemoryEngine).

pub mod job;
pub mod reference;
pub mod table;

pub use job::{
    CreateDisposition, ErrorProto, Job, JobState, JobStatus, PartitionType, QueryJobConfig,
    TimePartitioning, WriteDisposition,
};
pub use reference::{DatasetReference, JobReference, TableReference};
pub use table::{Dataset, Table, ViewDefinition};

/// int64 fields travel as JSON strings in the REST API.
pub(crate) mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(i64),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Num(n)) => Ok(Some(n)),
            Some(Raw::Str(s)) => s.parse().map(Some).map_err(de::Error::custom),
        }
    }
}
