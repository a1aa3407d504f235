//! Request and response envelopes that only exist on the wire.

use serde::{Deserialize, Serialize};

use crate::models::{JobReference, QueryJobConfig, TableReference};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableListResponse {
    #[serde(default)]
    pub tables: Vec<TableListEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableListEntry {
    pub table_reference: TableReference,
}

#[derive(Serialize, Debug)]
pub(crate) struct ViewPatch<'a> {
    pub view: ViewQueryPatch<'a>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewQueryPatch<'a> {
    pub query: &'a str,
    pub use_legacy_sql: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobInsertRequest<'a> {
    pub job_reference: JobReference,
    pub configuration: JobConfiguration<'a>,
}

#[derive(Serialize, Debug)]
pub(crate) struct JobConfiguration<'a> {
    pub query: QueryConfiguration<'a>,
}

#[derive(Serialize, Debug)]
pub(crate) struct QueryConfiguration<'a> {
    pub query: &'a str,
    #[serde(flatten)]
    pub config: &'a QueryJobConfig,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CreateDisposition, DatasetReference, TimePartitioning, WriteDisposition,
    };

    #[test]
    fn job_insert_body_matches_rest_shape() {
        let config = QueryJobConfig {
            destination_table: Some(DatasetReference::new("billing", "out").table("costs")),
            write_disposition: Some(WriteDisposition::WriteTruncate),
            create_disposition: Some(CreateDisposition::CreateIfNeeded),
            time_partitioning: Some(TimePartitioning::daily_on("usage_start_time")),
            use_legacy_sql: false,
        };
        let body = JobInsertRequest {
            job_reference: JobReference {
                project_id: "billing".into(),
                job_id: "kunskap_test".into(),
                location: Some("US".into()),
            },
            configuration: JobConfiguration {
                query: QueryConfiguration {
                    query: "SELECT 1",
                    config: &config,
                },
            },
        };

        insta::assert_json_snapshot!(body, @r#"
        {
          "jobReference": {
            "projectId": "billing",
            "jobId": "kunskap_test",
            "location": "US"
          },
          "configuration": {
            "query": {
              "query": "SELECT 1",
              "destinationTable": {
                "projectId": "billing",
                "datasetId": "out",
                "tableId": "costs"
              },
              "writeDisposition": "WRITE_TRUNCATE",
              "createDisposition": "CREATE_IF_NEEDED",
              "timePartitioning": {
                "type": "DAY",
                "field": "usage_start_time"
              },
              "useLegacySql": false
            }
          }
        }
        "#);
    }

    #[test]
    fn view_patch_touches_only_the_query() {
        let body = ViewPatch {
            view: ViewQueryPatch {
                query: "SELECT 2",
                use_legacy_sql: false,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "view": { "query": "SELECT 2", "useLegacySql": false } })
        );
    }
}
