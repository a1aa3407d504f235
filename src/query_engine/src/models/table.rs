use serde::{Deserialize, Serialize};

use crate::models::{DatasetReference, TableReference, TimePartitioning};

/// Dataset metadata as returned by a dataset lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub dataset_reference: DatasetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A table or view resource.
///
/// Only the members this job reads or writes are modelled; unknown fields in
/// engine responses are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub table_reference: TableReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_partitioning: Option<TimePartitioning>,
    /// `TABLE`, `VIEW`, ... Output only.
    #[serde(rename = "type", default, skip_serializing)]
    pub kind: Option<String>,
}

impl Table {
    /// A plain table resource with no view definition.
    pub fn new(table_reference: TableReference) -> Self {
        Self {
            table_reference,
            view: None,
            time_partitioning: None,
            kind: None,
        }
    }

    /// A view resource backed by `query` (standard SQL).
    pub fn view(table_reference: TableReference, query: impl Into<String>) -> Self {
        Self {
            view: Some(ViewDefinition::standard(query)),
            ..Self::new(table_reference)
        }
    }

    /// The stored view query, if this is a view.
    pub fn view_query(&self) -> Option<&str> {
        self.view.as_ref().map(|v| v.query.as_str())
    }
}

/// The query behind a view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub query: String,
    #[serde(default)]
    pub use_legacy_sql: bool,
}

impl ViewDefinition {
    pub fn standard(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            use_legacy_sql: false,
        }
    }
}
