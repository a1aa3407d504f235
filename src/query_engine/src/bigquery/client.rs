use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shared_utils::env::get_env_var_opt;
use snafu::{OptionExt, ResultExt};
use tracing::debug;
use uuid::Uuid;

use crate::{
    bigquery::{
        auth::Auth,
        wire::{
            ErrorEnvelope, JobConfiguration, JobInsertRequest, QueryConfiguration,
            TableListResponse, ViewPatch, ViewQueryPatch,
        },
    },
    engine::QueryEngine,
    errors::{
        AlreadyExistsSnafu, ApiSnafu, ClientBuildSnafu, ClientInitError, EngineError, HttpSnafu,
        MissingProjectSnafu, NotFoundSnafu,
    },
    models::{
        Dataset, DatasetReference, Job, JobReference, QueryJobConfig, Table, TableReference,
    },
};

pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Points the client at a local emulator, e.g. `localhost:9050`.
pub const EMULATOR_HOST_VAR: &str = "BIGQUERY_EMULATOR_HOST";
/// A pre-minted bearer token; skips credential discovery.
pub const ACCESS_TOKEN_VAR: &str = "BIGQUERY_ACCESS_TOKEN";

/// BigQuery REST client.
///
/// Jobs are created in (and billed to) `project_id`; datasets and tables are
/// addressed by their own references and may live in other projects.
#[derive(Debug)]
pub struct BigQueryClient {
    http: Client,
    base_url: String,
    project_id: String,
    location: Option<String>,
    auth: Auth,
}

#[derive(Debug)]
pub struct BigQueryClientBuilder {
    base_url: String,
    project_id: Option<String>,
    location: Option<String>,
    auth: Auth,
    timeout: Option<Duration>,
}

impl Default for BigQueryClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: None,
            location: None,
            auth: Auth::None,
            timeout: None,
        }
    }
}

impl BigQueryClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Job location (`US`, `EU`, `europe-north1`, ...).
    pub fn location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Per-request timeout. Unset by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<BigQueryClient, ClientInitError> {
        let project_id = self.project_id.context(MissingProjectSnafu)?;

        let mut http = Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build().context(ClientBuildSnafu)?;

        Ok(BigQueryClient {
            http,
            base_url: self.base_url,
            project_id,
            location: self.location,
            auth: self.auth,
        })
    }
}

impl BigQueryClient {
    pub fn builder() -> BigQueryClientBuilder {
        BigQueryClientBuilder::default()
    }

    /// Builds a client from the process environment.
    ///
    /// - `BIGQUERY_EMULATOR_HOST` set: talk plain HTTP to the emulator, no auth.
    /// - `BIGQUERY_ACCESS_TOKEN` set: use that token as-is.
    /// - otherwise: application-default credentials.
    pub async fn from_env(
        project_id: impl Into<String>,
        location: Option<String>,
    ) -> Result<Self, ClientInitError> {
        let builder = Self::builder().project_id(project_id).location(location);

        let builder = if let Some(host) = get_env_var_opt(EMULATOR_HOST_VAR) {
            builder.base_url(emulator_base_url(&host))
        } else if let Some(token) = get_env_var_opt(ACCESS_TOKEN_VAR) {
            builder.auth(Auth::Static(SecretString::new(token.into())))
        } else {
            builder.auth(Auth::application_default().await?)
        };

        builder.build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn dataset_url(&self, ds: &DatasetReference) -> String {
        format!(
            "{}/projects/{}/datasets/{}",
            self.base_url, ds.project_id, ds.dataset_id
        )
    }

    async fn request(&self, method: Method, url: String) -> Result<RequestBuilder, EngineError> {
        let mut req = self.http.request(method, url);
        if let Some(token) = self.auth.bearer().await? {
            req = req.bearer_auth(token.expose_secret());
        }
        Ok(req)
    }

    /// Sends `req` and decodes a successful JSON body; maps failures via
    /// [`error_for_status`], naming `resource` in not-found/conflict errors.
    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        resource: &str,
    ) -> Result<T, EngineError> {
        let response = req.send().await.context(HttpSnafu)?;
        let response = check_status(response, resource).await?;
        response.json::<T>().await.context(HttpSnafu)
    }
}

fn emulator_base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/bigquery/v2")
    } else {
        format!("http://{host}/bigquery/v2")
    }
}

async fn check_status(response: Response, resource: &str) -> Result<Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown API error".to_string());
    Err(error_for_status(status, &body, resource))
}

/// Maps a non-success response onto [`EngineError`].
///
/// The engine's own `error.message` is preferred; an unparseable body is
/// passed through verbatim.
pub(crate) fn error_for_status(status: StatusCode, body: &str, resource: &str) -> EngineError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::NOT_FOUND => NotFoundSnafu { resource }.build(),
        StatusCode::CONFLICT => AlreadyExistsSnafu { resource }.build(),
        _ => ApiSnafu {
            status: status.as_u16(),
            message,
        }
        .build(),
    }
}

#[async_trait]
impl QueryEngine for BigQueryClient {
    async fn get_dataset(&self, dataset: &DatasetReference) -> Result<Dataset, EngineError> {
        let req = self.request(Method::GET, self.dataset_url(dataset)).await?;
        self.send(req, &format!("Dataset {dataset}")).await
    }

    async fn list_tables(
        &self,
        dataset: &DatasetReference,
    ) -> Result<Vec<TableReference>, EngineError> {
        let url = format!("{}/tables", self.dataset_url(dataset));
        let resource = format!("Dataset {dataset}");

        let mut tables = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut req = self.request(Method::GET, url.clone()).await?;
            if let Some(token) = &next_page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let page: TableListResponse = self.send(req, &resource).await?;
            tables.extend(page.tables.into_iter().map(|t| t.table_reference));

            match page.next_page_token {
                Some(token) if !token.is_empty() => next_page_token = Some(token),
                _ => break,
            }
        }

        debug!(dataset = %dataset, count = tables.len(), "listed tables");
        Ok(tables)
    }

    async fn create_table(&self, table: &Table) -> Result<Table, EngineError> {
        let dataset = table.table_reference.dataset();
        let url = format!("{}/tables", self.dataset_url(&dataset));
        let req = self.request(Method::POST, url).await?.json(table);
        self.send(req, &format!("Table {}", table.table_reference)).await
    }

    async fn update_view_query(
        &self,
        view: &TableReference,
        query: &str,
    ) -> Result<Table, EngineError> {
        let url = format!(
            "{}/tables/{}",
            self.dataset_url(&view.dataset()),
            view.table_id
        );
        let body = ViewPatch {
            view: ViewQueryPatch {
                query,
                use_legacy_sql: false,
            },
        };
        let req = self.request(Method::PATCH, url).await?.json(&body);
        self.send(req, &format!("Table {view}")).await
    }

    async fn insert_query_job(
        &self,
        sql: &str,
        config: &QueryJobConfig,
    ) -> Result<Job, EngineError> {
        let job_reference = JobReference {
            project_id: self.project_id.clone(),
            job_id: format!("kunskap_{}", Uuid::new_v4().simple()),
            location: self.location.clone(),
        };
        let resource = format!("Job {}", job_reference.job_id);
        let body = JobInsertRequest {
            job_reference,
            configuration: JobConfiguration {
                query: QueryConfiguration { query: sql, config },
            },
        };

        let url = format!("{}/projects/{}/jobs", self.base_url, self.project_id);
        let req = self.request(Method::POST, url).await?.json(&body);
        self.send(req, &resource).await
    }

    async fn get_job(&self, job: &JobReference) -> Result<Job, EngineError> {
        let url = format!(
            "{}/projects/{}/jobs/{}",
            self.base_url, job.project_id, job.job_id
        );
        let mut req = self.request(Method::GET, url).await?;
        if let Some(location) = &job.location {
            req = req.query(&[("location", location.as_str())]);
        }
        self.send(req, &format!("Job {}", job.job_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_resource() {
        let err = error_for_status(
            StatusCode::NOT_FOUND,
            r#"{"error":{"code":404,"message":"Not found: Dataset p:d","status":"NOT_FOUND"}}"#,
            "Dataset p.d",
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: Dataset p.d");
    }

    #[test]
    fn api_error_prefers_engine_message() {
        let err = error_for_status(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":403,"message":"Access Denied: Project p","status":"PERMISSION_DENIED"}}"#,
            "Job j",
        );
        assert_eq!(err.to_string(), "API error (403): Access Denied: Project p");
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = error_for_status(StatusCode::BAD_GATEWAY, "upstream reset\n", "Job j");
        assert_eq!(err.to_string(), "API error (502): upstream reset");
    }

    #[test]
    fn conflict_maps_to_already_exists() {
        let err = error_for_status(StatusCode::CONFLICT, "{}", "Table p.d.v");
        assert!(matches!(err, EngineError::AlreadyExists { .. }));
    }

    #[test]
    fn emulator_host_gets_scheme_and_api_prefix() {
        assert_eq!(
            emulator_base_url("localhost:9050"),
            "http://localhost:9050/bigquery/v2"
        );
        assert_eq!(
            emulator_base_url("https://bq.internal/"),
            "https://bq.internal/bigquery/v2"
        );
    }

    #[test]
    fn builder_requires_a_project() {
        let err = BigQueryClient::builder().build().unwrap_err();
        assert!(matches!(err, ClientInitError::MissingProject { .. }));
    }
}
