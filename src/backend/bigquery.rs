//! BigQuery client speaking the v2 REST API.
//!
//! Every statement runs as a query job: `jobs.query` starts it and waits up
//! to the job timeout, then `jobs.getQueryResults` is polled until the job
//! reports completion or the timeout is spent.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use url::Url;

use crate::backend::{ensure_success, BackendError, TokenSource, WarehouseClient};

/// Pause between completion polls when the server answers without long-polling.
const POLL_PAUSE: Duration = Duration::from_millis(200);

/// Test tables expire on their own after a year.
const TABLE_EXPIRATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Value,
}

/// Client bound to one table.
#[derive(Debug)]
pub struct BigQueryClient {
    client: reqwest::Client,
    endpoint: Url,
    project: String,
    dataset: String,
    table: String,
    auth: TokenSource,
    job_timeout: Duration,
}

impl BigQueryClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
        auth: TokenSource,
        job_timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client,
            endpoint: endpoint.parse()?,
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
            auth,
            job_timeout,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Protocol(format!("endpoint cannot be a base url: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(["bigquery", "v2", "projects", self.project.as_str()])
            .extend(segments);
        Ok(url)
    }

    /// Table reference usable inside standard SQL.
    fn sql_table(&self) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, self.table)
    }

    /// Run one statement and wait for the job to complete.
    async fn run_query(&self, sql: &str, parameters: Vec<Value>) -> Result<Vec<TableRow>, BackendError> {
        let deadline = Instant::now() + self.job_timeout;
        let timeout_ms = self.job_timeout.as_millis() as u64;

        let mut body = json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": timeout_ms,
        });
        if !parameters.is_empty() {
            body["parameterMode"] = json!("NAMED");
            body["queryParameters"] = Value::Array(parameters);
        }

        let request = self.client.post(self.url(&["queries"])?).json(&body);
        let response = ensure_success(self.auth.authorize(request).await?.send().await?).await?;
        let mut result: QueryResponse = response.json().await?;

        while !result.job_complete {
            if Instant::now() >= deadline {
                return Err(BackendError::Timeout(self.job_timeout));
            }
            let job = result
                .job_reference
                .as_ref()
                .ok_or_else(|| BackendError::Protocol("incomplete job without a job reference".to_string()))?;
            tracing::debug!(job_id = %job.job_id, "Waiting for query job to complete");

            let mut url = self.url(&["queries", &job.job_id])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("timeoutMs", &timeout_ms.to_string());
                if let Some(location) = &job.location {
                    query.append_pair("location", location);
                }
            }
            sleep(POLL_PAUSE).await;
            let request = self.auth.authorize(self.client.get(url)).await?;
            let response = ensure_success(request.send().await?).await?;
            let next: QueryResponse = response.json().await?;
            result = QueryResponse {
                job_reference: next.job_reference.or(result.job_reference),
                ..next
            };
        }

        Ok(result.rows)
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    fn table_id(&self) -> String {
        format!("{}:{}.{}", self.project, self.dataset, self.table)
    }

    async fn create_table(&self) -> Result<(), BackendError> {
        let expires_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(TABLE_EXPIRATION);
        let body = json!({
            "tableReference": {
                "projectId": self.project,
                "datasetId": self.dataset,
                "tableId": self.table,
            },
            "schema": {
                "fields": [{ "name": "Message", "type": "STRING" }],
            },
            "expirationTime": expires_at.as_millis().to_string(),
        });

        let request = self
            .client
            .post(self.url(&["datasets", &self.dataset, "tables"])?)
            .json(&body);
        ensure_success(self.auth.authorize(request).await?.send().await?).await?;
        tracing::info!(table = %self.table_id(), "Created warehouse table");
        Ok(())
    }

    async fn insert(&self, message: &str) -> Result<(), BackendError> {
        let sql = format!("INSERT INTO {} (Message) VALUES (@message)", self.sql_table());
        let parameter = json!({
            "name": "message",
            "parameterType": { "type": "STRING" },
            "parameterValue": { "value": message },
        });
        self.run_query(&sql, vec![parameter]).await?;
        Ok(())
    }

    async fn read_messages(&self) -> Result<Vec<String>, BackendError> {
        let sql = format!("SELECT Message FROM {}", self.sql_table());
        let rows = self.run_query(&sql, Vec::new()).await?;
        rows.into_iter()
            .map(|row| match row.f.into_iter().next().map(|cell| cell.v) {
                Some(Value::String(message)) => Ok(message),
                other => Err(BackendError::Protocol(format!("unexpected cell value: {other:?}"))),
            })
            .collect()
    }

    async fn truncate(&self) -> Result<(), BackendError> {
        let sql = format!("TRUNCATE TABLE {}", self.sql_table());
        self.run_query(&sql, Vec::new()).await?;
        Ok(())
    }
}
