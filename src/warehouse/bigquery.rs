use crate::config::env_value;
use crate::error::{ForecastError, Result};
use crate::warehouse::{ParamValue, QueryExecutor, QueryParam, Row, WarehouseQuery};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Runs queries through the BigQuery REST `jobs.query` endpoint.
#[derive(Clone)]
pub struct BigQueryClient {
    client: Client,
    project_id: String,
    access_token: String,
    base_url: String,
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<NamedParameter>,
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NamedParameter {
    name: String,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: String,
}

/// Shape shared by `jobs.query` and `jobs.getQueryResults`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

/// Continuation of a paged result.
#[derive(Debug, PartialEq)]
struct NextPage {
    job_id: String,
    location: Option<String>,
    page_token: String,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

impl From<&QueryParam> for NamedParameter {
    fn from(param: &QueryParam) -> Self {
        let (kind, value) = match &param.value {
            ParamValue::Date(date) => ("DATE", date.format("%Y-%m-%d").to_string()),
            ParamValue::String(s) => ("STRING", s.clone()),
            ParamValue::Int64(n) => ("INT64", n.to_string()),
        };
        Self {
            name: param.name.clone(),
            parameter_type: ParameterType { kind },
            parameter_value: ParameterValue { value },
        }
    }
}

impl BigQueryClient {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            project_id: project_id.into(),
            access_token: access_token.into(),
            base_url: BIGQUERY_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Reads `BQ_PROJECT_ID` and `BQ_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let project_id = env_value("BQ_PROJECT_ID")
            .ok_or_else(|| ForecastError::Config("BQ_PROJECT_ID is not set".to_string()))?;
        let access_token = env_value("BQ_ACCESS_TOKEN")
            .ok_or_else(|| ForecastError::Config("BQ_ACCESS_TOKEN is not set".to_string()))?;
        Ok(Self::new(project_id, access_token))
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    async fn run_query(&self, query: &WarehouseQuery) -> Result<Vec<Row>> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);

        let payload = QueryRequest {
            query: &query.sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: query.params.iter().map(NamedParameter::from).collect(),
            timeout_ms: self.timeout_ms,
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        let mut body = Self::read_response(res).await?;
        let mut rows = Vec::new();

        loop {
            let next = next_page(&body)?;
            rows.extend(rows_from_response(body)?);

            let Some(page) = next else {
                break;
            };
            debug!(
                "Fetching next result page of job {} ({} rows so far)",
                page.job_id,
                rows.len()
            );
            body = self.fetch_page(&page).await?;
        }

        debug!("BigQuery returned {} rows", rows.len());
        Ok(rows)
    }

    async fn fetch_page(&self, page: &NextPage) -> Result<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, self.project_id, page.job_id
        );

        let timeout = self.timeout_ms.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("pageToken", page.page_token.as_str()),
            ("timeoutMs", timeout.as_str()),
        ];
        if let Some(location) = &page.location {
            query.push(("location", location.as_str()));
        }

        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;

        Self::read_response(res).await
    }

    async fn read_response(res: reqwest::Response) -> Result<QueryResponse> {
        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(ForecastError::Query(format!(
                "BigQuery API Error (status {}): {}",
                status, err_text
            )));
        }

        Ok(res.json().await?)
    }
}

fn next_page(body: &QueryResponse) -> Result<Option<NextPage>> {
    let Some(page_token) = &body.page_token else {
        return Ok(None);
    };
    let job = body.job_reference.as_ref().ok_or_else(|| {
        ForecastError::Query("Paged result is missing its job reference".to_string())
    })?;

    Ok(Some(NextPage {
        job_id: job.job_id.clone(),
        location: job.location.clone(),
        page_token: page_token.clone(),
    }))
}

fn rows_from_response(body: QueryResponse) -> Result<Vec<Row>> {
    if !body.job_complete {
        return Err(ForecastError::Query(
            "Query job did not complete within the timeout".to_string(),
        ));
    }

    let fields = body.schema.map(|s| s.fields).unwrap_or_default();

    Ok(body
        .rows
        .into_iter()
        .map(|row| {
            fields
                .iter()
                .zip(row.f)
                .map(|(field, cell)| (field.name.clone(), cell.v))
                .collect()
        })
        .collect())
}

impl QueryExecutor for BigQueryClient {
    async fn execute(&self, query: &WarehouseQuery) -> Result<Vec<Row>> {
        self.run_query(query).await
    }
}
