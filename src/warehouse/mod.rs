//! The query-engine seam. The crate only ever needs
//! `execute(query, params) -> rows`; everything else about the warehouse is
//! the executor's business.

#[cfg(feature = "bigquery")]
pub mod bigquery;

#[cfg(feature = "bigquery")]
pub use bigquery::BigQueryClient;

use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A result row keyed by column name. Cell values are left as the engine
/// returned them; see [`crate::ingestion`] for normalization.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamValue {
    Date(NaiveDate),
    String(String),
    Int64(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: ParamValue,
}

/// SQL text with `@name` placeholders plus the values bound to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl WarehouseQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn bind(mut self, name: &str, value: ParamValue) -> Self {
        self.params.retain(|p| p.name != name);
        self.params.push(QueryParam {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// Runs a parameterized query and returns its rows.
///
/// Implementations must not retry: a failure is reported to the caller as-is.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, query: &WarehouseQuery) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

impl<E: QueryExecutor> QueryExecutor for std::sync::Arc<E> {
    fn execute(&self, query: &WarehouseQuery) -> impl Future<Output = Result<Vec<Row>>> + Send {
        (**self).execute(query)
    }
}
