//! BigQuery implementation of the `Warehouse` trait, via
//! `gcp-bigquery-client` — the real, published crate for this surface;
//! none of the retrieval pack's example repos touch BigQuery, so this
//! dependency was added fresh rather than adapted from the teacher
//! (see DESIGN.md).

use async_trait::async_trait;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::ResultSet;
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::Client;
use nl2sql_core::{ExecutionError, Nl2SqlError, Nl2SqlResult};
use serde_json::{json, Value};
use std::time::Duration;

use crate::admin::run_merge;
use crate::{AdminWarehouse, DryRunOutcome, FieldSchema, InsertOutcome, QueryMemoryStore, QueryResult, ValidatedQueryRow, Warehouse, sanitize_row};

pub struct BigQueryWarehouse {
    client: Client,
    project: String,
    location: String,
    metadata_dataset: String,
}

impl BigQueryWarehouse {
    pub fn new(client: Client, project: impl Into<String>, location: impl Into<String>, metadata_dataset: impl Into<String>) -> Self {
        Self {
            client,
            project: project.into(),
            location: location.into(),
            metadata_dataset: metadata_dataset.into(),
        }
    }

    pub async fn from_service_account_key_file(
        path: &str,
        project: impl Into<String>,
        location: impl Into<String>,
        metadata_dataset: impl Into<String>,
    ) -> Nl2SqlResult<Self> {
        let client = Client::from_service_account_key_file(path).await.map_err(|e| {
            Nl2SqlError::Execution(ExecutionError::Warehouse {
                reason: format!("failed to construct BigQuery client: {e}"),
            })
        })?;
        Ok(Self::new(client, project, location, metadata_dataset))
    }

    fn request(&self, sql: &str, dry_run: bool, timeout_ms: Option<i64>, max_results: Option<i64>) -> QueryRequest {
        let mut request = QueryRequest::new(sql);
        request.dry_run = Some(dry_run);
        request.use_legacy_sql = false;
        request.location = Some(self.location.clone());
        request.timeout_ms = timeout_ms;
        request.max_results = max_results;
        request
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn dry_run(&self, sql: &str) -> Nl2SqlResult<DryRunOutcome> {
        let request = self.request(sql, true, None, None);
        match self.client.job().query(&self.project, request).await {
            Ok(response) => {
                let bytes = response
                    .total_bytes_processed
                    .as_deref()
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(0);
                Ok(DryRunOutcome::Valid { estimated_bytes: bytes })
            }
            Err(err) => Ok(DryRunOutcome::Invalid {
                warehouse_message: err.to_string(),
            }),
        }
    }

    async fn execute(
        &self,
        sql: &str,
        row_cap: usize,
        query_timeout: Duration,
        fetch_timeout: Duration,
    ) -> Nl2SqlResult<QueryResult> {
        let request = self.request(sql, false, Some(query_timeout.as_millis() as i64), Some(row_cap as i64 + 1));

        let response = tokio::time::timeout(fetch_timeout, self.client.job().query(&self.project, request))
            .await
            .map_err(|_| {
                Nl2SqlError::Execution(ExecutionError::Timeout {
                    timeout_secs: fetch_timeout.as_secs(),
                })
            })?
            .map_err(|e| {
                Nl2SqlError::Execution(ExecutionError::Warehouse {
                    reason: e.to_string(),
                })
            })?;

        // Thread each column's declared BigQuery type through to the
        // sanitiser so it never has to guess a TIMESTAMP from a plain
        // integer's value happening to look like a plausible epoch
        // second count (spec §4.4, §9).
        let fields: Vec<FieldSchema> = response
            .schema
            .as_ref()
            .and_then(|s| s.fields.as_ref())
            .map(|fields| fields.iter().map(|f| FieldSchema::new(f.name.clone(), f.r#type.clone())).collect())
            .unwrap_or_default();

        let mut result_set = ResultSet::new_from_query_response(response);
        let mut rows = Vec::new();
        let mut truncated = false;

        while result_set.next_row() {
            if rows.len() >= row_cap {
                truncated = true;
                break;
            }
            let raw_values: Vec<Value> = fields
                .iter()
                .map(|field| result_set.get_json_value_by_name(&field.name).ok().flatten().unwrap_or(Value::Null))
                .collect();
            rows.push(sanitize_row(&fields, &raw_values));
        }

        Ok(QueryResult { rows, truncated })
    }

    fn project(&self) -> &str {
        &self.project
    }
}

#[async_trait]
impl QueryMemoryStore for BigQueryWarehouse {
    async fn insert_validated(&self, row: ValidatedQueryRow) -> Nl2SqlResult<InsertOutcome> {
        let mut request = TableDataInsertAllRequest::new();
        request
            .add_row(
                None,
                json!({
                    "question": row.question,
                    "sql": row.sql,
                    "tables": row.tables.join(","),
                    "dataset": row.dataset,
                    "complexity": row.complexity,
                    "routing_signal": row.routing_signal,
                    "validator": row.validator,
                }),
            )
            .map_err(|e| {
                Nl2SqlError::Execution(ExecutionError::Warehouse {
                    reason: format!("failed to build query-memory insert row: {e}"),
                })
            })?;

        let response = self
            .client
            .tabledata()
            .insert_all(&self.project, &self.metadata_dataset, "query_memory", request)
            .await
            .map_err(|e| {
                Nl2SqlError::Execution(ExecutionError::Warehouse {
                    reason: format!("query-memory insert failed: {e}"),
                })
            })?;

        match response.insert_errors {
            Some(errors) if !errors.is_empty() => {
                tracing::warn!(count = errors.len(), "query-memory row inserted with embedding deferred");
                Ok(InsertOutcome::PartialSuccess)
            }
            _ => Ok(InsertOutcome::Success),
        }
    }
}

#[async_trait]
impl AdminWarehouse for BigQueryWarehouse {
    async fn execute_ddl(&self, sql: &str) -> Nl2SqlResult<()> {
        let mut request = QueryRequest::new(sql);
        request.use_legacy_sql = false;
        self.client.job().query(&self.project, request).await.map_err(|e| {
            Nl2SqlError::Execution(ExecutionError::Warehouse {
                reason: format!("DDL failed: {e}"),
            })
        })?;
        Ok(())
    }

    async fn upsert_rows(
        &self,
        dataset: &str,
        table: &str,
        key_fields: &[&str],
        blank_on_update: &[&str],
        rows: Vec<std::collections::HashMap<String, Value>>,
    ) -> Nl2SqlResult<usize> {
        let mut upserted = 0;
        for row in &rows {
            run_merge(&self.client, &self.project, dataset, table, key_fields, blank_on_update, row).await?;
            upserted += 1;
        }
        Ok(upserted)
    }
}
