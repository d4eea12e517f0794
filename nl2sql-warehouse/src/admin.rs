//! Administrative surface used only by the embedding pipeline (C2):
//! DDL and upsert-by-key population. Kept off the `Warehouse` trait the
//! agent uses, the same way `QueryMemoryStore` is — neither the DML
//! guard nor the LLM should ever be able to reach these operations.

use async_trait::async_trait;
use gcp_bigquery_client::model::query_parameter::QueryParameter;
use gcp_bigquery_client::model::query_parameter_type::QueryParameterType;
use gcp_bigquery_client::model::query_parameter_value::QueryParameterValue;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::Client;
use nl2sql_core::{ExecutionError, Nl2SqlError, Nl2SqlResult};
use serde_json::Value;
use std::collections::HashMap;

#[async_trait]
pub trait AdminWarehouse: Send + Sync {
    /// Run a DDL statement (CREATE SCHEMA/TABLE/INDEX, or their
    /// `CREATE OR REPLACE` destructive counterparts). Never guarded —
    /// callers are the pipeline's own named steps, not the LLM.
    async fn execute_ddl(&self, sql: &str) -> Nl2SqlResult<()>;

    /// Upsert `rows` into `dataset.table` keyed by `key_fields`. Any
    /// field named in `blank_on_update` is set to `NULL` on the UPDATE
    /// branch so the next `generate-embeddings` step treats the row as
    /// pending again (spec §4.2 "on update, any embedding column is
    /// blanked").
    async fn upsert_rows(
        &self,
        dataset: &str,
        table: &str,
        key_fields: &[&str],
        blank_on_update: &[&str],
        rows: Vec<HashMap<String, Value>>,
    ) -> Nl2SqlResult<usize>;
}

fn bq_parameter(name: &str, value: &Value) -> QueryParameter {
    let (type_name, string_value) = match value {
        Value::String(s) => ("STRING", Some(s.clone())),
        Value::Bool(b) => ("BOOL", Some(b.to_string())),
        Value::Number(n) if n.is_i64() || n.is_u64() => ("INT64", Some(n.to_string())),
        Value::Number(n) => ("FLOAT64", Some(n.to_string())),
        Value::Null => ("STRING", None),
        other => ("STRING", Some(other.to_string())),
    };

    QueryParameter {
        name: Some(name.to_string()),
        parameter_type: Some(QueryParameterType {
            r#type: type_name.to_string(),
            ..Default::default()
        }),
        parameter_value: Some(QueryParameterValue {
            value: string_value,
            ..Default::default()
        }),
    }
}

pub(crate) async fn run_merge(
    client: &Client,
    project: &str,
    dataset: &str,
    table: &str,
    key_fields: &[&str],
    blank_on_update: &[&str],
    row: &HashMap<String, Value>,
) -> Nl2SqlResult<()> {
    let mut columns: Vec<&str> = row.keys().map(|k| k.as_str()).collect();
    columns.sort_unstable();

    let using_select = columns
        .iter()
        .map(|c| format!("@{c} AS {c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let on_clause = key_fields.iter().map(|k| format!("T.{k} = S.{k}")).collect::<Vec<_>>().join(" AND ");
    let update_set = columns
        .iter()
        .map(|c| {
            if blank_on_update.contains(c) {
                format!("{c} = NULL")
            } else {
                format!("{c} = S.{c}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let insert_cols = columns.join(", ");
    let insert_vals = columns.iter().map(|c| format!("S.{c}")).collect::<Vec<_>>().join(", ");

    let sql = format!(
        "MERGE `{project}.{dataset}.{table}` T USING (SELECT {using_select}) S ON {on_clause} \
         WHEN MATCHED THEN UPDATE SET {update_set} \
         WHEN NOT MATCHED THEN INSERT ({insert_cols}) VALUES ({insert_vals})"
    );

    let mut request = QueryRequest::new(&sql);
    request.use_legacy_sql = false;
    request.query_parameters = Some(columns.iter().map(|c| bq_parameter(c, &row[*c])).collect());

    client.job().query(project, request).await.map_err(|e| {
        Nl2SqlError::Execution(ExecutionError::Warehouse {
            reason: format!("upsert into {dataset}.{table} failed: {e}"),
        })
    })?;

    Ok(())
}
