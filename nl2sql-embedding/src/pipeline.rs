//! The stepwise embedding pipeline (spec §4.2). Steps are independent
//! — a failing step never corrupts another, and re-running any step is
//! always safe (upsert-by-key, idempotent DDL).

use nl2sql_catalog::Catalog;
use nl2sql_core::{EmbeddingProvider, ExecutionError, Nl2SqlError, Nl2SqlResult, TaskType};
use nl2sql_warehouse::{AdminWarehouse, Warehouse};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::refresh::REFRESH_PREDICATE_SQL;
use crate::rows::{column_row, glossary_row, schema_row, symbol_row};

/// Anything the pipeline needs from a warehouse: read/execute for
/// inspection queries, admin for DDL and upsert.
pub trait PipelineWarehouse: Warehouse + AdminWarehouse {}
impl<T: Warehouse + AdminWarehouse> PipelineWarehouse for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateDataset,
    VerifyModel,
    CreateTables,
    PopulateSchema,
    PopulateColumns,
    PopulateGlossary,
    PopulateSymbols,
    GenerateEmbeddings,
    CreateIndexes,
    TestSearch,
}

impl Step {
    pub const ALL: [Step; 10] = [
        Step::CreateDataset,
        Step::VerifyModel,
        Step::CreateTables,
        Step::PopulateSchema,
        Step::PopulateColumns,
        Step::PopulateGlossary,
        Step::PopulateSymbols,
        Step::GenerateEmbeddings,
        Step::CreateIndexes,
        Step::TestSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CreateDataset => "create-dataset",
            Step::VerifyModel => "verify-model",
            Step::CreateTables => "create-tables",
            Step::PopulateSchema => "populate-schema",
            Step::PopulateColumns => "populate-columns",
            Step::PopulateGlossary => "populate-glossary",
            Step::PopulateSymbols => "populate-symbols",
            Step::GenerateEmbeddings => "generate-embeddings",
            Step::CreateIndexes => "create-indexes",
            Step::TestSearch => "test-search",
        }
    }

    pub fn from_str(s: &str) -> Option<Step> {
        Step::ALL.into_iter().find(|step| step.as_str() == s)
    }
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: Step,
    pub rows_affected: usize,
    pub message: String,
}

pub struct EmbeddingPipeline {
    warehouse: Arc<dyn PipelineWarehouse>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    catalog: Arc<Catalog>,
    gold_dataset: String,
    silver_dataset: String,
    metadata_dataset: String,
    /// DDL defaults to non-destructive create-if-not-exists; `--force`
    /// switches every DDL step to destructive recreate (spec §4.2).
    force: bool,
}

impl EmbeddingPipeline {
    pub fn new(
        warehouse: Arc<dyn PipelineWarehouse>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        catalog: Arc<Catalog>,
        gold_dataset: impl Into<String>,
        silver_dataset: impl Into<String>,
        metadata_dataset: impl Into<String>,
        force: bool,
    ) -> Self {
        Self {
            warehouse,
            embedding_provider,
            catalog,
            gold_dataset: gold_dataset.into(),
            silver_dataset: silver_dataset.into(),
            metadata_dataset: metadata_dataset.into(),
            force,
        }
    }

    pub async fn run_step(&self, step: Step) -> Nl2SqlResult<StepReport> {
        match step {
            Step::CreateDataset => self.create_dataset().await,
            Step::VerifyModel => self.verify_model().await,
            Step::CreateTables => self.create_tables().await,
            Step::PopulateSchema => self.populate_schema().await,
            Step::PopulateColumns => self.populate_columns().await,
            Step::PopulateGlossary => self.populate_glossary().await,
            Step::PopulateSymbols => self.populate_symbols().await,
            Step::GenerateEmbeddings => self.generate_embeddings().await,
            Step::CreateIndexes => self.create_indexes().await,
            Step::TestSearch => self.test_search().await,
        }
    }

    pub async fn run_all(&self) -> Vec<Nl2SqlResult<StepReport>> {
        let mut reports = Vec::with_capacity(Step::ALL.len());
        for step in Step::ALL {
            reports.push(self.run_step(step).await);
        }
        reports
    }

    fn ddl_verb(&self) -> &'static str {
        if self.force {
            "CREATE OR REPLACE"
        } else {
            "CREATE"
        }
    }

    fn if_not_exists(&self) -> &'static str {
        if self.force {
            ""
        } else {
            " IF NOT EXISTS"
        }
    }

    async fn create_dataset(&self) -> Nl2SqlResult<StepReport> {
        let sql = format!(
            "CREATE SCHEMA{} `{}.{}`",
            self.if_not_exists(),
            self.warehouse.project(),
            self.metadata_dataset
        );
        self.warehouse.execute_ddl(&sql).await?;
        Ok(StepReport {
            step: Step::CreateDataset,
            rows_affected: 0,
            message: format!("metadata dataset {} ready", self.metadata_dataset),
        })
    }

    async fn verify_model(&self) -> Nl2SqlResult<StepReport> {
        let probe = self.embedding_provider.embed("connectivity probe", TaskType::RetrievalQuery).await?;
        if probe.dimensions != self.embedding_provider.dimensions() {
            return Err(Nl2SqlError::Execution(ExecutionError::Warehouse {
                reason: format!(
                    "embedding model {} returned {} dimensions, expected {}",
                    self.embedding_provider.model_id(),
                    probe.dimensions,
                    self.embedding_provider.dimensions()
                ),
            }));
        }
        Ok(StepReport {
            step: Step::VerifyModel,
            rows_affected: 0,
            message: format!("model {} verified at {} dimensions", self.embedding_provider.model_id(), probe.dimensions),
        })
    }

    async fn create_tables(&self) -> Nl2SqlResult<StepReport> {
        let project = self.warehouse.project();
        let verb = self.ddl_verb();
        let exists = self.if_not_exists();
        let dataset = &self.metadata_dataset;

        let statements = [
            format!(
                "{verb} TABLE{exists} `{project}.{dataset}.schema_index` \
                 (dataset STRING, table_name STRING, layer STRING, embed_text STRING, partition_field STRING, vector STRING)"
            ),
            format!(
                "{verb} TABLE{exists} `{project}.{dataset}.column_index` \
                 (dataset STRING, table_name STRING, column_name STRING, embed_text STRING, category STRING, \
                 formula STRING, example_values STRING, related_columns STRING, typical_aggregation STRING, \
                 filterable BOOL, vector STRING)"
            ),
            format!(
                "{verb} TABLE{exists} `{project}.{dataset}.glossary_index` \
                 (concept_name STRING, embed_text STRING, related_columns STRING, vector STRING)"
            ),
            format!(
                "{verb} TABLE{exists} `{project}.{dataset}.query_memory` \
                 (question STRING, sql STRING, tables STRING, dataset STRING, complexity STRING, \
                 routing_signal STRING, validator STRING, vector STRING)"
            ),
            format!("{verb} TABLE{exists} `{project}.{dataset}.symbol_exchange_map` (exchange_code STRING, gold_dataset STRING, silver_dataset STRING)"),
        ];

        for statement in &statements {
            self.warehouse.execute_ddl(statement).await?;
        }

        Ok(StepReport {
            step: Step::CreateTables,
            rows_affected: statements.len(),
            message: "schema/column/glossary/query_memory/symbol_exchange_map tables ready".to_string(),
        })
    }

    async fn populate_schema(&self) -> Nl2SqlResult<StepReport> {
        let rows: Vec<HashMap<String, Value>> = self.catalog.all_tables().into_iter().map(schema_row).collect();
        let count = rows.len();
        self.warehouse
            .upsert_rows(&self.metadata_dataset, "schema_index", &["dataset", "table_name"], &["vector"], rows)
            .await?;
        Ok(StepReport {
            step: Step::PopulateSchema,
            rows_affected: count,
            message: format!("{count} schema rows upserted"),
        })
    }

    async fn populate_columns(&self) -> Nl2SqlResult<StepReport> {
        let mut rows = Vec::new();
        for table in self.catalog.all_tables() {
            for column in &table.columns {
                rows.push(column_row(table, column));
            }
        }
        let count = rows.len();
        self.warehouse
            .upsert_rows(
                &self.metadata_dataset,
                "column_index",
                &["dataset", "table_name", "column_name"],
                &["vector"],
                rows,
            )
            .await?;
        Ok(StepReport {
            step: Step::PopulateColumns,
            rows_affected: count,
            message: format!("{count} column rows upserted"),
        })
    }

    async fn populate_glossary(&self) -> Nl2SqlResult<StepReport> {
        let rows: Vec<HashMap<String, Value>> = self.catalog.glossary.iter().map(glossary_row).collect();
        let count = rows.len();
        self.warehouse
            .upsert_rows(&self.metadata_dataset, "glossary_index", &["concept_name"], &["vector"], rows)
            .await?;
        Ok(StepReport {
            step: Step::PopulateGlossary,
            rows_affected: count,
            message: format!("{count} glossary rows upserted"),
        })
    }

    /// Batched to stay within request limits (spec §4.2 "Symbol-map
    /// population is batched").
    async fn populate_symbols(&self) -> Nl2SqlResult<StepReport> {
        const BATCH_SIZE: usize = 100;
        let rows: Vec<HashMap<String, Value>> = self
            .catalog
            .exchanges
            .exchanges
            .iter()
            .map(|e| symbol_row(&e.code, &e.gold_dataset, &e.silver_dataset))
            .collect();
        let count = rows.len();
        for batch in rows.chunks(BATCH_SIZE) {
            self.warehouse
                .upsert_rows(&self.metadata_dataset, "symbol_exchange_map", &["exchange_code"], &[], batch.to_vec())
                .await?;
        }
        Ok(StepReport {
            step: Step::PopulateSymbols,
            rows_affected: count,
            message: format!("{count} exchange symbol rows upserted in batches of {BATCH_SIZE}"),
        })
    }

    /// Selects rows where the refresh predicate holds, embeds their
    /// `embed_text`, and writes the vector back. Both "absent" and
    /// "empty" vector count as pending (spec §9 length-of-null
    /// pitfall) — `REFRESH_PREDICATE_SQL` already encodes both checks.
    async fn generate_embeddings(&self) -> Nl2SqlResult<StepReport> {
        let mut total = 0;
        for (table, key_fields) in [
            ("schema_index", &["dataset", "table_name"][..]),
            ("column_index", &["dataset", "table_name", "column_name"][..]),
            ("glossary_index", &["concept_name"][..]),
            ("query_memory", &["question"][..]),
        ] {
            total += self.embed_pending_rows(table, key_fields).await?;
        }
        Ok(StepReport {
            step: Step::GenerateEmbeddings,
            rows_affected: total,
            message: format!("{total} rows re-embedded across schema/column/glossary/query-memory indexes"),
        })
    }

    async fn embed_pending_rows(&self, table: &str, key_fields: &[&str]) -> Nl2SqlResult<usize> {
        let select_cols = key_fields.join(", ");
        let sql = format!(
            "SELECT {select_cols}, embed_text FROM `{}.{}.{table}` WHERE {REFRESH_PREDICATE_SQL}",
            self.warehouse.project(),
            self.metadata_dataset
        );

        let result = self.warehouse.execute(&sql, 10_000, Duration::from_secs(30), Duration::from_secs(120)).await?;

        let mut embedded = 0;
        let mut rows_to_store = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            let text = row.get("embed_text").and_then(|v| v.as_str()).unwrap_or_default();
            if text.is_empty() {
                continue;
            }
            let vector = self.embedding_provider.embed(text, TaskType::RetrievalDocument).await?;
            let mut stored_row: HashMap<String, Value> = key_fields
                .iter()
                .map(|k| (k.to_string(), row.get(*k).cloned().unwrap_or(Value::Null)))
                .collect();
            stored_row.insert("vector".to_string(), json!(serde_json::to_string(&vector.data).unwrap_or_default()));
            rows_to_store.push(stored_row);
            embedded += 1;
        }

        if !rows_to_store.is_empty() {
            self.warehouse.upsert_rows(&self.metadata_dataset, table, key_fields, &[], rows_to_store).await?;
        }

        Ok(embedded)
    }

    async fn create_indexes(&self) -> Nl2SqlResult<StepReport> {
        let project = self.warehouse.project();
        let dataset = &self.metadata_dataset;
        let verb = if self.force { "CREATE OR REPLACE VECTOR INDEX" } else { "CREATE VECTOR INDEX IF NOT EXISTS" };

        let statements = [
            format!("{verb} schema_index_vec ON `{project}.{dataset}.schema_index`(vector) OPTIONS(distance_type='COSINE')"),
            format!("{verb} column_index_vec ON `{project}.{dataset}.column_index`(vector) OPTIONS(distance_type='COSINE')"),
            format!("{verb} glossary_index_vec ON `{project}.{dataset}.glossary_index`(vector) OPTIONS(distance_type='COSINE')"),
            format!("{verb} query_memory_vec ON `{project}.{dataset}.query_memory`(vector) OPTIONS(distance_type='COSINE')"),
        ];

        for statement in &statements {
            self.warehouse.execute_ddl(statement).await?;
        }

        Ok(StepReport {
            step: Step::CreateIndexes,
            rows_affected: statements.len(),
            message: "vector indexes ready on all four search-index tables".to_string(),
        })
    }

    async fn test_search(&self) -> Nl2SqlResult<StepReport> {
        let probe_vector = self.embedding_provider.embed("test search probe", TaskType::RetrievalQuery).await?;
        let sql = format!(
            "SELECT table_name, distance FROM VECTOR_SEARCH(TABLE `{}.{}.schema_index`, 'vector', (SELECT {:?} AS probe), top_k => 1)",
            self.warehouse.project(),
            self.metadata_dataset,
            probe_vector.data,
        );
        let result = self.warehouse.execute(&sql, 1, Duration::from_secs(30), Duration::from_secs(60)).await?;
        Ok(StepReport {
            step: Step::TestSearch,
            rows_affected: result.rows.len(),
            message: if result.rows.is_empty() {
                "test search returned no rows; index may be empty".to_string()
            } else {
                "test search reached the vector index successfully".to_string()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_round_trip() {
        for step in Step::ALL {
            assert_eq!(Step::from_str(step.as_str()), Some(step));
        }
    }

    #[test]
    fn unknown_step_name_is_none() {
        assert_eq!(Step::from_str("not-a-step"), None);
    }
}
