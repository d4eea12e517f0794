//! Combined single-round-trip vector search (spec §4.3.1). One query
//! embeds the question once and fans out to column/glossary/query-memory
//! search, unioned into rows tagged by a `source` discriminator (spec
//! glossary "combined search CTE"). If the column-level branch errors
//! (index missing/empty), the caller falls back to a table-level search
//! against the schema index (spec §4.3.1 "Fallback").

use async_trait::async_trait;
use nl2sql_core::{Complexity, EmbeddingVector, FewShotExample, GlossaryEntry, Nl2SqlResult};
use nl2sql_warehouse::Row;

/// A single hit from the combined search or the table-level fallback,
/// tagged by the index it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchHit {
    Column {
        dataset: String,
        table: String,
        column_name: String,
        data_type: String,
        description: String,
        synonyms: Vec<String>,
        category: Option<String>,
        formula: Option<String>,
        example_values: Vec<String>,
        related_columns: Vec<String>,
        typical_aggregation: Option<String>,
        filterable: bool,
        distance: f32,
    },
    Glossary {
        entry: GlossaryEntry,
        distance: f32,
    },
    QueryMemory {
        example: FewShotExample,
        distance: f32,
    },
    /// Fallback-only: a schema-level table hit with no column context.
    Table {
        dataset: String,
        table: String,
        distance: f32,
    },
}

impl SearchHit {
    pub fn distance(&self) -> f32 {
        match self {
            SearchHit::Column { distance, .. }
            | SearchHit::Glossary { distance, .. }
            | SearchHit::QueryMemory { distance, .. }
            | SearchHit::Table { distance, .. } => *distance,
        }
    }
}

/// Anything the retrieval engine needs from a warehouse: the combined
/// search round-trip, and the table-level fallback it drops to on
/// failure. Kept separate from `nl2sql_warehouse::Warehouse` since
/// these queries return tagged index rows, not arbitrary LLM-composed
/// SQL results.
#[async_trait]
pub trait SearchWarehouse: Send + Sync {
    async fn combined_search(&self, sql: &str) -> Nl2SqlResult<Vec<Row>>;
    async fn table_fallback_search(&self, sql: &str) -> Nl2SqlResult<Vec<Row>>;
    async fn semantic_cache_probe(&self, sql: &str) -> Nl2SqlResult<Option<Row>>;
}

/// Tunable top-K/fan-out knobs (spec §6 defaults).
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub column_top_k: usize,
    pub max_per_table: usize,
    pub glossary_top_k: usize,
    pub query_memory_top_k: usize,
    pub table_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            column_top_k: 30,
            max_per_table: 15,
            glossary_top_k: 3,
            query_memory_top_k: 5,
            table_top_k: 5,
        }
    }
}

fn vector_literal(vector: &EmbeddingVector) -> String {
    format!(
        "[{}]",
        vector.data.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    )
}

/// Build the single combined-search CTE: one `question_embedding` CTE,
/// three `VECTOR_SEARCH` branches over column/glossary/query-memory
/// indexes, unioned with a literal `source` discriminator column (spec
/// §4.3.1). The question's text is never interpolated — only the
/// already-embedded numeric vector is inlined, since BigQuery has no
/// parameter-binding path for array-typed literals used inside
/// `VECTOR_SEARCH`.
pub fn build_combined_search_sql(project: &str, metadata_dataset: &str, question_vector: &EmbeddingVector, config: &SearchConfig) -> String {
    let vector = vector_literal(question_vector);
    format!(
        "WITH question_embedding AS (SELECT {vector} AS vector) \
         SELECT 'column' AS source, base.dataset AS dataset, base.table_name AS table_name, \
                base.column_name AS column_name, base.embed_text AS embed_text, \
                base.category AS category, base.formula AS formula, base.example_values AS example_values, \
                base.related_columns AS related_columns, base.typical_aggregation AS typical_aggregation, \
                base.filterable AS filterable, CAST(NULL AS STRING) AS concept_name, \
                CAST(NULL AS STRING) AS question, CAST(NULL AS STRING) AS sql_text, \
                CAST(NULL AS STRING) AS tables, CAST(NULL AS STRING) AS complexity, \
                CAST(NULL AS STRING) AS routing_signal, distance \
         FROM VECTOR_SEARCH(TABLE `{project}.{metadata_dataset}.column_index`, 'vector', TABLE question_embedding, top_k => {column_top_k}, distance_type => 'COSINE') \
         UNION ALL \
         SELECT 'glossary', CAST(NULL AS STRING), CAST(NULL AS STRING), CAST(NULL AS STRING), base.embed_text, \
                CAST(NULL AS STRING), CAST(NULL AS STRING), CAST(NULL AS STRING), base.related_columns, CAST(NULL AS STRING), \
                CAST(NULL AS BOOL), base.concept_name, CAST(NULL AS STRING), CAST(NULL AS STRING), CAST(NULL AS STRING), \
                CAST(NULL AS STRING), CAST(NULL AS STRING), distance \
         FROM VECTOR_SEARCH(TABLE `{project}.{metadata_dataset}.glossary_index`, 'vector', TABLE question_embedding, top_k => {glossary_top_k}, distance_type => 'COSINE') \
         UNION ALL \
         SELECT 'query_memory', base.dataset, CAST(NULL AS STRING), CAST(NULL AS STRING), CAST(NULL AS STRING), \
                CAST(NULL AS STRING), CAST(NULL AS STRING), CAST(NULL AS STRING), CAST(NULL AS STRING), CAST(NULL AS STRING), \
                CAST(NULL AS BOOL), CAST(NULL AS STRING), base.question, base.sql, base.tables, base.complexity, \
                base.routing_signal, distance \
         FROM VECTOR_SEARCH(TABLE `{project}.{metadata_dataset}.query_memory`, 'vector', TABLE question_embedding, top_k => {query_memory_top_k}, distance_type => 'COSINE')",
        vector = vector,
        column_top_k = config.column_top_k,
        glossary_top_k = config.glossary_top_k,
        query_memory_top_k = config.query_memory_top_k,
    )
}

/// Table-level fallback (spec §4.3.1 "Fallback"). Run only when the
/// column-level branch of the combined search errors.
pub fn build_table_fallback_sql(project: &str, metadata_dataset: &str, question_vector: &EmbeddingVector, top_k: usize) -> String {
    let vector = vector_literal(question_vector);
    format!(
        "SELECT 'table' AS source, base.dataset AS dataset, base.table_name AS table_name, distance \
         FROM VECTOR_SEARCH(TABLE `{project}.{metadata_dataset}.schema_index`, 'vector', (SELECT {vector} AS vector), top_k => {top_k}, distance_type => 'COSINE')"
    )
}

fn string_field(row: &Row, key: &str) -> Option<String> {
    row.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn csv_field(row: &Row, key: &str) -> Vec<String> {
    string_field(row, key)
        .map(|s| s.split(',').map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect())
        .unwrap_or_default()
}

fn distance_field(row: &Row) -> f32 {
    row.get("distance").and_then(|v| v.as_f64()).unwrap_or(f32::MAX as f64) as f32
}

/// Parse the unioned combined-search result into typed hits, switching
/// on the `source` discriminator column (spec §4.3.1).
pub fn parse_search_hits(rows: &[Row]) -> Vec<SearchHit> {
    rows.iter().filter_map(parse_search_hit).collect()
}

fn parse_search_hit(row: &Row) -> Option<SearchHit> {
    let source = string_field(row, "source")?;
    let distance = distance_field(row);
    match source.as_str() {
        "column" => Some(SearchHit::Column {
            dataset: string_field(row, "dataset")?,
            table: string_field(row, "table_name")?,
            column_name: string_field(row, "column_name")?,
            data_type: string_field(row, "data_type").unwrap_or_default(),
            description: string_field(row, "embed_text").unwrap_or_default(),
            synonyms: csv_field(row, "synonyms"),
            category: string_field(row, "category"),
            formula: string_field(row, "formula"),
            example_values: csv_field(row, "example_values"),
            related_columns: csv_field(row, "related_columns"),
            typical_aggregation: string_field(row, "typical_aggregation"),
            filterable: row.get("filterable").and_then(|v| v.as_bool()).unwrap_or(false),
            distance,
        }),
        "glossary" => Some(SearchHit::Glossary {
            entry: GlossaryEntry {
                name: string_field(row, "concept_name")?,
                definition: string_field(row, "embed_text").unwrap_or_default(),
                synonyms: Vec::new(),
                related_columns: csv_field(row, "related_columns"),
                category: None,
            },
            distance,
        }),
        "query_memory" => Some(SearchHit::QueryMemory {
            example: FewShotExample {
                question: string_field(row, "question")?,
                sql: string_field(row, "sql_text").unwrap_or_default(),
                tables: csv_field(row, "tables"),
                dataset: string_field(row, "dataset").unwrap_or_default(),
                complexity: parse_complexity(string_field(row, "complexity").as_deref()),
                routing_signal: string_field(row, "routing_signal"),
                embedding: None,
            },
            distance,
        }),
        "table" => Some(SearchHit::Table {
            dataset: string_field(row, "dataset")?,
            table: string_field(row, "table_name")?,
            distance,
        }),
        _ => None,
    }
}

fn parse_complexity(value: Option<&str>) -> Complexity {
    match value {
        Some("moderate") => Complexity::Moderate,
        Some("complex") => Complexity::Complex,
        _ => Complexity::Simple,
    }
}

/// A relevant column surfaced alongside its table, carrying the payload
/// fields a prompt needs to compose SQL (spec §3 "Payload column").
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHit {
    pub column_name: String,
    pub data_type: String,
    pub description: String,
    pub synonyms: Vec<String>,
    pub category: Option<String>,
    pub formula: Option<String>,
    pub example_values: Vec<String>,
    pub related_columns: Vec<String>,
    pub typical_aggregation: Option<String>,
    pub filterable: bool,
    pub distance: f32,
}

/// A candidate table ranked by its best-matching column (spec §4.3.1
/// step 3).
#[derive(Debug, Clone, PartialEq)]
pub struct TableCandidate {
    pub dataset: String,
    pub table: String,
    pub min_distance: f32,
    pub hit_count: usize,
    pub columns: Vec<ColumnHit>,
}

/// Aggregate column hits by `(dataset, table)`: rank by `min(distance)`,
/// carry `count(*)` as a secondary signal, and keep up to
/// `max_per_table` columns ordered by distance. Tie-break is lower
/// `min(distance)` first, then higher `count(*)`, then table name
/// lexicographically (spec §4.3.4).
pub fn aggregate_by_table(hits: &[SearchHit], max_per_table: usize) -> Vec<TableCandidate> {
    use std::collections::HashMap;

    let mut grouped: HashMap<(String, String), Vec<&SearchHit>> = HashMap::new();
    for hit in hits {
        if let SearchHit::Column { dataset, table, .. } = hit {
            grouped.entry((dataset.clone(), table.clone())).or_default().push(hit);
        }
    }

    let mut candidates: Vec<TableCandidate> = grouped
        .into_iter()
        .map(|((dataset, table), mut column_hits)| {
            column_hits.sort_by(|a, b| a.distance().partial_cmp(&b.distance()).unwrap_or(std::cmp::Ordering::Equal));
            let min_distance = column_hits.first().map(|h| h.distance()).unwrap_or(f32::MAX);
            let hit_count = column_hits.len();
            let columns = column_hits
                .into_iter()
                .take(max_per_table)
                .filter_map(|hit| match hit {
                    SearchHit::Column {
                        column_name,
                        data_type,
                        description,
                        synonyms,
                        category,
                        formula,
                        example_values,
                        related_columns,
                        typical_aggregation,
                        filterable,
                        distance,
                        ..
                    } => Some(ColumnHit {
                        column_name: column_name.clone(),
                        data_type: data_type.clone(),
                        description: description.clone(),
                        synonyms: synonyms.clone(),
                        category: category.clone(),
                        formula: formula.clone(),
                        example_values: example_values.clone(),
                        related_columns: related_columns.clone(),
                        typical_aggregation: typical_aggregation.clone(),
                        filterable: *filterable,
                        distance: *distance,
                    }),
                    _ => None,
                })
                .collect();
            TableCandidate {
                dataset,
                table,
                min_distance,
                hit_count,
                columns,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.min_distance
            .partial_cmp(&b.min_distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.hit_count.cmp(&a.hit_count))
            .then_with(|| a.table.cmp(&b.table))
    });

    candidates
}

/// A glossary hit, sorted and truncated to the configured top-K.
#[derive(Debug, Clone, PartialEq)]
pub struct GlossaryCandidate {
    pub entry: GlossaryEntry,
    pub distance: f32,
}

pub fn glossary_candidates(hits: &[SearchHit], top_k: usize) -> Vec<GlossaryCandidate> {
    let mut out: Vec<GlossaryCandidate> = hits
        .iter()
        .filter_map(|hit| match hit {
            SearchHit::Glossary { entry, distance } => Some(GlossaryCandidate {
                entry: entry.clone(),
                distance: *distance,
            }),
            _ => None,
        })
        .collect();
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(top_k);
    out
}

/// A few-shot example hit, sorted and truncated to the configured
/// top-K.
#[derive(Debug, Clone, PartialEq)]
pub struct ExampleCandidate {
    pub example: FewShotExample,
    pub distance: f32,
}

pub fn example_candidates(hits: &[SearchHit], top_k: usize) -> Vec<ExampleCandidate> {
    let mut out: Vec<ExampleCandidate> = hits
        .iter()
        .filter_map(|hit| match hit {
            SearchHit::QueryMemory { example, distance } => Some(ExampleCandidate {
                example: example.clone(),
                distance: *distance,
            }),
            _ => None,
        })
        .collect();
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(top_k);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column_row(dataset: &str, table: &str, column: &str, distance: f32) -> Row {
        let mut row = Row::new();
        row.insert("source".to_string(), json!("column"));
        row.insert("dataset".to_string(), json!(dataset));
        row.insert("table_name".to_string(), json!(table));
        row.insert("column_name".to_string(), json!(column));
        row.insert("embed_text".to_string(), json!("a description"));
        row.insert("distance".to_string(), json!(distance));
        row.insert("filterable".to_string(), json!(true));
        row
    }

    #[test]
    fn table_ranking_orders_by_min_distance_then_count_then_name() {
        let rows = vec![
            column_row("gold_omx", "b_table", "x", 0.2),
            column_row("gold_omx", "a_table", "y", 0.1),
            column_row("gold_omx", "a_table", "z", 0.15),
            column_row("gold_omx", "c_table", "w", 0.1),
        ];
        let hits = parse_search_hits(&rows);
        let candidates = aggregate_by_table(&hits, 15);

        // a_table and c_table tie on min_distance=0.1; a_table has 2 hits, c_table has 1.
        assert_eq!(candidates[0].table, "a_table");
        assert_eq!(candidates[1].table, "c_table");
        assert_eq!(candidates[2].table, "b_table");
    }

    #[test]
    fn max_per_table_truncates_columns() {
        let rows: Vec<Row> = (0..20).map(|i| column_row("gold_omx", "daily_edge", &format!("col_{i}"), i as f32 * 0.01)).collect();
        let hits = parse_search_hits(&rows);
        let candidates = aggregate_by_table(&hits, 15);
        assert_eq!(candidates[0].hit_count, 20);
        assert_eq!(candidates[0].columns.len(), 15);
    }

    #[test]
    fn glossary_hits_are_capped_and_sorted() {
        let mut rows = Vec::new();
        for (name, distance) in [("edge", 0.3), ("notional", 0.1), ("slippage", 0.2), ("vwap", 0.05)] {
            let mut row = Row::new();
            row.insert("source".to_string(), json!("glossary"));
            row.insert("concept_name".to_string(), json!(name));
            row.insert("embed_text".to_string(), json!("definition"));
            row.insert("distance".to_string(), json!(distance));
            rows.push(row);
        }
        let hits = parse_search_hits(&rows);
        let top = glossary_candidates(&hits, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].entry.name, "vwap");
    }

    #[test]
    fn unknown_source_tag_is_dropped_not_panicked() {
        let mut row = Row::new();
        row.insert("source".to_string(), json!("unknown"));
        let hits = parse_search_hits(&[row]);
        assert!(hits.is_empty());
    }
}
