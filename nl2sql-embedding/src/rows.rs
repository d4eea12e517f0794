//! Row builders translating catalog entities into the flat
//! `HashMap<String, Value>` shape `AdminWarehouse::upsert_rows` expects.
//! Embedding-bearing fields are left absent here — they are populated
//! only by the `generate-embeddings` step.

use nl2sql_core::{Column, GlossaryEntry, Layer, Table};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::text::{column_embed_text, glossary_embed_text, schema_embed_text};

pub fn schema_row(table: &Table) -> HashMap<String, Value> {
    let mut row = HashMap::new();
    row.insert("dataset".to_string(), json!(table.dataset));
    row.insert("table_name".to_string(), json!(table.name));
    row.insert("layer".to_string(), json!(table.layer.as_db_str()));
    row.insert("embed_text".to_string(), json!(schema_embed_text(table)));
    row.insert("partition_field".to_string(), json!(table.partition_field));
    row
}

pub fn column_row(table: &Table, column: &Column) -> HashMap<String, Value> {
    let mut row = HashMap::new();
    row.insert("dataset".to_string(), json!(table.dataset));
    row.insert("table_name".to_string(), json!(table.name));
    row.insert("column_name".to_string(), json!(column.name));
    row.insert("embed_text".to_string(), json!(column_embed_text(&table.name, table.layer, column)));
    row.insert(
        "category".to_string(),
        json!(column.category.map(|c| format!("{c:?}").to_lowercase())),
    );
    row.insert("formula".to_string(), json!(column.formula));
    row.insert("example_values".to_string(), json!(column.example_values.join(",")));
    row.insert("related_columns".to_string(), json!(column.related_columns.join(",")));
    row.insert(
        "typical_aggregation".to_string(),
        json!(column.typical_aggregation.map(|a| format!("{a:?}"))),
    );
    row.insert("filterable".to_string(), json!(column.filterable));
    row
}

pub fn glossary_row(entry: &GlossaryEntry) -> HashMap<String, Value> {
    let mut row = HashMap::new();
    row.insert("concept_name".to_string(), json!(entry.name));
    row.insert("embed_text".to_string(), json!(glossary_embed_text(entry)));
    row.insert("related_columns".to_string(), json!(entry.related_columns.join(",")));
    row
}

pub fn symbol_row(exchange_code: &str, gold_dataset: &str, silver_dataset: &str) -> HashMap<String, Value> {
    let mut row = HashMap::new();
    row.insert("exchange_code".to_string(), json!(exchange_code));
    row.insert("gold_dataset".to_string(), json!(gold_dataset));
    row.insert("silver_dataset".to_string(), json!(silver_dataset));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::PreferredTimestamps;

    fn sample_table() -> Table {
        Table {
            name: "daily_edge".to_string(),
            dataset: "gold_omx".to_string(),
            layer: Layer::Gold,
            description: "daily theoretical edge by symbol".to_string(),
            partition_field: "trade_date".to_string(),
            preferred_timestamps: PreferredTimestamps {
                primary: "trade_date".to_string(),
                fallback_chain: vec![],
            },
            business_context: None,
            pipeline_flow: None,
            columns: vec![],
        }
    }

    #[test]
    fn schema_row_carries_natural_key_fields() {
        let row = schema_row(&sample_table());
        assert_eq!(row.get("dataset"), Some(&json!("gold_omx")));
        assert_eq!(row.get("table_name"), Some(&json!("daily_edge")));
    }
}
