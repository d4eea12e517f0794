//! Embedded-text builders (spec §3 "Search-index rows"). Each builder
//! produces exactly the text that gets embedded — payload fields
//! carried alongside a row for prompt context are never included here.

use nl2sql_core::{Column, GlossaryEntry, Layer, Table};

pub fn schema_embed_text(table: &Table) -> String {
    let mut text = format!("{}: {}", table.name, table.description);
    if let Some(context) = &table.business_context {
        text.push_str(". ");
        text.push_str(context);
    }
    text
}

pub fn column_embed_text(table_name: &str, layer: Layer, column: &Column) -> String {
    let layer_str = match layer {
        Layer::Gold => "gold",
        Layer::Silver => "silver",
    };
    let synonyms = column.synonyms.join(", ");
    let mut text = format!(
        "{table_name}.{name} ({data_type}, {layer_str}): {description}. Also known as: {synonyms} [{category}]",
        name = column.name,
        data_type = column.data_type,
        description = column.description,
        category = column.category.map(|c| format!("{c:?}").to_lowercase()).unwrap_or_else(|| "uncategorised".to_string()),
    );

    if column.filterable && matches!(column.category, Some(nl2sql_core::ColumnCategory::Dimension)) && !column.example_values.is_empty() {
        let samples: Vec<&str> = column.example_values.iter().take(5).map(|s| s.as_str()).collect();
        text.push_str(". Sample values: ");
        text.push_str(&samples.join(", "));
    }

    text
}

pub fn glossary_embed_text(entry: &GlossaryEntry) -> String {
    format!("{}: {}. Also known as: {}", entry.name, entry.definition, entry.synonyms.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::{Column, ColumnCategory};

    fn sample_column() -> Column {
        Column {
            name: "notional_usd".to_string(),
            data_type: "FLOAT64".to_string(),
            description: "trade notional in USD".to_string(),
            category: Some(ColumnCategory::Measure),
            typical_aggregation: None,
            filterable: true,
            example_values: vec!["100.0".to_string(), "200.0".to_string()],
            comprehensive: Some(false),
            formula: None,
            related_columns: vec![],
            synonyms: vec!["notional".to_string()],
            source: None,
            business_rules: None,
            deprecated: false,
        }
    }

    #[test]
    fn column_text_includes_table_prefix_and_synonyms() {
        let text = column_embed_text("daily_edge", Layer::Gold, &sample_column());
        assert!(text.contains("daily_edge.notional_usd"));
        assert!(text.contains("Also known as: notional"));
    }

    #[test]
    fn non_filterable_columns_omit_sample_values() {
        let mut column = sample_column();
        column.filterable = false;
        let text = column_embed_text("daily_edge", Layer::Gold, &column);
        assert!(!text.contains("Sample values"));
    }
}
