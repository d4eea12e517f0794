//! Catalog invariants (spec §3, §8). Run at load time and in CI — never
//! at query time, so a bad catalog fails loudly and early rather than
//! surfacing as a confusing SQL-generation error.

use crate::Catalog;
use nl2sql_core::{CatalogError, ColumnCategory, Nl2SqlError, Nl2SqlResult, Table};

pub fn validate(catalog: &Catalog) -> Nl2SqlResult<()> {
    for table in catalog.all_tables() {
        validate_partition_field(table)?;
        for column in &table.columns {
            validate_column(table, column)?;
        }
    }

    for example in &catalog.few_shot_examples {
        validate_few_shot(catalog, example)?;
    }

    for rule in catalog
        .routing
        .gold_routing
        .iter()
        .chain(catalog.routing.silver_routing.iter())
    {
        if catalog.table(&rule.dataset, &rule.table).is_none() {
            return Err(Nl2SqlError::Catalog(CatalogError::RoutingUnknownTable {
                dataset: rule.dataset.clone(),
                table: rule.table.clone(),
            }));
        }
    }

    Ok(())
}

fn validate_partition_field(table: &Table) -> Nl2SqlResult<()> {
    if table.column(&table.partition_field).is_none() {
        return Err(Nl2SqlError::Catalog(CatalogError::UnknownPartitionField {
            dataset: table.dataset.clone(),
            table: table.name.clone(),
            field: table.partition_field.clone(),
        }));
    }
    Ok(())
}

fn validate_column(table: &Table, column: &nl2sql_core::Column) -> Nl2SqlResult<()> {
    let dataset = table.dataset.clone();
    let tname = table.name.clone();
    let cname = column.name.clone();

    if column.typical_aggregation.is_some() && column.category != Some(ColumnCategory::Measure) {
        return Err(Nl2SqlError::Catalog(CatalogError::AggregationRequiresMeasure {
            dataset,
            table: tname,
            column: cname,
        }));
    }

    if column.comprehensive == Some(true) && column.example_values.is_empty() {
        return Err(Nl2SqlError::Catalog(CatalogError::ComprehensiveRequiresExamples {
            dataset: table.dataset.clone(),
            table: table.name.clone(),
            column: column.name.clone(),
        }));
    }

    if column.example_values.len() > 25 {
        return Err(Nl2SqlError::Catalog(CatalogError::TooManyExampleValues {
            dataset: table.dataset.clone(),
            table: table.name.clone(),
            column: column.name.clone(),
            len: column.example_values.len(),
        }));
    }

    if column.related_columns.len() > 5 {
        return Err(Nl2SqlError::Catalog(CatalogError::TooManyRelatedColumns {
            dataset: table.dataset.clone(),
            table: table.name.clone(),
            column: column.name.clone(),
            len: column.related_columns.len(),
        }));
    }

    if let Some(formula) = &column.formula {
        if formula.contains('\n') {
            return Err(Nl2SqlError::Catalog(CatalogError::MultilineFormula {
                dataset: table.dataset.clone(),
                table: table.name.clone(),
                column: column.name.clone(),
            }));
        }
    }

    for related in &column.related_columns {
        if table.column(related).is_none() {
            return Err(Nl2SqlError::Catalog(CatalogError::DanglingColumnReference {
                dataset: table.dataset.clone(),
                table: table.name.clone(),
                via: "related_columns".to_string(),
                column: related.clone(),
            }));
        }
    }

    Ok(())
}

fn validate_few_shot(catalog: &Catalog, example: &nl2sql_core::FewShotExample) -> Nl2SqlResult<()> {
    for table_name in &example.tables {
        let table = catalog
            .table(&example.dataset, table_name)
            .ok_or_else(|| {
                Nl2SqlError::Catalog(CatalogError::FewShotUnknownTable {
                    dataset: example.dataset.clone(),
                    table: table_name.clone(),
                })
            })?;

        for column_name in referenced_columns(&example.sql, table) {
            if table.column(&column_name).is_none() {
                return Err(Nl2SqlError::Catalog(CatalogError::FewShotUnknownColumn {
                    table: table_name.clone(),
                    column: column_name,
                }));
            }
        }
    }
    Ok(())
}

/// Which of this table's columns are textually referenced in the SQL.
/// This is a conservative token-membership check (not a real SQL
/// parser): it is sufficient for the cross-reference invariant, which
/// only needs to catch columns that were renamed or removed from the
/// catalog but left behind in a stored example.
fn referenced_columns(sql: &str, table: &Table) -> Vec<String> {
    let upper = sql.to_uppercase();
    table
        .columns
        .iter()
        .filter(|c| upper.contains(&c.name.to_uppercase()))
        .map(|c| c.name.clone())
        .collect::<Vec<_>>()
        .into_iter()
        .filter(|name| sql_word_present(sql, name))
        .collect()
}

fn sql_word_present(sql: &str, word: &str) -> bool {
    sql.to_lowercase().contains(&word.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::{Column, Complexity, FewShotExample, Layer, PreferredTimestamps};

    fn sample_table() -> Table {
        Table {
            name: "trades".to_string(),
            dataset: "gold_omx".to_string(),
            layer: Layer::Gold,
            description: "d".to_string(),
            partition_field: "trade_date".to_string(),
            preferred_timestamps: PreferredTimestamps {
                primary: "trade_date".to_string(),
                fallback_chain: vec![],
            },
            business_context: None,
            pipeline_flow: None,
            columns: vec![
                Column {
                    name: "trade_date".to_string(),
                    data_type: "DATE".to_string(),
                    description: "d".to_string(),
                    category: Some(ColumnCategory::Time),
                    typical_aggregation: None,
                    filterable: true,
                    example_values: vec![],
                    comprehensive: None,
                    formula: None,
                    related_columns: vec![],
                    synonyms: vec![],
                    source: None,
                    business_rules: None,
                    deprecated: false,
                },
                Column {
                    name: "notional".to_string(),
                    data_type: "FLOAT64".to_string(),
                    description: "d".to_string(),
                    category: Some(ColumnCategory::Measure),
                    typical_aggregation: Some(nl2sql_core::Aggregation::Sum),
                    filterable: false,
                    example_values: vec![],
                    comprehensive: None,
                    formula: None,
                    related_columns: vec![],
                    synonyms: vec![],
                    source: None,
                    business_rules: None,
                    deprecated: false,
                },
            ],
        }
    }

    fn catalog_with(table: Table) -> Catalog {
        let mut catalog = Catalog::default();
        catalog
            .tables
            .insert((table.dataset.clone(), table.name.clone()), table);
        catalog
    }

    #[test]
    fn valid_catalog_passes() {
        let catalog = catalog_with(sample_table());
        assert!(validate(&catalog).is_ok());
    }

    #[test]
    fn bad_partition_field_is_rejected() {
        let mut table = sample_table();
        table.partition_field = "does_not_exist".to_string();
        let catalog = catalog_with(table);
        assert!(validate(&catalog).is_err());
    }

    #[test]
    fn aggregation_without_measure_category_is_rejected() {
        let mut table = sample_table();
        table.columns[0].typical_aggregation = Some(nl2sql_core::Aggregation::Sum);
        let catalog = catalog_with(table);
        assert!(matches!(
            validate(&catalog),
            Err(Nl2SqlError::Catalog(CatalogError::AggregationRequiresMeasure { .. }))
        ));
    }

    #[test]
    fn comprehensive_without_examples_is_rejected() {
        let mut table = sample_table();
        table.columns[0].comprehensive = Some(true);
        let catalog = catalog_with(table);
        assert!(matches!(
            validate(&catalog),
            Err(Nl2SqlError::Catalog(CatalogError::ComprehensiveRequiresExamples { .. }))
        ));
    }

    #[test]
    fn dangling_related_column_is_rejected() {
        let mut table = sample_table();
        table.columns[1].related_columns = vec!["ghost_column".to_string()];
        let catalog = catalog_with(table);
        assert!(matches!(
            validate(&catalog),
            Err(Nl2SqlError::Catalog(CatalogError::DanglingColumnReference { .. }))
        ));
    }

    #[test]
    fn few_shot_example_referencing_unknown_table_is_rejected() {
        let table = sample_table();
        let mut catalog = catalog_with(table);
        catalog.few_shot_examples.push(FewShotExample {
            question: "q".to_string(),
            sql: "SELECT notional FROM trades".to_string(),
            tables: vec!["nonexistent".to_string()],
            dataset: "gold_omx".to_string(),
            complexity: Complexity::Simple,
            routing_signal: None,
            embedding: None,
        });
        assert!(matches!(
            validate(&catalog),
            Err(Nl2SqlError::Catalog(CatalogError::FewShotUnknownTable { .. }))
        ));
    }

    #[test]
    fn routing_rule_to_unknown_table_is_rejected() {
        let table = sample_table();
        let mut catalog = catalog_with(table);
        catalog.routing.gold_routing.push(nl2sql_core::RoutingRule {
            patterns: vec!["edge".to_string()],
            table: "ghost_table".to_string(),
            dataset: "gold_omx".to_string(),
        });
        assert!(matches!(
            validate(&catalog),
            Err(Nl2SqlError::Catalog(CatalogError::RoutingUnknownTable { .. }))
        ));
    }
}
