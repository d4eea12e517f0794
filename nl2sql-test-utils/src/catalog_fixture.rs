//! Fixture-catalog tree builder: writes a minimal but structurally
//! complete catalog (spec §6 "Catalog format") to a temp directory and
//! loads it with the real `nl2sql_catalog::load_catalog`, so tests
//! elsewhere in the workspace exercise the real loader/validator
//! instead of hand-built `Catalog` structs that could drift from what
//! the loader actually produces.

use nl2sql_catalog::{load_catalog, Catalog};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// One gold-layer table, `gold_omx.trades`, with a dataset descriptor,
/// a time column and a measure column, one glossary entry, one routing
/// rule, one exchange mapping, and one few-shot example — enough to
/// exercise every catalog-consuming code path without a real desk's
/// full schema.
pub fn write_minimal_catalog_tree(root: &Path) {
    write(
        &root.join("gold/_dataset.yaml"),
        "name: gold_omx\nlayer: gold\ntrade_taxonomy_notes: Daily aggregated trades.\n",
    );
    write(
        &root.join("gold/trades.yaml"),
        r#"
name: trades
dataset: gold_omx
layer: gold
description: Daily trade KPIs per symbol.
partition_field: trade_date
preferred_timestamps:
  primary: trade_date
columns:
  - name: trade_date
    type: DATE
    description: Partition date.
    category: time
  - name: symbol
    type: STRING
    description: Traded symbol.
    category: dimension
    filterable: true
  - name: notional
    type: FLOAT64
    description: Trade notional value.
    category: measure
    typical_aggregation: SUM
"#,
    );
    write(
        &root.join("_routing.yaml"),
        r#"
gold_routing:
  - patterns: ["notional", "trade volume"]
    table: trades
    dataset: gold_omx
silver_routing: []
cross_cutting:
  layer_selection: ["Prefer gold tables for desk-facing KPIs."]
  double_counting_warnings: []
  time_filter_guidance: ["Always filter on trade_date."]
"#,
    );
    write(
        &root.join("glossary.yaml"),
        r#"
entries:
  - name: notional
    definition: The total traded value of a transaction.
    synonyms: ["trade value"]
    related_columns: ["notional"]
"#,
    );
    write(
        &root.join("_exchanges.yaml"),
        r#"
exchanges:
  - code: OMX
    aliases: ["nasdaq nordic"]
    gold_dataset: gold_omx
    silver_dataset: silver_omx
"#,
    );
    write(
        &root.join("examples/trades.yaml"),
        r#"
examples:
  - question: "What was the total notional traded yesterday?"
    sql: "SELECT SUM(notional) FROM `proj.gold_omx.trades` WHERE trade_date = CURRENT_DATE() - 1"
    tables: ["trades"]
    dataset: gold_omx
    complexity: simple
    routing_signal: trades
"#,
    );
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).expect("create fixture catalog directory");
    fs::write(path, contents).expect("write fixture catalog file");
}

/// Build the minimal fixture tree under a fresh temp directory, load it
/// with the real loader, and hand back both the `Catalog` and the
/// `TempDir` (keep the guard alive for as long as the catalog's path is
/// needed, e.g. if a test re-reads the tree).
pub fn minimal_catalog() -> (Catalog, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir for fixture catalog");
    write_minimal_catalog_tree(dir.path());
    let catalog = load_catalog(dir.path()).expect("fixture catalog must be valid");
    (catalog, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_catalog_loads_and_validates() {
        let (catalog, _dir) = minimal_catalog();
        assert!(catalog.table("gold_omx", "trades").is_some());
        assert_eq!(catalog.glossary.len(), 1);
        assert_eq!(catalog.few_shot_examples.len(), 1);
        assert_eq!(catalog.exchanges.exchanges.len(), 1);
        assert_eq!(catalog.routing.gold_routing.len(), 1);
    }
}
