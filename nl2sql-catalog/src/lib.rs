//! NL2SQL Catalog (C1) — typed, validated view of the warehouse schema
//! plus human knowledge, loaded from a YAML file tree (spec §4.1).

mod cache;
mod loader;
mod prompt;
mod validate;

pub use cache::{clear_cache, load_cached};
pub use loader::load_catalog;
pub use prompt::generate_routing_prompt;
pub use validate::validate;

use nl2sql_core::{Dataset, ExchangeRegistry, FewShotExample, GlossaryEntry, RoutingRules, Table};
use std::collections::HashMap;

/// Key identifying a table: (dataset, table name).
pub type TableKey = (String, String);

/// The fully loaded, validated catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub tables: HashMap<TableKey, Table>,
    pub datasets: HashMap<String, Dataset>,
    pub glossary: Vec<GlossaryEntry>,
    pub few_shot_examples: Vec<FewShotExample>,
    pub routing: RoutingRules,
    pub exchanges: ExchangeRegistry,
}

impl Catalog {
    /// Look up a table by (dataset, table). Missing tables are reported
    /// as an error result upstream, not an exception (spec §4.1).
    pub fn table(&self, dataset: &str, table: &str) -> Option<&Table> {
        self.tables.get(&(dataset.to_string(), table.to_string()))
    }

    /// A table with the dataset-level business context appended under
    /// a reserved key, for full-metadata loads (spec §4.1
    /// `load_table`).
    pub fn table_with_dataset_context(&self, dataset: &str, table: &str) -> Option<TableView<'_>> {
        let t = self.table(dataset, table)?;
        Some(TableView {
            table: t,
            dataset_context: self.datasets.get(dataset),
        })
    }

    pub fn all_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
}

/// A table joined with its dataset-level context, the shape
/// `load_table` returns to callers.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    pub table: &'a Table,
    pub dataset_context: Option<&'a Dataset>,
}
