//! File-tree loader. Self-contained per-table files: shared columns may
//! be duplicated across tables; that's deliberate (spec §4.1 "Key
//! design decisions") — it trades storage for independent editability,
//! and the cross-reference invariants in `validate` guard against the
//! resulting drift.

use crate::Catalog;
use nl2sql_core::{
    CatalogError, Dataset, ExchangeRegistry, FewShotExample, GlossaryEntry, Nl2SqlError,
    Nl2SqlResult, RoutingRules, Table,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct GlossaryFile {
    #[serde(default)]
    entries: Vec<GlossaryEntry>,
}

#[derive(Debug, Deserialize)]
struct ExamplesFile {
    #[serde(default)]
    examples: Vec<FewShotExample>,
}

const LAYER_DIRS: [&str; 2] = ["gold", "silver"];

/// Load and validate the full catalog from `{catalog_root}`. See spec
/// §6 "Catalog format" for the expected tree shape.
pub fn load_catalog(root: &Path) -> Nl2SqlResult<Catalog> {
    let mut tables = HashMap::new();
    let mut datasets = HashMap::new();

    for layer_dir in LAYER_DIRS {
        let dir = root.join(layer_dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in read_dir_yaml_files(&dir)? {
            let file_name = entry
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            if file_name.starts_with('_') {
                if file_name == "_dataset" {
                    let dataset: Dataset = parse_yaml(&entry)?;
                    datasets.insert(dataset.name.clone(), dataset);
                }
                continue;
            }

            let table: Table = parse_yaml(&entry)?;
            tables.insert((table.dataset.clone(), table.name.clone()), table);
        }
    }

    let routing: RoutingRules = read_optional_yaml(&root.join("_routing.yaml"))?.unwrap_or_default();
    let glossary: Vec<GlossaryEntry> = read_optional_yaml::<GlossaryFile>(&root.join("glossary.yaml"))?
        .map(|f| f.entries)
        .unwrap_or_default();
    let exchanges: ExchangeRegistry =
        read_optional_yaml(&root.join("_exchanges.yaml"))?.unwrap_or_default();

    let mut few_shot_examples = Vec::new();
    let examples_dir = root.join("examples");
    if examples_dir.is_dir() {
        for entry in read_dir_yaml_files(&examples_dir)? {
            let file: ExamplesFile = parse_yaml(&entry)?;
            few_shot_examples.extend(file.examples);
        }
    }

    let catalog = Catalog {
        tables,
        datasets,
        glossary,
        few_shot_examples,
        routing,
        exchanges,
    };

    crate::validate::validate(&catalog)?;
    Ok(catalog)
}

fn read_dir_yaml_files(dir: &Path) -> Nl2SqlResult<Vec<std::path::PathBuf>> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Nl2SqlError::Catalog(CatalogError::Io {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| {
            Nl2SqlError::Catalog(CatalogError::Io {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn parse_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Nl2SqlResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Nl2SqlError::Catalog(CatalogError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    serde_yaml::from_str(&contents).map_err(|e| {
        Nl2SqlError::Catalog(CatalogError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })
}

fn read_optional_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Nl2SqlResult<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(parse_yaml(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn loads_minimal_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(
            &root.join("gold/_dataset.yaml"),
            "name: gold_omx\nlayer: gold\n",
        );
        write(
            &root.join("gold/trades.yaml"),
            r#"
name: trades
dataset: gold_omx
layer: gold
description: Daily trade KPIs.
partition_field: trade_date
preferred_timestamps:
  primary: trade_date
columns:
  - name: trade_date
    type: DATE
    description: Partition date.
    category: time
  - name: notional
    type: FLOAT64
    description: Trade notional value.
    category: measure
    typical_aggregation: SUM
"#,
        );

        let catalog = load_catalog(root).unwrap();
        assert!(catalog.table("gold_omx", "trades").is_some());
        assert_eq!(catalog.datasets.len(), 1);
    }

    #[test]
    fn skips_underscore_prefixed_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("gold/_dataset.yaml"), "name: gold_omx\nlayer: gold\n");
        let catalog = load_catalog(root).unwrap();
        assert!(catalog.tables.is_empty());
    }

    #[test]
    fn missing_table_is_none_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = load_catalog(dir.path()).unwrap();
        assert!(catalog.table("gold_omx", "nonexistent").is_none());
    }
}
