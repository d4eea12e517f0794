//! Typed catalog entities (spec §3). Pure data — loading, validation and
//! caching live in `nl2sql-catalog`.

use crate::EmbeddingVector;
use serde::{Deserialize, Serialize};

/// The two physical layers the warehouse is organized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Gold,
    Silver,
}

impl Layer {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Silver => "silver",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "gold" => Some(Self::Gold),
            "silver" => Some(Self::Silver),
            _ => None,
        }
    }
}

/// Column role in analytical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnCategory {
    Dimension,
    Measure,
    Time,
    Identifier,
}

/// Aggregation a measure column is typically reduced with. Only valid
/// when `Column::category == Measure` (spec §3 invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    #[serde(rename = "SUM")]
    Sum,
    #[serde(rename = "AVG")]
    Avg,
    #[serde(rename = "WEIGHTED_AVG")]
    WeightedAvg,
    #[serde(rename = "COUNT")]
    Count,
    #[serde(rename = "MIN")]
    Min,
    #[serde(rename = "MAX")]
    Max,
}

/// A single column on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub description: String,

    #[serde(default)]
    pub category: Option<ColumnCategory>,
    #[serde(default)]
    pub typical_aggregation: Option<Aggregation>,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub example_values: Vec<String>,
    #[serde(default)]
    pub comprehensive: Option<bool>,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub related_columns: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub business_rules: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
}

/// Preferred timestamp chain: the canonical column first, then
/// fallbacks in preference order (spec §3, glossary "preferred
/// timestamp").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredTimestamps {
    pub primary: String,
    #[serde(default)]
    pub fallback_chain: Vec<String>,
}

/// A table within a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub dataset: String,
    pub layer: Layer,
    pub description: String,
    pub partition_field: String,
    pub preferred_timestamps: PreferredTimestamps,
    #[serde(default)]
    pub business_context: Option<String>,
    #[serde(default)]
    pub pipeline_flow: Option<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A dataset-level descriptor (the `_dataset.yaml` file per layer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub layer: Layer,
    #[serde(default)]
    pub trade_taxonomy_notes: Option<String>,
    #[serde(default)]
    pub preferred_timestamp_chains: Option<String>,
    #[serde(default)]
    pub enum_references: Option<String>,
}

/// A business-glossary concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub related_columns: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Complexity tag on a validated few-shot example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// A validated natural-language question / SQL pair used as a few-shot
/// example and, once confirmed, as a query-memory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub sql: String,
    pub tables: Vec<String>,
    pub dataset: String,
    pub complexity: Complexity,
    #[serde(default)]
    pub routing_signal: Option<String>,
    #[serde(default)]
    pub embedding: Option<EmbeddingVector>,
}

/// Pattern list routing to a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub patterns: Vec<String>,
    pub table: String,
    pub dataset: String,
}

/// Cross-cutting guidance that doesn't route to a specific table: layer
/// selection, double-counting warnings, time-filter guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CrossCuttingRules {
    #[serde(default)]
    pub layer_selection: Vec<String>,
    #[serde(default)]
    pub double_counting_warnings: Vec<DoubleCountingWarning>,
    #[serde(default)]
    pub time_filter_guidance: Vec<String>,
}

/// A superset/subset trade-table pair where summing across both
/// double-counts (glossary "superset trade table").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleCountingWarning {
    pub superset_table: String,
    pub subset_tables: Vec<String>,
    pub note: String,
}

/// The full, loaded routing configuration (spec §4.1
/// `load_routing_rules()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoutingRules {
    pub cross_cutting: CrossCuttingRules,
    pub gold_routing: Vec<RoutingRule>,
    pub silver_routing: Vec<RoutingRule>,
}

/// Exchange code/alias -> (gold dataset, silver dataset) mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub code: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub gold_dataset: String,
    pub silver_dataset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExchangeRegistry {
    pub exchanges: Vec<ExchangeEntry>,
}

impl ExchangeRegistry {
    /// Resolve free-form text to the exchange entry it mentions, if
    /// any. Matching is case-insensitive on the code and every alias.
    pub fn resolve(&self, text: &str) -> Option<&ExchangeEntry> {
        let lower = text.to_lowercase();
        self.exchanges.iter().find(|e| {
            lower.contains(&e.code.to_lowercase())
                || e.aliases.iter().any(|a| lower.contains(&a.to_lowercase()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_round_trips() {
        for l in [Layer::Gold, Layer::Silver] {
            assert_eq!(Layer::from_db_str(l.as_db_str()), Some(l));
        }
    }

    #[test]
    fn exchange_registry_resolves_by_code_or_alias() {
        let reg = ExchangeRegistry {
            exchanges: vec![ExchangeEntry {
                code: "OMX".to_string(),
                aliases: vec!["nasdaq nordic".to_string()],
                gold_dataset: "gold_omx".to_string(),
                silver_dataset: "silver_omx".to_string(),
            }],
        };
        assert!(reg.resolve("what happened on OMX yesterday").is_some());
        assert!(reg.resolve("any trades on Nasdaq Nordic?").is_some());
        assert!(reg.resolve("unrelated question").is_none());
    }
}
