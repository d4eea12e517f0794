//! Routing-rule prompt generation (spec §4.1, §4.5.5). Prompt text is
//! *generated* from the structured routing YAML rather than duplicated
//! by hand, precisely so the two can never drift — the drift test
//! below is the contract that guarantees it (spec §8 invariant 3).

use nl2sql_core::RoutingRules;
use std::fmt::Write as _;

/// Render the routing rules as the text block the static system prompt
/// embeds (spec §4.5.5 "Static section... routing rules (generated
/// from routing YAML)").
pub fn generate_routing_prompt(routing: &RoutingRules) -> String {
    let mut out = String::new();

    writeln!(out, "## Table routing").ok();
    for (label, rules) in [
        ("Gold (KPI) routing", &routing.gold_routing),
        ("Silver (data) routing", &routing.silver_routing),
    ] {
        if rules.is_empty() {
            continue;
        }
        writeln!(out, "\n### {label}").ok();
        for rule in rules {
            writeln!(
                out,
                "- patterns [{}] -> {}.{}",
                rule.patterns.join(", "),
                rule.dataset,
                rule.table
            )
            .ok();
        }
    }

    if !routing.cross_cutting.layer_selection.is_empty() {
        writeln!(out, "\n### Layer selection").ok();
        for line in &routing.cross_cutting.layer_selection {
            writeln!(out, "- {line}").ok();
        }
    }

    if !routing.cross_cutting.double_counting_warnings.is_empty() {
        writeln!(out, "\n### Double-counting warnings").ok();
        for warning in &routing.cross_cutting.double_counting_warnings {
            writeln!(
                out,
                "- {} is a superset of [{}]: {}",
                warning.superset_table,
                warning.subset_tables.join(", "),
                warning.note
            )
            .ok();
        }
    }

    if !routing.cross_cutting.time_filter_guidance.is_empty() {
        writeln!(out, "\n### Time-filter guidance").ok();
        for line in &routing.cross_cutting.time_filter_guidance {
            writeln!(out, "- {line}").ok();
        }
    }

    out
}

/// Every table name that appears anywhere in the routing rules
/// (including double-counting warnings), for the drift test.
pub fn tables_named_in_routing(routing: &RoutingRules) -> Vec<String> {
    let mut tables: Vec<String> = routing
        .gold_routing
        .iter()
        .chain(routing.silver_routing.iter())
        .map(|r| r.table.clone())
        .collect();

    for warning in &routing.cross_cutting.double_counting_warnings {
        tables.push(warning.superset_table.clone());
        tables.extend(warning.subset_tables.clone());
    }

    tables.sort();
    tables.dedup();
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::RoutingRule;

    fn sample_routing() -> RoutingRules {
        RoutingRules {
            gold_routing: vec![RoutingRule {
                patterns: vec!["edge".to_string(), "pnl".to_string()],
                table: "daily_edge".to_string(),
                dataset: "gold_omx".to_string(),
            }],
            silver_routing: vec![],
            cross_cutting: Default::default(),
        }
    }

    #[test]
    fn every_routed_table_appears_in_the_generated_prompt() {
        let routing = sample_routing();
        let prompt = generate_routing_prompt(&routing);
        for table in tables_named_in_routing(&routing) {
            assert!(
                prompt.contains(&table),
                "table {table} missing from generated prompt"
            );
        }
    }

    #[test]
    fn double_counting_tables_are_included() {
        let mut routing = sample_routing();
        routing.cross_cutting.double_counting_warnings.push(
            nl2sql_core::DoubleCountingWarning {
                superset_table: "all_trades".to_string(),
                subset_tables: vec!["mako_trades".to_string()],
                note: "mako subset double counts".to_string(),
            },
        );
        let named = tables_named_in_routing(&routing);
        assert!(named.contains(&"all_trades".to_string()));
        assert!(named.contains(&"mako_trades".to_string()));
    }
}
