//! Prompt assembly (spec §4.5.5): a static section cached for the
//! process lifetime — tool roster, tool-usage order, routing rules
//! generated from the routing YAML, SQL guidelines — plus a dynamic
//! section recomposed every turn from whatever the state carries right
//! now: the resolved exchange, the most recent tool error, and a
//! trimmed SQL/row preview so the transcript doesn't grow without
//! bound across retries.

use nl2sql_catalog::generate_routing_prompt;
use nl2sql_core::RoutingRules;
use once_cell::sync::OnceCell;
use serde_json::Value;

static STATIC_PROMPT: OnceCell<String> = OnceCell::new();

/// The static system-prompt section, built once per process and
/// reused for every turn (spec §4.5.5 "Static section... cached").
pub fn static_system_prompt(routing: &RoutingRules) -> &'static str {
    STATIC_PROMPT.get_or_init(|| build_static_prompt(routing))
}

fn build_static_prompt(routing: &RoutingRules) -> String {
    format!(
        "You are a read-only SQL analyst for an options market-making desk. Answer questions \
         by composing and running BigQuery SQL against the catalog described below; never guess \
         at a schema you haven't looked up.\n\n\
         ## Tools, in the order you should reach for them\n\
         0. resolve_exchange - if the question names an exchange, symbol, or market.\n\
         1. check_semantic_cache - always, for every new question; a hit means you can answer \
         immediately from its cached SQL instead of searching.\n\
         2. vector_search_columns - to find candidate tables, columns, glossary terms, and \
         query-memory examples for the question.\n\
         3. fetch_few_shot_examples - for additional validated question/SQL pairs.\n\
         4. load_yaml_metadata - optionally, for a table's full schema when the search payload \
         isn't enough to compose correct SQL.\n\
         5. dry_run_sql - before every execute_sql, to validate the query plan.\n\
         6. execute_sql - once the dry run is valid.\n\
         7. save_validated_query - only after the user confirms the answer is correct.\n\n\
         ## SQL rules\n\
         - Only SELECT statements. Never write INSERT, UPDATE, DELETE, DROP, ALTER, TRUNCATE, \
         MERGE, or CREATE, even inside a CTE.\n\
         - Always filter on the table's partition_field.\n\
         - Prefer a table's preferred_timestamps.primary column; fall back down its chain only \
         when primary doesn't cover the question's time range.\n\
         - A query without an explicit terminal LIMIT will have one appended automatically; add \
         your own when you want a smaller result.\n\
         - Summing across a superset trade table and its listed subset tables double-counts \
         trades; see the warning below if one applies to your tables.\n\n\
         {routing_prompt}",
        routing_prompt = generate_routing_prompt(routing)
    )
}

/// Everything the dynamic section needs this turn (spec §4.5.5
/// "Dynamic section").
#[derive(Debug, Clone, Default)]
pub struct DynamicContext {
    pub resolved_exchange: Option<(String, String)>,
    pub last_tool_error: Option<String>,
    pub sql_preview: Option<String>,
    pub row_preview: Vec<Value>,
    pub row_preview_total: usize,
}

/// Render the dynamic section. `sql_preview_chars` and
/// `row_preview_count` come from `AgentConfig` (spec §6) so an operator
/// can tune how much context each retry burns.
pub fn render_dynamic_context(ctx: &DynamicContext, sql_preview_chars: usize, row_preview_count: usize) -> String {
    let mut out = String::new();

    if let Some((gold, silver)) = &ctx.resolved_exchange {
        out.push_str(&format!("Resolved exchange datasets: gold={gold}, silver={silver}\n"));
    }

    if let Some(error) = &ctx.last_tool_error {
        out.push_str(&format!("Most recent tool error: {error}\n"));
    }

    if let Some(sql) = &ctx.sql_preview {
        out.push_str(&format!("Current SQL (truncated): {}\n", truncate_sql(sql, sql_preview_chars)));
    }

    if !ctx.row_preview.is_empty() {
        let preview: Vec<&Value> = ctx.row_preview.iter().take(row_preview_count).collect();
        out.push_str(&format!(
            "Row preview ({} of {} rows): {}\n",
            preview.len(),
            ctx.row_preview_total,
            Value::Array(preview.into_iter().cloned().collect())
        ));
    }

    out
}

fn truncate_sql(sql: &str, max_chars: usize) -> String {
    if sql.chars().count() <= max_chars {
        sql.to_string()
    } else {
        let truncated: String = sql.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_routing() -> RoutingRules {
        RoutingRules::default()
    }

    #[test]
    fn static_prompt_mentions_every_tool_in_order() {
        let prompt = static_system_prompt(&sample_routing());
        let tools = [
            "resolve_exchange",
            "check_semantic_cache",
            "vector_search_columns",
            "fetch_few_shot_examples",
            "load_yaml_metadata",
            "dry_run_sql",
            "execute_sql",
            "save_validated_query",
        ];
        let mut last_pos = 0;
        for tool in tools {
            let pos = prompt.find(tool).unwrap_or_else(|| panic!("{tool} missing from static prompt"));
            assert!(pos >= last_pos, "{tool} appears out of order");
            last_pos = pos;
        }
    }

    #[test]
    fn short_sql_is_not_truncated() {
        assert_eq!(truncate_sql("SELECT 1", 500), "SELECT 1");
    }

    #[test]
    fn long_sql_is_truncated_with_ellipsis() {
        let sql = "x".repeat(600);
        let truncated = truncate_sql(&sql, 500);
        assert_eq!(truncated.chars().count(), 501);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn row_preview_respects_the_configured_count_not_the_full_set() {
        let ctx = DynamicContext {
            row_preview: vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})],
            row_preview_total: 3,
            ..Default::default()
        };
        let rendered = render_dynamic_context(&ctx, 500, 2);
        assert!(rendered.contains("2 of 3 rows"));
    }

    #[test]
    fn empty_context_renders_an_empty_string() {
        assert_eq!(render_dynamic_context(&DynamicContext::default(), 500, 3), "");
    }
}
