//! Auto-LIMIT enforcement (spec §4.4). If the outer statement lacks a
//! terminal LIMIT clause, one is appended at the configured row cap.
//! The regex anchors at end-of-string so a LIMIT inside a subquery
//! never satisfies the check.

use once_cell::sync::Lazy;
use regex::Regex;

static TERMINAL_LIMIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bLIMIT\s+\d+\s*;?\s*$").expect("static terminal-limit pattern is valid"));

/// Append `LIMIT {row_cap}` unless the statement already ends with one.
pub fn ensure_limit(sql: &str, row_cap: usize) -> String {
    if TERMINAL_LIMIT.is_match(sql) {
        return sql.to_string();
    }
    let trimmed = sql.trim_end().trim_end_matches(';');
    format!("{trimmed}\nLIMIT {row_cap}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_limit_when_absent() {
        let sql = "SELECT * FROM gold_omx.daily_edge";
        assert_eq!(ensure_limit(sql, 1000), "SELECT * FROM gold_omx.daily_edge\nLIMIT 1000");
    }

    #[test]
    fn matches_seed_scenario_literal() {
        assert_eq!(ensure_limit("SELECT 1 AS x", 1000), "SELECT 1 AS x\nLIMIT 1000");
    }

    #[test]
    fn leaves_existing_terminal_limit_untouched() {
        let sql = "SELECT * FROM gold_omx.daily_edge LIMIT 50";
        assert_eq!(ensure_limit(sql, 1000), sql);
    }

    #[test]
    fn does_not_treat_subquery_limit_as_terminal() {
        let sql = "SELECT * FROM (SELECT * FROM daily_edge LIMIT 5) AS sub";
        let result = ensure_limit(sql, 1000);
        assert!(result.ends_with("LIMIT 1000"));
    }

    #[test]
    fn strips_trailing_semicolon_before_appending() {
        let sql = "SELECT * FROM gold_omx.daily_edge;";
        assert_eq!(ensure_limit(sql, 1000), "SELECT * FROM gold_omx.daily_edge\nLIMIT 1000");
    }
}
