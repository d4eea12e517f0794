//! Shared DML/multi-statement guard (spec §4.4). The same `is_blocked`
//! function backs both the agent's pre-tool callback and the executor,
//! so a query can never slip through one path that the other would
//! have rejected.

use nl2sql_core::GuardError;
use once_cell::sync::Lazy;
use regex::Regex;

const FORBIDDEN_KEYWORDS: [&str; 8] = ["INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "MERGE", "CREATE"];

static KEYWORD_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|kw| (*kw, Regex::new(&format!(r"(?i)\b{kw}\b")).expect("static keyword pattern is valid")))
        .collect()
});

/// Scan the *full body* of `sql` for forbidden keywords and
/// multi-statement constructs. CTEs are permitted (`WITH ... SELECT
/// ...`) but a CTE-wrapped DML statement is still rejected because the
/// keyword scan covers the whole string, not just the first token.
pub fn is_blocked(sql: &str) -> Option<GuardError> {
    for (keyword, pattern) in KEYWORD_PATTERNS.iter() {
        if pattern.is_match(sql) {
            return Some(GuardError::ForbiddenKeyword {
                keyword: keyword.to_string(),
            });
        }
    }

    if let Some(idx) = sql.find(';') {
        if !sql[idx + 1..].trim().is_empty() {
            return Some(GuardError::MultiStatement);
        }
    }

    None
}
