//! Repetition and budget guards around each tool call (spec §4.5.3): a
//! pre-tool check that can block a call outright, and a post-tool
//! bookkeeping step that records it and tracks dry-run retries. Kept as
//! a linear pair of functions the controller calls around dispatch,
//! not a nested callback chain — there is exactly one thing each needs
//! to do, and a middleware list would only hide that.

use nl2sql_core::{LoopError, Nl2SqlError, Nl2SqlResult};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::state::TurnState;

/// Canonicalise a JSON value by sorting object keys recursively, so two
/// semantically identical argument sets always hash the same
/// regardless of the order an LLM happened to emit them in.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = serde_json::Map::new();
            for (key, val) in entries {
                sorted.insert(key.clone(), canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Stable hash of `(tool_name, canonicalised arguments)` — the
/// "repetition hash" a turn's call history is built from.
pub fn repetition_hash(tool_name: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonicalize(args).to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Pre-tool guard (spec §4.5.3): refuses the call before it runs,
/// rather than running it and discarding the result, so a blocked call
/// has no side effects at all.
pub fn pre_tool_guard(
    state: &TurnState,
    tool_name: &str,
    args: &Value,
    max_consecutive_repeats: u32,
    max_tool_calls_per_turn: u32,
) -> Nl2SqlResult<()> {
    if state.tool_call_count >= max_tool_calls_per_turn {
        return Err(Nl2SqlError::Loop(LoopError::BudgetExceeded { max: max_tool_calls_per_turn }));
    }

    if state.max_retries_reached && matches!(tool_name, "dry_run_sql" | "execute_sql") {
        return Err(Nl2SqlError::Loop(LoopError::MaxRetriesReached));
    }

    let hash = repetition_hash(tool_name, args);
    let repeats = state.consecutive_repeats(&hash);
    if repeats >= max_consecutive_repeats {
        return Err(Nl2SqlError::Loop(LoopError::Repeated { count: repeats }));
    }

    Ok(())
}

/// Post-tool bookkeeping: record the call in the turn's history. Called
/// only for calls that passed `pre_tool_guard`, so a blocked call never
/// pollutes the repetition window with its own (rejected) attempt.
pub fn record_call(state: &mut TurnState, tool_name: &str, args: &Value) {
    state.tool_call_count += 1;
    state.push_call_hash(repetition_hash(tool_name, args));
}

/// Post-`dry_run_sql` bookkeeping (spec §4.5.3, §7): a valid plan
/// resets the retry counter; an invalid one advances it and trips
/// `max_retries_reached` once the configured limit is hit.
pub fn record_dry_run_outcome(state: &mut TurnState, was_valid: bool, max_retries: u32) {
    if was_valid {
        state.dry_run_attempts = 0;
        return;
    }
    state.dry_run_attempts += 1;
    if state.dry_run_attempts >= max_retries {
        state.max_retries_reached = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalisation_is_insensitive_to_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(repetition_hash("dry_run_sql", &a), repetition_hash("dry_run_sql", &b));
    }

    #[test]
    fn different_tool_name_changes_the_hash() {
        let args = json!({"sql": "SELECT 1"});
        assert_ne!(repetition_hash("dry_run_sql", &args), repetition_hash("execute_sql", &args));
    }

    #[test]
    fn fourth_identical_dry_run_is_blocked_but_first_three_are_not() {
        let args = json!({"sql": "SELECT 1"});
        let mut state = TurnState::new();

        for _ in 0..3 {
            assert!(pre_tool_guard(&state, "dry_run_sql", &args, 3, 50).is_ok());
            record_call(&mut state, "dry_run_sql", &args);
        }

        let result = pre_tool_guard(&state, "dry_run_sql", &args, 3, 50);
        assert!(matches!(result, Err(Nl2SqlError::Loop(LoopError::Repeated { count: 3 }))));
    }

    #[test]
    fn a_single_repetition_is_permitted() {
        let args = json!({"sql": "SELECT 1"});
        let mut state = TurnState::new();
        record_call(&mut state, "dry_run_sql", &args);
        assert!(pre_tool_guard(&state, "dry_run_sql", &args, 3, 50).is_ok());
    }

    #[test]
    fn budget_exhaustion_blocks_regardless_of_repetition() {
        let mut state = TurnState::new();
        state.tool_call_count = 50;
        let result = pre_tool_guard(&state, "vector_search_columns", &json!({"question": "a"}), 3, 50);
        assert!(matches!(result, Err(Nl2SqlError::Loop(LoopError::BudgetExceeded { max: 50 }))));
    }

    #[test]
    fn third_consecutive_dry_run_failure_trips_max_retries_reached() {
        let mut state = TurnState::new();
        for _ in 0..2 {
            record_dry_run_outcome(&mut state, false, 3);
            assert!(!state.max_retries_reached);
        }
        record_dry_run_outcome(&mut state, false, 3);
        assert!(state.max_retries_reached);
    }

    #[test]
    fn max_retries_reached_blocks_dry_run_and_execute_but_nothing_else() {
        let mut state = TurnState::new();
        state.max_retries_reached = true;
        assert!(pre_tool_guard(&state, "dry_run_sql", &json!({"sql": "SELECT 1"}), 3, 50).is_err());
        assert!(pre_tool_guard(&state, "execute_sql", &json!({"sql": "SELECT 1"}), 3, 50).is_err());
        assert!(pre_tool_guard(&state, "resolve_exchange", &json!({"text": "omx"}), 3, 50).is_ok());
    }

    #[test]
    fn a_valid_dry_run_resets_the_retry_counter() {
        let mut state = TurnState::new();
        record_dry_run_outcome(&mut state, false, 3);
        record_dry_run_outcome(&mut state, false, 3);
        record_dry_run_outcome(&mut state, true, 3);
        assert_eq!(state.dry_run_attempts, 0);
        assert!(!state.max_retries_reached);
    }

    #[test]
    fn new_question_reset_clears_max_retries_reached() {
        let mut state = TurnState::new();
        record_dry_run_outcome(&mut state, false, 1);
        assert!(state.max_retries_reached);
        state.reset_for_new_question();
        assert!(!state.max_retries_reached);
        assert!(pre_tool_guard(&state, "dry_run_sql", &json!({"sql": "SELECT 1"}), 3, 50).is_ok());
    }
}
