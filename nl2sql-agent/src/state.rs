//! Per-turn agent state (spec §4.5.2, §4.5.3): tool-call count and
//! history, dry-run retry counter, and any exchange the turn has
//! resolved so far. Reset wholesale whenever `check_semantic_cache`
//! fires for a new question — the only reset trigger, never a timer.
//! Grounded on `caliber-core::lock`'s typestate shape: a small struct
//! that is either live or reset to its zero value, never partially so.

use std::collections::VecDeque;

/// How many of the most recent tool-call hashes to retain for the
/// consecutive-repetition check (spec §4.5.3). Deep enough to catch a
/// repeat a few calls back without growing unbounded over a long turn.
const HISTORY_WINDOW: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct TurnState {
    pub tool_call_count: u32,
    tool_call_history: VecDeque<String>,
    pub dry_run_attempts: u32,
    pub max_retries_reached: bool,
    /// Set by `resolve_exchange`: `(gold_dataset, silver_dataset)`.
    pub resolved_exchange_datasets: Option<(String, String)>,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `check_semantic_cache` reset (spec §4.5.2): clears every
    /// field, including the resolved exchange — a new question may name
    /// a different one.
    pub fn reset_for_new_question(&mut self) {
        *self = TurnState::default();
    }

    pub(crate) fn push_call_hash(&mut self, hash: String) {
        self.tool_call_history.push_back(hash);
        if self.tool_call_history.len() > HISTORY_WINDOW {
            self.tool_call_history.pop_front();
        }
    }

    /// How many of the most recent calls, counting back from the end of
    /// history, share `hash`. Zero if the most recent call doesn't match.
    pub(crate) fn consecutive_repeats(&self, hash: &str) -> u32 {
        self.tool_call_history.iter().rev().take_while(|h| h.as_str() == hash).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_every_field() {
        let mut state = TurnState::new();
        state.tool_call_count = 5;
        state.push_call_hash("abc".to_string());
        state.dry_run_attempts = 2;
        state.max_retries_reached = true;
        state.resolved_exchange_datasets = Some(("gold_omx".to_string(), "silver_omx".to_string()));

        state.reset_for_new_question();

        assert_eq!(state.tool_call_count, 0);
        assert_eq!(state.dry_run_attempts, 0);
        assert!(!state.max_retries_reached);
        assert!(state.resolved_exchange_datasets.is_none());
        assert_eq!(state.consecutive_repeats("abc"), 0);
    }

    #[test]
    fn consecutive_repeats_counts_only_the_trailing_run() {
        let mut state = TurnState::new();
        state.push_call_hash("a".to_string());
        state.push_call_hash("b".to_string());
        state.push_call_hash("b".to_string());
        state.push_call_hash("b".to_string());
        assert_eq!(state.consecutive_repeats("b"), 3);
        assert_eq!(state.consecutive_repeats("a"), 0);
    }

    #[test]
    fn history_window_bounds_growth() {
        let mut state = TurnState::new();
        for i in 0..20 {
            state.push_call_hash(format!("call-{i}"));
        }
        assert_eq!(state.tool_call_history.len(), HISTORY_WINDOW);
    }
}
