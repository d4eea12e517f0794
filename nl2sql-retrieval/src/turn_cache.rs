//! Per-question caches scoped to the turn (spec §4.3.2). A process-local
//! store keyed by a question hash memoises few-shot examples and loaded
//! YAML metadata blobs so a second call within the same turn is a
//! Rust-level hit rather than another warehouse round-trip. Both caches
//! are explicitly cleared whenever a new question starts — the
//! `check_semantic_cache` invocation (spec §4.5.2) — not on any timer.
//!
//! This is a process-wide singleton, matching the teacher's documented
//! constraint that these caches are not safe across concurrent sessions
//! (spec §5 "Shared-resource policy"); see `nl2sql-catalog::cache` for
//! the equivalent singleton shape.

use once_cell::sync::Lazy;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::search::ExampleCandidate;

/// Stable hash of a question, used as the turn-cache key. Case- and
/// whitespace-insensitive so trivial re-phrasing of the same question
/// still hits.
pub fn question_hash(question: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Default)]
struct TurnCacheState {
    few_shot: HashMap<String, Vec<ExampleCandidate>>,
    metadata: HashMap<String, Value>,
}

static TURN_CACHE: Lazy<RwLock<TurnCacheState>> = Lazy::new(|| RwLock::new(TurnCacheState::default()));

pub fn cache_few_shot(question_hash: &str, examples: Vec<ExampleCandidate>) {
    TURN_CACHE.write().unwrap().few_shot.insert(question_hash.to_string(), examples);
}

pub fn get_cached_few_shot(question_hash: &str) -> Option<Vec<ExampleCandidate>> {
    TURN_CACHE.read().unwrap().few_shot.get(question_hash).cloned()
}

/// Key metadata blobs by `(question_hash, dataset, table)` so a single
/// turn can load more than one table's full schema without clobbering
/// earlier loads.
fn metadata_key(question_hash: &str, dataset: &str, table: &str) -> String {
    format!("{question_hash}:{dataset}:{table}")
}

pub fn cache_metadata(question_hash: &str, dataset: &str, table: &str, value: Value) {
    TURN_CACHE
        .write()
        .unwrap()
        .metadata
        .insert(metadata_key(question_hash, dataset, table), value);
}

pub fn get_cached_metadata(question_hash: &str, dataset: &str, table: &str) -> Option<Value> {
    TURN_CACHE.read().unwrap().metadata.get(&metadata_key(question_hash, dataset, table)).cloned()
}

/// Clear both per-question caches. Called once per turn, when
/// `check_semantic_cache` fires for a new question (spec §4.5.2).
pub fn clear_turn_caches() {
    let mut state = TURN_CACHE.write().unwrap();
    state.few_shot.clear();
    state.metadata.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::{Complexity, FewShotExample};
    use serde_json::json;
    use std::sync::Mutex;

    // Tests share one process-wide cache; serialize them so assertions
    // about cache contents don't race.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn sample_example() -> ExampleCandidate {
        ExampleCandidate {
            example: FewShotExample {
                question: "what was yesterday's edge?".to_string(),
                sql: "SELECT 1".to_string(),
                tables: vec!["daily_edge".to_string()],
                dataset: "gold_omx".to_string(),
                complexity: Complexity::Simple,
                routing_signal: None,
                embedding: None,
            },
            distance: 0.05,
        }
    }

    #[test]
    fn question_hash_is_case_and_whitespace_insensitive() {
        assert_eq!(question_hash("What was the EDGE?"), question_hash("  what was the edge?  "));
    }

    #[test]
    fn few_shot_cache_round_trips() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_turn_caches();
        let hash = question_hash("round trip question");
        assert!(get_cached_few_shot(&hash).is_none());
        cache_few_shot(&hash, vec![sample_example()]);
        assert_eq!(get_cached_few_shot(&hash).unwrap().len(), 1);
    }

    #[test]
    fn metadata_cache_is_scoped_by_dataset_and_table() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_turn_caches();
        let hash = question_hash("metadata question");
        cache_metadata(&hash, "gold_omx", "daily_edge", json!({"columns": []}));
        assert!(get_cached_metadata(&hash, "gold_omx", "daily_edge").is_some());
        assert!(get_cached_metadata(&hash, "gold_omx", "other_table").is_none());
    }

    #[test]
    fn clear_turn_caches_empties_both_stores() {
        let _guard = TEST_LOCK.lock().unwrap();
        let hash = question_hash("cleared question");
        cache_few_shot(&hash, vec![sample_example()]);
        cache_metadata(&hash, "gold_omx", "daily_edge", json!({}));
        clear_turn_caches();
        assert!(get_cached_few_shot(&hash).is_none());
        assert!(get_cached_metadata(&hash, "gold_omx", "daily_edge").is_none());
    }
}
