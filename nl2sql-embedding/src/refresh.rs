//! The refresh predicate (spec §4.2, §9 "Length-of-null pitfall"). The
//! warehouse's `length(NULL)` evaluates to `NULL`, not `0`, so testing
//! `length(vector) = 0` alone silently excludes freshly inserted rows
//! whose vector column was never set at all. Both conditions must be
//! checked.

use nl2sql_core::EmbeddingVector;

/// SQL fragment implementing the refresh predicate, for embedding
/// directly into a generated `generate-embeddings` query.
pub const REFRESH_PREDICATE_SQL: &str = "vector IS NULL OR length(vector) = 0";

/// In-process equivalent of the predicate, for rows already loaded
/// into memory (e.g. during a populate step that just upserted them).
pub fn needs_embedding(vector: &Option<EmbeddingVector>) -> bool {
    match vector {
        None => true,
        Some(v) => v.is_pending(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_vector_needs_embedding() {
        assert!(needs_embedding(&None));
    }

    #[test]
    fn empty_vector_needs_embedding() {
        assert!(needs_embedding(&Some(EmbeddingVector::pending())));
    }

    #[test]
    fn populated_vector_does_not_need_embedding() {
        let vector = EmbeddingVector::new(vec![0.1, 0.2, 0.3], "text-embedding-005".to_string());
        assert!(!needs_embedding(&Some(vector)));
    }
}
