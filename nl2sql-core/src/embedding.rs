//! Embedding vector operations shared by the retrieval engine and the
//! embedding pipeline.

use crate::{Nl2SqlError, Nl2SqlResult, VectorError};
use serde::{Deserialize, Serialize};

/// Which Vertex-AI-style embedding task type to request. Stored content
/// is embedded as `RETRIEVAL_DOCUMENT`; ad-hoc questions at search time
/// are embedded as `RETRIEVAL_QUERY` (spec §4.2, §4.3.4 — task type is
/// fixed by direction, never chosen ad hoc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

impl TaskType {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            Self::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

/// Embedding vector with dynamic dimensions, tagged by the model that
/// produced it so a dimension change in the embedding model is
/// detectable rather than silently mixed in with stale rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub data: Vec<f32>,
    pub model_id: String,
    pub dimensions: i32,
}

impl EmbeddingVector {
    pub fn new(data: Vec<f32>, model_id: impl Into<String>) -> Self {
        let dimensions = data.len() as i32;
        Self {
            data,
            model_id: model_id.into(),
            dimensions,
        }
    }

    /// An empty vector, used as the "needs (re-)embedding" sentinel
    /// (spec §3 invariant 5, §4.2, §9 "length-of-null pitfall"). Both
    /// an entirely absent embedding column and a vector with
    /// `data.is_empty()` count as "pending" — the refresh predicate in
    /// `nl2sql-embedding::refresh` must check both.
    pub fn pending() -> Self {
        Self {
            data: Vec::new(),
            model_id: String::new(),
            dimensions: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.data.is_empty()
    }

    /// Cosine distance — the sole distance metric used across the
    /// search index (spec §4.3.4). `1.0 - cosine_similarity`.
    pub fn cosine_distance(&self, other: &EmbeddingVector) -> Nl2SqlResult<f32> {
        self.cosine_similarity(other).map(|sim| 1.0 - sim)
    }

    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> Nl2SqlResult<f32> {
        if self.dimensions != other.dimensions {
            return Err(Nl2SqlError::Vector(VectorError::DimensionMismatch {
                expected: self.dimensions,
                got: other.dimensions,
            }));
        }

        let mut dot_product = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.data.iter().zip(other.data.iter()) {
            dot_product += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let norm_a = norm_a.sqrt();
        let norm_b = norm_b.sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }

        Ok(dot_product / (norm_a * norm_b))
    }

    pub fn is_valid(&self) -> bool {
        self.dimensions > 0 && self.data.len() == self.dimensions as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        let a = EmbeddingVector::new(vec![1.0, 0.0, 0.0], "m");
        let b = EmbeddingVector::new(vec![1.0, 0.0, 0.0], "m");
        assert!(a.cosine_distance(&b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_unit_distance() {
        let a = EmbeddingVector::new(vec![1.0, 0.0], "m");
        let b = EmbeddingVector::new(vec![0.0, 1.0], "m");
        assert!((a.cosine_distance(&b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pending_vector_is_empty_and_flagged() {
        let v = EmbeddingVector::pending();
        assert!(v.is_pending());
        assert!(v.data.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let a = EmbeddingVector::new(vec![1.0, 0.0], "m");
        let b = EmbeddingVector::new(vec![1.0, 0.0, 0.0], "m");
        assert!(a.cosine_distance(&b).is_err());
    }

    #[test]
    fn task_type_api_strings_are_fixed_by_direction() {
        assert_eq!(TaskType::RetrievalDocument.as_api_str(), "RETRIEVAL_DOCUMENT");
        assert_eq!(TaskType::RetrievalQuery.as_api_str(), "RETRIEVAL_QUERY");
    }
}
