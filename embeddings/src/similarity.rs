//! Similarity computation for embeddings.

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Vectors of different length fail with [`EmbeddingError::DimensionMismatch`]
/// and a zero-magnitude vector on either side fails with
/// [`EmbeddingError::DegenerateVector`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    // Accumulate in f64 so long vectors do not drift past the [-1, 1] range.
    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    if mag_a == 0.0 || mag_b == 0.0 {
        return Err(EmbeddingError::DegenerateVector);
    }

    let cosine = dot / (mag_a.sqrt() * mag_b.sqrt());
    Ok(cosine.clamp(-1.0, 1.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.3, -1.2, 4.5, 0.01];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_scale_invariant() {
        let a = vec![3.0, 4.0];
        let b = vec![6.0, 8.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_stays_in_range() {
        let a: Vec<f32> = (0..1536).map(|i| ((i * 37) % 101) as f32 - 50.0).collect();
        let b: Vec<f32> = (0..1536).map(|i| ((i * 53) % 89) as f32 - 44.0).collect();
        for (x, y) in [(&a, &b), (&a, &a), (&b, &b)] {
            let sim = cosine_similarity(x, y).unwrap();
            assert!((-1.0..=1.0).contains(&sim), "out of range: {sim}");
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        match cosine_similarity(&a, &b) {
            Err(EmbeddingError::DimensionMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (2, 3));
            }
            other => panic!("expected dimension mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_magnitude_is_degenerate() {
        let zero = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            cosine_similarity(&zero, &b),
            Err(EmbeddingError::DegenerateVector)
        ));
        assert!(matches!(
            cosine_similarity(&b, &zero),
            Err(EmbeddingError::DegenerateVector)
        ));
    }
}
