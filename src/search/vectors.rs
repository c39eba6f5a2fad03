//! Vector math for similarity search.

use crate::{Error, Result};

pub type Vector = Vec<f32>;

pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::invalid_input(format!(
            "vector dimensions must match: {} != {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn normalize(v: &[f32]) -> Vector {
    let mag = magnitude(v);
    if mag == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / mag).collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (mag_a * mag_b))
}

/// 1 − cosine similarity; 0 = identical direction, 2 = opposite.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    Ok(1.0 - cosine_similarity(a, b)?)
}

/// Convert a cosine distance to a similarity score, clamped to [0, 1].
pub fn score_from_distance(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_dot_product_basic() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        assert!(approx_eq(dot_product(&a, &b).unwrap(), 32.0));
    }

    #[test]
    fn test_dot_product_dimension_mismatch() {
        assert!(dot_product(&[1.0, 2.0], &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_magnitude_and_normalize() {
        let v = vec![3.0, 4.0];
        assert!(approx_eq(magnitude(&v), 5.0));
        let n = normalize(&v);
        assert!(approx_eq(n[0], 0.6));
        assert!(approx_eq(n[1], 0.8));
        assert!(approx_eq(magnitude(&n), 1.0));
    }

    #[test]
    fn test_normalize_zero_vector_is_identity() {
        let v = vec![0.0, 0.0];
        assert_eq!(normalize(&v), v);
    }

    #[test]
    fn test_cosine_similarity_identical_and_orthogonal() {
        assert!(approx_eq(
            cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap(),
            1.0
        ));
        assert!(approx_eq(
            cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(),
            0.0
        ));
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert!(approx_eq(
            cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(),
            0.0
        ));
    }

    #[test]
    fn test_cosine_distance_identical_is_zero() {
        assert!(approx_eq(
            cosine_distance(&[0.5, 0.5], &[0.5, 0.5]).unwrap(),
            0.0
        ));
    }

    #[test]
    fn test_score_clamps_opposite_vectors() {
        // Opposite directions give distance 2; the score floor is 0.
        let d = cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!(approx_eq(d, 2.0));
        assert_eq!(score_from_distance(d), 0.0);
        assert_eq!(score_from_distance(0.0), 1.0);
    }
}
