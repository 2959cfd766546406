//! Distance functions used to rank stored vectors against a query.

/// Distance metric used by [`super::VectorStore::knn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Euclidean distance, lower is closer.
    L2,
    /// Cosine similarity, higher is closer.
    Cosine,
}

/// Compute L2 (Euclidean) distance between two vectors.
///
/// Formula: sqrt(sum((a[i] - b[i])²))
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Compute cosine similarity between two vectors.
///
/// Formula: dot(a, b) / (||a|| * ||b||)
///
/// Returns 0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x.powi(2)).sum::<f32>().sqrt()
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > 0.0 {
        v.iter_mut().for_each(|x| *x /= n);
    }
}

/// Uniform distance where lower = closer, used to rank across metrics.
pub fn raw_distance(a: &[f32], b: &[f32], metric: Metric) -> f32 {
    match metric {
        Metric::L2 => l2_distance(a, b),
        Metric::Cosine => 1.0 - cosine_similarity(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn l2() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < EPS);
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < EPS);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < EPS);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn normalization() {
        let mut v = [3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < EPS);
        assert!((v[1] - 0.8).abs() < EPS);

        let mut zero = [0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, [0.0, 0.0]);
    }

    #[test]
    fn raw_distance_orders_lower_as_closer() {
        let q = [1.0, 0.0];
        assert!(raw_distance(&q, &[1.0, 0.1], Metric::Cosine) < raw_distance(&q, &[0.0, 1.0], Metric::Cosine));
        assert!(raw_distance(&q, &[1.0, 0.1], Metric::L2) < raw_distance(&q, &[0.0, 1.0], Metric::L2));
    }
}
