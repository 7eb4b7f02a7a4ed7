//! Text embedders used by memory banks for similarity retrieval.

pub mod factory;
pub mod providers;

pub use factory::EmbedderFactory;
pub use providers::{Embedder, HashEmbedder, LexicalEmbedder};

/// Dot product of two vectors of equal length.
///
/// Extra components of the longer vector are ignored.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

/// Euclidean length of a vector.
pub fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt()
}

/// Cosine similarity in `[-1, 1]`; `0.0` when either vector has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    dot(a, b) / denom
}

/// Scale to unit length in place.
///
/// Returns `false` (leaving the vector untouched) when it has no length to scale.
pub(crate) fn normalize(v: &mut [f64]) -> bool {
    let length = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if length == 0.0 || !length.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= length;
    }
    true
}

pub mod prelude {
    pub use crate::embeddings::{cosine_similarity, Embedder, HashEmbedder, LexicalEmbedder};
}
