//! Hash-seeded embedder
//!
//! Maps text to a pseudo-random unit vector: the SHA-256 digest of the text
//! seeds a generator, components are drawn from a standard normal and the
//! result is L2-normalized. The vectors carry no meaning, but they are stable,
//! spread uniformly over the sphere, and need no model or network.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use super::Embedder;
use crate::embeddings::normalize;
use crate::error::{ParleyError, Result};

/// Deterministic embedder seeded from a hash of the text.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a new hash embedder producing `dimension`-length vectors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ParleyError::Configuration(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 64 }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        seeded_unit_vector(text, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashed"
    }
}

/// Unit vector derived from the SHA-256 digest of `text`.
pub(crate) fn seeded_unit_vector(text: &str, dimension: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    let mut rng = StdRng::from_seed(seed);

    let mut components: Vec<f64> = (0..dimension).map(|_| standard_normal(&mut rng)).collect();
    if !normalize(&mut components) {
        // Every draw was zero; not reachable in practice but the output must stay defined.
        components.iter_mut().for_each(|x| *x = 0.0);
        if let Some(first) = components.first_mut() {
            *first = 1.0;
        }
    }
    components.into_iter().map(|x| x as f32).collect()
}

/// Box-Muller draw from N(0, 1).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::norm;

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(64).unwrap();
        let a = embedder.embed("the night falls");
        let b = embedder.embed("the night falls");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_length() {
        let embedder = HashEmbedder::new(32).unwrap();
        let long = "x".repeat(5000);
        for text in ["", "a", "role: wolf", "天黑请闭眼", long.as_str()] {
            let v = embedder.embed(text);
            assert_eq!(v.len(), 32);
            assert!(v.iter().all(|x| x.is_finite()));
            assert!((norm(&v) - 1.0).abs() < 1e-5, "norm of {:?}", text);
        }
    }

    #[test]
    fn test_distinct_texts_differ() {
        let embedder = HashEmbedder::default();
        assert_ne!(embedder.embed("alpha"), embedder.embed("beta"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(
            HashEmbedder::new(0),
            Err(ParleyError::Configuration(_))
        ));
    }

    #[test]
    fn test_batch_matches_single() {
        let embedder = HashEmbedder::new(16).unwrap();
        let batch = embedder.embed_batch(&["one", "two"]);
        assert_eq!(batch[0], embedder.embed("one"));
        assert_eq!(batch[1], embedder.embed("two"));
    }
}
