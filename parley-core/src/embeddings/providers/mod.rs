//! Embedder implementations

/// Trait for text embedders.
///
/// Embedders map text to a fixed-length vector. Memory banks rank records by
/// cosine similarity between these vectors, so an embedder must always return
/// `dimension()` components. The shipped embedders are deterministic: the same
/// text always produces a bit-identical vector, which keeps retrieval
/// reproducible across runs.
pub trait Embedder: Send + Sync {
    /// Generate the embedding for a single text.
    ///
    /// The empty string is valid input and must yield a finite vector.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Generate embeddings for a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Get the dimension of embeddings produced by this embedder.
    fn dimension(&self) -> usize;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

pub mod hashed;
pub mod lexical;

pub use hashed::HashEmbedder;
pub use lexical::LexicalEmbedder;
