//! Factory for creating embedders from configuration

use crate::config::{EmbedderKind, MemoryConfig};
use crate::embeddings::providers::{Embedder, HashEmbedder, LexicalEmbedder};
use crate::error::Result;
use std::sync::Arc;

/// Factory for creating embedders
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Create an embedder from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Memory configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured dimension is zero
    pub fn create(config: &MemoryConfig) -> Result<Arc<dyn Embedder>> {
        let embedder: Arc<dyn Embedder> = match config.embedder {
            EmbedderKind::Hashed => Arc::new(HashEmbedder::new(config.dimension)?),
            EmbedderKind::Lexical => Arc::new(LexicalEmbedder::new(config.dimension)?),
        };

        tracing::debug!(
            embedder = embedder.name(),
            dimension = embedder.dimension(),
            "Created embedder"
        );

        Ok(embedder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParleyError;

    #[test]
    fn test_create_from_config() {
        let config = MemoryConfig {
            embedder: EmbedderKind::Lexical,
            dimension: 128,
            ..Default::default()
        };
        let embedder = EmbedderFactory::create(&config).unwrap();
        assert_eq!(embedder.name(), "lexical");
        assert_eq!(embedder.dimension(), 128);
        assert_eq!(embedder.embed("hello").len(), 128);
    }

    #[test]
    fn test_default_is_hashed() {
        let embedder = EmbedderFactory::create(&MemoryConfig::default()).unwrap();
        assert_eq!(embedder.name(), "hashed");
        assert_eq!(embedder.dimension(), 64);
    }

    #[test]
    fn test_zero_dimension_fails() {
        let config = MemoryConfig {
            dimension: 0,
            ..Default::default()
        };
        assert!(matches!(
            EmbedderFactory::create(&config),
            Err(ParleyError::Configuration(_))
        ));
    }
}
