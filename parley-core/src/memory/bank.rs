//! Append-only associative memory owned by a single participant

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::record::{MemoryRecord, ScoredRecord};
use crate::embeddings::{Embedder, cosine_similarity};
use crate::error::{ParleyError, Result};

/// Per-participant memory with similarity retrieval.
///
/// A bank has a fixed embedding dimension chosen at construction. The embedder
/// may be bound exactly once, either at construction or later through
/// [`set_embedder`](Self::set_embedder), and must be bound before the first
/// [`add`](Self::add). Records are never mutated or removed.
///
/// The bank keeps a logical clock. Every record is stamped with the clock value
/// at the time it was added, and [`retrieve_as_of`](Self::retrieve_as_of) never
/// sees records stamped later than the requested time.
pub struct MemoryBank {
    dimension: usize,
    embedder: Option<Arc<dyn Embedder>>,
    records: Vec<MemoryRecord>,
    next_id: u64,
    clock: u64,
}

impl MemoryBank {
    /// Create an empty bank with no embedder bound.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ParleyError::Configuration(
                "memory bank dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            embedder: None,
            records: Vec::new(),
            next_id: 0,
            clock: 0,
        })
    }

    /// Create a bank whose dimension follows the embedder.
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            dimension: embedder.dimension(),
            embedder: Some(embedder),
            records: Vec::new(),
            next_id: 0,
            clock: 0,
        }
    }

    /// Bind the embedder.
    ///
    /// # Errors
    ///
    /// - `AlreadyConfigured` if an embedder is already bound
    /// - `DimensionMismatch` if the embedder's dimension differs from the bank's
    pub fn set_embedder(&mut self, embedder: Arc<dyn Embedder>) -> Result<()> {
        if self.embedder.is_some() {
            return Err(ParleyError::AlreadyConfigured(
                "memory bank embedder is already bound".to_string(),
            ));
        }
        if embedder.dimension() != self.dimension {
            return Err(ParleyError::DimensionMismatch {
                expected: self.dimension,
                actual: embedder.dimension(),
            });
        }
        self.embedder = Some(embedder);
        Ok(())
    }

    /// Whether an embedder has been bound.
    pub fn is_configured(&self) -> bool {
        self.embedder.is_some()
    }

    /// Embedding dimension of every record in this bank.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the bank holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current logical time.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Move the logical clock forward to `t`. Earlier times are ignored.
    pub fn advance_clock(&mut self, t: u64) {
        self.clock = self.clock.max(t);
    }

    /// Embed `text` and append it as a new record stamped with the current clock.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if no embedder is bound
    /// - `DimensionMismatch` if the embedder returned a vector of the wrong length
    pub fn add(&mut self, text: impl Into<String>) -> Result<&MemoryRecord> {
        let text = text.into();
        let embedding = self.embed(&text)?;

        let record = MemoryRecord {
            id: self.next_id,
            text,
            embedding,
            created_at: self.clock,
        };
        self.next_id += 1;

        debug!(
            id = record.id,
            created_at = record.created_at,
            "Added memory record"
        );

        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Up to `k` records most similar to `query`, best first.
    ///
    /// Ties keep insertion order. `k == 0` yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if no embedder is bound.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<&MemoryRecord>> {
        Ok(self
            .retrieve_scored(query, k, u64::MAX)?
            .into_iter()
            .map(|scored| scored.record)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve), restricted to records added at or before `t`.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if no embedder is bound.
    pub fn retrieve_as_of(&self, query: &str, k: usize, t: u64) -> Result<Vec<&MemoryRecord>> {
        Ok(self
            .retrieve_scored(query, k, t)?
            .into_iter()
            .map(|scored| scored.record)
            .collect())
    }

    /// Ranked retrieval with similarity scores, restricted to records added at
    /// or before `as_of`.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if no embedder is bound.
    pub fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
        as_of: u64,
    ) -> Result<Vec<ScoredRecord<'_>>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embed(query)?;

        let mut scored: Vec<ScoredRecord<'_>> = self
            .records
            .iter()
            .filter(|record| record.created_at <= as_of)
            .map(|record| ScoredRecord {
                record,
                score: cosine_similarity(&query_embedding, &record.embedding),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);

        debug!(k, returned = scored.len(), "Retrieved memories");
        Ok(scored)
    }

    /// Every record in insertion order.
    pub fn all(&self) -> &[MemoryRecord] {
        &self.records
    }

    /// The last `n` records in insertion order.
    pub fn recent(&self, n: usize) -> &[MemoryRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            ParleyError::NotConfigured("memory bank has no embedder bound".to_string())
        })?;
        let embedding = embedder.embed(text);
        if embedding.len() != self.dimension {
            return Err(ParleyError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

impl fmt::Debug for MemoryBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBank")
            .field("dimension", &self.dimension)
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .field("records", &self.records.len())
            .field("clock", &self.clock)
            .finish()
    }
}
