//! Memory records stored by a [`MemoryBank`](super::MemoryBank)

use serde::{Deserialize, Serialize};

/// A single remembered text.
///
/// Records are immutable once created. The embedding is kept out of the
/// serialized form since it can always be recomputed from the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Sequence number, unique and increasing within the owning bank
    pub id: u64,

    /// Remembered text
    pub text: String,

    /// Unit-length embedding of `text`
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,

    /// Logical time at which the record was added
    pub created_at: u64,
}

/// A retrieved record together with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredRecord<'a> {
    pub record: &'a MemoryRecord,
    pub score: f64,
}
