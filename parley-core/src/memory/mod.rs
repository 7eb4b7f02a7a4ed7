//! Associative memory for participants
//!
//! Each participant owns one [`MemoryBank`]: an append-only sequence of
//! [`MemoryRecord`]s, each carrying an embedding of its text. Retrieval ranks
//! records by cosine similarity to an embedded query, which is how observations
//! from earlier turns find their way back into prompts.

pub mod bank;
pub mod record;

pub use bank::MemoryBank;
pub use record::{MemoryRecord, ScoredRecord};
