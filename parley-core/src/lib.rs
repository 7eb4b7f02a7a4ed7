//! # Parley - Turn-Based Multi-Agent Simulations
//!
//! Parley runs language-model driven simulations in which autonomous
//! participants act in turns under the arbitration of a game master:
//! - Entities and game masters with their own associative memory
//! - Prompt assembly from ordered context components
//! - Pluggable turn, resolution, witness and termination policies
//! - An append-only event log with JSON Lines output
//! - Oracle backends behind one trait, with timeouts and retries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
//!     let oracle: Arc<dyn Oracle> = Arc::new(EchoOracle::new("I wave."));
//!
//!     let alice = Participant::builder("Alice")
//!         .embedder(embedder.clone())
//!         .oracle(oracle.clone())
//!         .build()?;
//!     let gm = ParticipantBuilder::game_master("Narrator")
//!         .embedder(embedder)
//!         .oracle(oracle)
//!         .build()?;
//!
//!     let mut engine = Engine::new(RunConfig::default().with_max_steps(3), vec![alice, gm])?;
//!     let report = engine.run().await?;
//!     println!("{:?} after {} steps", report.outcome, report.steps);
//!     print!("{}", engine.log().to_jsonl()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `oracle-openai`: OpenAI-compatible chat completions backend
//! - `oracle-ollama`: Ollama chat backend

pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod logging;
pub mod memory;
pub mod oracle;
pub mod participant;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        EmbedderKind, MemoryConfig, OracleConfig, OracleProvider, ParleyConfig, ParticipantConfig,
        RunConfig,
    };
    pub use crate::embeddings::prelude::*;
    pub use crate::embeddings::EmbedderFactory;
    pub use crate::engine::prelude::*;
    pub use crate::engine::{EngineState, EngineStatus};
    pub use crate::error::{ParleyError, Result};
    pub use crate::memory::{MemoryBank, MemoryRecord};
    pub use crate::oracle::prelude::*;
    pub use crate::oracle::{OracleFactory, RetryConfig, ScriptedFailure, ScriptedResponse};
    pub use crate::participant::{
        ContextComponent, Participant, ParticipantBuilder, ParticipantKind, ParticipantStats,
    };
}
