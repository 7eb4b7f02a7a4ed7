//! Builder for participants

use std::sync::Arc;

use super::components::{ContextComponent, default_components};
use super::{Participant, ParticipantKind, ParticipantStats};
use crate::config::{MemoryConfig, ParticipantConfig};
use crate::embeddings::Embedder;
use crate::error::{ParleyError, Result};
use crate::memory::MemoryBank;
use crate::oracle::{GenerateOptions, Oracle, OracleCallPolicy};

/// Builder for [`Participant`]
pub struct ParticipantBuilder {
    name: String,
    kind: ParticipantKind,
    memory: Option<MemoryBank>,
    embedder: Option<Arc<dyn Embedder>>,
    oracle: Option<Arc<dyn Oracle>>,
    components: Option<Vec<ContextComponent>>,
    instructions: Option<String>,
    seed_memories: Vec<String>,
    options: GenerateOptions,
    call_policy: OracleCallPolicy,
    retrieval_k: usize,
    recent_observations: usize,
}

impl ParticipantBuilder {
    /// Create a builder for an entity called `name`
    pub fn new(name: impl Into<String>) -> Self {
        let memory = MemoryConfig::default();
        Self {
            name: name.into(),
            kind: ParticipantKind::Entity,
            memory: None,
            embedder: None,
            oracle: None,
            components: None,
            instructions: None,
            seed_memories: Vec::new(),
            options: GenerateOptions::default(),
            call_policy: OracleCallPolicy::default(),
            retrieval_k: memory.retrieval_k,
            recent_observations: memory.recent_observations,
        }
    }

    /// Create a builder for a game master called `name`
    pub fn game_master(name: impl Into<String>) -> Self {
        Self::new(name).kind(ParticipantKind::GameMaster)
    }

    /// Start from a configuration descriptor.
    ///
    /// The memory bank is created with `embedder`; retrieval sizes for the
    /// default pipeline come from `memory`.
    pub fn from_config(
        config: &ParticipantConfig,
        memory: &MemoryConfig,
        embedder: Arc<dyn Embedder>,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        let mut builder = Self::new(config.name.clone())
            .kind(config.kind)
            .embedder(embedder)
            .oracle(oracle)
            .retrieval_k(memory.retrieval_k)
            .recent_observations(memory.recent_observations);
        if let Some(instructions) = &config.instructions {
            builder = builder.instructions(instructions.clone());
        }
        if let Some(components) = &config.components {
            builder = builder.components(components.clone());
        }
        for seed in &config.seed_memories {
            builder = builder.seed_memory(seed.clone());
        }
        builder
    }

    pub fn kind(mut self, kind: ParticipantKind) -> Self {
        self.kind = kind;
        self
    }

    /// Use an existing memory bank
    pub fn memory(mut self, memory: MemoryBank) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Embedder for the memory bank
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Append one component to an explicit pipeline
    pub fn component(mut self, component: ContextComponent) -> Self {
        self.components.get_or_insert_with(Vec::new).push(component);
        self
    }

    /// Replace the pipeline. Without this the kind's default pipeline is used.
    pub fn components(mut self, components: Vec<ContextComponent>) -> Self {
        self.components = Some(components);
        self
    }

    /// Role prompt for the default pipeline
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Memory written before the run starts
    pub fn seed_memory(mut self, text: impl Into<String>) -> Self {
        self.seed_memories.push(text.into());
        self
    }

    pub fn generate_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn call_policy(mut self, policy: OracleCallPolicy) -> Self {
        self.call_policy = policy;
        self
    }

    pub fn retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    pub fn recent_observations(mut self, count: usize) -> Self {
        self.recent_observations = count;
        self
    }

    /// Build the participant.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the name is blank
    /// - `NotConfigured` if no oracle, or neither a configured memory bank nor an embedder, was given
    /// - `AlreadyConfigured` or `DimensionMismatch` if an embedder cannot be bound to the given bank
    pub fn build(self) -> Result<Participant> {
        if self.name.trim().is_empty() {
            return Err(ParleyError::Configuration(
                "participant name must not be empty".to_string(),
            ));
        }

        let oracle = self.oracle.ok_or_else(|| {
            ParleyError::NotConfigured(format!("participant '{}' has no oracle", self.name))
        })?;

        let mut memory = match (self.memory, self.embedder) {
            (Some(mut memory), Some(embedder)) => {
                memory.set_embedder(embedder)?;
                memory
            }
            (Some(memory), None) => memory,
            (None, Some(embedder)) => MemoryBank::with_embedder(embedder),
            (None, None) => {
                return Err(ParleyError::NotConfigured(format!(
                    "participant '{}' has neither a memory bank nor an embedder",
                    self.name
                )));
            }
        };

        if !memory.is_configured() {
            return Err(ParleyError::NotConfigured(format!(
                "memory bank of participant '{}' has no embedder",
                self.name
            )));
        }

        for seed in self.seed_memories {
            memory.add(seed)?;
        }

        let components = self.components.unwrap_or_else(|| {
            default_components(
                self.kind,
                self.instructions.as_deref(),
                self.retrieval_k,
                self.recent_observations,
            )
        });

        tracing::debug!(
            participant = %self.name,
            kind = %self.kind,
            components = components.len(),
            memories = memory.len(),
            "Built participant"
        );

        Ok(Participant {
            name: self.name,
            kind: self.kind,
            memory,
            oracle,
            components,
            options: self.options,
            call_policy: self.call_policy,
            latest_observation: None,
            stats: ParticipantStats::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{HashEmbedder, LexicalEmbedder};
    use crate::oracle::EchoOracle;

    fn oracle() -> Arc<dyn Oracle> {
        Arc::new(EchoOracle::new("ok"))
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = ParticipantBuilder::new("  ")
            .embedder(Arc::new(HashEmbedder::default()))
            .oracle(oracle())
            .build();
        assert!(matches!(result, Err(ParleyError::Configuration(_))));
    }

    #[test]
    fn test_oracle_required() {
        let result = ParticipantBuilder::new("P1")
            .embedder(Arc::new(HashEmbedder::default()))
            .build();
        assert!(matches!(result, Err(ParleyError::NotConfigured(_))));
    }

    #[test]
    fn test_embedder_required() {
        let result = ParticipantBuilder::new("P1").oracle(oracle()).build();
        assert!(matches!(result, Err(ParleyError::NotConfigured(_))));

        let result = ParticipantBuilder::new("P1")
            .memory(MemoryBank::new(64).unwrap())
            .oracle(oracle())
            .build();
        assert!(matches!(result, Err(ParleyError::NotConfigured(_))));
    }

    #[test]
    fn test_embedder_bound_to_given_bank() {
        let participant = ParticipantBuilder::new("P1")
            .memory(MemoryBank::new(64).unwrap())
            .embedder(Arc::new(HashEmbedder::new(64).unwrap()))
            .oracle(oracle())
            .seed_memory("role: seer")
            .build()
            .unwrap();
        assert_eq!(participant.memory().len(), 1);

        let result = ParticipantBuilder::new("P1")
            .memory(MemoryBank::new(64).unwrap())
            .embedder(Arc::new(HashEmbedder::new(16).unwrap()))
            .oracle(oracle())
            .build();
        assert!(matches!(result, Err(ParleyError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_rebinding_rejected() {
        let bank = MemoryBank::with_embedder(Arc::new(LexicalEmbedder::default()));
        let result = ParticipantBuilder::new("P1")
            .memory(bank)
            .embedder(Arc::new(LexicalEmbedder::default()))
            .oracle(oracle())
            .build();
        assert!(matches!(result, Err(ParleyError::AlreadyConfigured(_))));
    }

    #[test]
    fn test_explicit_components_replace_defaults() {
        let participant = ParticipantBuilder::game_master("GM")
            .embedder(Arc::new(LexicalEmbedder::default()))
            .oracle(oracle())
            .component(ContextComponent::Identity)
            .component(ContextComponent::EventLogTail { count: 2 })
            .build()
            .unwrap();
        assert!(participant.is_game_master());
        assert_eq!(participant.components().len(), 2);
    }

    #[test]
    fn test_from_config() {
        let config = ParticipantConfig::game_master("Host")
            .with_instructions("Moderate the debate.")
            .with_seed_memory("Topic: tabs or spaces");
        let memory = MemoryConfig {
            recent_observations: 2,
            ..Default::default()
        };

        let participant = ParticipantBuilder::from_config(
            &config,
            &memory,
            Arc::new(HashEmbedder::default()),
            oracle(),
        )
        .build()
        .unwrap();

        assert_eq!(participant.name(), "Host");
        assert_eq!(participant.kind(), ParticipantKind::GameMaster);
        assert_eq!(participant.memory().all()[0].text, "Topic: tabs or spaces");
        assert!(
            participant
                .components()
                .contains(&ContextComponent::RecentObservations { count: 2 })
        );
        assert_eq!(participant.stats(), ParticipantStats::default());
    }
}
