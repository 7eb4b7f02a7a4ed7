//! Configuration types for Parley simulations

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::engine::action::ActionSpec;
use crate::engine::policy::{
    ActionSpecPolicy, ResolutionPolicy, TerminationPolicy, TurnPolicy, WitnessPolicy,
};
use crate::error::{ParleyError, Result};
use crate::oracle::retry::RetryConfig;
use crate::participant::{ContextComponent, ParticipantKind};

/// Main configuration for a Parley simulation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParleyConfig {
    /// Engine configuration for a single run
    #[serde(default)]
    pub run: RunConfig,

    /// Memory bank configuration shared by every participant
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Oracle backend configuration (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleConfig>,

    /// Participant descriptors, in turn order
    #[serde(default)]
    pub participants: Vec<ParticipantConfig>,
}

/// Engine configuration for a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hard ceiling on resolved steps
    pub max_steps: u64,

    /// Fed to every game master before the first step
    pub initial_observations: Vec<String>,

    /// Name of the game master that arbitrates; the first one when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_master: Option<String>,

    /// How the next actor is picked
    pub turn_policy: TurnPolicy,

    /// When the run stops before the step budget is spent
    pub termination_policy: TerminationPolicy,

    /// Who observes each resolved event
    pub witness_policy: WitnessPolicy,

    /// How raw actions become events
    pub resolution: ResolutionPolicy,

    /// Where action specs come from
    pub action_spec: ActionSpecPolicy,

    /// Have the game master narrate an observation to the actor before it acts
    pub gm_observations: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            initial_observations: Vec::new(),
            game_master: None,
            turn_policy: TurnPolicy::RoundRobin,
            termination_policy: TerminationPolicy::Never,
            witness_policy: WitnessPolicy::ActorAndGameMasters,
            resolution: ResolutionPolicy::Verbatim,
            action_spec: ActionSpecPolicy::Fixed {
                spec: ActionSpec::default(),
            },
            gm_observations: false,
        }
    }
}

impl RunConfig {
    /// Builder: set the step budget
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Builder: add an observation delivered to game masters before step one
    pub fn with_initial_observation(mut self, observation: impl Into<String>) -> Self {
        self.initial_observations.push(observation.into());
        self
    }

    /// Builder: set the arbitrating game master
    pub fn with_game_master(mut self, name: impl Into<String>) -> Self {
        self.game_master = Some(name.into());
        self
    }

    /// Builder: set the turn policy
    pub fn with_turn_policy(mut self, policy: TurnPolicy) -> Self {
        self.turn_policy = policy;
        self
    }

    /// Builder: set the termination policy
    pub fn with_termination_policy(mut self, policy: TerminationPolicy) -> Self {
        self.termination_policy = policy;
        self
    }

    /// Builder: set the witness policy
    pub fn with_witness_policy(mut self, policy: WitnessPolicy) -> Self {
        self.witness_policy = policy;
        self
    }

    /// Builder: set the resolution policy
    pub fn with_resolution(mut self, policy: ResolutionPolicy) -> Self {
        self.resolution = policy;
        self
    }

    /// Builder: set the action spec policy
    pub fn with_action_spec(mut self, policy: ActionSpecPolicy) -> Self {
        self.action_spec = policy;
        self
    }

    /// Builder: enable game-master observations before each action
    pub fn with_gm_observations(mut self, enabled: bool) -> Self {
        self.gm_observations = enabled;
        self
    }

    /// Validate the run configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the step budget is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(ParleyError::Configuration(
                "max_steps must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Memory bank configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Embedding dimension, fixed for the lifetime of every bank
    pub dimension: usize,

    /// Which embedder backs the banks
    pub embedder: EmbedderKind,

    /// Default number of similar memories pulled into a prompt
    pub retrieval_k: usize,

    /// Default number of recent observations pulled into a prompt
    pub recent_observations: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dimension: 64,
            embedder: EmbedderKind::Hashed,
            retrieval_k: 3,
            recent_observations: 5,
        }
    }
}

/// Embedder type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// SHA-256 seeded random unit vectors
    #[default]
    Hashed,
    /// Signed feature hashing of content words
    Lexical,
}

/// Oracle backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Provider type
    pub provider: OracleProvider,

    /// Model name
    pub model: String,

    /// API key (if needed, prefer env vars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for compatible endpoints such as DeepSeek or a local Ollama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-call deadline
    #[serde(default = "default_oracle_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Retry behaviour for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_oracle_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Oracle provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// Descriptor for one participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantConfig {
    /// Unique name within the run
    pub name: String,

    /// Entity or game master
    #[serde(default)]
    pub kind: ParticipantKind,

    /// Role prompt shown at the top of every prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Written to the participant's memory before the run
    #[serde(default)]
    pub seed_memories: Vec<String>,

    /// Explicit context pipeline; the kind's default pipeline when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ContextComponent>>,
}

impl ParticipantConfig {
    /// Descriptor for an entity
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParticipantKind::Entity,
            instructions: None,
            seed_memories: Vec::new(),
            components: None,
        }
    }

    /// Descriptor for a game master
    pub fn game_master(name: impl Into<String>) -> Self {
        Self {
            kind: ParticipantKind::GameMaster,
            ..Self::entity(name)
        }
    }

    /// Builder: set the role prompt
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Builder: add a seed memory
    pub fn with_seed_memory(mut self, memory: impl Into<String>) -> Self {
        self.seed_memories.push(memory.into());
        self
    }
}

impl ParleyConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (parley.toml)
    /// 3. The file named by PARLEY_CONFIG_PATH, if set
    /// 4. Environment variable overrides (`PARLEY_RUN__MAX_STEPS=4`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::new()
            .merge(Serialized::defaults(ParleyConfig::default()))
            .merge(Toml::file("parley.toml"));

        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ParleyConfig = figment
            .merge(Env::prefixed("PARLEY_").split("__"))
            .extract()
            .map_err(|e| {
                ParleyError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.json`, anything
    /// else is read as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Json, Serialized, Toml, Yaml},
        };

        let path = path.as_ref();
        let figment = Figment::new().merge(Serialized::defaults(ParleyConfig::default()));
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };

        let config: ParleyConfig = figment.extract().map_err(|e| {
            ParleyError::Configuration(format!("Failed to load configuration file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;

        if self.memory.dimension == 0 {
            return Err(ParleyError::Configuration(
                "memory.dimension must be positive".to_string(),
            ));
        }

        if let Some(oracle) = &self.oracle {
            if oracle.timeout.is_zero() {
                return Err(ParleyError::Configuration(
                    "oracle.timeout must be positive".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for participant in &self.participants {
            if participant.name.trim().is_empty() {
                return Err(ParleyError::Configuration(
                    "participant names must not be empty".to_string(),
                ));
            }
            if !seen.insert(participant.name.as_str()) {
                return Err(ParleyError::DuplicateParticipant(participant.name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ParleyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.max_steps, 10);
        assert_eq!(config.memory.dimension, 64);
        assert_eq!(config.memory.embedder, EmbedderKind::Hashed);
    }

    #[test]
    fn test_zero_steps_rejected() {
        let config = ParleyConfig {
            run: RunConfig::default().with_max_steps(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ParleyError::Configuration(_))
        ));
    }

    #[test]
    fn test_duplicate_participants_rejected() {
        let config = ParleyConfig {
            participants: vec![
                ParticipantConfig::entity("P1"),
                ParticipantConfig::entity("P1"),
            ],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ParleyError::DuplicateParticipant(name)) if name == "P1"
        ));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[run]
max_steps = 4
initial_observations = ["The night falls."]

[run.turn_policy]
type = "forced"
order = ["A", "B"]

[memory]
dimension = 32
embedder = "lexical"

[oracle]
provider = "openai"
model = "deepseek-chat"
base_url = "https://api.deepseek.com"
timeout = "30s"

[[participants]]
name = "A"

[[participants]]
name = "GM"
kind = "game_master"
"#
        )
        .unwrap();

        let config = ParleyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.run.max_steps, 4);
        assert_eq!(config.run.initial_observations, vec!["The night falls."]);
        assert!(matches!(config.run.turn_policy, TurnPolicy::Forced { ref order } if order.len() == 2));
        assert_eq!(config.memory.dimension, 32);
        assert_eq!(config.memory.embedder, EmbedderKind::Lexical);
        // Unset fields keep their defaults
        assert_eq!(config.memory.retrieval_k, 3);

        let oracle = config.oracle.unwrap();
        assert_eq!(oracle.provider, OracleProvider::OpenAi);
        assert_eq!(oracle.timeout, Duration::from_secs(30));
        assert_eq!(oracle.retry.max_attempts, 3);

        assert_eq!(config.participants.len(), 2);
        assert_eq!(config.participants[1].kind, ParticipantKind::GameMaster);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "run:\n  max_steps: 6\nparticipants:\n  - name: P1\n  - name: Host\n    kind: game_master\n"
        )
        .unwrap();

        let config = ParleyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.run.max_steps, 6);
        assert_eq!(config.participants[0].kind, ParticipantKind::Entity);
    }

    #[test]
    fn test_participant_descriptor_builders() {
        let gm = ParticipantConfig::game_master("Werewolf GM")
            .with_instructions("Run a classic game.")
            .with_seed_memory("Terms: wolf, seer, villager");
        assert_eq!(gm.kind, ParticipantKind::GameMaster);
        assert_eq!(gm.seed_memories.len(), 1);
        assert!(gm.components.is_none());
    }
}
