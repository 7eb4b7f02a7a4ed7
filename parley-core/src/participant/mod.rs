//! Participants: entities and game masters
//!
//! A participant owns a [`MemoryBank`], shares an [`Oracle`] with the rest of
//! the run and turns an [`ActionSpec`] into text by running its context
//! components in order, joining their fragments into one prompt, and making a
//! single oracle call. Participants never talk to each other directly; the
//! engine carries every observation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::action::{ActionSpec, OutputType};
use crate::engine::event::EventLog;
use crate::error::{ParleyError, Result};
use crate::memory::MemoryBank;
use crate::oracle::{GenerateOptions, Oracle, OracleCallPolicy};

pub mod builder;
pub mod components;

pub use builder::ParticipantBuilder;
pub use components::{ComponentContext, ContextComponent, default_components};

/// Role of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    /// An actor in the simulation
    #[default]
    Entity,
    /// An arbiter: selects actors, shapes actions, resolves events
    GameMaster,
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantKind::Entity => write!(f, "entity"),
            ParticipantKind::GameMaster => write!(f, "game master"),
        }
    }
}

/// Counters kept per participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStats {
    /// Completed `act` calls
    pub actions: u64,
    /// Observations written to memory
    pub observations: u64,
    /// Choices the oracle answered unreadably, resolved at random
    pub choice_fallbacks: u64,
}

static FIRST_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

/// An entity or game master taking part in a run.
pub struct Participant {
    name: String,
    kind: ParticipantKind,
    memory: MemoryBank,
    oracle: Arc<dyn Oracle>,
    components: Vec<ContextComponent>,
    options: GenerateOptions,
    call_policy: OracleCallPolicy,
    latest_observation: Option<String>,
    stats: ParticipantStats,
}

impl Participant {
    /// Start building an entity called `name`
    pub fn builder(name: impl Into<String>) -> ParticipantBuilder {
        ParticipantBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    pub fn is_game_master(&self) -> bool {
        self.kind == ParticipantKind::GameMaster
    }

    pub fn memory(&self) -> &MemoryBank {
        &self.memory
    }

    pub fn components(&self) -> &[ContextComponent] {
        &self.components
    }

    pub fn oracle(&self) -> &Arc<dyn Oracle> {
        &self.oracle
    }

    pub fn latest_observation(&self) -> Option<&str> {
        self.latest_observation.as_deref()
    }

    pub fn stats(&self) -> ParticipantStats {
        self.stats
    }

    /// Remember `text` as an observation at the current logical time.
    ///
    /// # Errors
    ///
    /// Propagates memory errors.
    pub fn observe(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let record = self.memory.add(text.clone())?;
        debug!(
            participant = %self.name,
            record = record.id,
            "Observed"
        );
        self.latest_observation = Some(text);
        self.stats.observations += 1;
        Ok(())
    }

    /// Remember `text` as an observation made at logical time `t`.
    pub fn observe_at(&mut self, text: impl Into<String>, t: u64) -> Result<()> {
        self.memory.advance_clock(t);
        self.observe(text)
    }

    /// Assemble the prompt for `spec`: each component's fragment in order,
    /// separated by blank lines, followed by the call to action.
    ///
    /// # Errors
    ///
    /// Propagates memory retrieval errors.
    pub fn compose_prompt(&self, spec: &ActionSpec, log: &EventLog) -> Result<String> {
        let call_to_action = spec.call_to_action_for(&self.name);
        let ctx = ComponentContext {
            name: &self.name,
            kind: self.kind,
            memory: &self.memory,
            latest_observation: self.latest_observation.as_deref(),
            call_to_action: &call_to_action,
            log,
        };

        let mut sections = Vec::with_capacity(self.components.len() + 1);
        for component in &self.components {
            if let Some(fragment) = component.render(&ctx)? {
                sections.push(fragment);
            }
        }
        sections.push(call_to_action.clone());

        let prompt = sections.join("\n\n");
        debug!(
            participant = %self.name,
            fragments = sections.len() - 1,
            prompt_len = prompt.len(),
            "Composed prompt"
        );
        Ok(prompt)
    }

    /// Produce an action answering `spec`.
    ///
    /// Free text is returned as generated. A choice returns the chosen option
    /// text. A float returns the first number found in the reply, or `"0.0"`
    /// when the reply holds none.
    ///
    /// # Errors
    ///
    /// - `UnsatisfiableActionSpec` for a choice with no options
    /// - oracle errors left over once the call policy gives up
    pub async fn act(&mut self, spec: &ActionSpec, log: &EventLog) -> Result<String> {
        if let OutputType::Choice { options } = &spec.output {
            if options.is_empty() {
                return Err(ParleyError::UnsatisfiableActionSpec {
                    actor: self.name.clone(),
                    reason: "choice without options".to_string(),
                });
            }
        }

        let prompt = self.compose_prompt(spec, log)?;

        let action = match &spec.output {
            OutputType::FreeText => self.generate(&prompt).await?,
            OutputType::Choice { options } => {
                // Seeded draws differ per action and repeat across runs
                let seed = self.options.seed.map(|seed| seed.wrapping_add(self.stats.actions));
                let oracle = &self.oracle;
                let choice = self
                    .call_policy
                    .call(|| oracle.select_choice(&prompt, options, seed))
                    .await?;
                if choice.is_fallback() {
                    self.stats.choice_fallbacks += 1;
                }
                choice.text
            }
            OutputType::Float => {
                let reply = self.generate(&prompt).await?;
                match FIRST_FLOAT.find(&reply) {
                    Some(number) => number.as_str().to_string(),
                    None => {
                        warn!(
                            participant = %self.name,
                            reply = %reply,
                            "No number in reply, using 0.0"
                        );
                        "0.0".to_string()
                    }
                }
            }
        };

        self.stats.actions += 1;
        debug!(participant = %self.name, action = %action, "Acted");
        Ok(action)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let oracle = &self.oracle;
        let options = &self.options;
        self.call_policy
            .call(|| oracle.generate_text(prompt, options))
            .await
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("memory", &self.memory)
            .field("components", &self.components.len())
            .field("stats", &self.stats)
            .finish()
    }
}
