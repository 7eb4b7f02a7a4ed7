//! Text-generation oracles
//!
//! An [`Oracle`] is whatever produces text for a participant: a hosted chat
//! model, a local model, or a scripted stand-in. Participants share one oracle
//! by `Arc`, so implementations must be `Send + Sync` and keep no per-call
//! state that would leak between participants.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ParleyError, Result};

pub mod factory;
pub mod retry;
pub mod scripted;

#[cfg(any(feature = "oracle-openai", feature = "oracle-ollama"))]
mod http;
#[cfg(feature = "oracle-ollama")]
pub mod ollama;
#[cfg(feature = "oracle-openai")]
pub mod openai;

pub use factory::OracleFactory;
pub use retry::{OracleCallPolicy, RetryConfig, with_retry, with_timeout};
pub use scripted::{EchoOracle, OracleCall, ScriptedFailure, ScriptedOracle, ScriptedResponse};

/// Options for a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Upper bound on generated tokens
    pub max_length: usize,

    /// Generation stops before any of these strings
    pub stop_sequences: Vec<String>,

    /// Sampling temperature (0.0-2.0)
    pub temperature: f32,

    /// Seed for backends that support reproducible sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_length: 256,
            stop_sequences: Vec::new(),
            temperature: 0.5,
            seed: None,
        }
    }
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.stop_sequences.push(stop.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Where a [`Choice`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSource {
    /// The backend named an option
    Model,
    /// The backend's answer could not be read as an option; the index was drawn uniformly
    RandomFallback,
}

/// Result of [`Oracle::select_choice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Index into the offered options, always in range
    pub index: usize,

    /// The selected option
    pub text: String,

    /// Per-option confidence, when the backend reports one
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,

    pub source: ChoiceSource,
}

impl Choice {
    /// Whether this choice was drawn at random instead of made by the backend.
    pub fn is_fallback(&self) -> bool {
        self.source == ChoiceSource::RandomFallback
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Trait for text-generation backends.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate free text for `prompt`.
    ///
    /// # Errors
    ///
    /// - `OracleUnavailable` when the backend is unreachable or overloaded
    /// - `OracleTimeout` when the backend does not answer in time
    /// - `OracleRejected` when the request or the response is unusable
    async fn generate_text(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;

    /// Pick one of `options`.
    ///
    /// The default implementation shows the options as a numbered menu, asks
    /// for the number at temperature zero and reads the first integer in the
    /// reply. If there is none, or it is out of range, a uniformly random
    /// option is returned with [`ChoiceSource::RandomFallback`]. The draw uses
    /// `seed` when given.
    ///
    /// # Errors
    ///
    /// Fails if `options` is empty or if the generation call itself fails.
    async fn select_choice(
        &self,
        prompt: &str,
        options: &[String],
        seed: Option<u64>,
    ) -> Result<Choice> {
        if options.is_empty() {
            return Err(ParleyError::Other(
                "select_choice needs at least one option".to_string(),
            ));
        }

        let menu = choice_prompt(prompt, options);
        let mut generate = GenerateOptions::new()
            .with_temperature(0.0)
            .with_max_length(10);
        generate.seed = seed;

        let reply = self.generate_text(&menu, &generate).await?;

        match parse_choice(&reply, options.len()) {
            Some(index) => Ok(Choice {
                index,
                text: options[index].clone(),
                scores: BTreeMap::new(),
                source: ChoiceSource::Model,
            }),
            None => {
                let index = random_index(options.len(), seed);
                tracing::warn!(
                    fallback = true,
                    reply = %reply.trim(),
                    options = options.len(),
                    index,
                    "Unparseable choice reply, picking an option at random"
                );
                Ok(Choice {
                    index,
                    text: options[index].clone(),
                    scores: BTreeMap::new(),
                    source: ChoiceSource::RandomFallback,
                })
            }
        }
    }

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Numbered menu prompt used by the default `select_choice`.
pub fn choice_prompt(prompt: &str, options: &[String]) -> String {
    let mut menu = String::from(prompt.trim_end());
    menu.push_str("\n\nOptions:\n");
    for (i, option) in options.iter().enumerate() {
        menu.push_str(&format!("{}. {}\n", i + 1, option));
    }
    menu.push_str(&format!(
        "\nRespond ONLY with the number of the best option (1-{}):",
        options.len()
    ));
    menu
}

/// Read a 1-based option number out of `reply`, returning the 0-based index.
pub fn parse_choice(reply: &str, option_count: usize) -> Option<usize> {
    let number: usize = FIRST_NUMBER.find(reply)?.as_str().parse().ok()?;
    let index = number.checked_sub(1)?;
    (index < option_count).then_some(index)
}

fn random_index(option_count: usize, seed: Option<u64>) -> usize {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..option_count),
        None => rand::thread_rng().gen_range(0..option_count),
    }
}

pub mod prelude {
    pub use crate::oracle::{
        Choice, ChoiceSource, EchoOracle, GenerateOptions, Oracle, OracleCallPolicy,
        ScriptedOracle,
    };
}
