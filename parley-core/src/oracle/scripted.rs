//! Scripted oracles for deterministic runs
//!
//! Provides oracles that return predetermined replies, enabling offline,
//! reproducible tests and demos without a model backend.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::{GenerateOptions, ModelInfo, Oracle};
use crate::error::{ParleyError, Result};

/// Failure a scripted oracle can be told to produce
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedFailure {
    Unavailable(String),
    Timeout(Duration),
    Rejected(String),
}

impl ScriptedFailure {
    fn to_error(&self) -> ParleyError {
        match self {
            ScriptedFailure::Unavailable(msg) => ParleyError::OracleUnavailable(msg.clone()),
            ScriptedFailure::Timeout(after) => ParleyError::OracleTimeout(*after),
            ScriptedFailure::Rejected(msg) => ParleyError::OracleRejected(msg.clone()),
        }
    }
}

/// Predetermined outcome of one oracle call
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedResponse {
    /// Reply text, or the failure to raise
    pub outcome: std::result::Result<String, ScriptedFailure>,

    /// Simulated latency in milliseconds
    pub delay_ms: u64,
}

impl ScriptedResponse {
    /// Create a successful reply
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            outcome: Ok(text.into()),
            delay_ms: 0,
        }
    }

    /// Create a failing response
    pub fn failure(failure: ScriptedFailure) -> Self {
        Self {
            outcome: Err(failure),
            delay_ms: 0,
        }
    }

    /// Add a simulated delay
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// One recorded call
#[derive(Debug, Clone)]
pub struct OracleCall {
    pub prompt: String,
    pub options: GenerateOptions,
}

/// An oracle that replays a script.
///
/// Responses are returned in order; once the script runs out the last
/// response repeats. An empty script answers with an empty string.
pub struct ScriptedOracle {
    responses: Arc<RwLock<Vec<ScriptedResponse>>>,
    call_count: AtomicUsize,
    call_history: Arc<RwLock<Vec<OracleCall>>>,
}

impl ScriptedOracle {
    /// Create an oracle that replies with `replies` in order
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_responses(replies.into_iter().map(ScriptedResponse::reply).collect())
    }

    /// Create an oracle from full response definitions
    pub fn with_responses(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Arc::new(RwLock::new(responses)),
            call_count: AtomicUsize::new(0),
            call_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create an oracle whose every call fails the same way
    pub fn always_failing(failure: ScriptedFailure) -> Self {
        Self::with_responses(vec![ScriptedResponse::failure(failure)])
    }

    /// Append a response to the script
    pub async fn push(&self, response: ScriptedResponse) {
        self.responses.write().await.push(response);
    }

    /// Get the number of times this oracle has been called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the call history (prompt and options of each call)
    pub async fn call_history(&self) -> Vec<OracleCall> {
        self.call_history.read().await.clone()
    }

    /// Reset call count and history
    pub async fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        self.call_history.write().await.clear();
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate_text(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_history.write().await.push(OracleCall {
            prompt: prompt.to_string(),
            options: options.clone(),
        });

        let response = {
            let responses = self.responses.read().await;
            responses
                .get(call_num)
                .or_else(|| responses.last())
                .cloned()
        };

        let Some(response) = response else {
            return Ok(String::new());
        };

        if response.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(response.delay_ms)).await;
        }

        response.outcome.map_err(|failure| failure.to_error())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "script".to_string(),
        }
    }
}

/// An oracle that always answers with one template.
///
/// `{prompt}` in the template is replaced by the prompt it was given.
pub struct EchoOracle {
    template: String,
}

impl EchoOracle {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl Oracle for EchoOracle {
    async fn generate_text(&self, prompt: &str, _options: &GenerateOptions) -> Result<String> {
        Ok(self.template.replace("{prompt}", prompt))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "echo".to_string(),
            model_name: "template".to_string(),
        }
    }
}
