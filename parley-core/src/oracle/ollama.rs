//! Ollama oracle (local models)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::http::{build_client, map_status_error, map_transport_error};
use super::{GenerateOptions, ModelInfo, Oracle};
use crate::error::{ParleyError, Result};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen3:14b";

/// Oracle backed by a local Ollama server.
pub struct OllamaOracle {
    client: reqwest::Client,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OllamaOracle {
    /// Create a new Ollama oracle.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (e.g., "qwen3:14b")
    /// * `base_url` - Base URL for the Ollama API (defaults to "http://localhost:11434")
    pub fn new(model: impl Into<String>, base_url: Option<impl Into<String>>) -> Self {
        let timeout = Duration::from_secs(60);
        Self {
            client: build_client(timeout),
            model: model.into(),
            base_url: base_url
                .map(|u| u.into())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout,
        }
    }

    /// Builder: set the HTTP request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self.timeout = timeout;
        self
    }

    /// Create from environment variables.
    ///
    /// Reads from:
    /// - `OLLAMA_MODEL` - Model name (optional, defaults to "qwen3:14b")
    /// - `OLLAMA_BASE_URL` - Base URL (optional, defaults to "http://localhost:11434")
    pub fn from_env(model: Option<impl Into<String>>) -> Self {
        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(model, Some(base_url))
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions<'a> {
    temperature: f32,
    num_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn generate_text(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_length,
                stop: (!options.stop_sequences.is_empty())
                    .then_some(options.stop_sequences.as_slice()),
                seed: options.seed,
            },
        };

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error("Ollama", e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error("Ollama", status, text));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            ParleyError::OracleRejected(format!("Failed to parse Ollama response: {}", e))
        })?;

        // Reasoning models may put everything in the thinking field
        let content = body.message.content.trim();
        if content.is_empty() {
            if let Some(thinking) = body.message.thinking {
                return Ok(thinking.trim().to_string());
            }
        }
        Ok(content.to_string())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_oracle_creation() {
        let oracle = OllamaOracle::new("qwen3:14b", None::<String>);
        assert_eq!(oracle.model(), "qwen3:14b");
        assert_eq!(oracle.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_request_shape() {
        let stops = vec!["\n".to_string()];
        let request = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            stream: false,
            options: ChatOptions {
                temperature: 0.0,
                num_predict: 10,
                stop: Some(stops.as_slice()),
                seed: Some(1),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["options"]["num_predict"], 10);
        assert_eq!(json["options"]["stop"][0], "\n");
        assert_eq!(json["stream"], false);
    }
}
