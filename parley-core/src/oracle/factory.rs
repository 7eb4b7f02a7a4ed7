//! Factory for creating oracles from configuration

use crate::config::{OracleConfig, OracleProvider};
#[cfg(not(all(feature = "oracle-openai", feature = "oracle-ollama")))]
use crate::error::ParleyError;
use crate::error::Result;
use crate::oracle::{Oracle, OracleCallPolicy};
use std::sync::Arc;

#[cfg(feature = "oracle-ollama")]
use crate::oracle::ollama::OllamaOracle;

#[cfg(feature = "oracle-openai")]
use crate::oracle::openai::OpenAiOracle;

/// Factory for creating oracles
pub struct OracleFactory;

impl OracleFactory {
    /// Create an oracle from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Oracle configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created (e.g., missing API
    /// key, or the backend's feature is not enabled)
    pub fn create(config: &OracleConfig) -> Result<Arc<dyn Oracle>> {
        let oracle = match config.provider {
            OracleProvider::OpenAi => Self::create_openai(config)?,
            OracleProvider::Ollama => Self::create_ollama(config)?,
        };

        let info = oracle.model_info();
        tracing::info!(
            provider = %info.provider,
            model = %info.model_name,
            "Created oracle"
        );

        Ok(oracle)
    }

    /// Create from an optional config section
    pub fn from_config(config: Option<&OracleConfig>) -> Result<Option<Arc<dyn Oracle>>> {
        config.map(Self::create).transpose()
    }

    /// Call policy for participants talking to the configured backend.
    ///
    /// Without an `[oracle]` section the default policy applies.
    pub fn call_policy(config: Option<&OracleConfig>) -> OracleCallPolicy {
        config
            .map(|oracle| OracleCallPolicy::new(oracle.timeout, oracle.retry.clone()))
            .unwrap_or_default()
    }

    #[cfg(feature = "oracle-openai")]
    fn create_openai(config: &OracleConfig) -> Result<Arc<dyn Oracle>> {
        let model = (!config.model.is_empty()).then(|| config.model.clone());

        let oracle = match &config.api_key {
            Some(api_key) => {
                let model = model
                    .or_else(|| std::env::var("OPENAI_MODEL").ok())
                    .unwrap_or_else(|| "gpt-4o-mini".to_string());
                match &config.base_url {
                    Some(base_url) => {
                        OpenAiOracle::with_base_url(api_key.clone(), model, base_url.clone())
                    }
                    None => OpenAiOracle::new(api_key.clone(), model),
                }
            }
            None => OpenAiOracle::from_env(model)?,
        };

        Ok(Arc::new(oracle.with_timeout(config.timeout)))
    }

    #[cfg(not(feature = "oracle-openai"))]
    fn create_openai(_config: &OracleConfig) -> Result<Arc<dyn Oracle>> {
        Err(ParleyError::Configuration(
            "OpenAI oracle requires 'oracle-openai' feature".to_string(),
        ))
    }

    #[cfg(feature = "oracle-ollama")]
    fn create_ollama(config: &OracleConfig) -> Result<Arc<dyn Oracle>> {
        let model = (!config.model.is_empty()).then(|| config.model.clone());
        let oracle = match &config.base_url {
            Some(url) => OllamaOracle::new(
                model.unwrap_or_else(|| "qwen3:14b".to_string()),
                Some(url.clone()),
            ),
            None => OllamaOracle::from_env(model),
        };

        Ok(Arc::new(oracle.with_timeout(config.timeout)))
    }

    #[cfg(not(feature = "oracle-ollama"))]
    fn create_ollama(_config: &OracleConfig) -> Result<Arc<dyn Oracle>> {
        Err(ParleyError::Configuration(
            "Ollama oracle requires 'oracle-ollama' feature".to_string(),
        ))
    }
}
