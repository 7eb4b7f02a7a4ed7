//! Error types for Parley operations

use std::time::Duration;

/// Result type for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Error types for the Parley simulation engine.
///
/// Variants fall into four families:
/// - configuration errors, detected before a run starts and always fatal
/// - transient oracle errors, retried with backoff at the call site
/// - protocol violations by a collaborator (usually a game master), fatal for the run
/// - turn failures, which wrap whatever made a single turn give up
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required collaborator has not been bound yet
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// A collaborator that may only be bound once was bound again
    #[error("Already configured: {0}")]
    AlreadyConfigured(String),

    /// An embedding had the wrong number of components
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Two participants share a name
    #[error("Duplicate participant name: {0}")]
    DuplicateParticipant(String),

    /// A name was used that no participant carries
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    /// The oracle backend could not be reached or is overloaded
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The oracle did not answer within the deadline
    #[error("Oracle timed out after {0:?}")]
    OracleTimeout(Duration),

    /// The oracle answered with something that retrying will not fix
    #[error("Oracle rejected request: {0}")]
    OracleRejected(String),

    /// The actor selected for a step is not a live participant
    #[error("No eligible actor at step {step}: '{requested}' is not a live participant")]
    NoEligibleActor { step: u64, requested: String },

    /// An action spec cannot be answered by the actor it was issued to
    #[error("Unsatisfiable action spec for {actor}: {reason}")]
    UnsatisfiableActionSpec { actor: String, reason: String },

    /// A turn gave up; prior log state is intact
    #[error("Turn failed at step {step} (actor {actor}): {source}")]
    TurnFailed {
        step: u64,
        actor: String,
        #[source]
        source: Box<ParleyError>,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ParleyError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ParleyError::OracleUnavailable(_) | ParleyError::OracleTimeout(_)
        )
    }

    /// Whether this error should have stopped the run from starting.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ParleyError::Configuration(_)
                | ParleyError::NotConfigured(_)
                | ParleyError::AlreadyConfigured(_)
                | ParleyError::DimensionMismatch { .. }
                | ParleyError::DuplicateParticipant(_)
                | ParleyError::UnknownParticipant(_)
        )
    }

    /// Whether a collaborator broke the engine protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ParleyError::NoEligibleActor { .. } | ParleyError::UnsatisfiableActionSpec { .. }
        )
    }
}

impl From<String> for ParleyError {
    fn from(s: String) -> Self {
        ParleyError::Other(s)
    }
}

impl From<&str> for ParleyError {
    fn from(s: &str) -> Self {
        ParleyError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ParleyError {
    fn from(err: anyhow::Error) -> Self {
        ParleyError::Other(err.to_string())
    }
}

impl From<figment::Error> for ParleyError {
    fn from(err: figment::Error) -> Self {
        ParleyError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParleyError::DimensionMismatch {
            expected: 64,
            actual: 32,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 64, got 32");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ParleyError::OracleUnavailable("503".into()).is_transient());
        assert!(ParleyError::OracleTimeout(Duration::from_secs(1)).is_transient());
        assert!(!ParleyError::OracleRejected("400".into()).is_transient());
        assert!(!ParleyError::Configuration("bad".into()).is_transient());
    }

    #[test]
    fn test_turn_failed_keeps_source() {
        let err = ParleyError::TurnFailed {
            step: 3,
            actor: "Alice".to_string(),
            source: Box::new(ParleyError::OracleUnavailable("down".into())),
        };
        assert!(err.to_string().contains("step 3"));
        assert!(err.to_string().contains("Alice"));
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("down"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(ParleyError::DuplicateParticipant("A".into()).is_configuration());
        assert!(
            ParleyError::NoEligibleActor {
                step: 0,
                requested: "Z".into()
            }
            .is_protocol_violation()
        );
    }
}
