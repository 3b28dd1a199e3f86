//! Error types for the orchestration core.
//!
//! Only the knowledge-store initialization and generation paths surface these
//! to callers directly. Factory and registry code converts failures into
//! outcome values, and write paths report an [`OperationResult`](crate::knowledge::OperationResult).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Knowledge store error for domain '{domain}': {message}")]
    KnowledgeStore { domain: String, message: String },

    #[error("Error generating document with {agent_type} agent: {message}")]
    Generation { agent_type: String, message: String },

    #[error("Error generating document with history using {agent_type} agent: {message}")]
    GenerationWithHistory { agent_type: String, message: String },

    #[error("Agent returned no usable output (missing data/output)")]
    NoUsableOutput,

    #[error("{0}")]
    InvalidUpdateRequest(String),

    #[error("Unknown agent type: {0}")]
    UnknownAgent(String),

    #[error("No valid agents provided. Valid options: {0:?}")]
    NoValidAgents(Vec<String>),

    #[error("Failed to construct agent {agent_type}: {reason}")]
    ConstructionFailed { agent_type: String, reason: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn knowledge(domain: impl Into<String>, message: impl ToString) -> Self {
        OrchestratorError::KnowledgeStore {
            domain: domain.into(),
            message: message.to_string(),
        }
    }

    pub fn generation(agent_type: impl Into<String>, source: impl ToString) -> Self {
        OrchestratorError::Generation {
            agent_type: agent_type.into(),
            message: source.to_string(),
        }
    }
}

impl From<config::ConfigError> for OrchestratorError {
    fn from(err: config::ConfigError) -> Self {
        OrchestratorError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        OrchestratorError::Provider(err.to_string())
    }
}

impl From<toml::ser::Error> for OrchestratorError {
    fn from(err: toml::ser::Error) -> Self {
        OrchestratorError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_is_tagged_with_agent_type() {
        let err = OrchestratorError::generation("prs", "boom");
        assert_eq!(
            err.to_string(),
            "Error generating document with prs agent: boom"
        );
    }

    #[test]
    fn test_no_usable_output_message() {
        assert_eq!(
            OrchestratorError::NoUsableOutput.to_string(),
            "Agent returned no usable output (missing data/output)"
        );
    }
}
