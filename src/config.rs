//! Configuration
//!
//! Process-wide settings consumed by the knowledge manager, the agent factory,
//! the monitor and the orchestrator. Loaded once at startup through
//! [`ConfigLoader`] and passed by reference to whichever service needs it.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::agent::factory::AgentFactoryConfig;
use crate::agent::kind::normalize_agent_type;
use crate::error::OrchestratorError;
use crate::logging::LoggingConfig;
use crate::monitor::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_knowledge_bases_root() -> PathBuf {
    PathBuf::from("knowledge_bases")
}

fn default_generated_documents_root() -> PathBuf {
    PathBuf::from("generated_documents")
}

fn default_conversation_storage() -> PathBuf {
    PathBuf::from("conversation_data")
}

/// Filesystem roots for knowledge stores, generated output and archived conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_knowledge_bases_root")]
    pub knowledge_bases_root: PathBuf,

    #[serde(default = "default_generated_documents_root")]
    pub generated_documents_root: PathBuf,

    #[serde(default = "default_conversation_storage")]
    pub conversation_storage: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            knowledge_bases_root: default_knowledge_bases_root(),
            generated_documents_root: default_generated_documents_root(),
            conversation_storage: default_conversation_storage(),
        }
    }
}

impl PathsConfig {
    /// Knowledge store directory for a domain: `<root>/<long_name>_kb`.
    ///
    /// Short codes (`ism`, `bsp`, `pds`, `prs`) resolve to their long names;
    /// any other domain name is used as given.
    pub fn knowledge_base_path(&self, domain: &str) -> PathBuf {
        let mapped = normalize_agent_type(domain);
        self.knowledge_bases_root.join(format!("{}_kb", mapped))
    }

    /// Output directory for generated documents of a domain.
    pub fn output_path(&self, domain: &str) -> PathBuf {
        let mapped = normalize_agent_type(domain);
        self.generated_documents_root.join(mapped)
    }

    pub fn ensure_directories_exist(&self) -> Result<(), OrchestratorError> {
        std::fs::create_dir_all(&self.knowledge_bases_root)?;
        std::fs::create_dir_all(&self.generated_documents_root)?;
        Ok(())
    }
}

/// Which backends the knowledge manager and the agents talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// In-process embedding, completion and template generation. No network.
    #[default]
    Offline,
    /// OpenAI-compatible HTTP endpoints.
    OpenAi,
}

fn default_model() -> String {
    "openai:gpt-4o-mini".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_max_tool_calls() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

/// Document generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Overall budget for a generation run, reported to providers that accept one.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Optional hard deadline around each generation and knowledge query call.
    /// Unset means calls may block indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub enable_streaming: bool,

    #[serde(default = "default_true")]
    pub enable_tool_calls: bool,

    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls_per_run: u32,

    #[serde(default)]
    pub provider: ProviderKind,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            request_timeout_secs: None,
            enable_streaming: true,
            enable_tool_calls: true,
            max_tool_calls_per_run: default_max_tool_calls(),
            provider: ProviderKind::default(),
        }
    }
}

fn default_api_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_completion_model")]
    pub completion_model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            completion_model: default_completion_model(),
        }
    }
}

impl OpenAiSettings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FindocConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub openai: OpenAiSettings,

    #[serde(default)]
    pub factory: AgentFactoryConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FindocConfig {
    pub fn knowledge_base_path(&self, domain: &str) -> PathBuf {
        self.paths.knowledge_base_path(domain)
    }

    pub fn output_path(&self, domain: &str) -> PathBuf {
        self.paths.output_path(domain)
    }

    pub fn ensure_directories_exist(&self) -> Result<(), OrchestratorError> {
        self.paths.ensure_directories_exist()
    }

    /// Root every relative storage path under `base`.
    pub fn rooted_at(mut self, base: &std::path::Path) -> Self {
        let root = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        self.paths.knowledge_bases_root = root(&self.paths.knowledge_bases_root);
        self.paths.generated_documents_root = root(&self.paths.generated_documents_root);
        self.paths.conversation_storage = root(&self.paths.conversation_storage);
        self
    }

    /// Validate settings that would otherwise fail late.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.generation.default_model.trim().is_empty() {
            return Err(OrchestratorError::ConfigError(
                "generation.default_model must not be empty".to_string(),
            ));
        }
        if self.monitor.check_interval_secs == 0 {
            return Err(OrchestratorError::ConfigError(
                "monitor.check_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.generation.provider == ProviderKind::OpenAi && !self.openai.has_api_key() {
            tracing::warn!(
                "OPENAI_API_KEY is not set. LLM-backed features will fail until it's provided."
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knowledge_base_path_maps_short_codes() {
        let paths = PathsConfig::default();
        assert_eq!(
            paths.knowledge_base_path("ism"),
            PathBuf::from("knowledge_bases").join("investor_summary_kb")
        );
        assert_eq!(
            paths.knowledge_base_path("pricing_supplement"),
            PathBuf::from("knowledge_bases").join("pricing_supplement_kb")
        );
        assert_eq!(
            paths.knowledge_base_path("x"),
            PathBuf::from("knowledge_bases").join("x_kb")
        );
    }

    #[test]
    fn test_output_path_maps_short_codes() {
        let paths = PathsConfig::default();
        assert_eq!(
            paths.output_path("bsp"),
            PathBuf::from("generated_documents").join("base_shelf_prospectus")
        );
    }

    #[test]
    fn test_defaults() {
        let config = FindocConfig::default();
        assert_eq!(config.generation.default_model, "openai:gpt-4o-mini");
        assert_eq!(config.generation.request_timeout_secs, None);
        assert_eq!(config.generation.provider, ProviderKind::Offline);
        assert_eq!(config.factory.max_retry_attempts, 3);
        assert_eq!(config.monitor.check_interval_secs, 60);
    }

    #[test]
    fn test_rooted_at_keeps_absolute_paths() {
        let mut config = FindocConfig::default();
        config.paths.generated_documents_root = PathBuf::from("/abs/out");
        let rooted = config.rooted_at(std::path::Path::new("/tmp/base"));
        assert_eq!(
            rooted.paths.knowledge_bases_root,
            PathBuf::from("/tmp/base/knowledge_bases")
        );
        assert_eq!(rooted.paths.generated_documents_root, PathBuf::from("/abs/out"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = FindocConfig::default();
        config.monitor.check_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_kind_parses_lowercase() {
        let parsed: GenerationSettings =
            toml::from_str("provider = \"openai\"").unwrap();
        assert_eq!(parsed.provider, ProviderKind::OpenAi);
    }
}
