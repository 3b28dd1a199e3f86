//! Agent factory: the monitored way to obtain agent instances.
//!
//! Never returns an error to its caller. Every path yields a
//! [`CreationOutcome`] and a log record; `create_*` convenience methods
//! collapse that to `Option`.

use super::base::{AgentConfig, FinancialAgent};
use super::kind::normalize_agent_type;
use super::large_text::LargeTextAgent;
use super::registry::{AgentCapability, AgentRegistry, AgentStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn default_model() -> String {
    "openai:gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFactoryConfig {
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    #[serde(default = "default_true")]
    pub enable_health_monitoring: bool,

    #[serde(default = "default_true")]
    pub auto_retry_on_failure: bool,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Fixed pause between retry attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for AgentFactoryConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            enable_health_monitoring: true,
            auto_retry_on_failure: true,
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Why a creation call did or did not yield an agent.
#[derive(Debug, Clone)]
pub enum CreationOutcome<T> {
    Created(T),
    NotFound {
        agent_type: String,
    },
    ConstructionFailed {
        agent_type: String,
        reason: String,
    },
    RetriesExhausted {
        agent_type: String,
        attempts: u32,
        last_reason: String,
    },
}

impl<T> CreationOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            CreationOutcome::Created(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreationOutcome::Created(_))
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            CreationOutcome::Created(_) => None,
            CreationOutcome::NotFound { agent_type } => {
                Some(format!("Agent type {} not found in registry", agent_type))
            }
            CreationOutcome::ConstructionFailed { reason, .. } => Some(reason.clone()),
            CreationOutcome::RetriesExhausted {
                attempts,
                last_reason,
                ..
            } => Some(format!("{} attempts failed: {}", attempts, last_reason)),
        }
    }
}

/// A tracked instance: a base agent or its large-text wrapper.
#[derive(Clone)]
pub enum AgentHandle {
    Base(Arc<dyn FinancialAgent>),
    LargeText(Arc<LargeTextAgent>),
}

impl AgentHandle {
    pub fn agent(&self) -> &Arc<dyn FinancialAgent> {
        match self {
            AgentHandle::Base(agent) => agent,
            AgentHandle::LargeText(wrapper) => wrapper.base(),
        }
    }

    pub fn agent_type(&self) -> &str {
        self.agent().agent_type()
    }
}

#[derive(Clone)]
pub struct ActiveAgentRecord {
    pub instance: AgentHandle,
    pub created_at: DateTime<Utc>,
    pub config: AgentConfig,
    pub health_status: String,
}

/// Cached state of one tracked instance, or a `not_found` sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAgentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<AgentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct AgentFactory {
    registry: Arc<AgentRegistry>,
    config: AgentFactoryConfig,
    active_agents: RwLock<HashMap<String, ActiveAgentRecord>>,
}

impl AgentFactory {
    pub fn new(registry: Arc<AgentRegistry>, config: AgentFactoryConfig) -> Self {
        Self {
            registry,
            config,
            active_agents: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AgentFactoryConfig {
        &self.config
    }

    /// Factory defaults, then the registry's config schema, then `overrides`.
    pub fn prepare_agent_config(&self, agent_type: &str, overrides: Option<&AgentConfig>) -> AgentConfig {
        let mut config = AgentConfig::new();
        config.insert("model_name".into(), json!(self.config.default_model));
        config.insert("max_tokens".into(), json!(self.config.default_max_tokens));
        config.insert("temperature".into(), json!(self.config.default_temperature));
        if let Some(metadata) = self.registry.get_agent_metadata(agent_type) {
            config.extend(metadata.config_schema);
        }
        if let Some(overrides) = overrides {
            config.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        config
    }

    /// Resolve metadata and config for `agent_type`. Deprecated and shell
    /// entries are logged but still built.
    fn resolve(
        &self,
        agent_type: &str,
        overrides: Option<&AgentConfig>,
    ) -> Result<(String, AgentConfig), CreationOutcome<()>> {
        let mapped = normalize_agent_type(agent_type);
        let Some(metadata) = self.registry.get_agent_metadata(&mapped) else {
            tracing::error!(
                agent_type,
                mapped = %mapped,
                "Agent type {} (mapped to {}) not found in registry",
                agent_type,
                mapped
            );
            return Err(CreationOutcome::NotFound {
                agent_type: agent_type.to_string(),
            });
        };
        match metadata.status {
            AgentStatus::Deprecated => tracing::warn!(agent_type, "Agent {} is deprecated", agent_type),
            AgentStatus::Shell => {
                tracing::warn!(agent_type, "Agent {} is a shell implementation", agent_type)
            }
            _ => {}
        }
        Ok((mapped.clone(), self.prepare_agent_config(&mapped, overrides)))
    }

    fn build_base(
        &self,
        agent_type: &str,
        mapped: &str,
        config: &AgentConfig,
    ) -> CreationOutcome<Arc<dyn FinancialAgent>> {
        let Some(blueprint) = self.registry.get_agent_class(mapped) else {
            tracing::error!(agent_type, "Unknown agent type: {}", agent_type);
            return CreationOutcome::NotFound {
                agent_type: agent_type.to_string(),
            };
        };
        let spec = self.registry.agent_spec(mapped, config);
        match blueprint.construct(&spec) {
            Ok(agent) => CreationOutcome::Created(agent),
            Err(e) => {
                tracing::error!(agent_type, error = %e, "Error creating agent {}: {}", agent_type, e);
                CreationOutcome::ConstructionFailed {
                    agent_type: agent_type.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn track(&self, key: String, instance: AgentHandle, config: AgentConfig) {
        self.active_agents.write().insert(
            key,
            ActiveAgentRecord {
                instance,
                created_at: Utc::now(),
                config,
                health_status: "unknown".to_string(),
            },
        );
    }

    pub fn try_create_agent(
        &self,
        agent_type: &str,
        overrides: Option<&AgentConfig>,
        enable_monitoring: bool,
    ) -> CreationOutcome<Arc<dyn FinancialAgent>> {
        let (mapped, config) = match self.resolve(agent_type, overrides) {
            Ok(resolved) => resolved,
            Err(outcome) => return retype(outcome),
        };
        let outcome = self.build_base(agent_type, &mapped, &config);
        if let CreationOutcome::Created(agent) = &outcome {
            if enable_monitoring && self.config.enable_health_monitoring {
                self.track(mapped.clone(), AgentHandle::Base(agent.clone()), config);
            }
            tracing::debug!(agent_type = %mapped, "Agent created");
        }
        outcome
    }

    pub fn create_agent(
        &self,
        agent_type: &str,
        overrides: Option<&AgentConfig>,
        enable_monitoring: bool,
    ) -> Option<Arc<dyn FinancialAgent>> {
        self.try_create_agent(agent_type, overrides, enable_monitoring)
            .into_option()
    }

    /// Build the base agent, then wrap it. Tracked as `<type>_large_text` so
    /// both variants can coexist.
    pub fn try_create_large_text_agent(
        &self,
        agent_type: &str,
        overrides: Option<&AgentConfig>,
        enable_monitoring: bool,
    ) -> CreationOutcome<Arc<LargeTextAgent>> {
        let (mapped, config) = match self.resolve(agent_type, overrides) {
            Ok(resolved) => resolved,
            Err(outcome) => return retype(outcome),
        };
        let base = match self.build_base(agent_type, &mapped, &config) {
            CreationOutcome::Created(base) => base,
            other => return retype(other),
        };
        let Some(blueprint) = self.registry.get_agent_class(&mapped) else {
            return CreationOutcome::NotFound {
                agent_type: agent_type.to_string(),
            };
        };
        match blueprint.construct_large_text(&mapped, base, &config) {
            Ok(wrapper) => {
                if enable_monitoring && self.config.enable_health_monitoring {
                    self.track(
                        format!("{}_large_text", mapped),
                        AgentHandle::LargeText(wrapper.clone()),
                        config,
                    );
                }
                CreationOutcome::Created(wrapper)
            }
            Err(e) => {
                tracing::error!(agent_type, error = %e, "Error creating large text agent {}: {}", agent_type, e);
                CreationOutcome::ConstructionFailed {
                    agent_type: agent_type.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn create_large_text_agent(
        &self,
        agent_type: &str,
        overrides: Option<&AgentConfig>,
        enable_monitoring: bool,
    ) -> Option<Arc<LargeTextAgent>> {
        self.try_create_large_text_agent(agent_type, overrides, enable_monitoring)
            .into_option()
    }

    /// Sequential attempts with a fixed pause between them. An unknown type
    /// is not retried.
    pub async fn try_create_agent_with_retry(
        &self,
        agent_type: &str,
        overrides: Option<&AgentConfig>,
        max_attempts: Option<u32>,
    ) -> CreationOutcome<Arc<dyn FinancialAgent>> {
        let max_attempts = match max_attempts {
            Some(n) if n > 0 => n,
            _ if self.config.auto_retry_on_failure => self.config.max_retry_attempts.max(1),
            _ => 1,
        };
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            match self.try_create_agent(agent_type, overrides, true) {
                CreationOutcome::Created(agent) => {
                    tracing::info!(
                        agent_type,
                        attempt,
                        "Successfully created agent {} on attempt {}",
                        agent_type,
                        attempt
                    );
                    return CreationOutcome::Created(agent);
                }
                not_found @ CreationOutcome::NotFound { .. } => return not_found,
                other => {
                    last_reason = other.reason().unwrap_or_default();
                    tracing::warn!(
                        agent_type,
                        attempt,
                        reason = %last_reason,
                        "Attempt {} failed for agent {}",
                        attempt,
                        agent_type
                    );
                    if attempt < max_attempts {
                        tracing::info!(agent_type, "Retrying agent creation for {}...", agent_type);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        tracing::error!(
            agent_type,
            attempts = max_attempts,
            "Failed to create agent {} after {} attempts",
            agent_type,
            max_attempts
        );
        CreationOutcome::RetriesExhausted {
            agent_type: agent_type.to_string(),
            attempts: max_attempts,
            last_reason,
        }
    }

    pub async fn create_agent_with_retry(
        &self,
        agent_type: &str,
        overrides: Option<&AgentConfig>,
        max_attempts: Option<u32>,
    ) -> Option<Arc<dyn FinancialAgent>> {
        self.try_create_agent_with_retry(agent_type, overrides, max_attempts)
            .await
            .into_option()
    }

    /// Only successes appear in the map.
    pub fn create_agents_by_capability(
        &self,
        capability: AgentCapability,
        overrides: Option<&AgentConfig>,
    ) -> BTreeMap<String, Arc<dyn FinancialAgent>> {
        self.registry
            .get_agents_by_capability(capability)
            .into_iter()
            .filter_map(|metadata| {
                self.create_agent(&metadata.agent_type, overrides, true)
                    .map(|agent| (metadata.agent_type, agent))
            })
            .collect()
    }

    pub fn get_agent_health(&self, agent_type: &str) -> ActiveAgentHealth {
        let active = self.active_agents.read();
        match active.get(agent_type) {
            None => ActiveAgentHealth {
                status: "not_found".to_string(),
                agent_type: None,
                created_at: None,
                config: None,
                health_status: None,
                message: Some(format!("Agent {} not found in active agents", agent_type)),
            },
            Some(record) => ActiveAgentHealth {
                status: "healthy".to_string(),
                agent_type: Some(record.instance.agent_type().to_string()),
                created_at: Some(record.created_at.to_rfc3339()),
                config: Some(record.config.clone()),
                health_status: Some(record.health_status.clone()),
                message: None,
            },
        }
    }

    pub fn get_all_agent_health(&self) -> BTreeMap<String, ActiveAgentHealth> {
        let keys: Vec<String> = self.active_agents.read().keys().cloned().collect();
        keys.into_iter()
            .map(|key| {
                let health = self.get_agent_health(&key);
                (key, health)
            })
            .collect()
    }

    /// Record the monitor's verdict on every tracked record for a type.
    pub fn mark_health(&self, agent_type: &str, health_status: &str) {
        let mapped = normalize_agent_type(agent_type);
        let large_text = format!("{}_large_text", mapped);
        let mut active = self.active_agents.write();
        for key in [&mapped, &large_text] {
            if let Some(record) = active.get_mut(key.as_str()) {
                record.health_status = health_status.to_string();
            }
        }
    }

    pub fn cleanup_agent(&self, agent_type: &str) -> bool {
        let removed = self.active_agents.write().remove(agent_type);
        match removed {
            Some(record) => {
                record.instance.agent().cleanup();
                tracing::info!(agent_type, "Successfully cleaned up agent {}", agent_type);
                true
            }
            None => {
                tracing::warn!(agent_type, "Agent {} not found in active agents", agent_type);
                false
            }
        }
    }

    pub fn cleanup_all_agents(&self) -> BTreeMap<String, bool> {
        let keys: Vec<String> = self.active_agents.read().keys().cloned().collect();
        keys.into_iter()
            .map(|key| {
                let cleaned = self.cleanup_agent(&key);
                (key, cleaned)
            })
            .collect()
    }

    pub fn get_active_agents(&self) -> HashMap<String, ActiveAgentRecord> {
        self.active_agents.read().clone()
    }

    pub fn active_agent_types(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.active_agents.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Summary row per tracked record, for CLI output.
    pub fn active_summary(&self) -> Value {
        json!(self.get_all_agent_health())
    }
}

fn retype<T, U>(outcome: CreationOutcome<T>) -> CreationOutcome<U> {
    match outcome {
        CreationOutcome::Created(_) => CreationOutcome::ConstructionFailed {
            agent_type: String::new(),
            reason: "unexpected outcome".to_string(),
        },
        CreationOutcome::NotFound { agent_type } => CreationOutcome::NotFound { agent_type },
        CreationOutcome::ConstructionFailed { agent_type, reason } => {
            CreationOutcome::ConstructionFailed { agent_type, reason }
        }
        CreationOutcome::RetriesExhausted {
            agent_type,
            attempts,
            last_reason,
        } => CreationOutcome::RetriesExhausted {
            agent_type,
            attempts,
            last_reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::base::AgentSpec;
    use crate::agent::generation::TemplateGenerationService;
    use crate::agent::registry::AgentBlueprint;
    use crate::config::PathsConfig;
    use crate::error::OrchestratorError;
    use crate::knowledge::{ExtractiveCompletion, HashedEmbedding, KnowledgeManager, LocalStoreBuilder};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn factory(root: &std::path::Path) -> AgentFactory {
        let paths = PathsConfig {
            knowledge_bases_root: root.to_path_buf(),
            ..PathsConfig::default()
        };
        let knowledge = Arc::new(KnowledgeManager::new(
            paths.clone(),
            Arc::new(HashedEmbedding::default()),
            Arc::new(ExtractiveCompletion),
            Arc::new(LocalStoreBuilder),
        ));
        let registry = Arc::new(AgentRegistry::new(&paths, "openai:gpt-4o-mini"));
        registry.install_default_blueprints(
            knowledge,
            Arc::new(TemplateGenerationService::default()),
            None,
        );
        let config = AgentFactoryConfig {
            retry_delay_ms: 0,
            ..AgentFactoryConfig::default()
        };
        AgentFactory::new(registry, config)
    }

    /// Fails `failures` times, then delegates to the default constructor.
    fn flaky_blueprint(factory: &AgentFactory, failures: u32, calls: Arc<AtomicU32>) -> AgentBlueprint {
        let inner = factory.registry().get_agent_class("ism").unwrap();
        AgentBlueprint::new(Arc::new(
            move |spec: &AgentSpec| -> Result<Arc<dyn FinancialAgent>, OrchestratorError> {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(OrchestratorError::ConstructionFailed {
                        agent_type: spec.agent_type.clone(),
                        reason: format!("attempt {}", n),
                    })
                } else {
                    inner.construct(spec)
                }
            },
        ))
    }

    #[test]
    fn test_create_agent_tracks_normalized_key() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let agent = factory.create_agent("ism", None, true).unwrap();
        assert_eq!(agent.agent_type(), "ism");
        assert_eq!(factory.active_agent_types(), vec!["investor_summary"]);
        assert_eq!(
            factory.get_agent_health("investor_summary").health_status.as_deref(),
            Some("unknown")
        );
    }

    #[test]
    fn test_create_agent_unknown_type_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        assert!(factory.create_agent("does-not-exist", None, true).is_none());
        assert!(matches!(
            factory.try_create_agent("does-not-exist", None, true),
            CreationOutcome::NotFound { .. }
        ));
        assert!(factory.active_agent_types().is_empty());
    }

    #[test]
    fn test_config_merge_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let mut overrides = AgentConfig::new();
        overrides.insert("temperature".into(), json!(0.1));
        let config = factory.prepare_agent_config("prs", Some(&overrides));
        assert_eq!(config["temperature"], json!(0.1));
        assert_eq!(config["max_tokens"], json!(4000));
        assert!(config.contains_key("knowledge_base_path"));
    }

    #[test]
    fn test_disabled_monitoring_skips_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        assert!(factory.create_agent("bsp", None, false).is_some());
        assert!(factory.active_agent_types().is_empty());
    }

    #[test]
    fn test_large_text_variant_coexists() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        factory.create_agent("pds", None, true).unwrap();
        let wrapper = factory.create_large_text_agent("pds", None, true).unwrap();
        assert_eq!(wrapper.agent_type(), "pds");
        assert_eq!(
            factory.active_agent_types(),
            vec!["product_supplement", "product_supplement_large_text"]
        );
    }

    #[tokio::test]
    async fn test_retry_exhausts_exactly_max_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let calls = Arc::new(AtomicU32::new(0));
        factory
            .registry()
            .register_blueprint("ism", flaky_blueprint(&factory, u32::MAX, calls.clone()));

        let outcome = factory.try_create_agent_with_retry("ism", None, Some(3)).await;
        assert!(matches!(outcome, CreationOutcome::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_after_first_success() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let calls = Arc::new(AtomicU32::new(0));
        factory
            .registry()
            .register_blueprint("ism", flaky_blueprint(&factory, 2, calls.clone()));

        let agent = factory.create_agent_with_retry("ism", None, Some(3)).await;
        assert!(agent.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        factory.create_agent("prs", None, true).unwrap();
        assert!(factory.cleanup_agent("pricing_supplement"));
        assert!(!factory.cleanup_agent("pricing_supplement"));
        assert_eq!(
            factory.get_agent_health("pricing_supplement").status,
            "not_found"
        );
    }

    #[test]
    fn test_create_agents_by_capability() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let agents = factory.create_agents_by_capability(AgentCapability::DocumentGeneration, None);
        assert_eq!(agents.len(), 4);
        let cleaned = factory.cleanup_all_agents();
        assert!(cleaned.values().all(|ok| *ok));
    }

    #[test]
    fn test_mark_health_updates_both_variants() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        factory.create_agent("bsp", None, true).unwrap();
        factory.create_large_text_agent("bsp", None, true).unwrap();
        factory.mark_health("bsp", "critical");
        let health = factory.get_all_agent_health();
        assert!(health
            .values()
            .all(|h| h.health_status.as_deref() == Some("critical")));
    }
}
