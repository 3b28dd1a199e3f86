//! Agent registry: the catalog of agent types, their metadata and their
//! constructors.
//!
//! Entries are keyed by long name (`investor_summary`, ...). Every lookup
//! resolves short codes first, so `ism` and `investor_summary` always reach
//! the same entry.

use super::base::{AgentConfig, AgentSpec, DocumentAgent, FinancialAgent};
use super::generation::GenerationService;
use super::kind::{normalize_agent_type, DocumentKind};
use super::large_text::LargeTextAgent;
use crate::config::PathsConfig;
use crate::error::OrchestratorError;
use crate::knowledge::KnowledgeManager;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Available,
    Shell,
    Development,
    Deprecated,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Available => "available",
            AgentStatus::Shell => "shell",
            AgentStatus::Development => "development",
            AgentStatus::Deprecated => "deprecated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapability {
    DocumentGeneration,
    TemplateRetrieval,
    ComplianceCheck,
    KnowledgeUpdate,
}

impl AgentCapability {
    pub const ALL: [AgentCapability; 4] = [
        AgentCapability::DocumentGeneration,
        AgentCapability::TemplateRetrieval,
        AgentCapability::ComplianceCheck,
        AgentCapability::KnowledgeUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentCapability::DocumentGeneration => "document_generation",
            AgentCapability::TemplateRetrieval => "template_retrieval",
            AgentCapability::ComplianceCheck => "compliance_check",
            AgentCapability::KnowledgeUpdate => "knowledge_update",
        }
    }
}

impl std::str::FromStr for AgentCapability {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentCapability::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OrchestratorError::ConfigError(format!("Unknown capability: {}", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub agent_type: String,
    pub class_name: String,
    pub description: String,
    pub status: AgentStatus,
    pub capabilities: BTreeSet<AgentCapability>,
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub health_status: String,
    pub dependencies: Vec<String>,
    pub config_schema: AgentConfig,
}

impl AgentMetadata {
    pub fn has_capability(&self, capability: AgentCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

pub type AgentConstructor =
    Arc<dyn Fn(&AgentSpec) -> Result<Arc<dyn FinancialAgent>, OrchestratorError> + Send + Sync>;

pub type LargeTextConstructor = Arc<
    dyn Fn(Arc<dyn FinancialAgent>, &AgentConfig) -> Result<Arc<LargeTextAgent>, OrchestratorError>
        + Send
        + Sync,
>;

/// Constructors for one agent type. Replacing a blueprint is a data change;
/// neither the registry nor the factory branch on type names.
#[derive(Clone)]
pub struct AgentBlueprint {
    pub build: AgentConstructor,
    pub large_text: Option<LargeTextConstructor>,
}

impl AgentBlueprint {
    pub fn new(build: AgentConstructor) -> Self {
        Self {
            build,
            large_text: None,
        }
    }

    pub fn with_large_text(mut self, large_text: LargeTextConstructor) -> Self {
        self.large_text = Some(large_text);
        self
    }

    /// Run the base constructor, turning a panic into a construction failure.
    pub fn construct(&self, spec: &AgentSpec) -> Result<Arc<dyn FinancialAgent>, OrchestratorError> {
        catch_unwind(AssertUnwindSafe(|| (self.build)(spec))).unwrap_or_else(|_| {
            Err(OrchestratorError::ConstructionFailed {
                agent_type: spec.agent_type.clone(),
                reason: "constructor panicked".to_string(),
            })
        })
    }

    pub fn construct_large_text(
        &self,
        agent_type: &str,
        base: Arc<dyn FinancialAgent>,
        config: &AgentConfig,
    ) -> Result<Arc<LargeTextAgent>, OrchestratorError> {
        let build = self.large_text.as_ref().ok_or_else(|| {
            OrchestratorError::ConstructionFailed {
                agent_type: agent_type.to_string(),
                reason: "no large-text variant registered".to_string(),
            }
        })?;
        catch_unwind(AssertUnwindSafe(|| build(base, config))).unwrap_or_else(|_| {
            Err(OrchestratorError::ConstructionFailed {
                agent_type: agent_type.to_string(),
                reason: "large-text constructor panicked".to_string(),
            })
        })
    }
}

/// Blueprint building a [`DocumentAgent`] of `kind` with its large-text variant.
pub fn document_blueprint(
    kind: DocumentKind,
    knowledge: Arc<KnowledgeManager>,
    generation: Arc<dyn GenerationService>,
    request_timeout: Option<Duration>,
) -> AgentBlueprint {
    let build: AgentConstructor = Arc::new(
        move |spec: &AgentSpec| -> Result<Arc<dyn FinancialAgent>, OrchestratorError> {
            let agent =
                DocumentAgent::new(kind, spec.clone(), knowledge.clone(), generation.clone())
                    .with_request_timeout(request_timeout);
            Ok(Arc::new(agent))
        },
    );
    let large_text: LargeTextConstructor = Arc::new(
        |base: Arc<dyn FinancialAgent>,
         config: &AgentConfig|
         -> Result<Arc<LargeTextAgent>, OrchestratorError> {
            Ok(Arc::new(LargeTextAgent::new(base, config.clone())))
        },
    );
    AgentBlueprint::new(build).with_large_text(large_text)
}

/// Result of the registry's construction smoke test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryHealthCheck {
    pub agent_type: String,
    /// `healthy`, `unhealthy` or `not_found`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<AgentCapability>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusEntry {
    pub status: AgentStatus,
    pub health: String,
    pub capabilities: Vec<AgentCapability>,
    pub version: String,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStatusSummary {
    pub total_agents: usize,
    pub available_agents: usize,
    pub shell_agents: usize,
    pub development_agents: usize,
    pub agents_by_type: BTreeMap<String, AgentStatusEntry>,
}

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentMetadata>>,
    blueprints: RwLock<HashMap<String, AgentBlueprint>>,
    paths: PathsConfig,
    default_model: String,
}

fn builtin_description(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::InvestorSummary => {
            "Investor Summary Agent - Generates investor-friendly summary documents for structured products"
        }
        DocumentKind::BaseShelfProspectus => {
            "Base Shelf Prospectus Agent - Generates base shelf prospectus documents for structured product programs"
        }
        DocumentKind::ProductSupplement => {
            "Product Supplement Agent - Generates product supplement documents for specific offerings"
        }
        DocumentKind::PricingSupplement => {
            "Pricing Supplement Agent - Generates pricing supplement documents with specific product terms"
        }
    }
}

impl AgentRegistry {
    /// Registry holding metadata for the four built-in kinds. Constructors are
    /// installed separately, see [`install_default_blueprints`](Self::install_default_blueprints).
    pub fn new(paths: &PathsConfig, default_model: &str) -> Self {
        let registry = Self {
            agents: RwLock::new(HashMap::new()),
            blueprints: RwLock::new(HashMap::new()),
            paths: paths.clone(),
            default_model: default_model.to_string(),
        };
        for kind in DocumentKind::ALL {
            registry.register_agent(registry.builtin_metadata(kind));
        }
        registry
    }

    fn builtin_metadata(&self, kind: DocumentKind) -> AgentMetadata {
        let mut schema = AgentConfig::new();
        schema.insert("model_name".into(), json!(self.default_model));
        schema.insert(
            "knowledge_base_path".into(),
            json!(self
                .paths
                .knowledge_base_path(kind.long_name())
                .display()
                .to_string()),
        );
        schema.insert("max_tokens".into(), json!(4000));
        schema.insert("temperature".into(), json!(0.7));

        AgentMetadata {
            agent_type: kind.long_name().to_string(),
            class_name: kind.class_name().to_string(),
            description: builtin_description(kind).to_string(),
            status: AgentStatus::Available,
            capabilities: AgentCapability::ALL.into_iter().collect(),
            version: "1.0.0".to_string(),
            last_updated: Utc::now(),
            health_status: "healthy".to_string(),
            dependencies: vec![
                "pydantic-ai".to_string(),
                "lightrag".to_string(),
                "openai".to_string(),
            ],
            config_schema: schema,
        }
    }

    /// Install [`DocumentAgent`] constructors for every built-in kind.
    pub fn install_default_blueprints(
        &self,
        knowledge: Arc<KnowledgeManager>,
        generation: Arc<dyn GenerationService>,
        request_timeout: Option<Duration>,
    ) {
        for kind in DocumentKind::ALL {
            self.register_blueprint(
                kind.long_name(),
                document_blueprint(kind, knowledge.clone(), generation.clone(), request_timeout),
            );
        }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Upsert. Last writer wins for a given type.
    pub fn register_agent(&self, metadata: AgentMetadata) {
        let key = normalize_agent_type(&metadata.agent_type);
        tracing::debug!(agent_type = %key, status = metadata.status.as_str(), "Agent registered");
        self.agents.write().insert(key, metadata);
    }

    pub fn register_blueprint(&self, agent_type: &str, blueprint: AgentBlueprint) {
        self.blueprints
            .write()
            .insert(normalize_agent_type(agent_type), blueprint);
    }

    pub fn get_agent_metadata(&self, agent_type: &str) -> Option<AgentMetadata> {
        self.agents
            .read()
            .get(&normalize_agent_type(agent_type))
            .cloned()
    }

    pub fn get_agents_by_capability(&self, capability: AgentCapability) -> Vec<AgentMetadata> {
        let mut found: Vec<AgentMetadata> = self
            .agents
            .read()
            .values()
            .filter(|m| m.has_capability(capability))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.agent_type.cmp(&b.agent_type));
        found
    }

    pub fn get_agents_by_status(&self, status: AgentStatus) -> Vec<AgentMetadata> {
        let mut found: Vec<AgentMetadata> = self
            .agents
            .read()
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.agent_type.cmp(&b.agent_type));
        found
    }

    pub fn list_agent_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.agents.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// The constructors registered for a type, if any.
    pub fn get_agent_class(&self, agent_type: &str) -> Option<AgentBlueprint> {
        self.blueprints
            .read()
            .get(&normalize_agent_type(agent_type))
            .cloned()
    }

    /// Spec for a type from its registered config schema layered under `overrides`.
    pub fn agent_spec(&self, agent_type: &str, overrides: &AgentConfig) -> AgentSpec {
        let key = normalize_agent_type(agent_type);
        let mut config = self
            .get_agent_metadata(&key)
            .map(|m| m.config_schema)
            .unwrap_or_default();
        config.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        AgentSpec::from_config(
            &key,
            &config,
            &self.default_model,
            &self.paths.knowledge_base_path(&key),
        )
    }

    /// Raw construction without factory bookkeeping. Failures are logged and
    /// reported as `None`.
    pub fn create_agent(
        &self,
        agent_type: &str,
        overrides: &AgentConfig,
    ) -> Option<Arc<dyn FinancialAgent>> {
        match self.try_create(agent_type, overrides) {
            Ok(agent) => Some(agent),
            Err(e) => {
                tracing::warn!(agent_type, error = %e, "Error creating agent {}: {}", agent_type, e);
                None
            }
        }
    }

    fn try_create(
        &self,
        agent_type: &str,
        overrides: &AgentConfig,
    ) -> Result<Arc<dyn FinancialAgent>, OrchestratorError> {
        let blueprint = self
            .get_agent_class(agent_type)
            .ok_or_else(|| OrchestratorError::UnknownAgent(agent_type.to_string()))?;
        blueprint.construct(&self.agent_spec(agent_type, overrides))
    }

    /// Set health status and bump `last_updated`. Returns false for unknown types.
    pub fn update_agent_health(&self, agent_type: &str, health_status: &str) -> bool {
        let key = normalize_agent_type(agent_type);
        match self.agents.write().get_mut(&key) {
            Some(metadata) => {
                metadata.health_status = health_status.to_string();
                metadata.last_updated = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Construction smoke test. The outcome is persisted through
    /// [`update_agent_health`](Self::update_agent_health).
    pub fn check_agent_health(&self, agent_type: &str) -> RegistryHealthCheck {
        let Some(metadata) = self.get_agent_metadata(agent_type) else {
            return RegistryHealthCheck {
                agent_type: agent_type.to_string(),
                status: "not_found".to_string(),
                error: Some(format!("Agent {} not found", agent_type)),
                capabilities: None,
                version: None,
                last_updated: None,
            };
        };

        let (status, error) = match self.try_create(agent_type, &AgentConfig::new()) {
            Ok(_) => ("healthy", None),
            Err(OrchestratorError::UnknownAgent(_)) => (
                "unhealthy",
                Some("Failed to create agent instance".to_string()),
            ),
            Err(e) => ("unhealthy", Some(e.to_string())),
        };
        self.update_agent_health(&metadata.agent_type, status);

        RegistryHealthCheck {
            agent_type: agent_type.to_string(),
            status: status.to_string(),
            error,
            capabilities: Some(metadata.capabilities.iter().copied().collect()),
            version: Some(metadata.version.clone()),
            last_updated: self
                .get_agent_metadata(&metadata.agent_type)
                .map(|m| m.last_updated),
        }
    }

    pub fn get_agent_status_summary(&self) -> RegistryStatusSummary {
        let agents = self.agents.read();
        let count = |status: AgentStatus| agents.values().filter(|m| m.status == status).count();
        let agents_by_type = agents
            .iter()
            .map(|(key, m)| {
                (
                    key.clone(),
                    AgentStatusEntry {
                        status: m.status,
                        health: m.health_status.clone(),
                        capabilities: m.capabilities.iter().copied().collect(),
                        version: m.version.clone(),
                        last_updated: m.last_updated.to_rfc3339(),
                    },
                )
            })
            .collect();
        RegistryStatusSummary {
            total_agents: agents.len(),
            available_agents: count(AgentStatus::Available),
            shell_agents: count(AgentStatus::Shell),
            development_agents: count(AgentStatus::Development),
            agents_by_type,
        }
    }

    /// Metadata as a JSON value, for CLI output.
    pub fn metadata_value(&self, agent_type: &str) -> Option<Value> {
        self.get_agent_metadata(agent_type)
            .and_then(|m| serde_json::to_value(m).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_blueprint() -> AgentBlueprint {
        AgentBlueprint::new(Arc::new(
            |spec: &AgentSpec| -> Result<Arc<dyn FinancialAgent>, OrchestratorError> {
                Err(OrchestratorError::ConstructionFailed {
                    agent_type: spec.agent_type.clone(),
                    reason: "missing credentials".to_string(),
                })
            },
        ))
    }

    #[test]
    fn test_builtin_entries() {
        let registry = AgentRegistry::new(&PathsConfig::default(), "openai:gpt-4o-mini");
        assert_eq!(
            registry.list_agent_types(),
            vec![
                "base_shelf_prospectus",
                "investor_summary",
                "pricing_supplement",
                "product_supplement"
            ]
        );
        let ism = registry.get_agent_metadata("ism").unwrap();
        assert_eq!(ism.class_name, "ISMAgent");
        assert_eq!(ism.status, AgentStatus::Available);
        assert_eq!(ism.config_schema["max_tokens"], json!(4000));
        assert!(ism.config_schema["knowledge_base_path"]
            .as_str()
            .unwrap()
            .ends_with("investor_summary_kb"));
    }

    #[test]
    fn test_aliases_resolve_to_same_entry() {
        let registry = AgentRegistry::new(&PathsConfig::default(), "m");
        for kind in DocumentKind::ALL {
            let short = registry.get_agent_metadata(kind.short_code()).unwrap();
            let long = registry.get_agent_metadata(kind.long_name()).unwrap();
            assert_eq!(short.agent_type, long.agent_type);
        }
        assert!(registry.get_agent_metadata("does-not-exist").is_none());
    }

    #[test]
    fn test_register_agent_upserts() {
        let registry = AgentRegistry::new(&PathsConfig::default(), "m");
        let mut metadata = registry.get_agent_metadata("bsp").unwrap();
        metadata.status = AgentStatus::Deprecated;
        registry.register_agent(metadata);
        assert_eq!(registry.list_agent_types().len(), 4);
        assert_eq!(registry.get_agents_by_status(AgentStatus::Deprecated).len(), 1);
        assert_eq!(registry.get_agent_status_summary().available_agents, 3);
    }

    #[test]
    fn test_capability_filter() {
        let registry = AgentRegistry::new(&PathsConfig::default(), "m");
        assert_eq!(
            registry
                .get_agents_by_capability(AgentCapability::ComplianceCheck)
                .len(),
            4
        );
        assert_eq!(
            "Template_Retrieval".parse::<AgentCapability>().unwrap(),
            AgentCapability::TemplateRetrieval
        );
    }

    #[test]
    fn test_create_agent_without_blueprint_is_none() {
        let registry = AgentRegistry::new(&PathsConfig::default(), "m");
        assert!(registry.create_agent("ism", &AgentConfig::new()).is_none());
        assert!(registry.create_agent("nope", &AgentConfig::new()).is_none());
    }

    #[test]
    fn test_check_agent_health_records_failure() {
        let registry = AgentRegistry::new(&PathsConfig::default(), "m");
        registry.register_blueprint("prs", failing_blueprint());

        let report = registry.check_agent_health("prs");
        assert_eq!(report.status, "unhealthy");
        assert!(report.error.unwrap().contains("missing credentials"));
        assert_eq!(
            registry.get_agent_metadata("pricing_supplement").unwrap().health_status,
            "unhealthy"
        );

        let missing = registry.check_agent_health("xyz");
        assert_eq!(missing.status, "not_found");
        assert_eq!(missing.error.as_deref(), Some("Agent xyz not found"));
    }

    #[test]
    fn test_panicking_constructor_is_contained() {
        let blueprint = AgentBlueprint::new(Arc::new(
            |_: &AgentSpec| -> Result<Arc<dyn FinancialAgent>, OrchestratorError> { panic!("boom") },
        ));
        let spec = AgentSpec::from_config("ism", &AgentConfig::new(), "m", std::path::Path::new("kb"));
        let err = blueprint.construct(&spec).err().unwrap();
        assert!(matches!(err, OrchestratorError::ConstructionFailed { .. }));
    }

    #[test]
    fn test_agent_spec_overrides_win() {
        let registry = AgentRegistry::new(&PathsConfig::default(), "base-model");
        let mut overrides = AgentConfig::new();
        overrides.insert("model_name".into(), json!("override-model"));
        let spec = registry.agent_spec("pds", &overrides);
        assert_eq!(spec.agent_type, "product_supplement");
        assert_eq!(spec.model_name, "override-model");
        assert_eq!(spec.config["temperature"], json!(0.7));
    }
}
