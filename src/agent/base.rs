//! Base agent contract shared by every document agent.
//!
//! A generation call walks `Created -> DependenciesBuilt -> PromptFormatted ->
//! Generating -> OutputExtracted` with no retries; any stage failure aborts
//! the call with an error tagged by agent type.

use super::generation::{extract_output, GenerationRequest, GenerationService};
use super::kind::DocumentKind;
use super::profiles::DocumentProfile;
use super::tools::{tools_for, AgentTool, CrossReferenceSearchTool, RetrieveKnowledgeTool, ToolArgs};
use crate::error::OrchestratorError;
use crate::knowledge::{
    KnowledgeManager, KnowledgeStore, KnowledgeUpdater, OperationResult, QueryMode, QueryParams,
    UpdateRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Merged per-agent configuration (`model_name`, `max_tokens`, `temperature`, ...).
pub type AgentConfig = Map<String, Value>;

/// One prior conversation turn threaded through generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

impl HistoryMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Stages of a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Created,
    DependenciesBuilt,
    PromptFormatted,
    Generating,
    OutputExtracted,
}

/// Collaborators bound for one generation call.
pub struct AgentDeps {
    pub agent_type: String,
    pub kind: DocumentKind,
    pub knowledge: Arc<KnowledgeManager>,
    pub store: Arc<dyn KnowledgeStore>,
    pub input: Value,
}

/// Construction arguments for a document agent.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Registry key (long name) the agent is built for.
    pub agent_type: String,
    pub knowledge_base_path: PathBuf,
    pub model_name: String,
    pub config: AgentConfig,
}

impl AgentSpec {
    /// Build from a merged config map, falling back to `default_model` and
    /// `default_path` when the map lacks those keys.
    pub fn from_config(
        agent_type: &str,
        config: &AgentConfig,
        default_model: &str,
        default_path: &Path,
    ) -> Self {
        let model_name = config
            .get("model_name")
            .and_then(Value::as_str)
            .unwrap_or(default_model)
            .to_string();
        let knowledge_base_path = config
            .get("knowledge_base_path")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_path.to_path_buf());
        Self {
            agent_type: agent_type.to_string(),
            knowledge_base_path,
            model_name,
            config: config.clone(),
        }
    }
}

#[async_trait]
pub trait FinancialAgent: Send + Sync {
    /// Short code used as the knowledge domain (`ism`, `bsp`, `pds`, `prs`).
    fn agent_type(&self) -> &str;

    fn kind(&self) -> DocumentKind;

    fn model_name(&self) -> &str;

    fn agent_info(&self) -> Value;

    fn tool_names(&self) -> Vec<String>;

    /// Hook for domain checks. Typed input is validated upstream.
    fn validate_input(&self, _input: &Value) -> bool {
        true
    }

    /// `initialized` when the agent's store is materialized, `available` otherwise.
    fn knowledge_status(&self) -> String;

    async fn generate_document(&self, input: &Value) -> Result<Value, OrchestratorError>;

    async fn generate_document_with_history(
        &self,
        input: &Value,
        history: &[HistoryMessage],
    ) -> Result<Value, OrchestratorError>;

    async fn retrieve_knowledge(&self, query: &str, params: QueryParams) -> String;

    async fn cross_reference_search(
        &self,
        query: &str,
        domains: Option<Vec<String>>,
        mode: QueryMode,
    ) -> String;

    fn propose_knowledge_update(&self, feedback: &str) -> Result<String, OrchestratorError>;

    async fn apply_knowledge_update(&self, update: &Value) -> OperationResult;

    /// Release agent-held resources. Called by the factory before dropping its record.
    fn cleanup(&self) {}
}

pub struct DocumentAgent {
    kind: DocumentKind,
    agent_type: String,
    model_name: String,
    knowledge_base_path: PathBuf,
    config: AgentConfig,
    profile: &'static DocumentProfile,
    tools: Vec<Arc<dyn AgentTool>>,
    knowledge: Arc<KnowledgeManager>,
    updater: KnowledgeUpdater,
    generation: Arc<dyn GenerationService>,
    request_timeout: Option<Duration>,
}

impl DocumentAgent {
    /// Tools are registered here, once per instance.
    pub fn new(
        kind: DocumentKind,
        spec: AgentSpec,
        knowledge: Arc<KnowledgeManager>,
        generation: Arc<dyn GenerationService>,
    ) -> Self {
        Self {
            kind,
            agent_type: kind.short_code().to_string(),
            model_name: spec.model_name,
            knowledge_base_path: spec.knowledge_base_path,
            config: spec.config,
            profile: DocumentProfile::for_kind(kind),
            tools: tools_for(kind),
            updater: KnowledgeUpdater::new(knowledge.clone()),
            knowledge,
            generation,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn profile(&self) -> &'static DocumentProfile {
        self.profile
    }

    pub fn system_instructions(&self) -> &'static str {
        self.profile.instructions
    }

    fn generation_request(&self, prompt: String, history: &[HistoryMessage]) -> GenerationRequest {
        GenerationRequest {
            agent_type: self.agent_type.clone(),
            kind: self.kind,
            model_name: self.model_name.clone(),
            instructions: self.profile.instructions.to_string(),
            prompt,
            history: history.to_vec(),
            max_tokens: self
                .config
                .get("max_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(4000) as u32,
            temperature: self
                .config
                .get("temperature")
                .and_then(Value::as_f64)
                .unwrap_or(0.7),
        }
    }

    async fn run_pipeline(
        &self,
        input: &Value,
        history: &[HistoryMessage],
    ) -> Result<Value, OrchestratorError> {
        let mut stage = GenerationStage::Created;
        tracing::debug!(agent_type = %self.agent_type, ?stage, "Generation started");

        let store = self
            .knowledge
            .initialize_rag_instance(&self.agent_type, false)
            .await?;
        let deps = AgentDeps {
            agent_type: self.agent_type.clone(),
            kind: self.kind,
            knowledge: self.knowledge.clone(),
            store,
            input: input.clone(),
        };
        stage = GenerationStage::DependenciesBuilt;
        tracing::debug!(agent_type = %self.agent_type, ?stage);

        let prompt = self.profile.format_prompt(input);
        let request = self.generation_request(prompt, history);
        stage = GenerationStage::PromptFormatted;
        tracing::debug!(agent_type = %self.agent_type, ?stage);

        stage = GenerationStage::Generating;
        tracing::debug!(agent_type = %self.agent_type, ?stage, history = history.len());
        let run = self.generation.run(&request, &deps, &self.tools);
        let result = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                OrchestratorError::Timeout {
                    operation: "generate_document".to_string(),
                    seconds: limit.as_secs(),
                }
            })??,
            None => run.await?,
        };

        let output = extract_output(&result)?;
        stage = GenerationStage::OutputExtracted;
        tracing::debug!(agent_type = %self.agent_type, ?stage);
        Ok(output)
    }
}

#[async_trait]
impl FinancialAgent for DocumentAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn kind(&self) -> DocumentKind {
        self.kind
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn agent_info(&self) -> Value {
        json!({
            "agent_type": self.agent_type,
            "model_name": self.model_name,
            "knowledge_base_path": self.knowledge_base_path.display().to_string(),
            "config": self.config,
        })
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    fn knowledge_status(&self) -> String {
        if self.knowledge.get_rag_instance(&self.agent_type).is_some() {
            "initialized".to_string()
        } else {
            "available".to_string()
        }
    }

    async fn generate_document(&self, input: &Value) -> Result<Value, OrchestratorError> {
        self.run_pipeline(input, &[])
            .await
            .map_err(|e| OrchestratorError::generation(&self.agent_type, e))
    }

    async fn generate_document_with_history(
        &self,
        input: &Value,
        history: &[HistoryMessage],
    ) -> Result<Value, OrchestratorError> {
        self.run_pipeline(input, history)
            .await
            .map_err(|e| OrchestratorError::GenerationWithHistory {
                agent_type: self.agent_type.clone(),
                message: e.to_string(),
            })
    }

    async fn retrieve_knowledge(&self, query: &str, params: QueryParams) -> String {
        let deps = match self.knowledge.initialize_rag_instance(&self.agent_type, false).await {
            Ok(store) => self.bare_deps(store),
            Err(e) => return format!("Error retrieving knowledge: {}", e),
        };
        let mut args = ToolArgs::new();
        args.insert("query".to_string(), json!(query));
        args.insert("mode".to_string(), json!(params.mode.as_str()));
        args.insert("top_k".to_string(), json!(params.top_k));
        RetrieveKnowledgeTool.call(&deps, &args).await
    }

    async fn cross_reference_search(
        &self,
        query: &str,
        domains: Option<Vec<String>>,
        mode: QueryMode,
    ) -> String {
        let deps = match self.knowledge.initialize_rag_instance(&self.agent_type, false).await {
            Ok(store) => self.bare_deps(store),
            Err(e) => return format!("Error in cross-reference search: {}", e),
        };
        let mut args = ToolArgs::new();
        args.insert("query".to_string(), json!(query));
        args.insert("mode".to_string(), json!(mode.as_str()));
        if let Some(domains) = domains {
            args.insert("domains".to_string(), json!(domains));
        }
        CrossReferenceSearchTool.call(&deps, &args).await
    }

    fn propose_knowledge_update(&self, feedback: &str) -> Result<String, OrchestratorError> {
        let request = UpdateRequest::insert(&self.agent_type, feedback);
        self.updater.propose(&request.to_value())
    }

    async fn apply_knowledge_update(&self, update: &Value) -> OperationResult {
        self.updater.apply_update(update).await
    }

    fn cleanup(&self) {
        tracing::debug!(agent_type = %self.agent_type, "Agent cleaned up");
    }
}

impl DocumentAgent {
    fn bare_deps(&self, store: Arc<dyn KnowledgeStore>) -> AgentDeps {
        AgentDeps {
            agent_type: self.agent_type.clone(),
            kind: self.kind,
            knowledge: self.knowledge.clone(),
            store,
            input: Value::Null,
        }
    }
}
