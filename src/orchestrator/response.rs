//! Response types returned by the global agent.

use crate::agent::TemplateVariables;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Initialized,
    Processing,
    AwaitingFeedback,
    Updating,
    Completed,
    Error,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Initialized => "initialized",
            ConversationState::Processing => "processing",
            ConversationState::AwaitingFeedback => "awaiting_feedback",
            ConversationState::Updating => "updating",
            ConversationState::Completed => "completed",
            ConversationState::Error => "error",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Approval,
    Rejection,
    ContentUpdate,
    KnowledgeUpdate,
    ClarificationRequest,
}

impl FeedbackType {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::Approval => "approval",
            FeedbackType::Rejection => "rejection",
            FeedbackType::ContentUpdate => "content_update",
            FeedbackType::KnowledgeUpdate => "knowledge_update",
            FeedbackType::ClarificationRequest => "clarification_request",
        }
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "approval" => Ok(FeedbackType::Approval),
            "rejection" => Ok(FeedbackType::Rejection),
            "content_update" => Ok(FeedbackType::ContentUpdate),
            "knowledge_update" => Ok(FeedbackType::KnowledgeUpdate),
            "clarification_request" | "clarification" => Ok(FeedbackType::ClarificationRequest),
            other => Err(format!("Unknown feedback type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResultMetadata {
    pub agent_impl: String,
    pub missing_fields: Vec<String>,
}

/// Outcome of running one agent. Failures carry a message instead of output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_type: String,
    pub success: bool,
    /// Seconds.
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: AgentResultMetadata,
}

impl AgentResult {
    pub fn failed(agent_type: &str, processing_time: f64, message: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            success: false,
            processing_time,
            output: None,
            error_message: Some(message.into()),
            metadata: AgentResultMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunSummary {
    pub success: bool,
    pub processing_time: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedContent {
    pub total_agents: usize,
    pub successful_agents: usize,
    pub primary_agent: String,
    pub primary_success: bool,
    pub secondary_agents: Vec<String>,
    pub all_results: BTreeMap<String, AgentRunSummary>,
}

impl AggregatedContent {
    pub fn from_results(primary: &AgentResult, secondary: &[AgentResult]) -> Self {
        let all = std::iter::once(primary).chain(secondary.iter());
        Self {
            total_agents: 1 + secondary.len(),
            successful_agents: all.clone().filter(|r| r.success).count(),
            primary_agent: primary.agent_type.clone(),
            primary_success: primary.success,
            secondary_agents: secondary.iter().map(|r| r.agent_type.clone()).collect(),
            all_results: all
                .map(|r| {
                    (
                        r.agent_type.clone(),
                        AgentRunSummary {
                            success: r.success,
                            processing_time: r.processing_time,
                            error: r.error_message.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalAgentResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
    pub conversation_state: ConversationState,
    pub primary_result: Option<AgentResult>,
    #[serde(default)]
    pub secondary_results: Vec<AgentResult>,
    #[serde(default)]
    pub aggregated_content: Option<AggregatedContent>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl GlobalAgentResponse {
    pub fn new(success: bool, message: impl Into<String>, session_id: &str, state: ConversationState) -> Self {
        Self {
            success,
            message: message.into(),
            session_id: session_id.to_string(),
            conversation_state: state,
            primary_result: None,
            secondary_results: Vec::new(),
            aggregated_content: None,
            next_actions: Vec::new(),
            confidence_score: 0.0,
            reasoning: String::new(),
        }
    }

    pub fn error(message: impl Into<String>, session_id: &str) -> Self {
        Self::new(false, message, session_id, ConversationState::Error)
    }

    pub fn with_next_actions(mut self, actions: &[&str]) -> Self {
        self.next_actions = actions.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_primary(mut self, result: AgentResult) -> Self {
        self.primary_result = Some(result);
        self
    }
}

/// Caller options for [`super::GlobalAgent::process_request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub session_id: Option<String>,
    /// Explicit agents, short or long names. The first is primary. Overrides routing.
    pub agents: Vec<String>,
    /// Run every agent, routed primary first. Ignored when `agents` is set.
    pub run_all: bool,
    pub use_large_text_templates: bool,
    pub audience: Option<String>,
    pub custom_variables: TemplateVariables,
    pub enforce_placeholder_validation: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            agents: Vec::new(),
            run_all: false,
            use_large_text_templates: false,
            audience: None,
            custom_variables: TemplateVariables::new(),
            enforce_placeholder_validation: true,
        }
    }
}

impl RequestOptions {
    pub fn in_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}
