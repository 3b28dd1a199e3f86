//! The global agent: user-facing entry point for document generation.
//!
//! A request is routed, recorded in its conversation session, run through one
//! or more agents from the factory, and answered with an aggregated response
//! and suggested next actions. Sessions are keyed by an opaque id and are
//! fully independent of each other.

mod feedback;
pub mod response;

pub use response::{
    AgentResult, AgentResultMetadata, AgentRunSummary, AggregatedContent, ConversationState,
    FeedbackType, GlobalAgentResponse, RequestOptions,
};

use crate::agent::input::prepare_input;
use crate::agent::registry::RegistryStatusSummary;
use crate::agent::{
    AgentFactory, CreationOutcome, DocumentKind, LargeTextOptions, TemplateVariables,
};
use crate::conversation::{
    AuditEntry, AuditFilter, ConversationManager, ConversationMessage, ConversationSession,
    ConversationStatistics, FeedbackSummary, KnowledgeUpdateSummary, NewConversation,
};
use crate::error::OrchestratorError;
use crate::knowledge::KnowledgeUpdater;
use crate::router::{RoutingDecision, SmartAgentRouter};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Orchestrator-side view of a session. Messages and feedback live in the
/// conversation manager.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_request: String,
    pub routing_decision: RoutingDecision,
    pub conversation_state: ConversationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub agent_results: BTreeMap<String, AgentResult>,
}

/// Per-run flags split out of the request options.
#[derive(Debug, Clone)]
struct ExecutionOptions {
    use_large_text_templates: bool,
    audience: Option<String>,
    custom_variables: TemplateVariables,
    enforce_placeholder_validation: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            use_large_text_templates: false,
            audience: None,
            custom_variables: TemplateVariables::new(),
            enforce_placeholder_validation: true,
        }
    }
}

impl From<&RequestOptions> for ExecutionOptions {
    fn from(options: &RequestOptions) -> Self {
        Self {
            use_large_text_templates: options.use_large_text_templates,
            audience: options.audience.clone(),
            custom_variables: options.custom_variables.clone(),
            enforce_placeholder_validation: options.enforce_placeholder_validation,
        }
    }
}

/// Report for one pending knowledge update pushed into its store.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppliedKnowledgeUpdate {
    pub update_id: String,
    pub target_agent: String,
    pub success: bool,
    pub message: String,
}

pub struct GlobalAgent {
    router: SmartAgentRouter,
    factory: Arc<AgentFactory>,
    conversations: Arc<ConversationManager>,
    updater: Arc<KnowledgeUpdater>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl GlobalAgent {
    pub fn new(
        router: SmartAgentRouter,
        factory: Arc<AgentFactory>,
        conversations: Arc<ConversationManager>,
        updater: Arc<KnowledgeUpdater>,
    ) -> Self {
        Self {
            router,
            factory,
            conversations,
            updater,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn router(&self) -> &SmartAgentRouter {
        &self.router
    }

    pub fn conversations(&self) -> &Arc<ConversationManager> {
        &self.conversations
    }

    /// Route, run and aggregate. Never returns an error: failures become an
    /// `error`-state response.
    pub async fn process_request(&self, user_request: &str, options: RequestOptions) -> GlobalAgentResponse {
        let preview: String = user_request.chars().take(100).collect();
        tracing::info!("Processing request: {}...", preview);

        let session_id = options
            .session_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        match self.run_request(&session_id, user_request, &options).await {
            Ok(response) => {
                tracing::info!(session_id = %session_id, "Request processed successfully");
                response
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Error processing request");
                self.set_state(&session_id, ConversationState::Error);
                GlobalAgentResponse::error(format!("Error processing request: {}", e), &session_id)
            }
        }
    }

    async fn run_request(
        &self,
        session_id: &str,
        user_request: &str,
        options: &RequestOptions,
    ) -> Result<GlobalAgentResponse, OrchestratorError> {
        let decision = self.router.analyze_request(user_request);
        self.open_session(session_id, user_request, &decision)?;
        self.set_state(session_id, ConversationState::Processing);

        let selected = self.select_agents(&decision, options)?;
        let execution = ExecutionOptions::from(options);
        let input = without_nulls(&decision.extracted_data);

        let mut results = Vec::with_capacity(selected.len());
        for kind in &selected {
            results.push(self.execute_agent(*kind, &input, &execution, session_id).await);
        }
        let mut results = results.into_iter();
        let primary = results
            .next()
            .ok_or_else(|| OrchestratorError::Session("No agents selected".to_string()))?;
        let secondary: Vec<AgentResult> = results.collect();

        let aggregated = AggregatedContent::from_results(&primary, &secondary);
        let next_actions = next_actions(decision.primary_agent, &primary, &secondary);
        let message = response_message(&primary, &secondary);

        {
            let mut sessions = self.sessions.write();
            if let Some(record) = sessions.get_mut(session_id) {
                for result in std::iter::once(&primary).chain(secondary.iter()) {
                    record
                        .agent_results
                        .insert(result.agent_type.clone(), result.clone());
                }
                record.conversation_state = ConversationState::AwaitingFeedback;
                record.updated_at = Utc::now();
            }
        }

        Ok(GlobalAgentResponse {
            success: primary.success,
            message,
            session_id: session_id.to_string(),
            conversation_state: ConversationState::AwaitingFeedback,
            primary_result: Some(primary),
            secondary_results: secondary,
            aggregated_content: Some(aggregated),
            next_actions,
            confidence_score: decision.confidence_score,
            reasoning: decision.reasoning,
        })
    }

    /// Explicit agents win, then `run_all`, then the routed primary and secondaries.
    fn select_agents(
        &self,
        decision: &RoutingDecision,
        options: &RequestOptions,
    ) -> Result<Vec<DocumentKind>, OrchestratorError> {
        if !options.agents.is_empty() {
            let selected: Vec<DocumentKind> = options
                .agents
                .iter()
                .filter_map(|name| DocumentKind::parse(name))
                .collect();
            if selected.is_empty() {
                let mut valid: Vec<String> = DocumentKind::ALL
                    .iter()
                    .map(|k| k.long_name().to_string())
                    .collect();
                valid.sort();
                return Err(OrchestratorError::NoValidAgents(valid));
            }
            return Ok(selected);
        }

        let primary = decision.primary_agent;
        let rest: Vec<DocumentKind> = if options.run_all {
            DocumentKind::ALL.into_iter().filter(|k| *k != primary).collect()
        } else {
            decision.secondary_agents.clone()
        };
        Ok(std::iter::once(primary).chain(rest).collect())
    }

    fn open_session(
        &self,
        session_id: &str,
        user_request: &str,
        decision: &RoutingDecision,
    ) -> Result<(), OrchestratorError> {
        let exists = {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(session_id) {
                Some(record) => {
                    record.updated_at = Utc::now();
                    true
                }
                None => {
                    let now = Utc::now();
                    sessions.insert(
                        session_id.to_string(),
                        SessionRecord {
                            session_id: session_id.to_string(),
                            user_request: user_request.to_string(),
                            routing_decision: decision.clone(),
                            conversation_state: ConversationState::Initialized,
                            created_at: now,
                            updated_at: now,
                            agent_results: BTreeMap::new(),
                        },
                    );
                    false
                }
            }
        };

        if !exists && !self.conversations.contains(session_id) {
            let prefix: String = session_id.chars().take(8).collect();
            self.conversations.create_conversation(NewConversation {
                user_id: None,
                title: Some(format!("Document Generation Session {}", prefix)),
                description: Some("Session for generating financial documents".to_string()),
                tags: vec!["document_generation".to_string(), "financial".to_string()],
                session_id: Some(session_id.to_string()),
            });
        }

        let mut metadata = Map::new();
        metadata.insert("routing_decision".to_string(), serde_json::to_value(decision)?);
        self.conversations
            .add_message(session_id, "user", "request", user_request, metadata)
            .ok_or_else(|| OrchestratorError::Session(format!("Session {} not found", session_id)))?;
        Ok(())
    }

    fn set_state(&self, session_id: &str, state: ConversationState) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            record.conversation_state = state;
            record.updated_at = Utc::now();
        }
    }

    /// Build the agent through the factory, scaffold its input and generate.
    async fn execute_agent(
        &self,
        kind: DocumentKind,
        data: &Map<String, Value>,
        options: &ExecutionOptions,
        session_id: &str,
    ) -> AgentResult {
        let agent_type = kind.long_name();
        let start = Instant::now();
        let today = chrono::Local::now().date_naive();
        let prepared = prepare_input(kind, data, today);
        let input = prepared.to_value();

        let (agent_impl, generated) = if options.use_large_text_templates {
            let agent = match self.factory.try_create_large_text_agent(agent_type, None, true) {
                CreationOutcome::Created(agent) => agent,
                other => return unavailable(agent_type, session_id, other.reason()),
            };
            let large_options = LargeTextOptions {
                audience: options.audience.clone().unwrap_or_else(|| "retail".to_string()),
                custom_variables: options.custom_variables.clone(),
                enforce_placeholder_validation: options.enforce_placeholder_validation,
            };
            let generated = agent
                .generate_document_with_large_templates(&input, &large_options)
                .await
                .map(|sections| json!({ "sections": sections }));
            (format!("LargeText{}", kind.class_name()), generated)
        } else {
            let agent = match self.factory.try_create_agent(agent_type, None, true) {
                CreationOutcome::Created(agent) => agent,
                other => return unavailable(agent_type, session_id, other.reason()),
            };
            (kind.class_name().to_string(), agent.generate_document(&input).await)
        };

        let elapsed = start.elapsed().as_secs_f64();
        match generated {
            Ok(output) => {
                tracing::info!(agent_type, session_id, elapsed, "Agent produced document");
                AgentResult {
                    agent_type: agent_type.to_string(),
                    success: true,
                    processing_time: elapsed,
                    output: Some(output),
                    error_message: None,
                    metadata: AgentResultMetadata {
                        agent_impl,
                        missing_fields: prepared.missing_fields,
                    },
                }
            }
            Err(e) => {
                tracing::error!(agent_type, session_id, error = %e, "Error executing agent {}: {}", agent_type, e);
                AgentResult::failed(agent_type, elapsed, e.to_string())
            }
        }
    }

    /// Approve every pending knowledge update of a session, push it into the
    /// target agent's store and mark the ones that landed as implemented.
    pub async fn apply_pending_knowledge_updates(
        &self,
        session_id: &str,
        approver: &str,
    ) -> Vec<AppliedKnowledgeUpdate> {
        self.set_state(session_id, ConversationState::Updating);
        let mut applied = Vec::new();
        for update in self.conversations.pending_knowledge_updates(session_id) {
            self.conversations
                .approve_knowledge_update(&update.update_id, approver, None);
            let request = crate::knowledge::UpdateRequest::insert(&update.target_agent, &update.content);
            let result = self.updater.apply_update(&request.to_value()).await;
            if result.success {
                self.conversations.implement_knowledge_update(
                    &update.update_id,
                    "knowledge_updater",
                    Some(json!({ "message": result.message })),
                );
            }
            applied.push(AppliedKnowledgeUpdate {
                update_id: update.update_id,
                target_agent: update.target_agent,
                success: result.success,
                message: result.message,
            });
        }
        self.set_state(session_id, ConversationState::AwaitingFeedback);
        applied
    }

    pub fn get_agent_status(&self) -> RegistryStatusSummary {
        self.factory.registry().get_agent_status_summary()
    }

    pub fn get_session_state(&self, session_id: &str) -> Option<ConversationState> {
        self.sessions
            .read()
            .get(session_id)
            .map(|r| r.conversation_state)
    }

    pub fn get_session_record(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn get_session_info(&self, session_id: &str) -> Option<ConversationSession> {
        self.conversations.get_conversation(session_id)
    }

    pub fn get_conversation_history(&self, session_id: &str, limit: Option<usize>) -> Vec<ConversationMessage> {
        self.conversations
            .get_conversation_history(session_id, limit, &[])
    }

    pub fn get_feedback_summary(&self, session_id: &str) -> Option<FeedbackSummary> {
        self.conversations.get_feedback_summary(session_id)
    }

    pub fn get_knowledge_update_summary(&self, session_id: &str) -> Option<KnowledgeUpdateSummary> {
        self.conversations.get_knowledge_update_summary(session_id)
    }

    /// Entries from the last `hours`, optionally for one session.
    pub fn get_audit_trail(&self, session_id: Option<&str>, hours: i64) -> Vec<AuditEntry> {
        let filter = AuditFilter {
            session_id: session_id.map(str::to_string),
            ..AuditFilter::default()
        }
        .since(Utc::now() - ChronoDuration::hours(hours));
        self.conversations.get_audit_trail(&filter)
    }

    pub fn get_conversation_statistics(&self) -> ConversationStatistics {
        self.conversations.get_statistics()
    }

    /// Forget a session here and in the conversation manager. Other sessions are untouched.
    pub fn cleanup_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().remove(session_id).is_some();
        let removed_conversation = self.conversations.remove_conversation(session_id);
        if removed || removed_conversation {
            tracing::info!(session_id, "Cleaned up session");
        }
        removed || removed_conversation
    }
}

fn unavailable(agent_type: &str, session_id: &str, reason: Option<String>) -> AgentResult {
    tracing::warn!(agent_type, session_id, reason = ?reason, "Agent not available");
    AgentResult::failed(agent_type, 0.0, format!("Agent {} not available", agent_type))
}

fn without_nulls(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn next_actions(primary_kind: DocumentKind, primary: &AgentResult, secondary: &[AgentResult]) -> Vec<String> {
    let mut actions: Vec<&str> = Vec::new();
    if primary.success {
        actions.push("Review generated document");
        actions.push("Provide feedback for improvements");
        if !secondary.is_empty() {
            actions.push("Review secondary documents");
        }
    } else {
        actions.push("Check agent availability and configuration");
        actions.push("Verify input data completeness");
    }
    if primary_kind == DocumentKind::InvestorSummary {
        actions.push("Customize for specific investor audience");
        actions.push("Add regulatory compliance checks");
    }
    actions.into_iter().map(str::to_string).collect()
}

fn response_message(primary: &AgentResult, secondary: &[AgentResult]) -> String {
    let name = primary.agent_type.to_uppercase();
    if !primary.success {
        return format!(
            "Failed to generate {} document: {}",
            name,
            primary.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    let mut message = format!("Successfully generated {} document", name);
    if !secondary.is_empty() {
        let successful = secondary.iter().filter(|r| r.success).count();
        message.push_str(&format!(" and {} additional documents", successful));
    }
    message.push_str(". Please review and provide feedback.");
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(agent_type: &str, success: bool) -> AgentResult {
        if success {
            AgentResult {
                agent_type: agent_type.to_string(),
                success: true,
                processing_time: 0.1,
                output: Some(json!({})),
                error_message: None,
                metadata: AgentResultMetadata::default(),
            }
        } else {
            AgentResult::failed(agent_type, 0.0, format!("Agent {} not available", agent_type))
        }
    }

    #[test]
    fn test_response_message_counts_successful_secondaries() {
        let primary = result("investor_summary", true);
        let message = response_message(
            &primary,
            &[result("base_shelf_prospectus", true), result("pricing_supplement", false)],
        );
        assert_eq!(
            message,
            "Successfully generated INVESTOR_SUMMARY document and 1 additional documents. Please review and provide feedback."
        );
        assert_eq!(
            response_message(&result("pricing_supplement", false), &[]),
            "Failed to generate PRICING_SUPPLEMENT document: Agent pricing_supplement not available"
        );
    }

    #[test]
    fn test_next_actions_for_investor_summary() {
        let actions = next_actions(DocumentKind::InvestorSummary, &result("investor_summary", true), &[]);
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[3], "Add regulatory compliance checks");

        let failed = next_actions(DocumentKind::PricingSupplement, &result("pricing_supplement", false), &[]);
        assert_eq!(
            failed,
            vec!["Check agent availability and configuration", "Verify input data completeness"]
        );
    }

    #[test]
    fn test_without_nulls() {
        let mut data = Map::new();
        data.insert("issuer".to_string(), json!("Acme"));
        data.insert("currency".to_string(), Value::Null);
        let cleaned = without_nulls(&data);
        assert_eq!(cleaned.len(), 1);
    }
}
