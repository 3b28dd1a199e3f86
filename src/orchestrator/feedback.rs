//! Feedback handling for the global agent.
//!
//! Rejections and content updates re-run the primary agent on the last
//! request with the feedback appended. Knowledge updates are queued for
//! approval rather than applied inline.

use super::{
    AgentResult, ConversationState, ExecutionOptions, FeedbackType, GlobalAgent,
    GlobalAgentResponse,
};
use crate::conversation::{FeedbackStatus, KnowledgeUpdateType, UserFeedback};
use serde_json::{json, Map, Value};

const DEFAULT_KNOWLEDGE_TARGET: &str = "ism";

fn feedback_metadata(feedback: &UserFeedback) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "feedback_id".to_string(),
        Value::String(feedback.feedback_id.clone()),
    );
    metadata
}

impl GlobalAgent {
    pub async fn handle_feedback(
        &self,
        session_id: &str,
        feedback: &str,
        feedback_type: FeedbackType,
        target_agent: Option<&str>,
        priority: &str,
    ) -> GlobalAgentResponse {
        tracing::info!(session_id, feedback_type = feedback_type.as_str(), "Handling feedback");

        if !self.sessions.read().contains_key(session_id) {
            return GlobalAgentResponse::error(format!("Session {} not found", session_id), session_id);
        }

        let Some(user_feedback) = self.conversations.add_feedback(
            session_id,
            feedback_type.as_str(),
            feedback,
            target_agent,
            priority,
        ) else {
            return GlobalAgentResponse::error("Failed to add feedback to conversation", session_id);
        };

        self.conversations.add_message(
            session_id,
            "system",
            "feedback_received",
            &format!("Feedback received: {}", feedback_type.as_str()),
            feedback_metadata(&user_feedback),
        );

        let response = match feedback_type {
            FeedbackType::Approval => self.handle_approval(session_id, &user_feedback),
            FeedbackType::Rejection => {
                self.regenerate(session_id, feedback, &user_feedback, Revision::Rejection)
                    .await
            }
            FeedbackType::ContentUpdate => {
                self.regenerate(session_id, feedback, &user_feedback, Revision::ContentUpdate)
                    .await
            }
            FeedbackType::KnowledgeUpdate => {
                self.handle_knowledge_update(session_id, feedback, &user_feedback)
            }
            FeedbackType::ClarificationRequest => {
                self.handle_clarification(session_id, feedback, &user_feedback)
            }
        };

        let status = if response.success {
            FeedbackStatus::Approved
        } else {
            FeedbackStatus::Failed
        };
        let mut result = Map::new();
        result.insert(
            "response_message".to_string(),
            Value::String(response.message.clone()),
        );
        self.conversations
            .process_feedback(&user_feedback.feedback_id, "global_agent", status, Some(result));
        self.set_state(session_id, response.conversation_state);
        response
    }

    fn handle_approval(&self, session_id: &str, user_feedback: &UserFeedback) -> GlobalAgentResponse {
        self.conversations.add_message(
            session_id,
            "system",
            "approval_processed",
            "Document approved by user",
            feedback_metadata(user_feedback),
        );
        GlobalAgentResponse::new(
            true,
            "Document approved! The generated document is ready for use.",
            session_id,
            ConversationState::Completed,
        )
        .with_next_actions(&["Download final document", "Archive session"])
    }

    async fn regenerate(
        &self,
        session_id: &str,
        feedback: &str,
        user_feedback: &UserFeedback,
        revision: Revision,
    ) -> GlobalAgentResponse {
        self.conversations.add_message(
            session_id,
            "system",
            revision.processed_type(),
            &revision.processed_content(feedback),
            feedback_metadata(user_feedback),
        );

        let last_request = self
            .conversations
            .get_conversation_history(session_id, None, &["request"])
            .pop()
            .map(|m| m.content);
        let updated_request = revision.updated_request(last_request.as_deref(), feedback);

        let decision = self.router.analyze_request(&updated_request);
        let input = super::without_nulls(&decision.extracted_data);
        let primary = self
            .execute_agent(
                decision.primary_agent,
                &input,
                &ExecutionOptions::default(),
                session_id,
            )
            .await;

        let mut metadata = Map::new();
        metadata.insert(
            "agent_result".to_string(),
            serde_json::to_value(&primary).unwrap_or(Value::Null),
        );
        self.conversations.add_message(
            session_id,
            "system",
            revision.done_type(),
            revision.done_content(),
            metadata,
        );
        self.record_result(session_id, &primary);

        GlobalAgentResponse::new(
            primary.success,
            revision.response_message(feedback),
            session_id,
            ConversationState::AwaitingFeedback,
        )
        .with_primary(primary)
        .with_next_actions(revision.next_actions())
    }

    fn handle_knowledge_update(
        &self,
        session_id: &str,
        feedback: &str,
        user_feedback: &UserFeedback,
    ) -> GlobalAgentResponse {
        self.conversations.add_message(
            session_id,
            "system",
            "knowledge_update_processed",
            &format!("Knowledge update requested: {}", feedback),
            feedback_metadata(user_feedback),
        );

        let target = user_feedback
            .target_agent
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_KNOWLEDGE_TARGET);
        if let Some(update) = self.conversations.create_knowledge_update(
            session_id,
            KnowledgeUpdateType::ProductKnowledge,
            target,
            feedback,
            Some(&user_feedback.feedback_id),
            true,
        ) {
            let mut metadata = Map::new();
            metadata.insert("knowledge_update_id".to_string(), json!(update.update_id));
            self.conversations.add_message(
                session_id,
                "system",
                "knowledge_update_created",
                &format!("Knowledge update created: {}", update.update_id),
                metadata,
            );
        }

        GlobalAgentResponse::new(
            true,
            format!(
                "Knowledge update request received: {}. This will be processed in the background.",
                feedback
            ),
            session_id,
            ConversationState::AwaitingFeedback,
        )
        .with_next_actions(&[
            "Continue with document generation",
            "Monitor knowledge update progress",
        ])
    }

    fn handle_clarification(
        &self,
        session_id: &str,
        feedback: &str,
        user_feedback: &UserFeedback,
    ) -> GlobalAgentResponse {
        self.conversations.add_message(
            session_id,
            "system",
            "clarification_requested",
            &format!("Clarification requested: {}", feedback),
            feedback_metadata(user_feedback),
        );
        GlobalAgentResponse::new(
            true,
            format!(
                "Clarification requested: {}. Please provide additional details.",
                feedback
            ),
            session_id,
            ConversationState::AwaitingFeedback,
        )
        .with_next_actions(&["Provide additional information", "Clarify requirements"])
    }

    fn record_result(&self, session_id: &str, result: &AgentResult) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            record
                .agent_results
                .insert(result.agent_type.clone(), result.clone());
        }
    }
}

/// The two feedback kinds that re-run the primary agent.
#[derive(Debug, Clone, Copy)]
enum Revision {
    Rejection,
    ContentUpdate,
}

impl Revision {
    fn processed_type(self) -> &'static str {
        match self {
            Revision::Rejection => "rejection_processed",
            Revision::ContentUpdate => "content_update_processed",
        }
    }

    fn processed_content(self, feedback: &str) -> String {
        match self {
            Revision::Rejection => format!("Document rejected: {}", feedback),
            Revision::ContentUpdate => format!("Content update requested: {}", feedback),
        }
    }

    fn updated_request(self, last_request: Option<&str>, feedback: &str) -> String {
        let (fallback, tag) = match self {
            Revision::Rejection => ("Regenerate document", "REJECTED"),
            Revision::ContentUpdate => ("Update document", "UPDATE"),
        };
        format!("{} [{}: {}]", last_request.unwrap_or(fallback), tag, feedback)
    }

    fn done_type(self) -> &'static str {
        match self {
            Revision::Rejection => "document_regenerated",
            Revision::ContentUpdate => "document_updated",
        }
    }

    fn done_content(self) -> &'static str {
        match self {
            Revision::Rejection => "Document regenerated based on rejection feedback",
            Revision::ContentUpdate => "Document updated with requested changes",
        }
    }

    fn response_message(self, feedback: &str) -> String {
        match self {
            Revision::Rejection => format!("Document regenerated based on feedback: {}", feedback),
            Revision::ContentUpdate => format!("Document updated with requested changes: {}", feedback),
        }
    }

    fn next_actions(self) -> &'static [&'static str] {
        match self {
            Revision::Rejection => &["Review updated document", "Provide additional feedback"],
            Revision::ContentUpdate => &["Review updated content", "Approve or request further changes"],
        }
    }
}
