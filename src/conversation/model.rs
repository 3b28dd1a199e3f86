//! Session, message, feedback and knowledge-update records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Paused,
    Completed,
    Archived,
    Error,
}

impl ConversationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Paused => "paused",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Archived => "archived",
            ConversationStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    Implemented,
    Failed,
}

impl FeedbackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::Processing => "processing",
            FeedbackStatus::Approved => "approved",
            FeedbackStatus::Rejected => "rejected",
            FeedbackStatus::Implemented => "implemented",
            FeedbackStatus::Failed => "failed",
        }
    }

    /// Statuses that take feedback off the pending count.
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            FeedbackStatus::Approved | FeedbackStatus::Rejected | FeedbackStatus::Implemented
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeUpdateType {
    TemplateAddition,
    TemplateUpdate,
    RegulatoryUpdate,
    ProductKnowledge,
    RiskInformation,
    ComplianceRule,
    BestPractice,
}

impl KnowledgeUpdateType {
    pub fn as_str(self) -> &'static str {
        match self {
            KnowledgeUpdateType::TemplateAddition => "template_addition",
            KnowledgeUpdateType::TemplateUpdate => "template_update",
            KnowledgeUpdateType::RegulatoryUpdate => "regulatory_update",
            KnowledgeUpdateType::ProductKnowledge => "product_knowledge",
            KnowledgeUpdateType::RiskInformation => "risk_information",
            KnowledgeUpdateType::ComplianceRule => "compliance_rule",
            KnowledgeUpdateType::BestPractice => "best_practice",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    /// `user`, `system` or an agent type.
    pub sender: String,
    pub message_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFeedback {
    pub feedback_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub feedback_type: String,
    pub content: String,
    pub target_agent: Option<String>,
    pub priority: String,
    pub status: FeedbackStatus,
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeUpdate {
    pub update_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub update_type: KnowledgeUpdateType,
    pub target_agent: String,
    pub content: String,
    pub source_feedback: Option<String>,
    pub approval_required: bool,
    pub status: FeedbackStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub implemented_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub action: String,
    /// `conversation`, `feedback`, `knowledge_update` or `agent`.
    pub resource_type: String,
    pub resource_id: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub status: ConversationStatus,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub feedback_history: Vec<UserFeedback>,
    #[serde(default)]
    pub knowledge_updates: Vec<KnowledgeUpdate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ConversationSession {
    pub(crate) fn new(session_id: String, options: NewConversation) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            created_at: now,
            updated_at: now,
            user_id: options.user_id,
            status: ConversationStatus::Active,
            title: options.title,
            description: options.description,
            messages: Vec::new(),
            feedback_history: Vec::new(),
            knowledge_updates: Vec::new(),
            tags: options.tags,
            metadata: Map::new(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Options for [`super::ConversationManager::create_conversation`].
#[derive(Debug, Clone, Default)]
pub struct NewConversation {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Reuse a caller-chosen id instead of generating one.
    pub session_id: Option<String>,
}

impl NewConversation {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Archived form: the session plus its slice of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedConversation {
    #[serde(flatten)]
    pub session: ConversationSession,
    pub audit_entries: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total_feedback: usize,
    pub feedback_by_type: BTreeMap<String, usize>,
    pub feedback_by_status: BTreeMap<String, usize>,
    pub pending_feedback: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeUpdateSummary {
    pub total_updates: usize,
    pub updates_by_type: BTreeMap<String, usize>,
    pub updates_by_status: BTreeMap<String, usize>,
    pub pending_updates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationCounters {
    pub total_conversations: u64,
    pub active_conversations: u64,
    pub total_feedback: u64,
    pub pending_feedback: u64,
    pub total_knowledge_updates: u64,
    pub pending_knowledge_updates: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: usize,
    pub conversations_by_status: BTreeMap<String, usize>,
    pub average_messages_per_conversation: f64,
    pub average_feedback_per_conversation: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total_feedback: usize,
    pub feedback_by_type: BTreeMap<String, usize>,
    pub feedback_by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeUpdateStats {
    pub total_updates: usize,
    pub updates_by_type: BTreeMap<String, usize>,
    pub updates_by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_audit_entries: usize,
    pub audit_entries_by_action: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationStatistics {
    #[serde(flatten)]
    pub counters: ConversationCounters,
    pub conversation_stats: ConversationStats,
    pub feedback_stats: FeedbackStats,
    pub knowledge_update_stats: KnowledgeUpdateStats,
    pub audit_stats: AuditStats,
}

pub(crate) fn tally<'a, I>(keys: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}
