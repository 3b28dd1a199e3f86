//! Conversation sessions, user feedback, knowledge-update approvals and the audit trail.
//!
//! All state sits behind one lock so that a message, its session timestamp and
//! the matching audit entry always change together.

pub mod model;

pub use model::{
    ArchivedConversation, AuditEntry, ConversationCounters, ConversationMessage,
    ConversationSession, ConversationStatistics, ConversationStatus, FeedbackStatus,
    FeedbackSummary, KnowledgeUpdate, KnowledgeUpdateSummary, KnowledgeUpdateType,
    NewConversation, UserFeedback,
};

use crate::error::OrchestratorError;
use chrono::{DateTime, Utc};
use model::{
    new_id, tally, AuditStats, ConversationStats, FeedbackStats, KnowledgeUpdateStats,
};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};

/// Oldest entries are dropped past this size.
pub const AUDIT_TRAIL_CAP: usize = 10_000;

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub session_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub actions: Vec<String>,
}

impl AuditFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn since(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        self.session_id.as_ref().map_or(true, |s| &entry.session_id == s)
            && self.start_time.map_or(true, |t| entry.timestamp >= t)
            && self.end_time.map_or(true, |t| entry.timestamp <= t)
            && (self.actions.is_empty() || self.actions.iter().any(|a| a == &entry.action))
    }
}

struct AuditRecord<'a> {
    session_id: &'a str,
    user_id: Option<String>,
    action: &'a str,
    resource_type: &'a str,
    resource_id: &'a str,
    details: Value,
}

#[derive(Default)]
struct Ledger {
    sessions: HashMap<String, ConversationSession>,
    feedback_queue: Vec<String>,
    knowledge_update_queue: Vec<String>,
    audit_trail: VecDeque<AuditEntry>,
    counters: ConversationCounters,
}

impl Ledger {
    fn audit(&mut self, record: AuditRecord<'_>) {
        self.audit_trail.push_back(AuditEntry {
            entry_id: new_id(),
            timestamp: Utc::now(),
            session_id: record.session_id.to_string(),
            action: record.action.to_string(),
            resource_type: record.resource_type.to_string(),
            resource_id: record.resource_id.to_string(),
            user_id: record.user_id,
            details: record.details,
        });
        while self.audit_trail.len() > AUDIT_TRAIL_CAP {
            self.audit_trail.pop_front();
        }
    }

    fn feedback_mut(&mut self, feedback_id: &str) -> Option<(&mut UserFeedback, Option<String>)> {
        self.sessions.values_mut().find_map(|session| {
            let user_id = session.user_id.clone();
            let found = session
                .feedback_history
                .iter_mut()
                .find(|f| f.feedback_id == feedback_id);
            if found.is_some() {
                session.updated_at = Utc::now();
            }
            found.map(|f| (f, user_id))
        })
    }

    fn update_mut(&mut self, update_id: &str) -> Option<(&mut KnowledgeUpdate, Option<String>)> {
        self.sessions.values_mut().find_map(|session| {
            let user_id = session.user_id.clone();
            let found = session
                .knowledge_updates
                .iter_mut()
                .find(|u| u.update_id == update_id);
            if found.is_some() {
                session.updated_at = Utc::now();
            }
            found.map(|u| (u, user_id))
        })
    }

    fn remove(&mut self, session_id: &str) -> Option<ConversationSession> {
        let session = self.sessions.remove(session_id)?;
        self.counters.active_conversations = self.counters.active_conversations.saturating_sub(1);
        Some(session)
    }
}

pub struct ConversationManager {
    storage_path: PathBuf,
    ledger: RwLock<Ledger>,
}

impl ConversationManager {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();
        tracing::info!(path = %storage_path.display(), "Initialized conversation manager with empty state");
        Self {
            storage_path,
            ledger: RwLock::new(Ledger::default()),
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn create_conversation(&self, options: NewConversation) -> ConversationSession {
        let session_id = options.session_id.clone().unwrap_or_else(new_id);
        let details = json!({
            "title": options.title,
            "description": options.description,
            "tags": options.tags,
        });
        let session = ConversationSession::new(session_id.clone(), options);

        let mut ledger = self.ledger.write();
        ledger.sessions.insert(session_id.clone(), session.clone());
        ledger.counters.total_conversations += 1;
        ledger.counters.active_conversations += 1;
        ledger.audit(AuditRecord {
            session_id: &session_id,
            user_id: session.user_id.clone(),
            action: "conversation_created",
            resource_type: "conversation",
            resource_id: &session_id,
            details,
        });
        tracing::info!(session_id = %session_id, "Created conversation session");
        session
    }

    pub fn get_conversation(&self, session_id: &str) -> Option<ConversationSession> {
        self.ledger.read().sessions.get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.ledger.read().sessions.contains_key(session_id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ledger.read().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// `None` when the session does not exist.
    pub fn add_message(
        &self,
        session_id: &str,
        sender: &str,
        message_type: &str,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Option<ConversationMessage> {
        let mut ledger = self.ledger.write();
        let Some(session) = ledger.sessions.get_mut(session_id) else {
            tracing::warn!(session_id, "Conversation session not found");
            return None;
        };
        let message = ConversationMessage {
            message_id: new_id(),
            timestamp: Utc::now(),
            sender: sender.to_string(),
            message_type: message_type.to_string(),
            content: content.to_string(),
            metadata,
            attachments: Vec::new(),
        };
        session.messages.push(message.clone());
        session.touch();
        let user_id = session.user_id.clone();

        ledger.audit(AuditRecord {
            session_id,
            user_id,
            action: "message_added",
            resource_type: "conversation",
            resource_id: session_id,
            details: json!({
                "message_id": message.message_id,
                "sender": sender,
                "message_type": message_type,
                "content_length": content.chars().count(),
            }),
        });
        tracing::debug!(session_id, message_id = %message.message_id, "Added message");
        Some(message)
    }

    pub fn add_feedback(
        &self,
        session_id: &str,
        feedback_type: &str,
        content: &str,
        target_agent: Option<&str>,
        priority: &str,
    ) -> Option<UserFeedback> {
        let mut ledger = self.ledger.write();
        let Some(session) = ledger.sessions.get_mut(session_id) else {
            tracing::warn!(session_id, "Conversation session not found");
            return None;
        };
        let feedback = UserFeedback {
            feedback_id: new_id(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            feedback_type: feedback_type.to_string(),
            content: content.to_string(),
            target_agent: target_agent.map(str::to_string),
            priority: priority.to_string(),
            status: FeedbackStatus::Pending,
            processed_by: None,
            processed_at: None,
            metadata: Map::new(),
        };
        session.feedback_history.push(feedback.clone());
        session.touch();
        let user_id = session.user_id.clone();

        ledger.feedback_queue.push(feedback.feedback_id.clone());
        ledger.counters.total_feedback += 1;
        ledger.counters.pending_feedback += 1;
        ledger.audit(AuditRecord {
            session_id,
            user_id,
            action: "feedback_added",
            resource_type: "feedback",
            resource_id: &feedback.feedback_id,
            details: json!({
                "feedback_type": feedback_type,
                "target_agent": target_agent,
                "priority": priority,
                "content_length": content.chars().count(),
            }),
        });
        tracing::info!(session_id, feedback_id = %feedback.feedback_id, "Added feedback");
        Some(feedback)
    }

    /// Record the outcome of a piece of feedback. `false` when the id is unknown.
    pub fn process_feedback(
        &self,
        feedback_id: &str,
        processor: &str,
        status: FeedbackStatus,
        result: Option<Map<String, Value>>,
    ) -> bool {
        let mut ledger = self.ledger.write();
        let Some((feedback, user_id)) = ledger.feedback_mut(feedback_id) else {
            tracing::warn!(feedback_id, "Feedback not found");
            return false;
        };
        feedback.status = status;
        feedback.processed_by = Some(processor.to_string());
        feedback.processed_at = Some(Utc::now());
        if let Some(result) = &result {
            feedback
                .metadata
                .extend(result.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let session_id = feedback.session_id.clone();

        if status.is_resolved() {
            ledger.counters.pending_feedback = ledger.counters.pending_feedback.saturating_sub(1);
        }
        ledger.audit(AuditRecord {
            session_id: &session_id,
            user_id,
            action: "feedback_processed",
            resource_type: "feedback",
            resource_id: feedback_id,
            details: json!({
                "processor": processor,
                "status": status.as_str(),
                "result": result,
            }),
        });
        tracing::info!(feedback_id, status = status.as_str(), "Processed feedback");
        true
    }

    pub fn create_knowledge_update(
        &self,
        session_id: &str,
        update_type: KnowledgeUpdateType,
        target_agent: &str,
        content: &str,
        source_feedback: Option<&str>,
        approval_required: bool,
    ) -> Option<KnowledgeUpdate> {
        let mut ledger = self.ledger.write();
        let Some(session) = ledger.sessions.get_mut(session_id) else {
            tracing::warn!(session_id, "Conversation session not found");
            return None;
        };
        let update = KnowledgeUpdate {
            update_id: new_id(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            update_type,
            target_agent: target_agent.to_string(),
            content: content.to_string(),
            source_feedback: source_feedback.map(str::to_string),
            approval_required,
            status: FeedbackStatus::Pending,
            approved_by: None,
            approved_at: None,
            implemented_at: None,
            metadata: Map::new(),
        };
        session.knowledge_updates.push(update.clone());
        session.touch();
        let user_id = session.user_id.clone();

        if approval_required {
            ledger.knowledge_update_queue.push(update.update_id.clone());
            ledger.counters.pending_knowledge_updates += 1;
        }
        ledger.counters.total_knowledge_updates += 1;
        ledger.audit(AuditRecord {
            session_id,
            user_id,
            action: "knowledge_update_created",
            resource_type: "knowledge_update",
            resource_id: &update.update_id,
            details: json!({
                "update_type": update_type.as_str(),
                "target_agent": target_agent,
                "approval_required": approval_required,
                "content_length": content.chars().count(),
            }),
        });
        tracing::info!(session_id, update_id = %update.update_id, target_agent, "Created knowledge update");
        Some(update)
    }

    pub fn approve_knowledge_update(&self, update_id: &str, approver: &str, comments: Option<&str>) -> bool {
        let mut ledger = self.ledger.write();
        let Some((update, user_id)) = ledger.update_mut(update_id) else {
            tracing::warn!(update_id, "Knowledge update not found");
            return false;
        };
        update.status = FeedbackStatus::Approved;
        update.approved_by = Some(approver.to_string());
        update.approved_at = Some(Utc::now());
        if let Some(comments) = comments {
            update
                .metadata
                .insert("approval_comments".to_string(), Value::String(comments.to_string()));
        }
        let session_id = update.session_id.clone();

        ledger.counters.pending_knowledge_updates =
            ledger.counters.pending_knowledge_updates.saturating_sub(1);
        ledger.audit(AuditRecord {
            session_id: &session_id,
            user_id,
            action: "knowledge_update_approved",
            resource_type: "knowledge_update",
            resource_id: update_id,
            details: json!({ "approver": approver, "comments": comments }),
        });
        tracing::info!(update_id, approver, "Approved knowledge update");
        true
    }

    pub fn implement_knowledge_update(
        &self,
        update_id: &str,
        implementer: &str,
        implementation_details: Option<Value>,
    ) -> bool {
        let mut ledger = self.ledger.write();
        let Some((update, user_id)) = ledger.update_mut(update_id) else {
            tracing::warn!(update_id, "Knowledge update not found");
            return false;
        };
        update.status = FeedbackStatus::Implemented;
        update.implemented_at = Some(Utc::now());
        if let Some(details) = &implementation_details {
            update
                .metadata
                .insert("implementation_details".to_string(), details.clone());
        }
        let session_id = update.session_id.clone();

        ledger.audit(AuditRecord {
            session_id: &session_id,
            user_id,
            action: "knowledge_update_implemented",
            resource_type: "knowledge_update",
            resource_id: update_id,
            details: json!({
                "implementer": implementer,
                "implementation_details": implementation_details,
            }),
        });
        tracing::info!(update_id, implementer, "Implemented knowledge update");
        true
    }

    /// Knowledge updates of a session still waiting for approval, oldest first.
    pub fn pending_knowledge_updates(&self, session_id: &str) -> Vec<KnowledgeUpdate> {
        self.ledger
            .read()
            .sessions
            .get(session_id)
            .map(|s| {
                s.knowledge_updates
                    .iter()
                    .filter(|u| u.status == FeedbackStatus::Pending)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Messages in order, filtered by type when `message_types` is non-empty,
    /// then cut to the last `limit`.
    pub fn get_conversation_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
        message_types: &[&str],
    ) -> Vec<ConversationMessage> {
        let ledger = self.ledger.read();
        let Some(session) = ledger.sessions.get(session_id) else {
            return Vec::new();
        };
        let messages: Vec<ConversationMessage> = session
            .messages
            .iter()
            .filter(|m| message_types.is_empty() || message_types.contains(&m.message_type.as_str()))
            .cloned()
            .collect();
        match limit {
            Some(limit) if limit > 0 && messages.len() > limit => {
                messages[messages.len() - limit..].to_vec()
            }
            _ => messages,
        }
    }

    pub fn get_feedback_summary(&self, session_id: &str) -> Option<FeedbackSummary> {
        let ledger = self.ledger.read();
        let session = ledger.sessions.get(session_id)?;
        let history = &session.feedback_history;
        Some(FeedbackSummary {
            total_feedback: history.len(),
            feedback_by_type: tally(history.iter().map(|f| f.feedback_type.as_str())),
            feedback_by_status: tally(history.iter().map(|f| f.status.as_str())),
            pending_feedback: history
                .iter()
                .filter(|f| f.status == FeedbackStatus::Pending)
                .count(),
        })
    }

    pub fn get_knowledge_update_summary(&self, session_id: &str) -> Option<KnowledgeUpdateSummary> {
        let ledger = self.ledger.read();
        let session = ledger.sessions.get(session_id)?;
        let updates = &session.knowledge_updates;
        Some(KnowledgeUpdateSummary {
            total_updates: updates.len(),
            updates_by_type: tally(updates.iter().map(|u| u.update_type.as_str())),
            updates_by_status: tally(updates.iter().map(|u| u.status.as_str())),
            pending_updates: updates
                .iter()
                .filter(|u| u.status == FeedbackStatus::Pending)
                .count(),
        })
    }

    pub fn get_audit_trail(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.ledger
            .read()
            .audit_trail
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn get_statistics(&self) -> ConversationStatistics {
        let ledger = self.ledger.read();
        let sessions: Vec<&ConversationSession> = ledger.sessions.values().collect();
        let average = |total: usize| {
            if sessions.is_empty() {
                0.0
            } else {
                total as f64 / sessions.len() as f64
            }
        };
        let feedback = || sessions.iter().flat_map(|s| s.feedback_history.iter());
        let updates = || sessions.iter().flat_map(|s| s.knowledge_updates.iter());

        ConversationStatistics {
            counters: ledger.counters.clone(),
            conversation_stats: ConversationStats {
                total_conversations: sessions.len(),
                conversations_by_status: tally(sessions.iter().map(|s| s.status.as_str())),
                average_messages_per_conversation: average(
                    sessions.iter().map(|s| s.messages.len()).sum(),
                ),
                average_feedback_per_conversation: average(feedback().count()),
            },
            feedback_stats: FeedbackStats {
                total_feedback: ledger.feedback_queue.len(),
                feedback_by_type: tally(feedback().map(|f| f.feedback_type.as_str())),
                feedback_by_status: tally(feedback().map(|f| f.status.as_str())),
            },
            knowledge_update_stats: KnowledgeUpdateStats {
                total_updates: ledger.knowledge_update_queue.len(),
                updates_by_type: tally(updates().map(|u| u.update_type.as_str())),
                updates_by_status: tally(updates().map(|u| u.status.as_str())),
            },
            audit_stats: AuditStats {
                total_audit_entries: ledger.audit_trail.len(),
                audit_entries_by_action: tally(ledger.audit_trail.iter().map(|e| e.action.as_str())),
            },
        }
    }

    /// Write the session to `<storage>/archived_conversations/<id>.json` and drop it
    /// from the active set. `Ok(false)` when the session does not exist. Ids that
    /// are not a plain file name are rejected before anything is written.
    pub fn archive_conversation(&self, session_id: &str) -> Result<bool, OrchestratorError> {
        if !is_plain_file_name(session_id) {
            return Err(OrchestratorError::Session(format!(
                "Invalid session id for archive: {:?}",
                session_id
            )));
        }
        let mut ledger = self.ledger.write();
        let Some(mut session) = ledger.sessions.get(session_id).cloned() else {
            return Ok(false);
        };
        session.status = ConversationStatus::Archived;
        session.touch();
        let audit_entries = ledger
            .audit_trail
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect();
        let user_id = session.user_id.clone();
        let archived = ArchivedConversation {
            session,
            audit_entries,
        };

        let dir = self.storage_path.join("archived_conversations");
        std::fs::create_dir_all(&dir)?;
        let file = dir.join(format!("{}.json", session_id));
        std::fs::write(&file, serde_json::to_string_pretty(&archived)?)?;

        ledger.remove(session_id);
        ledger.audit(AuditRecord {
            session_id,
            user_id,
            action: "conversation_archived",
            resource_type: "conversation",
            resource_id: session_id,
            details: json!({ "archive_file": file.display().to_string() }),
        });
        tracing::info!(session_id, "Archived conversation session");
        Ok(true)
    }

    /// Drop a session without archiving it. Other sessions are untouched.
    pub fn remove_conversation(&self, session_id: &str) -> bool {
        let mut ledger = self.ledger.write();
        let Some(session) = ledger.remove(session_id) else {
            return false;
        };
        ledger.audit(AuditRecord {
            session_id,
            user_id: session.user_id,
            action: "conversation_removed",
            resource_type: "conversation",
            resource_id: session_id,
            details: Value::Null,
        });
        tracing::info!(session_id, "Removed conversation session");
        true
    }
}

fn is_plain_file_name(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !id.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, ConversationManager) {
        let dir = TempDir::new().unwrap();
        let manager = ConversationManager::new(dir.path());
        (dir, manager)
    }

    #[test]
    fn test_create_with_explicit_session_id() {
        let (_dir, manager) = manager();
        let session = manager.create_conversation(NewConversation::titled("t").with_session_id("abc"));
        assert_eq!(session.session_id, "abc");
        assert_eq!(session.status, ConversationStatus::Active);
        assert!(manager.contains("abc"));
        let generated = manager.create_conversation(NewConversation::default());
        assert_eq!(generated.session_id.len(), 36);
    }

    #[test]
    fn test_add_message_to_missing_session() {
        let (_dir, manager) = manager();
        assert!(manager
            .add_message("missing", "user", "request", "hi", Map::new())
            .is_none());
    }

    #[test]
    fn test_history_filters_then_limits() {
        let (_dir, manager) = manager();
        let id = manager.create_conversation(NewConversation::default()).session_id;
        for (kind, content) in [("request", "a"), ("response", "b"), ("request", "c"), ("request", "d")] {
            manager.add_message(&id, "user", kind, content, Map::new());
        }
        let requests = manager.get_conversation_history(&id, Some(2), &["request"]);
        let contents: Vec<&str> = requests.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "d"]);
        assert_eq!(manager.get_conversation_history(&id, None, &[]).len(), 4);
    }

    #[test]
    fn test_feedback_lifecycle_counts() {
        let (_dir, manager) = manager();
        let id = manager.create_conversation(NewConversation::default()).session_id;
        let fb = manager
            .add_feedback(&id, "approval", "looks good", None, "normal")
            .unwrap();
        assert_eq!(manager.get_statistics().counters.pending_feedback, 1);

        assert!(manager.process_feedback(&fb.feedback_id, "global_agent", FeedbackStatus::Approved, None));
        let stats = manager.get_statistics();
        assert_eq!(stats.counters.pending_feedback, 0);
        assert_eq!(stats.counters.total_feedback, 1);

        let summary = manager.get_feedback_summary(&id).unwrap();
        assert_eq!(summary.feedback_by_status.get("approved"), Some(&1));
        assert_eq!(summary.pending_feedback, 0);
        assert!(!manager.process_feedback("nope", "x", FeedbackStatus::Failed, None));
    }

    #[test]
    fn test_failed_feedback_stays_counted_as_pending() {
        let (_dir, manager) = manager();
        let id = manager.create_conversation(NewConversation::default()).session_id;
        let fb = manager.add_feedback(&id, "rejection", "no", None, "high").unwrap();
        manager.process_feedback(&fb.feedback_id, "global_agent", FeedbackStatus::Failed, None);
        assert_eq!(manager.get_statistics().counters.pending_feedback, 1);
    }

    #[test]
    fn test_knowledge_update_workflow() {
        let (_dir, manager) = manager();
        let id = manager.create_conversation(NewConversation::default()).session_id;
        let update = manager
            .create_knowledge_update(&id, KnowledgeUpdateType::ProductKnowledge, "ism", "new fact", None, true)
            .unwrap();
        assert_eq!(manager.pending_knowledge_updates(&id).len(), 1);
        assert!(manager.approve_knowledge_update(&update.update_id, "reviewer", Some("ok")));
        assert!(manager.implement_knowledge_update(&update.update_id, "updater", None));
        assert!(manager.pending_knowledge_updates(&id).is_empty());

        let summary = manager.get_knowledge_update_summary(&id).unwrap();
        assert_eq!(summary.updates_by_status.get("implemented"), Some(&1));
        assert_eq!(summary.updates_by_type.get("product_knowledge"), Some(&1));
        assert_eq!(manager.get_statistics().counters.pending_knowledge_updates, 0);
    }

    #[test]
    fn test_audit_trail_filters() {
        let (_dir, manager) = manager();
        let a = manager.create_conversation(NewConversation::default()).session_id;
        let b = manager.create_conversation(NewConversation::default()).session_id;
        manager.add_message(&a, "user", "request", "x", Map::new());

        assert_eq!(manager.get_audit_trail(&AuditFilter::for_session(&a)).len(), 2);
        assert_eq!(manager.get_audit_trail(&AuditFilter::for_session(&b)).len(), 1);
        let future = AuditFilter::default().since(Utc::now() + chrono::Duration::hours(1));
        assert!(manager.get_audit_trail(&future).is_empty());
        let created = AuditFilter {
            actions: vec!["conversation_created".to_string()],
            ..AuditFilter::default()
        };
        assert_eq!(manager.get_audit_trail(&created).len(), 2);
    }

    #[test]
    fn test_audit_trail_is_capped() {
        let (_dir, manager) = manager();
        let id = manager.create_conversation(NewConversation::default()).session_id;
        for _ in 0..AUDIT_TRAIL_CAP + 5 {
            manager.add_message(&id, "user", "request", "x", Map::new());
        }
        let stats = manager.get_statistics();
        assert_eq!(stats.audit_stats.total_audit_entries, AUDIT_TRAIL_CAP);
        assert!(stats.audit_stats.audit_entries_by_action.get("conversation_created").is_none());
    }

    #[test]
    fn test_archive_writes_json_and_deactivates() {
        let (dir, manager) = manager();
        let id = manager.create_conversation(NewConversation::titled("deal")).session_id;
        manager.add_message(&id, "user", "request", "hello", Map::new());

        assert!(manager.archive_conversation(&id).unwrap());
        assert!(!manager.contains(&id));
        assert_eq!(manager.get_statistics().counters.active_conversations, 0);

        let path = dir.path().join("archived_conversations").join(format!("{}.json", id));
        let archived: ArchivedConversation =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(archived.session.status, ConversationStatus::Archived);
        assert_eq!(archived.session.messages.len(), 1);
        assert_eq!(archived.audit_entries.len(), 2);

        assert!(!manager.archive_conversation(&id).unwrap());
    }

    #[test]
    fn test_archive_rejects_ids_outside_archive_dir() {
        let dir = TempDir::new().unwrap();
        let manager = ConversationManager::new(dir.path().join("store"));
        for id in ["../escape", "..", "nested/inner", "back\\slash", "/abs"] {
            manager.create_conversation(NewConversation::titled("t").with_session_id(id));
            let err = manager.archive_conversation(id).unwrap_err();
            assert!(matches!(err, OrchestratorError::Session(_)), "{id}");
            assert!(manager.contains(id));
        }
        assert!(!dir.path().join("escape.json").exists());
        assert!(!dir.path().join("store").join("archived_conversations").exists());
    }

    #[test]
    fn test_remove_leaves_other_sessions() {
        let (_dir, manager) = manager();
        let a = manager.create_conversation(NewConversation::default()).session_id;
        let b = manager.create_conversation(NewConversation::default()).session_id;
        manager.add_message(&b, "user", "request", "keep", Map::new());
        let before = manager.get_conversation(&b).unwrap();

        assert!(manager.remove_conversation(&a));
        assert!(!manager.remove_conversation(&a));
        let after = manager.get_conversation(&b).unwrap();
        assert_eq!(after.messages.len(), before.messages.len());
        assert_eq!(after.updated_at, before.updated_at);
    }
}
