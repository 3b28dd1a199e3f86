//! Knowledge update requests: validate, plan, apply.

use super::manager::KnowledgeManager;
use super::OperationResult;
use crate::error::OrchestratorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const INVALID_FORMAT: &str =
    "Invalid request format. Must include 'action', 'domain', and 'content'.";

/// A validated knowledge update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub action: String,
    pub domain: String,
    pub content: String,
}

impl UpdateRequest {
    pub fn insert(domain: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: "insert".to_string(),
            domain: domain.into(),
            content: content.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "action": self.action,
            "domain": self.domain,
            "content": self.content,
        })
    }
}

fn required_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

pub struct KnowledgeUpdater {
    manager: Arc<KnowledgeManager>,
}

impl KnowledgeUpdater {
    pub fn new(manager: Arc<KnowledgeManager>) -> Self {
        Self { manager }
    }

    /// Validate the raw request shape. Only `insert` is supported.
    pub fn parse_update_request(&self, raw: &Value) -> Result<UpdateRequest, OrchestratorError> {
        let (Some(action), Some(domain), Some(content)) = (
            required_field(raw, "action"),
            required_field(raw, "domain"),
            required_field(raw, "content"),
        ) else {
            return Err(OrchestratorError::InvalidUpdateRequest(
                INVALID_FORMAT.to_string(),
            ));
        };

        if !action.eq_ignore_ascii_case("insert") {
            return Err(OrchestratorError::InvalidUpdateRequest(format!(
                "Action '{}' is not supported. Only 'insert' is allowed.",
                action
            )));
        }

        Ok(UpdateRequest {
            action: action.to_string(),
            domain: domain.to_string(),
            content: content.to_string(),
        })
    }

    pub fn create_update_plan(&self, request: &UpdateRequest) -> String {
        format!(
            "Plan: The '{}' knowledge base will be updated with new content.",
            request.domain
        )
    }

    /// Parse and plan without applying.
    pub fn propose(&self, raw: &Value) -> Result<String, OrchestratorError> {
        let request = self.parse_update_request(raw)?;
        Ok(self.create_update_plan(&request))
    }

    pub async fn apply_update(&self, raw: &Value) -> OperationResult {
        let request = match self.parse_update_request(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Update request failed validation");
                return OperationResult::failed(e.to_string());
            }
        };
        let plan = self.create_update_plan(&request);
        tracing::info!(domain = %request.domain, plan = %plan, "Executing update plan");

        let result = self
            .manager
            .insert_document(&request.domain, &request.content)
            .await;
        if result.success {
            tracing::info!(domain = %request.domain, "Update applied successfully");
        } else {
            tracing::error!(domain = %request.domain, message = %result.message, "Failed to apply update");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::knowledge::store::{ExtractiveCompletion, HashedEmbedding, LocalStoreBuilder};
    use serde_json::json;

    fn updater(root: &std::path::Path) -> KnowledgeUpdater {
        let paths = PathsConfig {
            knowledge_bases_root: root.to_path_buf(),
            ..PathsConfig::default()
        };
        let manager = KnowledgeManager::new(
            paths,
            Arc::new(HashedEmbedding::default()),
            Arc::new(ExtractiveCompletion),
            Arc::new(LocalStoreBuilder),
        );
        KnowledgeUpdater::new(Arc::new(manager))
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let updater = updater(dir.path());
        let err = updater
            .parse_update_request(&json!({"action": "insert", "domain": "ism"}))
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_FORMAT);
    }

    #[test]
    fn test_only_insert_is_supported() {
        let dir = tempfile::tempdir().unwrap();
        let updater = updater(dir.path());
        let err = updater
            .parse_update_request(&json!({"action": "delete", "domain": "ism", "content": "x"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Action 'delete' is not supported. Only 'insert' is allowed."
        );
        assert!(updater
            .parse_update_request(&json!({"action": "INSERT", "domain": "ism", "content": "x"}))
            .is_ok());
    }

    #[test]
    fn test_plan_names_the_domain() {
        let dir = tempfile::tempdir().unwrap();
        let updater = updater(dir.path());
        let plan = updater.propose(&UpdateRequest::insert("prs", "new terms").to_value()).unwrap();
        assert_eq!(plan, "Plan: The 'prs' knowledge base will be updated with new content.");
    }

    #[tokio::test]
    async fn test_apply_update_reports_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let updater = updater(dir.path());
        let result = updater.apply_update(&json!({"domain": "ism"})).await;
        assert!(!result.success);
        assert_eq!(result.message, INVALID_FORMAT);
    }

    #[tokio::test]
    async fn test_apply_update_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let updater = updater(dir.path());
        let result = updater
            .apply_update(&UpdateRequest::insert("ism", "Coupon paid quarterly.").to_value())
            .await;
        assert!(result.success);
    }
}
