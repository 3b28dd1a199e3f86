//! OpenAI-compatible HTTP backends.
//!
//! Embedding and completion services for the knowledge stores, and a
//! generation service for document agents. All three share one
//! [`OpenAiClient`].

use crate::agent::base::AgentDeps;
use crate::agent::generation::{
    document_title, gather_tool_context, GenerationRequest, GenerationService,
};
use crate::agent::tools::AgentTool;
use crate::config::OpenAiSettings;
use crate::error::OrchestratorError;
use crate::knowledge::{CompletionService, EmbeddingService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// `openai:gpt-4o-mini` -> `gpt-4o-mini`. Names without a provider prefix pass through.
pub fn bare_model_name(model: &str) -> &str {
    model.split_once(':').map(|(_, name)| name).unwrap_or(model)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings, timeout: Duration) -> Result<Self, OrchestratorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, OrchestratorError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::Provider(format!(
                "Status {}: {}",
                status, text
            )));
        }
        Ok(response)
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f64,
    ) -> Result<String, OrchestratorError> {
        let body = json!({
            "model": bare_model_name(model),
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });
        let response: ChatResponse = self.post("chat/completions", &body).await?.json().await?;
        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| OrchestratorError::Provider("No content in response".to_string()))
    }

    pub async fn embed(&self, model: &str, input: &[String]) -> Result<Vec<Vec<f32>>, OrchestratorError> {
        let body = json!({ "model": model, "input": input });
        let response: EmbeddingResponse = self.post("embeddings", &body).await?.json().await?;
        if response.data.len() != input.len() {
            return Err(OrchestratorError::Provider(format!(
                "Expected {} embeddings, got {}",
                input.len(),
                response.data.len()
            )));
        }
        Ok(response.data.into_iter().map(|row| row.embedding).collect())
    }
}

pub struct OpenAiEmbedding {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiEmbedding {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OrchestratorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.client.embed(&self.model, texts).await
    }
}

pub struct OpenAiCompletion {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, question: &str, context: &str) -> Result<String, OrchestratorError> {
        let messages = [
            ChatMessage::new(
                "system",
                "Answer using only the provided context. Say so when the context does not cover the question.",
            ),
            ChatMessage::new("user", format!("Context:\n{}\n\nQuestion: {}", context, question)),
        ];
        self.client.chat(&self.model, &messages, 1024, 0.0).await
    }
}

/// Generation through chat completions, grounded on the agent's tool output.
pub struct OpenAiGenerationService {
    client: Arc<OpenAiClient>,
    max_tool_calls: usize,
}

impl OpenAiGenerationService {
    pub fn new(client: Arc<OpenAiClient>, max_tool_calls: usize) -> Self {
        Self {
            client,
            max_tool_calls,
        }
    }
}

/// System prompt, retrieved context, prior turns, then the request prompt.
pub fn build_messages(request: &GenerationRequest, context: &str) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new("system", request.instructions.clone())];
    if !context.is_empty() {
        messages.push(ChatMessage::new(
            "system",
            format!("Retrieved knowledge:\n{}", context),
        ));
    }
    messages.extend(
        request
            .history
            .iter()
            .map(|turn| ChatMessage::new(&turn.role, turn.content.clone())),
    );
    messages.push(ChatMessage::new("user", request.prompt.clone()));
    messages
}

#[async_trait]
impl GenerationService for OpenAiGenerationService {
    async fn run(
        &self,
        request: &GenerationRequest,
        deps: &AgentDeps,
        tools: &[Arc<dyn AgentTool>],
    ) -> Result<Value, OrchestratorError> {
        let records = gather_tool_context(tools, deps, self.max_tool_calls).await;
        let context = records
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = build_messages(request, &context);
        let content = self
            .client
            .chat(
                &request.model_name,
                &messages,
                request.max_tokens,
                request.temperature,
            )
            .await?;

        let body = serde_json::from_str::<Value>(&content).unwrap_or(Value::String(content));
        Ok(json!({
            "output": {
                "document_type": request.kind.long_name(),
                "title": document_title(request.kind, &deps.input),
                "model": request.model_name,
                "content": body,
                "tools_used": records.iter().map(|r| r.tool.clone()).collect::<Vec<_>>(),
                "generated_at": chrono::Utc::now().to_rfc3339(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::base::HistoryMessage;
    use crate::agent::DocumentKind;

    #[test]
    fn test_bare_model_name() {
        assert_eq!(bare_model_name("openai:gpt-4o-mini"), "gpt-4o-mini");
        assert_eq!(bare_model_name("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_build_messages_orders_turns() {
        let request = GenerationRequest {
            agent_type: "ism".to_string(),
            kind: DocumentKind::InvestorSummary,
            model_name: "openai:gpt-4o-mini".to_string(),
            instructions: "Write an investor summary.".to_string(),
            prompt: "Generate it".to_string(),
            history: vec![HistoryMessage::new("user", "earlier"), HistoryMessage::new("assistant", "reply")],
            max_tokens: 4000,
            temperature: 0.7,
        };
        let messages = build_messages(&request, "ctx");
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "system", "user", "assistant", "user"]);
        assert_eq!(messages.last().unwrap().content, "Generate it");

        let messages = build_messages(&request, "");
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn test_client_trims_base_url() {
        let settings = OpenAiSettings {
            api_key: "k".to_string(),
            base_url: "http://localhost:8080/v1/".to_string(),
            ..OpenAiSettings::default()
        };
        let client = OpenAiClient::new(&settings, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
