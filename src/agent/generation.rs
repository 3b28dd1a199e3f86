//! Generation step: the service contract, output extraction and the offline
//! template-driven implementation.

use super::base::{AgentDeps, HistoryMessage};
use super::kind::DocumentKind;
use super::tools::{tool_arguments, AgentTool};
use crate::error::OrchestratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Everything the generation step needs besides dependencies and tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub agent_type: String,
    pub kind: DocumentKind,
    pub model_name: String,
    pub instructions: String,
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// The underlying generation layer. Returns a raw result whose structured
/// output sits under one of several conventional keys.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn run(
        &self,
        request: &GenerationRequest,
        deps: &AgentDeps,
        tools: &[Arc<dyn AgentTool>],
    ) -> Result<Value, OrchestratorError>;
}

pub type OutputExtractor = fn(&Value) -> Option<Value>;

fn probe(result: &Value, key: &str) -> Option<Value> {
    result.get(key).filter(|v| !v.is_null()).cloned()
}

fn data_field(result: &Value) -> Option<Value> {
    probe(result, "data")
}

fn output_field(result: &Value) -> Option<Value> {
    probe(result, "output")
}

fn result_field(result: &Value) -> Option<Value> {
    probe(result, "result")
}

fn final_field(result: &Value) -> Option<Value> {
    probe(result, "final")
}

fn value_field(result: &Value) -> Option<Value> {
    probe(result, "value")
}

/// Tried in order; the first extractor yielding a value wins.
pub const OUTPUT_EXTRACTORS: [OutputExtractor; 5] =
    [data_field, output_field, result_field, final_field, value_field];

pub fn extract_output(result: &Value) -> Result<Value, OrchestratorError> {
    OUTPUT_EXTRACTORS
        .iter()
        .find_map(|extract| extract(result))
        .ok_or(OrchestratorError::NoUsableOutput)
}

/// One tool invocation made while gathering context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub content: String,
}

/// Call the agent's tools in registration order, at most `max_calls` of them.
pub async fn gather_tool_context(
    tools: &[Arc<dyn AgentTool>],
    deps: &AgentDeps,
    max_calls: usize,
) -> Vec<ToolCallRecord> {
    let args = tool_arguments(deps.kind, &deps.input);
    let mut records = Vec::new();
    for tool in tools.iter().take(max_calls) {
        let content = tool.call(deps, &args).await;
        tracing::debug!(agent_type = %deps.agent_type, tool = tool.name(), "Tool call completed");
        records.push(ToolCallRecord {
            tool: tool.name().to_string(),
            content,
        });
    }
    records
}

/// Document title from the most specific name field the input carries.
pub fn document_title(kind: DocumentKind, input: &Value) -> String {
    let name_field = match kind {
        DocumentKind::InvestorSummary => "product_name",
        DocumentKind::BaseShelfProspectus => "program_name",
        DocumentKind::ProductSupplement => "note_series",
        DocumentKind::PricingSupplement => "base_prospectus_reference",
    };
    match input.get(name_field).and_then(Value::as_str) {
        Some(name) if !name.is_empty() => format!("{} - {}", kind.title(), name),
        _ => kind.title().to_string(),
    }
}

/// Offline generation: assembles the document from retrieved knowledge
/// sections without calling a model.
pub struct TemplateGenerationService {
    max_tool_calls: usize,
}

impl TemplateGenerationService {
    pub fn new(max_tool_calls: usize) -> Self {
        Self { max_tool_calls }
    }
}

impl Default for TemplateGenerationService {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl GenerationService for TemplateGenerationService {
    async fn run(
        &self,
        request: &GenerationRequest,
        deps: &AgentDeps,
        tools: &[Arc<dyn AgentTool>],
    ) -> Result<Value, OrchestratorError> {
        let records = gather_tool_context(tools, deps, self.max_tool_calls).await;
        let sections: Vec<Value> = records
            .iter()
            .map(|record| json!({"tool": record.tool, "content": record.content}))
            .collect();

        Ok(json!({
            "data": {
                "document_type": request.kind.long_name(),
                "title": document_title(request.kind, &deps.input),
                "model": request.model_name,
                "prompt": request.prompt,
                "history_turns": request.history.len(),
                "sections": sections,
                "input": deps.input,
                "generated_at": chrono::Utc::now().to_rfc3339(),
            }
        }))
    }
}
