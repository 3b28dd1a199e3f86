//! Tools registered on every document agent.
//!
//! Two common tools (own-domain retrieval and cross-domain search) plus the
//! kind's domain retrieval tools from its [`DocumentProfile`](super::profiles::DocumentProfile).
//! Tools never fail: errors come back as text the generation step can read.

use super::base::AgentDeps;
use super::kind::{normalize_agent_type, DocumentKind};
use super::profiles::{display_value, ToolSpec};
use crate::knowledge::{QueryMode, QueryParams};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub type ToolArgs = Map<String, Value>;

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, deps: &AgentDeps, args: &ToolArgs) -> String;
}

fn arg_str<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn arg_mode(args: &ToolArgs) -> QueryMode {
    arg_str(args, "mode")
        .and_then(|m| m.parse().ok())
        .unwrap_or_default()
}

fn arg_top_k(args: &ToolArgs, default: usize) -> usize {
    args.get("top_k")
        .and_then(Value::as_u64)
        .map(|k| k as usize)
        .unwrap_or(default)
}

/// Retrieve from the agent's own domain.
pub struct RetrieveKnowledgeTool;

#[async_trait]
impl AgentTool for RetrieveKnowledgeTool {
    fn name(&self) -> &str {
        "retrieve_knowledge"
    }

    fn description(&self) -> &str {
        "Retrieve knowledge from the agent's domain-specific knowledge base."
    }

    async fn call(&self, deps: &AgentDeps, args: &ToolArgs) -> String {
        let query = arg_str(args, "query").unwrap_or_default();
        let params = QueryParams::new(arg_mode(args), arg_top_k(args, 5));
        match deps
            .knowledge
            .query_domain(&deps.agent_type, query, params)
            .await
        {
            Ok(result) => result,
            Err(e) => format!("Error retrieving knowledge: {}", e),
        }
    }
}

/// Search every other initialized domain for cross-references.
pub struct CrossReferenceSearchTool;

#[async_trait]
impl AgentTool for CrossReferenceSearchTool {
    fn name(&self) -> &str {
        "cross_reference_search"
    }

    fn description(&self) -> &str {
        "Search across multiple knowledge domains for cross-references."
    }

    async fn call(&self, deps: &AgentDeps, args: &ToolArgs) -> String {
        let query = arg_str(args, "query").unwrap_or_default();
        let domains: Vec<String> = match args.get("domains").and_then(Value::as_array) {
            Some(list) => list
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => deps.knowledge.list_domains(),
        };
        let own = normalize_agent_type(&deps.agent_type);
        let domains: Vec<String> = domains
            .into_iter()
            .filter(|d| normalize_agent_type(d) != own)
            .collect();
        if domains.is_empty() {
            return "No other domains available for cross-reference search.".to_string();
        }

        let params = QueryParams::new(arg_mode(args), 5);
        let results = deps.knowledge.cross_domain_query(&domains, query, params).await;
        let formatted: Vec<String> = results
            .iter()
            .filter(|(domain, _)| domain.as_str() != "error")
            .map(|(domain, result)| format!("**{} Domain:**\n{}\n", domain.to_uppercase(), result))
            .collect();
        if formatted.is_empty() {
            "No relevant cross-references found.".to_string()
        } else {
            formatted.join("\n")
        }
    }
}

/// A profile-defined retrieval against the agent's own store.
pub struct DomainQueryTool {
    spec: &'static ToolSpec,
}

impl DomainQueryTool {
    pub fn new(spec: &'static ToolSpec) -> Self {
        Self { spec }
    }

    pub fn query_for(&self, args: &ToolArgs) -> String {
        fill_query_template(self.spec.query_template, args)
    }
}

#[async_trait]
impl AgentTool for DomainQueryTool {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn description(&self) -> &str {
        self.spec.description
    }

    async fn call(&self, deps: &AgentDeps, args: &ToolArgs) -> String {
        let query = self.query_for(args);
        let params = QueryParams::new(QueryMode::Mix, self.spec.top_k);
        match deps.store.query(&query, &params).await {
            Ok(result) => format!("{}\n{}", self.spec.heading, result),
            Err(e) => format!("Error retrieving {}: {}", self.spec.subject, e),
        }
    }
}

/// Substitute `{name}` placeholders from `args`, then collapse whitespace.
pub fn fill_query_template(template: &str, args: &ToolArgs) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        match rest[start..].find('}') {
            Some(end) => {
                let key = &rest[start + 1..start + end];
                if let Some(value) = args.get(key) {
                    out.push_str(&display_value(value));
                }
                rest = &rest[start + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the full tool set for a kind: common tools first, then domain tools.
pub fn tools_for(kind: DocumentKind) -> Vec<Arc<dyn AgentTool>> {
    let mut tools: Vec<Arc<dyn AgentTool>> = vec![
        Arc::new(RetrieveKnowledgeTool),
        Arc::new(CrossReferenceSearchTool),
    ];
    let profile = super::profiles::DocumentProfile::for_kind(kind);
    tools.extend(
        profile
            .tools
            .iter()
            .map(|spec| Arc::new(DomainQueryTool::new(spec)) as Arc<dyn AgentTool>),
    );
    tools
}

/// Derive tool call arguments from a document input.
pub fn tool_arguments(kind: DocumentKind, input: &Value) -> ToolArgs {
    let text = |key: &str| input.get(key).map(display_value).unwrap_or_default();
    let mut args = ToolArgs::new();
    let mut put = |key: &str, value: String| {
        args.insert(key.to_string(), Value::String(value));
    };

    let query = match kind {
        DocumentKind::InvestorSummary => text("product_name"),
        DocumentKind::BaseShelfProspectus => text("program_name"),
        DocumentKind::ProductSupplement => text("note_description"),
        DocumentKind::PricingSupplement => text("base_prospectus_reference"),
    };
    put("query", format!("{} {}", kind.title().to_lowercase(), query));
    put("document_type", kind.title().to_lowercase());
    put("product_type", text("product_type"));
    put("underlying_asset", text("underlying_asset"));
    put("issuer", text("issuer"));
    put("jurisdiction", {
        let j = text("regulatory_jurisdiction");
        if j.is_empty() {
            "Canada".to_string()
        } else {
            j
        }
    });
    put("audience", text("target_audience"));
    put("reference", text("base_prospectus_reference"));
    put("pricing_date", text("pricing_date"));
    put("note_types", text("note_types"));
    put("legal_structure", text("legal_structure"));
    put("section_keywords", "terms definitions risk factors".to_string());
    put("focus", "payment at maturity".to_string());
    put("risk_categories", "market credit liquidity".to_string());
    put("duration_years", "3".to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fill_query_template_collapses_missing() {
        let filled = fill_query_template(
            "investor summary template {product_type} {query}",
            &args(json!({"query": "coupon"})),
        );
        assert_eq!(filled, "investor summary template coupon");
    }

    #[test]
    fn test_fill_query_template_keeps_unterminated_brace() {
        let filled = fill_query_template("a {b", &ToolArgs::new());
        assert_eq!(filled, "a {b");
    }

    #[test]
    fn test_tools_for_lists_common_tools_first() {
        let tools = tools_for(DocumentKind::ProductSupplement);
        assert_eq!(tools[0].name(), "retrieve_knowledge");
        assert_eq!(tools[1].name(), "cross_reference_search");
        assert_eq!(tools.len(), 2 + 7);
    }

    #[test]
    fn test_tool_arguments_default_jurisdiction() {
        let args = tool_arguments(
            DocumentKind::PricingSupplement,
            &json!({"base_prospectus_reference": "BSP 2024"}),
        );
        assert_eq!(args["jurisdiction"], json!("Canada"));
        assert_eq!(args["reference"], json!("BSP 2024"));
    }
}
