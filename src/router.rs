//! Request routing: pick the agents a free-text request needs.
//!
//! Each kind is scored by keyword hits, the best score picks the primary
//! agent, and any other kind above [`SECONDARY_THRESHOLD`] is added as a
//! secondary agent. Field extraction runs alongside and feeds both the
//! confidence score and the agent input.

pub mod capabilities;
pub mod extraction;

pub use capabilities::{capability, AgentCapability, TaskType};
pub use extraction::{extract_information, AdditionalContext, ExtractedInformation};

use crate::agent::DocumentKind;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Below this the request has no clear match and goes to the investor summary agent.
pub const PRIMARY_FLOOR: f64 = 0.1;
pub const SECONDARY_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Serialize)]
pub struct TaskAssignment {
    pub agent_type: DocumentKind,
    pub task_type: TaskType,
    pub priority: &'static str,
    pub description: String,
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
}

impl TaskAssignment {
    fn for_agent(kind: DocumentKind, priority: &'static str) -> Self {
        let cap = capability(kind);
        Self {
            agent_type: kind,
            task_type: TaskType::DocumentGeneration,
            priority,
            description: format!("Generate {}", cap.description.to_lowercase()),
            required_fields: cap.required_fields.iter().map(|f| f.to_string()).collect(),
            optional_fields: cap.optional_fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub primary_agent: DocumentKind,
    pub secondary_agents: Vec<DocumentKind>,
    pub extracted_data: Map<String, Value>,
    pub confidence_score: f64,
    pub reasoning: String,
    pub task_decomposition: Vec<TaskAssignment>,
    pub agent_scores: BTreeMap<DocumentKind, f64>,
}

impl RoutingDecision {
    fn field_present(&self, field: &str) -> bool {
        match self.extracted_data.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub agent_type: String,
    pub action: String,
    pub capability: &'static AgentCapability,
    pub status: &'static str,
    pub supported: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmartAgentRouter;

impl SmartAgentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn get_agent_capabilities(&self) -> Vec<&'static AgentCapability> {
        DocumentKind::ALL.into_iter().map(capability).collect()
    }

    pub fn analyze_request(&self, user_request: &str) -> RoutingDecision {
        let preview: String = user_request.chars().take(100).collect();
        info!("Analyzing user request: {}...", preview);

        let extracted = extract_information(user_request);
        let scores = detect_agents(user_request);
        let primary = primary_agent(&scores);
        let secondary = secondary_agents(&scores, primary);

        let mut task_decomposition = vec![TaskAssignment::for_agent(primary, "high")];
        task_decomposition.extend(
            secondary
                .iter()
                .map(|kind| TaskAssignment::for_agent(*kind, "medium")),
        );

        let confidence_score = confidence(&scores, &extracted);
        let reasoning = reasoning(&scores, primary, &secondary, &extracted);

        RoutingDecision {
            primary_agent: primary,
            secondary_agents: secondary,
            extracted_data: extracted.to_map(),
            confidence_score,
            reasoning,
            task_decomposition,
            agent_scores: scores.into_iter().collect(),
        }
    }

    /// A decision is usable when it is confident enough and carries at least one
    /// required field for its primary agent.
    pub fn validate_routing_decision(&self, decision: &RoutingDecision) -> bool {
        if decision.confidence_score < PRIMARY_FLOOR {
            return false;
        }
        capability(decision.primary_agent)
            .required_fields
            .iter()
            .any(|field| decision.field_present(field))
    }

    pub fn suggest_missing_information(&self, decision: &RoutingDecision) -> Vec<String> {
        capability(decision.primary_agent)
            .required_fields
            .iter()
            .filter(|field| !decision.field_present(field))
            .map(|field| format!("Missing required field: {}", field))
            .collect()
    }

    /// Route straight to a named agent. Unknown agent types yield `None`.
    pub fn route_request(&self, agent_type: &str, action: &str) -> Option<RouteInfo> {
        let Some(kind) = DocumentKind::parse(agent_type) else {
            warn!("Unknown agent type: {}", agent_type);
            return None;
        };
        let cap = capability(kind);
        let supported = action == "generate_document" && cap.supports(TaskType::DocumentGeneration);
        if !supported {
            warn!("Action {} not supported by agent {}", action, agent_type);
        }
        Some(RouteInfo {
            agent_type: agent_type.to_string(),
            action: action.to_string(),
            capability: cap,
            status: if supported { "routed" } else { "unsupported_action" },
            supported,
        })
    }
}

/// Per kind: `(substring hits + 2 * whole-phrase hits) / keyword count`, in registry order.
pub fn detect_agents(user_request: &str) -> Vec<(DocumentKind, f64)> {
    let lowered = user_request.to_lowercase();
    let padded = format!(" {} ", lowered);
    DocumentKind::ALL
        .into_iter()
        .map(|kind| {
            let keywords = capability(kind).keywords;
            let score: f64 = keywords
                .iter()
                .map(|kw| {
                    let kw = kw.to_lowercase();
                    let mut hit = 0.0;
                    if lowered.contains(&kw) {
                        hit += 1.0;
                    }
                    if padded.contains(&format!(" {} ", kw)) {
                        hit += 2.0;
                    }
                    hit
                })
                .sum();
            let normalized = if keywords.is_empty() {
                0.0
            } else {
                score / keywords.len() as f64
            };
            (kind, normalized)
        })
        .collect()
}

fn max_score(scores: &[(DocumentKind, f64)]) -> f64 {
    scores.iter().map(|(_, s)| *s).fold(0.0, f64::max)
}

/// First kind holding the maximum score wins ties.
fn primary_agent(scores: &[(DocumentKind, f64)]) -> DocumentKind {
    let mut best: Option<(DocumentKind, f64)> = None;
    for (kind, score) in scores {
        if best.map_or(true, |(_, b)| *score > b) {
            best = Some((*kind, *score));
        }
    }
    match best {
        Some((kind, score)) if score >= PRIMARY_FLOOR => kind,
        _ => DocumentKind::InvestorSummary,
    }
}

fn secondary_agents(scores: &[(DocumentKind, f64)], primary: DocumentKind) -> Vec<DocumentKind> {
    scores
        .iter()
        .filter(|(kind, score)| *kind != primary && *score > SECONDARY_THRESHOLD)
        .map(|(kind, _)| *kind)
        .collect()
}

fn confidence(scores: &[(DocumentKind, f64)], extracted: &ExtractedInformation) -> f64 {
    let base = (max_score(scores) * 2.0).min(1.0);
    let boost: f64 = [
        ("issuer", 0.1),
        ("product_name", 0.1),
        ("underlying_asset", 0.1),
        ("currency", 0.05),
        ("principal_amount", 0.05),
    ]
    .iter()
    .filter(|(field, _)| extracted.has(field))
    .map(|(_, weight)| weight)
    .sum();
    (base + boost).min(1.0)
}

fn reasoning(
    scores: &[(DocumentKind, f64)],
    primary: DocumentKind,
    secondary: &[DocumentKind],
    extracted: &ExtractedInformation,
) -> String {
    let primary_score = scores
        .iter()
        .find(|(kind, _)| *kind == primary)
        .map_or(0.0, |(_, s)| *s);
    let mut parts = vec![format!(
        "Selected {} as primary agent (confidence: {:.2})",
        primary.long_name().to_uppercase(),
        primary_score
    )];
    for (field, label) in [
        ("issuer", "issuer"),
        ("product_name", "product"),
        ("underlying_asset", "underlying"),
    ] {
        if let Some(value) = extracted.get(field) {
            parts.push(format!("Detected {}: {}", label, value));
        }
    }
    if !secondary.is_empty() {
        let names: Vec<String> = secondary
            .iter()
            .map(|k| k.long_name().to_uppercase())
            .collect();
        parts.push(format!("Additional agents needed: {}", names.join(", ")));
    }
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_of(scores: &[(DocumentKind, f64)], kind: DocumentKind) -> f64 {
        scores.iter().find(|(k, _)| *k == kind).map(|(_, s)| *s).unwrap()
    }

    #[test]
    fn test_whole_phrase_hits_weigh_triple() {
        let scores = detect_agents("Please draft a shelf prospectus");
        // "shelf prospectus" and "prospectus" both hit as substrings and whole phrases.
        let expected = (3.0 + 3.0) / 8.0;
        assert!((score_of(&scores, DocumentKind::BaseShelfProspectus) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_keywords_falls_back_to_investor_summary() {
        let router = SmartAgentRouter::new();
        let decision = router.analyze_request("hello there");
        assert_eq!(decision.primary_agent, DocumentKind::InvestorSummary);
        assert!(decision.secondary_agents.is_empty());
        assert_eq!(decision.confidence_score, 0.0);
        assert!(decision
            .reasoning
            .starts_with("Selected INVESTOR_SUMMARY as primary agent (confidence: 0.00)"));
    }

    #[test]
    fn test_pricing_supplement_request() {
        let router = SmartAgentRouter::new();
        let decision = router.analyze_request("Generate a pricing supplement and term sheet");
        assert_eq!(decision.primary_agent, DocumentKind::PricingSupplement);
        assert_eq!(decision.task_decomposition[0].priority, "high");
        assert_eq!(
            decision.task_decomposition[0].description,
            "Generate generates pricing supplement documents with specific product terms"
        );
    }

    #[test]
    fn test_multi_agent_request_lists_secondary() {
        let router = SmartAgentRouter::new();
        let decision = router.analyze_request(
            "Need an investor summary for the autocallable structured note and a base shelf prospectus under the shelf program with a shelf filing",
        );
        assert_eq!(decision.primary_agent, DocumentKind::BaseShelfProspectus);
        assert_eq!(decision.secondary_agents, vec![DocumentKind::InvestorSummary]);
        assert!(decision.reasoning.contains("Additional agents needed: INVESTOR_SUMMARY"));
        assert_eq!(decision.task_decomposition.len(), 2);
        assert_eq!(decision.task_decomposition[1].priority, "medium");
    }

    #[test]
    fn test_confidence_boosts_are_capped() {
        let router = SmartAgentRouter::new();
        let decision = router.analyze_request(
            "investor summary issued by Acme Bank on the S&P 500 with $1,000,000 USD",
        );
        assert!(decision.confidence_score <= 1.0);
        assert!(decision.confidence_score > 0.5);
        assert!(router.validate_routing_decision(&decision));
    }

    #[test]
    fn test_suggest_missing_information() {
        let router = SmartAgentRouter::new();
        let decision = router.analyze_request("investor summary");
        let missing = router.suggest_missing_information(&decision);
        assert!(missing.contains(&"Missing required field: issuer".to_string()));
        assert!(!router.validate_routing_decision(&decision));
    }

    #[test]
    fn test_route_request() {
        let router = SmartAgentRouter::new();
        let routed = router.route_request("investor_summary", "generate_document").unwrap();
        assert_eq!(routed.status, "routed");
        assert!(routed.supported);

        let unsupported = router.route_request("prs", "translate").unwrap();
        assert_eq!(unsupported.status, "unsupported_action");
        assert!(!unsupported.supported);

        assert!(router.route_request("nope", "generate_document").is_none());
    }
}
