//! Static capability table for the four document agents.

use crate::agent::DocumentKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    DocumentGeneration,
    KnowledgeUpdate,
    DocumentReview,
    CrossReference,
    TemplateRetrieval,
    ComplianceCheck,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::DocumentGeneration => "document_generation",
            TaskType::KnowledgeUpdate => "knowledge_update",
            TaskType::DocumentReview => "document_review",
            TaskType::CrossReference => "cross_reference",
            TaskType::TemplateRetrieval => "template_retrieval",
            TaskType::ComplianceCheck => "compliance_check",
        }
    }
}

/// What one agent understands: trigger keywords, the fields it needs, the tasks it runs.
#[derive(Debug, Clone, Serialize)]
pub struct AgentCapability {
    pub agent_type: DocumentKind,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
    pub required_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
    pub supported_tasks: &'static [TaskType],
}

impl AgentCapability {
    pub fn supports(&self, task: TaskType) -> bool {
        self.supported_tasks.contains(&task)
    }
}

static INVESTOR_SUMMARY: AgentCapability = AgentCapability {
    agent_type: DocumentKind::InvestorSummary,
    description: "Generates investor-friendly summary documents for structured products",
    keywords: &[
        "investor summary",
        "investor friendly",
        "summary document",
        "retail investor",
        "autocallable",
        "structured note",
        "investment summary",
        "product summary",
        "investor guide",
        "product overview",
        "investment overview",
    ],
    required_fields: &[
        "issuer",
        "product_name",
        "underlying_asset",
        "currency",
        "principal_amount",
        "product_type",
        "regulatory_jurisdiction",
    ],
    optional_fields: &[
        "barrier_level",
        "coupon_rate",
        "protection_level",
        "autocall_barrier",
        "target_audience",
        "risk_tolerance",
        "investment_objective",
    ],
    supported_tasks: &[
        TaskType::DocumentGeneration,
        TaskType::TemplateRetrieval,
        TaskType::ComplianceCheck,
    ],
};

static BASE_SHELF_PROSPECTUS: AgentCapability = AgentCapability {
    agent_type: DocumentKind::BaseShelfProspectus,
    description: "Generates base shelf prospectus documents for structured product programs",
    keywords: &[
        "base shelf prospectus",
        "shelf prospectus",
        "prospectus",
        "shelf program",
        "shelf amount",
        "program prospectus",
        "base prospectus",
        "shelf filing",
    ],
    required_fields: &[
        "issuer",
        "program_name",
        "shelf_amount",
        "currency",
        "regulatory_jurisdiction",
    ],
    optional_fields: &[
        "program_description",
        "shelf_period",
        "filing_date",
        "effective_date",
    ],
    supported_tasks: &[TaskType::DocumentGeneration, TaskType::ComplianceCheck],
};

static PRODUCT_SUPPLEMENT: AgentCapability = AgentCapability {
    agent_type: DocumentKind::ProductSupplement,
    description: "Generates product supplement documents for specific offerings",
    keywords: &[
        "product supplement",
        "supplement",
        "offering document",
        "supplemental prospectus",
        "offering prospectus",
        "supplemental filing",
        "offering supplement",
    ],
    required_fields: &[
        "base_prospectus_reference",
        "base_prospectus_date",
        "note_series",
        "note_description",
        "underlying_asset",
        "principal_amount",
        "issue_price",
        "currency",
        "issue_date",
        "maturity_date",
        "product_type",
        "calculation_methodology",
    ],
    optional_fields: &[
        "pricing_date",
        "barrier_level",
        "coupon_structure",
        "underlying_performance",
        "additional_terms",
    ],
    supported_tasks: &[TaskType::DocumentGeneration, TaskType::ComplianceCheck],
};

// "pricing supplement" is listed twice; both entries count toward the score.
static PRICING_SUPPLEMENT: AgentCapability = AgentCapability {
    agent_type: DocumentKind::PricingSupplement,
    description: "Generates pricing supplement documents with specific product terms",
    keywords: &[
        "pricing supplement",
        "pricing terms",
        "product terms",
        "pricing document",
        "final terms",
        "pricing sheet",
        "term sheet",
        "pricing supplement",
    ],
    required_fields: &[
        "base_prospectus_reference",
        "final_issue_price",
        "final_principal_amount",
        "currency",
        "pricing_date",
        "issue_date",
        "maturity_date",
        "settlement_date",
        "distribution_method",
        "minimum_denomination",
    ],
    optional_fields: &[
        "supplement_reference",
        "final_coupon_rate",
        "final_barrier_level",
        "underlying_initial_level",
        "underlying_price_at_pricing",
        "market_conditions",
        "volatility_at_pricing",
        "agent_discount",
        "estimated_value",
        "additional_terms",
    ],
    supported_tasks: &[TaskType::DocumentGeneration, TaskType::ComplianceCheck],
};

pub fn capability(kind: DocumentKind) -> &'static AgentCapability {
    match kind {
        DocumentKind::InvestorSummary => &INVESTOR_SUMMARY,
        DocumentKind::BaseShelfProspectus => &BASE_SHELF_PROSPECTUS,
        DocumentKind::ProductSupplement => &PRODUCT_SUPPLEMENT,
        DocumentKind::PricingSupplement => &PRICING_SUPPLEMENT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_generates_documents() {
        for kind in DocumentKind::ALL {
            let cap = capability(kind);
            assert_eq!(cap.agent_type, kind);
            assert!(cap.supports(TaskType::DocumentGeneration));
            assert!(!cap.keywords.is_empty());
        }
    }

    #[test]
    fn test_only_investor_summary_retrieves_templates() {
        let retrieving: Vec<DocumentKind> = DocumentKind::ALL
            .into_iter()
            .filter(|k| capability(*k).supports(TaskType::TemplateRetrieval))
            .collect();
        assert_eq!(retrieving, vec![DocumentKind::InvestorSummary]);
    }
}
