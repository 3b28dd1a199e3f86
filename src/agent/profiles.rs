//! Per-kind agent profiles: system instructions, user prompt layout and the
//! domain retrieval tools each document agent registers.

use super::kind::DocumentKind;
use serde_json::Value;

/// A knowledge retrieval tool bound to the agent's own store.
///
/// `query_template` placeholders (`{name}`) are filled from the call
/// arguments; missing arguments become empty and whitespace is collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub query_template: &'static str,
    pub top_k: usize,
    pub heading: &'static str,
    /// Used in the failure text: `Error retrieving {subject}: {error}`.
    pub subject: &'static str,
}

#[derive(Debug)]
pub struct DocumentProfile {
    pub kind: DocumentKind,
    pub instructions: &'static str,
    pub prompt_intro: &'static str,
    /// Input fields listed in the user prompt, in order.
    pub prompt_fields: &'static [&'static str],
    pub tools: &'static [ToolSpec],
}

impl DocumentProfile {
    pub fn for_kind(kind: DocumentKind) -> &'static DocumentProfile {
        match kind {
            DocumentKind::InvestorSummary => &ISM_PROFILE,
            DocumentKind::BaseShelfProspectus => &BSP_PROFILE,
            DocumentKind::ProductSupplement => &PDS_PROFILE,
            DocumentKind::PricingSupplement => &PRS_PROFILE,
        }
    }

    pub fn tool(&self, name: &str) -> Option<&'static ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Format the single user-facing instruction prompt for an input.
    pub fn format_prompt(&self, input: &Value) -> String {
        let mut prompt = String::from(self.prompt_intro);
        prompt.push_str("\n\n## Input\n");
        for field in self.prompt_fields {
            let value = input
                .get(*field)
                .map(display_value)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "N/A".to_string());
            prompt.push_str(&format!("- {}: {}\n", field_label(field), value));
        }
        if let Some(request) = input.get("request").and_then(Value::as_str) {
            prompt.push_str(&format!("\n## Original Request\n{}\n", request));
        }
        prompt
    }
}

/// `principal_amount` becomes `Principal Amount`.
pub fn field_label(field: &str) -> String {
    field
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a JSON value the way it should read in a prompt.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

static ISM_PROFILE: DocumentProfile = DocumentProfile {
    kind: DocumentKind::InvestorSummary,
    instructions: "You are an expert at writing investor summary documents for structured notes. \
Explain product mechanics, payoff scenarios and risks in plain language suitable for the target \
audience. Use the retrieval tools to ground every term in the knowledge base, keep regulatory \
disclaimers intact, and never invent figures that are not present in the input.",
    prompt_intro: "Generate a comprehensive investor summary for the following structured product. \
The document must explain key terms, illustrate scenarios and disclose principal risks.",
    prompt_fields: &[
        "issuer",
        "product_name",
        "underlying_asset",
        "currency",
        "principal_amount",
        "issue_date",
        "maturity_date",
        "product_type",
        "barrier_level",
        "coupon_rate",
        "protection_level",
        "autocall_barrier",
        "target_audience",
        "risk_tolerance",
        "investment_objective",
        "regulatory_jurisdiction",
        "distribution_method",
    ],
    tools: &[
        ToolSpec {
            name: "retrieve_investor_templates",
            description: "Retrieve investor summary templates for a product type.",
            query_template: "investor summary template {product_type} {query}",
            top_k: 8,
            heading: "**Template Information:**",
            subject: "templates",
        },
        ToolSpec {
            name: "retrieve_product_information",
            description: "Retrieve product mechanics for the underlying asset.",
            query_template: "{product_type} {underlying_asset} product features mechanics",
            top_k: 10,
            heading: "**Product Information:**",
            subject: "product information",
        },
        ToolSpec {
            name: "retrieve_risk_explanations",
            description: "Retrieve plain-language risk explanations.",
            query_template: "risk explanation {product_type} {audience} plain language examples",
            top_k: 8,
            heading: "**Risk Information:**",
            subject: "risk explanations",
        },
        ToolSpec {
            name: "retrieve_scenario_examples",
            description: "Retrieve payoff scenario examples.",
            query_template: "{product_type} scenario examples {underlying_asset} payoff illustration",
            top_k: 6,
            heading: "**Scenario Examples:**",
            subject: "scenario examples",
        },
        ToolSpec {
            name: "retrieve_regulatory_content",
            description: "Retrieve mandatory regulatory disclosure language.",
            query_template: "regulatory disclosure {jurisdiction} {document_type} requirements mandatory language",
            top_k: 5,
            heading: "**Regulatory Requirements:**",
            subject: "regulatory content",
        },
        ToolSpec {
            name: "retrieve_comparable_products",
            description: "Retrieve comparable product summaries.",
            query_template: "comparable {product_type} products {underlying_asset} {issuer}",
            top_k: 6,
            heading: "**Comparable Products:**",
            subject: "comparable products",
        },
    ],
};

static BSP_PROFILE: DocumentProfile = DocumentProfile {
    kind: DocumentKind::BaseShelfProspectus,
    instructions: "You are a securities lawyer drafting a base shelf prospectus for a structured \
note program. Follow the jurisdiction's shelf prospectus requirements, use precise legal \
language, and draw legal templates, risk factors and distribution provisions from the knowledge \
base rather than paraphrasing from memory.",
    prompt_intro: "Generate a comprehensive Base Shelf Prospectus for the following program. The \
document must describe the program, the notes, the plan of distribution and the risk factors.",
    prompt_fields: &[
        "issuer",
        "program_name",
        "shelf_amount",
        "currency",
        "regulatory_jurisdiction",
        "legal_structure",
        "business_description",
        "note_types",
        "distribution_methods",
        "program_description",
        "shelf_period",
        "filing_date",
        "effective_date",
    ],
    tools: &[
        ToolSpec {
            name: "retrieve_legal_templates",
            description: "Retrieve legal templates for the jurisdiction.",
            query_template: "legal template {jurisdiction} {query}",
            top_k: 8,
            heading: "**Legal Template Information:**",
            subject: "legal templates",
        },
        ToolSpec {
            name: "retrieve_regulatory_requirements",
            description: "Retrieve shelf prospectus regulatory requirements.",
            query_template: "regulatory requirements {jurisdiction} {document_type} compliance",
            top_k: 10,
            heading: "**Regulatory Requirements:**",
            subject: "regulatory requirements",
        },
        ToolSpec {
            name: "retrieve_issuer_information",
            description: "Retrieve issuer business and corporate information.",
            query_template: "issuer information {issuer} business description corporate structure",
            top_k: 8,
            heading: "**Issuer Information:**",
            subject: "issuer information",
        },
        ToolSpec {
            name: "retrieve_program_structure_examples",
            description: "Retrieve example program structures.",
            query_template: "shelf program structure {note_types} {jurisdiction} examples",
            top_k: 6,
            heading: "**Program Structure Examples:**",
            subject: "program structure examples",
        },
        ToolSpec {
            name: "retrieve_risk_factor_templates",
            description: "Retrieve risk factor templates.",
            query_template: "risk factors {risk_categories} {jurisdiction} legal templates",
            top_k: 8,
            heading: "**Risk Factor Templates:**",
            subject: "risk factor templates",
        },
        ToolSpec {
            name: "retrieve_legal_terms_examples",
            description: "Retrieve examples of legal note terms.",
            query_template: "legal terms {legal_structure} notes {jurisdiction} examples",
            top_k: 6,
            heading: "**Legal Terms Examples:**",
            subject: "legal terms examples",
        },
        ToolSpec {
            name: "retrieve_dealer_agreements",
            description: "Retrieve dealer and underwriting provisions.",
            query_template: "{jurisdiction} {focus} base shelf prospectus underwriting syndicate provisions",
            top_k: 6,
            heading: "**Dealer/Underwriting Agreements:**",
            subject: "dealer agreements",
        },
        ToolSpec {
            name: "retrieve_use_of_proceeds_examples",
            description: "Retrieve use of proceeds language.",
            query_template: "use of proceeds {issuer} {jurisdiction} general corporate purposes examples",
            top_k: 6,
            heading: "**Use of Proceeds Examples:**",
            subject: "use of proceeds",
        },
        ToolSpec {
            name: "retrieve_shelf_program_requirements",
            description: "Retrieve shelf registration duration and renewal requirements.",
            query_template: "{jurisdiction} shelf registration program requirements duration {duration_years} renewal disclosure",
            top_k: 5,
            heading: "**Shelf Program Requirements:**",
            subject: "shelf program requirements",
        },
    ],
};

static PDS_PROFILE: DocumentProfile = DocumentProfile {
    kind: DocumentKind::ProductSupplement,
    instructions: "You are drafting a prospectus supplement that must be read together with a \
base shelf prospectus. Describe the specific notes, their calculation methodology and the \
supplemental risks, cross-referencing the base prospectus wherever its terms apply.",
    prompt_intro: "Generate a comprehensive Product Supplement for the following notes. The \
document must cross-reference the Base Prospectus and describe the specific terms and risks.",
    prompt_fields: &[
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
        "pricing_date",
        "product_type",
        "barrier_level",
        "coupon_structure",
        "calculation_methodology",
        "additional_terms",
    ],
    tools: &[
        ToolSpec {
            name: "retrieve_base_prospectus",
            description: "Retrieve key sections of the base prospectus.",
            query_template: "base prospectus {reference} {section_keywords} key sections",
            top_k: 8,
            heading: "**Base Prospectus Content:**",
            subject: "base prospectus",
        },
        ToolSpec {
            name: "retrieve_note_specific_terms",
            description: "Retrieve term examples for the note type.",
            query_template: "{product_type} prospectus supplement {underlying_asset} {focus} terms examples",
            top_k: 10,
            heading: "**Note-Specific Terms:**",
            subject: "note-specific terms",
        },
        ToolSpec {
            name: "retrieve_regulatory_requirements",
            description: "Retrieve mandatory regulatory disclosure language.",
            query_template: "regulatory disclosure {jurisdiction} {document_type} requirements mandatory language",
            top_k: 6,
            heading: "**Regulatory Requirements:**",
            subject: "regulatory requirements",
        },
        ToolSpec {
            name: "retrieve_risk_factors",
            description: "Retrieve supplement risk factor language.",
            query_template: "risk factors {product_type} supplement {underlying_asset} examples language",
            top_k: 8,
            heading: "**Risk Factors:**",
            subject: "risk factors",
        },
        ToolSpec {
            name: "retrieve_supplement_purpose_templates",
            description: "Retrieve supplement purpose language.",
            query_template: "{jurisdiction} prospectus supplement purpose language relationship to base prospectus template",
            top_k: 6,
            heading: "**Supplement Purpose Templates:**",
            subject: "supplement purpose templates",
        },
        ToolSpec {
            name: "retrieve_calculation_agent_determinations",
            description: "Retrieve calculation agent determination language.",
            query_template: "{product_type} {focus} prospectus supplement language adjustments methodology",
            top_k: 6,
            heading: "**Calculation Agent Determinations:**",
            subject: "calculation agent determinations",
        },
        ToolSpec {
            name: "retrieve_risk_introductions",
            description: "Retrieve risk introduction paragraphs.",
            query_template: "{jurisdiction} {product_type} prospectus supplement risk introduction paragraph examples",
            top_k: 5,
            heading: "**Risk Introductions:**",
            subject: "risk introductions",
        },
    ],
};

static PRS_PROFILE: DocumentProfile = DocumentProfile {
    kind: DocumentKind::PricingSupplement,
    instructions: "You are drafting a pricing supplement that records the final terms of a note \
issuance. Present final terms, pricing methodology, market data at pricing, settlement details \
and regulatory notices, and cross-reference the base prospectus for defined terms.",
    prompt_intro: "Generate a comprehensive Pricing Supplement for the following issuance. This \
document must present final terms, pricing methodology, market data at pricing, settlement \
instructions, and regulatory notices, and must cross-reference the Base Prospectus.",
    prompt_fields: &[
        "base_prospectus_reference",
        "supplement_reference",
        "final_issue_price",
        "final_principal_amount",
        "currency",
        "pricing_date",
        "issue_date",
        "maturity_date",
        "settlement_date",
        "final_coupon_rate",
        "final_barrier_level",
        "underlying_initial_level",
        "underlying_price_at_pricing",
        "market_conditions",
        "volatility_at_pricing",
        "distribution_method",
        "minimum_denomination",
        "agent_discount",
        "estimated_value",
        "additional_terms",
    ],
    tools: &[
        ToolSpec {
            name: "retrieve_base_prospectus",
            description: "Retrieve key sections of the base prospectus.",
            query_template: "base prospectus {reference} {section_keywords} key sections",
            top_k: 8,
            heading: "**Base Prospectus Content:**",
            subject: "base prospectus",
        },
        ToolSpec {
            name: "retrieve_pricing_methodology",
            description: "Retrieve pricing methodology disclosure examples.",
            query_template: "{product_type} pricing methodology {underlying_asset} examples disclosure",
            top_k: 10,
            heading: "**Pricing Methodology:**",
            subject: "pricing methodology",
        },
        ToolSpec {
            name: "retrieve_market_data",
            description: "Retrieve market context around the pricing date.",
            query_template: "{underlying_asset} market data around {pricing_date} pricing context",
            top_k: 6,
            heading: "**Market Data at Pricing:**",
            subject: "market data",
        },
        ToolSpec {
            name: "retrieve_regulatory_pricing_disclosures",
            description: "Retrieve mandatory pricing disclosure language.",
            query_template: "regulatory pricing disclosures {jurisdiction} pricing supplement mandatory language",
            top_k: 5,
            heading: "**Regulatory Pricing Disclosures:**",
            subject: "regulatory disclosures",
        },
        ToolSpec {
            name: "retrieve_final_terms_templates",
            description: "Retrieve final terms table templates.",
            query_template: "{product_type} pricing supplement final terms table template {audience}",
            top_k: 8,
            heading: "**Final Terms Templates:**",
            subject: "final terms templates",
        },
        ToolSpec {
            name: "retrieve_estimated_value_language",
            description: "Retrieve estimated value disclosure language.",
            query_template: "{jurisdiction} pricing supplement estimated value disclosure standard language",
            top_k: 6,
            heading: "**Estimated Value Language:**",
            subject: "estimated value language",
        },
        ToolSpec {
            name: "retrieve_distribution_and_fees_templates",
            description: "Retrieve distribution, denomination and fee templates.",
            query_template: "{jurisdiction} pricing supplement distribution selling restrictions denominations fees templates",
            top_k: 6,
            heading: "**Distribution & Fees Templates:**",
            subject: "distribution and fees templates",
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("final_issue_price"), "Final Issue Price");
        assert_eq!(field_label("currency"), "Currency");
    }

    #[test]
    fn test_prompt_marks_missing_fields() {
        let profile = DocumentProfile::for_kind(DocumentKind::PricingSupplement);
        let prompt = profile.format_prompt(&json!({"currency": "USD", "final_issue_price": 100.0}));
        assert!(prompt.contains("- Currency: USD"));
        assert!(prompt.contains("- Final Issue Price: 100.0"));
        assert!(prompt.contains("- Settlement Date: N/A"));
    }

    #[test]
    fn test_tool_tables() {
        let prs = DocumentProfile::for_kind(DocumentKind::PricingSupplement);
        let tool = prs.tool("retrieve_base_prospectus").unwrap();
        assert_eq!(tool.top_k, 8);
        assert_eq!(tool.heading, "**Base Prospectus Content:**");

        let bsp = DocumentProfile::for_kind(DocumentKind::BaseShelfProspectus);
        assert_eq!(bsp.tools.len(), 9);
        let ism = DocumentProfile::for_kind(DocumentKind::InvestorSummary);
        assert_eq!(ism.tools.len(), 6);
    }

    #[test]
    fn test_display_value_joins_arrays() {
        assert_eq!(display_value(&json!(["a", "b"])), "a, b");
        assert_eq!(display_value(&json!(null)), "");
    }
}
