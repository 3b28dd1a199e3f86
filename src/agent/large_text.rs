//! Large-text agents: fill pre-written legal sections with computed variables
//! instead of driving free-form generation.

use super::base::{AgentConfig, FinancialAgent};
use super::kind::DocumentKind;
use super::profiles::display_value;
use super::templates::{builtin_sections, TemplateSection};
use crate::error::OrchestratorError;
use chrono::{Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Template variables, applied in insertion order of the layers that produce them.
pub type TemplateVariables = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub key: String,
    pub content: String,
}

/// Options for a large-text generation run.
#[derive(Debug, Clone, Default)]
pub struct LargeTextOptions {
    /// `retail` when empty.
    pub audience: String,
    pub custom_variables: TemplateVariables,
    pub enforce_placeholder_validation: bool,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([A-Z][^\[\]\n]*)\]").expect("placeholder pattern is valid"))
}

/// Replace every `[Name]` whose name is a known variable.
pub fn customize_template(template: &str, variables: &TemplateVariables) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Placeholder names still present in `text`.
pub fn unfilled_placeholders(text: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// `2024-03-15` becomes `March 15, 2024`; anything unparseable is returned as given.
pub fn format_long_date(value: &str) -> String {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => date.format("%B %d, %Y").to_string(),
        Err(_) => value.to_string(),
    }
}

/// Format with thousands separators and a fixed number of decimals.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted.clone(), None),
    };
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

fn text(input: &Value, key: &str) -> Option<String> {
    input
        .get(key)
        .map(display_value)
        .filter(|value| !value.is_empty())
}

fn text_or(input: &Value, key: &str, fallback: &str) -> String {
    text(input, key).unwrap_or_else(|| fallback.to_string())
}

fn number(input: &Value, key: &str, decimals: usize, fallback: &str) -> String {
    input
        .get(key)
        .and_then(super::input::coerce_float)
        .map(|n| format_thousands(n, decimals))
        .unwrap_or_else(|| fallback.to_string())
}

fn date(input: &Value, key: &str, fallback: &str) -> String {
    text(input, key)
        .map(|d| format_long_date(&d))
        .unwrap_or_else(|| fallback.to_string())
}

/// Variables every kind receives before its own.
pub fn base_variables() -> TemplateVariables {
    let now = Local::now();
    let mut vars = TemplateVariables::new();
    vars.insert("Document Date".into(), now.format("%B %d, %Y").to_string());
    vars.insert("Generation Date".into(), now.format("%Y-%m-%d").to_string());
    vars.insert("Document Version".into(), "1.0".into());
    vars
}

/// Variables derived from a prepared input for one kind.
pub fn kind_variables(kind: DocumentKind, input: &Value) -> TemplateVariables {
    let mut vars = TemplateVariables::new();
    let mut set = |name: &str, value: String| {
        vars.insert(name.to_string(), value);
    };
    match kind {
        DocumentKind::InvestorSummary => {
            let underlying = text_or(input, "underlying_asset", "the Underlying");
            let is_index = underlying.to_lowercase().contains("index");
            set("Note Title", text_or(input, "product_name", "Notes"));
            set("Issuer", text_or(input, "issuer", "TBD"));
            set("Underlying Asset Name", underlying);
            set(
                "Underlying Asset Type",
                if is_index {
                    "Index".to_string()
                } else {
                    "Reference Portfolio and Reference Companies".to_string()
                },
            );
            set(
                "Closing Level/Price Name",
                if is_index { "Closing Index Level" } else { "Closing Portfolio Price" }.to_string(),
            );
            set("Currency", text_or(input, "currency", "CAD"));
            set("Principal Amount", number(input, "principal_amount", 0, "TBD"));
            set("Product Type", text_or(input, "product_type", "structured"));
            set("Maturity Date", date(input, "maturity_date", "TBD"));
            set("Pricing Supplement Date", date(input, "issue_date", "TBD"));
            set(
                "Distribution Method",
                text_or(input, "distribution_method", "registered investment dealers"),
            );
        }
        DocumentKind::BaseShelfProspectus => {
            set("Program Name", text_or(input, "program_name", "Structured Note Program"));
            set("Issuer", text_or(input, "issuer", "TBD"));
            set("Shelf Amount", number(input, "shelf_amount", 0, "TBD"));
            set("Currency", text_or(input, "currency", "USD"));
            set(
                "Regulatory Jurisdiction",
                text_or(input, "regulatory_jurisdiction", "Canada"),
            );
            set("Program Duration", "3 years".to_string());
            set("Legal Structure", text_or(input, "legal_structure", "Senior unsecured notes"));
            set(
                "Business Description",
                text_or(input, "business_description", "Banking and financial services"),
            );
            set("Note Types", text_or(input, "note_types", "Notes"));
            set(
                "Distribution Methods",
                text_or(input, "distribution_methods", "registered investment dealers"),
            );
        }
        DocumentKind::ProductSupplement => {
            let series = text_or(input, "note_series", "Series TBD");
            let pricing = text(input, "pricing_date")
                .or_else(|| text(input, "issue_date"))
                .map(|d| format_long_date(&d))
                .unwrap_or_else(|| "TBD".to_string());
            set("Prospectus Supplement Date", Local::now().format("%B %d, %Y").to_string());
            set("Base Shelf Prospectus Date", date(input, "base_prospectus_date", "TBD"));
            set("New Issue Date", date(input, "issue_date", "TBD"));
            set("Note Type", text_or(input, "product_type", "Notes"));
            set("Underlying Asset Name", text_or(input, "underlying_asset", "TBD"));
            set(
                "Specific Pricing Supplement",
                format!("Pricing Supplement for {} dated {}", series, pricing),
            );
            set("Maturity Date", date(input, "maturity_date", "TBD"));
            set("Website for Note Information", "www.scotianotes.com".to_string());
            set("Principal Amount", number(input, "principal_amount", 0, "TBD"));
        }
        DocumentKind::PricingSupplement => {
            set(
                "Base Prospectus Reference",
                text_or(input, "base_prospectus_reference", "Base Shelf Prospectus"),
            );
            set(
                "Supplement Reference",
                text_or(input, "supplement_reference", "Not applicable"),
            );
            set("Final Issue Price", number(input, "final_issue_price", 2, "TBD"));
            set("Final Principal Amount", number(input, "final_principal_amount", 0, "TBD"));
            set("Currency", text_or(input, "currency", "USD"));
            set("Pricing Date", date(input, "pricing_date", "TBD"));
            set("Issue Date", date(input, "issue_date", "TBD"));
            set("Maturity Date", date(input, "maturity_date", "TBD"));
            set("Settlement Date", date(input, "settlement_date", "TBD"));
            set("Final Coupon Rate", number(input, "final_coupon_rate", 2, "Not applicable"));
            set("Final Barrier Level", number(input, "final_barrier_level", 2, "Not applicable"));
            set(
                "Market Conditions",
                text_or(input, "market_conditions", "Standard market conditions"),
            );
            set(
                "Volatility at Pricing",
                number(input, "volatility_at_pricing", 1, "To be determined"),
            );
            set("Distribution Method", text_or(input, "distribution_method", "retail"));
            set("Minimum Denomination", number(input, "minimum_denomination", 0, "TBD"));
            set("Agent Discount", number(input, "agent_discount", 2, "Not applicable"));
            set("Estimated Value", number(input, "estimated_value", 2, "To be determined"));
            set("Additional Terms", text_or(input, "additional_terms", ""));
        }
    }
    vars
}

/// Wraps a base agent with the kind's large-text sections.
pub struct LargeTextAgent {
    base: Arc<dyn FinancialAgent>,
    config: AgentConfig,
    sections: Vec<TemplateSection>,
}

impl LargeTextAgent {
    pub fn new(base: Arc<dyn FinancialAgent>, config: AgentConfig) -> Self {
        let sections = builtin_sections(base.kind());
        Self {
            base,
            config,
            sections,
        }
    }

    /// Replace the built-in sections with deployment-specific text.
    pub fn with_sections(mut self, sections: Vec<TemplateSection>) -> Self {
        self.sections = sections;
        self
    }

    pub fn base(&self) -> &Arc<dyn FinancialAgent> {
        &self.base
    }

    pub fn kind(&self) -> DocumentKind {
        self.base.kind()
    }

    pub fn agent_type(&self) -> &str {
        self.base.agent_type()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn section_keys(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.key.clone()).collect()
    }

    /// Base variables, then the kind's variables, then custom variables. Later layers win.
    pub fn prepare_template_variables(
        &self,
        input: &Value,
        audience: &str,
        custom_variables: &TemplateVariables,
    ) -> TemplateVariables {
        let mut vars = base_variables();
        vars.extend(kind_variables(self.kind(), input));
        let audience = if audience.trim().is_empty() {
            "retail"
        } else {
            audience
        };
        vars.insert("Audience".into(), audience.to_string());
        vars.extend(
            custom_variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        vars
    }

    pub async fn generate_document_with_large_templates(
        &self,
        input: &Value,
        options: &LargeTextOptions,
    ) -> Result<Vec<DocumentSection>, OrchestratorError> {
        let variables =
            self.prepare_template_variables(input, &options.audience, &options.custom_variables);
        let sections: Vec<DocumentSection> = self
            .sections
            .iter()
            .map(|section| DocumentSection {
                key: section.key.clone(),
                content: customize_template(&section.template, &variables),
            })
            .collect();

        if options.enforce_placeholder_validation {
            let mut unfilled: Vec<String> = sections
                .iter()
                .flat_map(|s| unfilled_placeholders(&s.content))
                .collect();
            unfilled.sort();
            unfilled.dedup();
            if !unfilled.is_empty() {
                return Err(OrchestratorError::generation(
                    self.agent_type(),
                    format!("Unfilled template placeholders: {}", unfilled.join(", ")),
                ));
            }
        }

        tracing::info!(
            agent_type = self.agent_type(),
            sections = sections.len(),
            "Generated document from large text templates"
        );
        Ok(sections)
    }
}
