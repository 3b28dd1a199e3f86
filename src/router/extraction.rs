//! Field extraction from free-text requests.
//!
//! Each field has one case-insensitive pattern whose first group is the value.
//! The first match in the request wins. Issuer, product and underlying
//! patterns stop lazily at a terminator word so that "issued by Acme Bank
//! on the S&P 500" yields `Acme Bank` and `S&P 500`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const NAME_TERMINATORS: &str = r"on|with|for|program|note|security|autocallable|barrier|prospectus|supplement|pricing|shelf|offering|product|amount|jurisdiction|currency|million|billion|thousand|USD|EUR|GBP|CAD|AUD|JPY|\$|%|on the|with \$|for \$";
const ASSET_TERMINATORS: &str = r"with|for|program|note|security|autocallable|barrier|prospectus|supplement|pricing|shelf|offering|product|amount|jurisdiction|currency|million|billion|thousand|USD|EUR|GBP|CAD|AUD|JPY|\$|%|with \$|for \$";
const DATE: &str = r"(\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|[A-Za-z]+\s+\d{1,2},\s*\d{4})";

const NAME_SUFFIXES: [&str; 6] = [" on", " with", " for", " program", " note", " security"];
const ASSET_SUFFIXES: [&str; 5] = [" with", " for", " program", " note", " security"];
const PRODUCT_TYPES: [&str; 5] = ["autocallable", "barrier", "reverse convertible", "step-up", "memory"];

fn field_sources() -> Vec<(&'static str, String)> {
    vec![
        (
            "issuer",
            format!(
                r"(?:by|from|issued by|company|firm|bank)\s+([A-Za-z\s&.,]+?)(?:\s+(?:{}))",
                NAME_TERMINATORS
            ),
        ),
        (
            "product_name",
            format!(
                r"(?:product|note|security|investment|program|offering)\s*(?:name|title)?\s*[:\-]?\s*([A-Za-z0-9\s&.,\-]+?)(?:\s+(?:{}))",
                NAME_TERMINATORS
            ),
        ),
        (
            "underlying_asset",
            format!(
                r"(?:on|underlying|asset|index|reference)\s+(?:the\s+)?([A-Za-z0-9\s&.,]+?)(?:\s+(?:{}))",
                ASSET_TERMINATORS
            ),
        ),
        (
            "currency",
            r"(?:currency|denomination|USD|EUR|GBP|CAD|AUD|JPY)\s*[:\-]?\s*(USD|EUR|GBP|CAD|AUD|JPY)".to_string(),
        ),
        (
            "principal_amount",
            r"\$?([0-9,]+(?:\.\d{2})?)\s*(?:million|billion|thousand)?\s*(USD|EUR|GBP|CAD|AUD|JPY)?".to_string(),
        ),
        (
            "product_type",
            r"(?:type|structure|autocallable|barrier|reverse convertible|step-up|memory)\s*[:\-]?\s*(autocallable|barrier|reverse convertible|step-up|memory)".to_string(),
        ),
        (
            "regulatory_jurisdiction",
            r"(?:jurisdiction|regulatory|compliance|US|EU|UK|Canada|Australia|Japan)\s*[:\-]?\s*(US|EU|UK|Canada|Australia|Japan)".to_string(),
        ),
        (
            "target_audience",
            r"(?:audience|investor|target|retail|institutional|accredited|qualified)\s*[:\-]?\s*(retail|institutional|accredited|qualified)".to_string(),
        ),
        (
            "document_type",
            r"(?:document|documentation|report|summary|prospectus|supplement|pricing)\s*[:\-]?\s*(summary|prospectus|supplement|pricing)".to_string(),
        ),
        (
            "base_prospectus_reference",
            r"(?:base\s*(?:shelf\s*)?prospectus(?:\s*reference)?|base\s*prospectus)\s*[:\-]?\s*([A-Za-z0-9\s,&().\-]+)".to_string(),
        ),
        (
            "base_prospectus_date",
            format!(r"(?:base\s*(?:shelf\s*)?prospectus\s*date)\s*[:\-]?\s*{}", DATE),
        ),
        ("note_series", r"(?:note\s*series|series)\s*[:\-]?\s*([A-Za-z0-9\-\s]+)".to_string()),
        (
            "note_description",
            r"(?:note\s*description|description)\s*[:\-]?\s*([A-Za-z0-9\s,&().\-]+)".to_string(),
        ),
        ("issue_price", r"(?:issue\s*price)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)\s*%".to_string()),
        ("issue_date", format!(r"(?:issue\s*date)\s*[:\-]?\s*{}", DATE)),
        ("maturity_date", format!(r"(?:maturity\s*date)\s*[:\-]?\s*{}", DATE)),
        ("pricing_date", format!(r"(?:pricing\s*date)\s*[:\-]?\s*{}", DATE)),
        ("barrier_level", r"(?:barrier\s*(?:level)?)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)\s*%".to_string()),
        (
            "coupon_structure",
            r"(?:coupon\s*(?:structure|payment\s*structure))\s*[:\-]?\s*([^\n]+)".to_string(),
        ),
        ("calculation_methodology", r"(?:calculation\s*methodology)\s*[:\-]?\s*([^\n]+)".to_string()),
        (
            "underlying_performance",
            r"(?:underlying\s*performance|performance\s*measure)\s*[:\-]?\s*([^\n]+)".to_string(),
        ),
        (
            "final_issue_price",
            r"(?:final\s*issue\s*price)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)\s*%".to_string(),
        ),
        (
            "final_principal_amount",
            r"(?:final\s*principal\s*amount)\s*[:\-]?\s*\$?([0-9,]+(?:\.[0-9]+)?)".to_string(),
        ),
        ("settlement_date", format!(r"(?:settlement\s*date)\s*[:\-]?\s*{}", DATE)),
        (
            "final_coupon_rate",
            r"(?:final\s*coupon\s*rate)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)\s*%".to_string(),
        ),
        (
            "final_barrier_level",
            r"(?:final\s*barrier\s*level)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)\s*%".to_string(),
        ),
        (
            "underlying_initial_level",
            r"(?:underlying\s*initial\s*level)\s*[:\-]?\s*([0-9,]+(?:\.[0-9]+)?)".to_string(),
        ),
        (
            "underlying_price_at_pricing",
            r"(?:underlying\s*price\s*at\s*pricing)\s*[:\-]?\s*([0-9,]+(?:\.[0-9]+)?)".to_string(),
        ),
        ("market_conditions", r"(?:market\s*conditions)\s*[:\-]?\s*([^\n]+)".to_string()),
        (
            "volatility_at_pricing",
            r"(?:volatility\s*at\s*pricing|implied\s*volatility)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)".to_string(),
        ),
        ("distribution_method", r"(?:distribution\s*method)\s*[:\-]?\s*([^\n]+)".to_string()),
        (
            "minimum_denomination",
            r"(?:minimum\s*denomination)\s*[:\-]?\s*\$?([0-9,]+(?:\.[0-9]+)?)".to_string(),
        ),
        ("agent_discount", r"(?:agent\s*discount)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)".to_string()),
        ("estimated_value", r"(?:estimated\s*value)\s*[:\-]?\s*([0-9]+(?:\.[0-9]+)?)".to_string()),
        ("supplement_reference", r"(?:supplement\s*reference)\s*[:\-]?\s*([^\n]+)".to_string()),
    ]
}

fn field_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        field_sources()
            .into_iter()
            .map(|(field, source)| {
                let regex = Regex::new(&format!("(?i){}", source))
                    .expect("field extraction patterns are valid");
                (field, regex)
            })
            .collect()
    })
}

fn static_pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("context pattern is valid"))
}

fn date_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    static_pattern(&CELL, r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2})")
}

fn percent_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    static_pattern(&CELL, r"(\d+(?:\.\d+)?)\s*%")
}

fn money_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    static_pattern(&CELL, r"\$?(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)")
}

fn currency_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    static_pattern(&CELL, r"(?i)(USD|EUR|GBP|CAD|AUD|JPY)")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dates: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub percentages: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monetary_amounts: Vec<f64>,
}

impl AdditionalContext {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.percentages.is_empty() && self.monetary_amounts.is_empty()
    }
}

/// Values pulled out of a request, keyed by input field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInformation {
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub additional_context: AdditionalContext,
}

impl ExtractedInformation {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Flat agent input: every extracted field as a string, plus `additional_context`
    /// when anything was found.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if !self.additional_context.is_empty() {
            if let Ok(context) = serde_json::to_value(&self.additional_context) {
                map.insert("additional_context".to_string(), context);
            }
        }
        map
    }

    fn set(&mut self, field: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.fields.remove(field);
        } else {
            self.fields.insert(field.to_string(), value.to_string());
        }
    }
}

pub fn extract_information(request: &str) -> ExtractedInformation {
    let mut extracted = ExtractedInformation::default();
    for (field, pattern) in field_patterns() {
        if let Some(value) = pattern.captures(request).and_then(|c| c.get(1)) {
            extracted.set(field, value.as_str());
        }
    }
    extracted.additional_context = extract_additional_context(request);
    post_process(&mut extracted, request);
    extracted
}

pub fn extract_additional_context(request: &str) -> AdditionalContext {
    let group = |re: &Regex| -> Vec<String> {
        re.captures_iter(request)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    };
    AdditionalContext {
        dates: group(date_pattern()),
        percentages: group(percent_pattern())
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect(),
        monetary_amounts: group(money_pattern())
            .iter()
            .filter_map(|a| a.replace(',', "").parse().ok())
            .collect(),
    }
}

fn trim_suffixes(value: &str, suffixes: &[&str]) -> String {
    let mut value = value.trim();
    for suffix in suffixes {
        if let Some(stripped) = value.strip_suffix(suffix) {
            value = stripped;
        }
    }
    value.trim().to_string()
}

fn post_process(extracted: &mut ExtractedInformation, request: &str) {
    for field in ["issuer", "product_name"] {
        if let Some(value) = extracted.get(field).map(|v| trim_suffixes(v, &NAME_SUFFIXES)) {
            extracted.set(field, &value);
        }
    }
    if let Some(value) = extracted
        .get("underlying_asset")
        .map(|v| trim_suffixes(v, &ASSET_SUFFIXES))
    {
        extracted.set("underlying_asset", &value);
    }

    if extracted.has("principal_amount") && !extracted.has("currency") {
        if let Some(m) = currency_pattern().captures(request).and_then(|c| c.get(1)) {
            extracted.set("currency", m.as_str());
        }
    }

    if !extracted.has("product_type") {
        let lowered = request.to_lowercase();
        if let Some(kind) = PRODUCT_TYPES.iter().find(|t| lowered.contains(*t)) {
            extracted.set("product_type", kind);
        }
    }
}
