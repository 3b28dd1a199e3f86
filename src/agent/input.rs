//! Agent input scaffolding: per-kind defaults and numeric coercion.

use super::kind::DocumentKind;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Input ready to hand to an agent, plus the keys that were filled from defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedInput {
    pub data: Map<String, Value>,
    pub missing_fields: Vec<String>,
}

impl PreparedInput {
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

/// Fields coerced to floats when they arrive as strings (commas stripped).
const NUMERIC_FIELDS: &[&str] = &[
    "principal_amount",
    "issue_price",
    "shelf_amount",
    "final_issue_price",
    "final_principal_amount",
    "minimum_denomination",
];

fn iso(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

/// Default values for a kind, in the order they are reported as missing.
pub fn default_fields(kind: DocumentKind, today: NaiveDate) -> Vec<(&'static str, Value)> {
    match kind {
        DocumentKind::InvestorSummary => {
            let maturity = today
                .with_year(today.year() + 7)
                .or_else(|| today.with_day(28).and_then(|d| d.with_year(today.year() + 7)))
                .unwrap_or_else(|| today + Duration::days(7 * 365));
            vec![
                ("issuer", json!("The Bank of Nova Scotia")),
                ("product_name", json!("Autocallable Plus Notes")),
                ("underlying_asset", json!("Canadian Financials Basket")),
                ("currency", json!("CAD")),
                ("principal_amount", json!(5000.0)),
                ("issue_date", iso(today)),
                ("maturity_date", iso(maturity)),
                ("product_type", json!("autocallable")),
                ("target_audience", json!("retail_investors")),
                ("risk_tolerance", json!("medium")),
                ("investment_objective", json!("capital_growth_with_income")),
                ("regulatory_jurisdiction", json!("Canada")),
                ("distribution_method", json!("broker_dealer_network")),
            ]
        }
        DocumentKind::BaseShelfProspectus => vec![
            ("issuer", json!("TBD")),
            ("program_name", json!("Structured Note Program")),
            ("shelf_amount", json!(10_000_000.0)),
            ("currency", json!("USD")),
            ("regulatory_jurisdiction", json!("Canada")),
            ("legal_structure", json!("Senior unsecured notes")),
            (
                "business_description",
                json!("Banking and financial services, including structured products"),
            ),
            ("note_types", json!(["Autocallable notes"])),
            ("distribution_methods", json!(["registered investment dealers"])),
        ],
        DocumentKind::ProductSupplement => vec![
            ("base_prospectus_reference", json!("Base Shelf Prospectus")),
            ("base_prospectus_date", iso(today)),
            ("note_series", json!("Series TBD")),
            ("note_description", json!("TBD")),
            ("underlying_asset", json!("TBD")),
            ("principal_amount", json!(100_000.0)),
            ("issue_price", json!(100.0)),
            ("currency", json!("USD")),
            ("issue_date", iso(today)),
            ("maturity_date", iso(today + Duration::days(365 * 3))),
            ("product_type", json!("autocallable")),
            (
                "calculation_methodology",
                json!("See applicable pricing supplement."),
            ),
        ],
        DocumentKind::PricingSupplement => vec![
            ("base_prospectus_reference", json!("Base Shelf Prospectus")),
            ("final_issue_price", json!(100.0)),
            ("final_principal_amount", json!(100_000.0)),
            ("currency", json!("USD")),
            ("pricing_date", iso(today)),
            ("issue_date", iso(today)),
            ("maturity_date", iso(today + Duration::days(365 * 3))),
            ("settlement_date", iso(today + Duration::days(7))),
            ("distribution_method", json!("retail")),
            ("minimum_denomination", json!(100)),
        ],
    }
}

/// Parse a number that may carry thousands separators.
pub fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
}

/// Apply the kind's defaults to `data`, coercing numeric strings first.
pub fn prepare_input(kind: DocumentKind, data: &Map<String, Value>, today: NaiveDate) -> PreparedInput {
    let mut prepared = data.clone();
    for field in NUMERIC_FIELDS {
        if let Some(value) = prepared.get(*field) {
            if let Some(number) = coerce_float(value) {
                prepared.insert((*field).to_string(), json!(number));
            }
        }
    }

    let mut missing_fields = Vec::new();
    for (key, default) in default_fields(kind, today) {
        if !prepared.contains_key(key) {
            missing_fields.push(key.to_string());
            prepared.insert(key.to_string(), default);
        }
    }

    PreparedInput {
        data: prepared,
        missing_fields,
    }
}
