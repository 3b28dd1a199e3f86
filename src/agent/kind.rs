//! Document kinds and agent type aliases.
//!
//! Every agent type has a long name (`investor_summary`) used as the registry
//! key and knowledge base directory, and a short code (`ism`) used by agents
//! as their own `agent_type` and knowledge domain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of document types the system can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    InvestorSummary,
    BaseShelfProspectus,
    ProductSupplement,
    PricingSupplement,
}

impl DocumentKind {
    /// Registry order. The router scores kinds in this order and breaks ties on it.
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::InvestorSummary,
        DocumentKind::BaseShelfProspectus,
        DocumentKind::ProductSupplement,
        DocumentKind::PricingSupplement,
    ];

    pub fn long_name(self) -> &'static str {
        match self {
            DocumentKind::InvestorSummary => "investor_summary",
            DocumentKind::BaseShelfProspectus => "base_shelf_prospectus",
            DocumentKind::ProductSupplement => "product_supplement",
            DocumentKind::PricingSupplement => "pricing_supplement",
        }
    }

    pub fn short_code(self) -> &'static str {
        match self {
            DocumentKind::InvestorSummary => "ism",
            DocumentKind::BaseShelfProspectus => "bsp",
            DocumentKind::ProductSupplement => "pds",
            DocumentKind::PricingSupplement => "prs",
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            DocumentKind::InvestorSummary => "ISMAgent",
            DocumentKind::BaseShelfProspectus => "BSPAgent",
            DocumentKind::ProductSupplement => "PDSAgent",
            DocumentKind::PricingSupplement => "PRSAgent",
        }
    }

    /// Human-readable title used in generated document headings.
    pub fn title(self) -> &'static str {
        match self {
            DocumentKind::InvestorSummary => "Investor Summary",
            DocumentKind::BaseShelfProspectus => "Base Shelf Prospectus",
            DocumentKind::ProductSupplement => "Product Supplement",
            DocumentKind::PricingSupplement => "Pricing Supplement",
        }
    }

    /// Parse either the long name or the short code, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        DocumentKind::ALL
            .into_iter()
            .find(|kind| kind.long_name() == value || kind.short_code() == value)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentKind::parse(s).ok_or_else(|| format!("Unknown document kind: {}", s))
    }
}

/// Map a short code to its long name. Long names and unknown strings pass through unchanged.
pub fn normalize_agent_type(agent_type: &str) -> String {
    match DocumentKind::ALL
        .into_iter()
        .find(|kind| kind.short_code() == agent_type)
    {
        Some(kind) => kind.long_name().to_string(),
        None => agent_type.to_string(),
    }
}

/// Map a long name to its short code. Short codes and unknown strings pass through unchanged.
pub fn short_agent_type(agent_type: &str) -> String {
    match DocumentKind::ALL
        .into_iter()
        .find(|kind| kind.long_name() == agent_type)
    {
        Some(kind) => kind.short_code().to_string(),
        None => agent_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_accepts_both_forms() {
        assert_eq!(DocumentKind::parse("ism"), Some(DocumentKind::InvestorSummary));
        assert_eq!(
            DocumentKind::parse("Pricing_Supplement"),
            Some(DocumentKind::PricingSupplement)
        );
        assert_eq!(DocumentKind::parse("term_sheet"), None);
    }

    #[test]
    fn test_normalize_leaves_unknown_types() {
        assert_eq!(normalize_agent_type("bsp"), "base_shelf_prospectus");
        assert_eq!(normalize_agent_type("product_supplement"), "product_supplement");
        assert_eq!(normalize_agent_type("does-not-exist"), "does-not-exist");
    }

    #[test]
    fn test_serde_uses_long_names() {
        let json = serde_json::to_string(&DocumentKind::ProductSupplement).unwrap();
        assert_eq!(json, "\"product_supplement\"");
    }

    proptest! {
        #[test]
        fn alias_mapping_is_stable(index in 0usize..4) {
            let kind = DocumentKind::ALL[index];
            prop_assert_eq!(normalize_agent_type(kind.short_code()), kind.long_name());
            prop_assert_eq!(normalize_agent_type(kind.long_name()), kind.long_name());
            prop_assert_eq!(short_agent_type(&normalize_agent_type(kind.short_code())), kind.short_code());
        }

        #[test]
        fn normalize_is_identity_for_unknown(name in "[a-z_]{1,20}") {
            prop_assume!(DocumentKind::parse(&name).is_none());
            prop_assert_eq!(normalize_agent_type(&name), name);
        }
    }
}
