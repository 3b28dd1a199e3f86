//! Built-in large-text sections per document kind.
//!
//! Placeholders are `[Variable Name]`. Deployments with their own legal text
//! replace these through [`LargeTextAgent::with_sections`](super::large_text::LargeTextAgent::with_sections).

use super::kind::DocumentKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSection {
    pub key: String,
    pub template: String,
}

impl TemplateSection {
    pub fn new(key: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            template: template.into(),
        }
    }
}

pub fn builtin_sections(kind: DocumentKind) -> Vec<TemplateSection> {
    let table: &[(&str, &str)] = match kind {
        DocumentKind::InvestorSummary => ISM_SECTIONS,
        DocumentKind::BaseShelfProspectus => BSP_SECTIONS,
        DocumentKind::ProductSupplement => PDS_SECTIONS,
        DocumentKind::PricingSupplement => PRS_SECTIONS,
    };
    table
        .iter()
        .map(|(key, template)| TemplateSection::new(*key, *template))
        .collect()
}

const ISM_SECTIONS: &[(&str, &str)] = &[
    (
        "executive_summary",
        "[Note Title] issued by [Issuer] are linked to the [Underlying Asset Name] and mature on \
[Maturity Date]. This summary, dated [Document Date], is prepared for [Audience] investors.",
    ),
    (
        "key_terms",
        "Issuer: [Issuer]\nUnderlying: [Underlying Asset Name] ([Underlying Asset Type])\n\
Principal Amount: [Currency] [Principal Amount]\nProduct Type: [Product Type]\nMaturity Date: [Maturity Date]",
    ),
    (
        "additional_key_terms",
        "The notes are governed by the pricing supplement dated [Pricing Supplement Date]. \
Distribution is through [Distribution Method].",
    ),
    (
        "scenarios",
        "The hypothetical scenarios below show how the [Product Type] payoff depends on the \
[Closing Level/Price Name] of the [Underlying Asset Name] on each valuation date.",
    ),
    (
        "disclaimer",
        "This investor summary does not constitute an offer to sell. Investors should read the \
pricing supplement and base shelf prospectus before investing. Version [Document Version], generated [Generation Date].",
    ),
];

const BSP_SECTIONS: &[(&str, &str)] = &[
    (
        "cover_page_disclosures",
        "[Issuer] may offer up to [Currency] [Shelf Amount] of notes under the [Program Name] \
during the [Program Duration] that this prospectus remains valid.",
    ),
    (
        "forward_looking_statements",
        "This prospectus contains forward-looking statements about [Issuer] that involve risks \
and uncertainties.",
    ),
    (
        "documents_incorporated_by_reference",
        "Documents filed by [Issuer] with the securities regulatory authorities in \
[Regulatory Jurisdiction] are incorporated by reference.",
    ),
    (
        "description_of_the_notes",
        "Notes issued under the [Program Name] will be [Legal Structure] and may include [Note Types].",
    ),
    (
        "plan_of_distribution",
        "Notes may be offered through [Distribution Methods].",
    ),
    (
        "risk_factors",
        "An investment in notes issued under the [Program Name] involves risks, including the \
credit risk of [Issuer].",
    ),
    (
        "use_of_proceeds",
        "The net proceeds will be used by [Issuer] for general banking purposes. [Business Description].",
    ),
    (
        "purchasers_statutory_rights",
        "Securities legislation in [Regulatory Jurisdiction] provides purchasers with rights of \
withdrawal and remedies for misrepresentation.",
    ),
    (
        "certificate_of_the_bank",
        "Dated [Document Date]. This prospectus constitutes full, true and plain disclosure of \
all material facts relating to the notes offered by [Issuer].",
    ),
    (
        "certificate_of_the_dealers",
        "Dated [Document Date]. To the best of our knowledge, this prospectus constitutes full, \
true and plain disclosure of all material facts.",
    ),
];

const PDS_SECTIONS: &[(&str, &str)] = &[
    (
        "initial_disclaimers",
        "This prospectus supplement dated [Prospectus Supplement Date] supplements the base \
shelf prospectus dated [Base Shelf Prospectus Date].",
    ),
    (
        "offering_details",
        "[Note Type] notes linked to the [Underlying Asset Name] in an aggregate principal \
amount of [Principal Amount], issued on [New Issue Date] and maturing on [Maturity Date].",
    ),
    (
        "nature_and_profile",
        "The notes are designed for investors seeking exposure to the [Underlying Asset Name].",
    ),
    (
        "prospectus_structure",
        "Specific terms of each issue are set out in the [Specific Pricing Supplement].",
    ),
    (
        "principal_at_risk_notes",
        "The notes are principal at risk. Information is available at [Website for Note Information].",
    ),
    (
        "calculation_agent_determinations",
        "The calculation agent will make all determinations relating to the [Underlying Asset Name].",
    ),
    (
        "risk_factor_introduction",
        "An investment in [Note Type] notes involves risks described in this supplement and in \
the base shelf prospectus.",
    ),
    (
        "potential_for_loss",
        "Investors could lose some or all of their principal if the [Underlying Asset Name] declines.",
    ),
];

const PRS_SECTIONS: &[(&str, &str)] = &[
    (
        "regulatory_and_offering_disclaimers",
        "This pricing supplement, together with the [Base Prospectus Reference] and \
[Supplement Reference], constitutes a public offering of the notes.",
    ),
    (
        "offering_overview",
        "Final issue price [Final Issue Price] per note, aggregate principal [Currency] \
[Final Principal Amount], minimum subscription [Minimum Denomination].",
    ),
    (
        "general_risks_and_guarantees",
        "The notes are not insured by any deposit insurer. Final coupon rate: [Final Coupon Rate]. \
Final barrier level: [Final Barrier Level].",
    ),
    (
        "prospectus_and_capitalized_terms",
        "Capitalized terms not defined here have the meanings given in the [Base Prospectus Reference].",
    ),
    (
        "documents_incorporated_by_reference",
        "The [Base Prospectus Reference] is incorporated by reference into this pricing supplement.",
    ),
    (
        "deferred_payment",
        "Notes priced on [Pricing Date] will settle on [Settlement Date] and are issued on [Issue Date].",
    ),
    (
        "forward_looking_statements",
        "Market conditions at pricing: [Market Conditions]. Volatility at pricing: [Volatility at Pricing].",
    ),
    (
        "suitability_for_investment",
        "The notes mature on [Maturity Date] and are distributed through [Distribution Method]. \
Agent discount: [Agent Discount]. Estimated value: [Estimated Value].",
    ),
    (
        "appendix_c_certain_canadian_federal_income_tax_considerations",
        "Investors should consult their tax advisors. [Additional Terms]",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_sections() {
        for kind in DocumentKind::ALL {
            assert!(!builtin_sections(kind).is_empty(), "{kind} has no sections");
        }
        assert_eq!(builtin_sections(DocumentKind::PricingSupplement).len(), 9);
    }
}
