use itertools::Itertools;

use crate::financials::EnrichedRecord;

// Organization-form codes are a fixed registry vocabulary, not something to
// derive from whatever happens to be loaded.
pub const LEGAL_FORMS: &[&str] = &[
    "AS", "ASA", "ANS", "BA", "DA", "ENK", "FLI", "IKS", "KF", "KS", "NUF", "SA", "SAM", "SE",
    "SF", "STI",
];

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct IndustryFacet {
    pub code: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FacetSet {
    pub industries: Vec<IndustryFacet>,
    pub legal_forms: Vec<&'static str>,
}

impl Default for FacetSet {
    fn default() -> Self {
        Self {
            industries: Vec::new(),
            legal_forms: LEGAL_FORMS.to_vec(),
        }
    }
}

// Industries are derived from the full (unfiltered) load. When the same code
// carries different labels across records the first-seen label wins; upstream
// data is expected to be consistent so the ambiguity is theoretical.
pub fn extract_facets(records: &[EnrichedRecord]) -> FacetSet {
    let mut industries: Vec<IndustryFacet> = records
        .iter()
        .filter(|record| !record.entity.industry_code.is_empty())
        .unique_by(|record| record.entity.industry_code.clone())
        .map(|record| IndustryFacet {
            code: record.entity.industry_code.clone(),
            label: record.entity.industry_label.clone(),
        })
        .collect();
    industries.sort_by(|a, b| a.label.cmp(&b.label));

    FacetSet {
        industries,
        legal_forms: LEGAL_FORMS.to_vec(),
    }
}
