use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_REGISTRY_URL: &str = "https://data.brreg.no/enhetsregisteret/api/enheter";

// Upper bound accepted by the list endpoint for a single page of results.
pub const MAX_FETCH_LIMIT: usize = 500;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub name: String,
    pub min_employees: u32,
    pub min_revenue: i64,
    pub industry_code: String,
    pub legal_form: String,
}

impl FilterCriteria {
    pub fn is_unconstrained(&self) -> bool {
        self.name.trim().is_empty()
            && self.min_employees == 0
            && self.min_revenue == 0
            && self.industry_code.trim().is_empty()
            && self.legal_form.trim().is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct EntityRecord {
    pub org_number: String,
    pub name: String,
    pub employees: u32,
    pub industry_code: String,
    pub industry_label: String,
    pub legal_form: String,
    pub city: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected registry response shape: {message}")]
    Parse { message: String },
}

pub trait EntitySource {
    fn fetch_entities(
        &self,
        criteria: &FilterCriteria,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<EntityRecord>, RegistryError>> + Send;
}

#[derive(Debug, Deserialize)]
struct RawListResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<RawEmbedded>,
}

#[derive(Debug, Deserialize)]
struct RawEmbedded {
    #[serde(default)]
    enheter: Vec<RawEntity>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    organisasjonsnummer: String,
    navn: Option<String>,
    #[serde(rename = "antallAnsatte")]
    antall_ansatte: Option<u32>,
    #[serde(rename = "naeringskode1")]
    naeringskode: Option<RawIndustry>,
    organisasjonsform: Option<RawLegalForm>,
    forretningsadresse: Option<RawAddress>,
}

#[derive(Debug, Deserialize)]
struct RawIndustry {
    kode: Option<String>,
    beskrivelse: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLegalForm {
    kode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    poststed: Option<String>,
}

// Single boundary where "maybe absent" upstream fields collapse into
// defined defaults. Everything past this point is strongly typed.
fn normalize_entity(raw: RawEntity) -> EntityRecord {
    let (industry_code, industry_label) = match raw.naeringskode {
        Some(industry) => (
            industry.kode.unwrap_or_default(),
            industry
                .beskrivelse
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
        ),
        None => (String::new(), "Unknown".to_string()),
    };

    EntityRecord {
        org_number: raw.organisasjonsnummer,
        name: raw.navn.unwrap_or_default(),
        employees: raw.antall_ansatte.unwrap_or(0),
        industry_code,
        industry_label,
        legal_form: raw
            .organisasjonsform
            .and_then(|form| form.kode)
            .unwrap_or_default(),
        city: raw
            .forretningsadresse
            .and_then(|address| address.poststed)
            .unwrap_or_default(),
    }
}

pub(crate) fn build_query(criteria: &FilterCriteria, limit: usize) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&'static str, String)> = Vec::new();
    let name = criteria.name.trim();
    if !name.is_empty() {
        params.push(("navn", name.to_string()));
    }
    if criteria.min_employees > 0 {
        params.push(("fraAntallAnsatte", criteria.min_employees.to_string()));
    }
    let industry = criteria.industry_code.trim();
    if !industry.is_empty() {
        params.push(("naeringskode", industry.to_string()));
    }
    let legal_form = criteria.legal_form.trim();
    if !legal_form.is_empty() {
        params.push(("organisasjonsform", legal_form.to_string()));
    }
    params.push(("size", limit.clamp(1, MAX_FETCH_LIMIT).to_string()));
    params.push(("sort", "antallAnsatte,DESC".to_string()));
    params
}

pub(crate) fn parse_list_body(body: &str) -> Result<Vec<EntityRecord>, RegistryError> {
    let parsed: RawListResponse =
        serde_json::from_str(body).map_err(|e| RegistryError::Parse {
            message: e.to_string(),
        })?;
    // The endpoint legitimately omits _embedded when nothing matched.
    let entities = parsed.embedded.map(|e| e.enheter).unwrap_or_default();
    Ok(entities.into_iter().map(normalize_entity).collect())
}

#[derive(Clone, Debug)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl EntitySource for RegistryClient {
    async fn fetch_entities(
        &self,
        criteria: &FilterCriteria,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, RegistryError> {
        let params = build_query(criteria, limit);
        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|source| RegistryError::Transport { source })?
            .error_for_status()
            .map_err(|source| RegistryError::Transport { source })?;

        let body = resp
            .text()
            .await
            .map_err(|source| RegistryError::Transport { source })?;
        parse_list_body(&body)
    }
}
