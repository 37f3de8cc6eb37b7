use std::future::Future;
use std::num::NonZeroU32;

use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter};
use indicatif::ProgressBar;
use serde::Deserialize;

use crate::registry::EntityRecord;

pub const DEFAULT_FINANCIALS_URL: &str = "https://data.brreg.no/regnskapsregisteret/regnskap";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FinancialSummary {
    pub fiscal_year: Option<i32>,
    pub revenue: Option<i64>,
    pub operating_result: Option<i64>,
    pub equity: Option<i64>,
    pub total_assets: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct EnrichedRecord {
    pub entity: EntityRecord,
    pub financials: Option<FinancialSummary>,
}

#[derive(Clone, Copy, Debug)]
pub struct EnrichOptions {
    pub sequential: bool,
    pub concurrency: usize,
    // Requests per second in sequential mode; 0 disables pacing.
    pub rate: u32,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            sequential: false,
            concurrency: 8,
            rate: 4,
        }
    }
}

pub trait StatementSource {
    fn fetch_statement(
        &self,
        org_number: &str,
    ) -> impl Future<Output = Option<FinancialSummary>> + Send;
}

#[derive(Debug, Deserialize)]
struct RawStatement {
    regnskapsperiode: Option<RawPeriod>,
    resultatregnskap: Option<RawIncomeStatement>,
    balanse: Option<RawBalanceSheet>,
}

#[derive(Debug, Deserialize)]
struct RawPeriod {
    aar: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawIncomeStatement {
    driftsinntekter: Option<i64>,
    driftsresultat: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawBalanceSheet {
    egenkapital: Option<i64>,
    #[serde(rename = "sumEiendeler")]
    sum_eiendeler: Option<i64>,
}

fn normalize_statement(raw: RawStatement) -> FinancialSummary {
    let fiscal_year = raw.regnskapsperiode.and_then(|p| p.aar);
    let (revenue, operating_result) = match raw.resultatregnskap {
        Some(income) => (income.driftsinntekter, income.driftsresultat),
        None => (None, None),
    };
    let (equity, total_assets) = match raw.balanse {
        Some(balance) => (balance.egenkapital, balance.sum_eiendeler),
        None => (None, None),
    };
    FinancialSummary {
        fiscal_year,
        revenue,
        operating_result,
        equity,
        total_assets,
    }
}

// Latest fiscal year wins; on ties the first-encountered statement is kept.
// A statement without a year ranks below any dated one.
fn select_latest(statements: Vec<RawStatement>) -> Option<FinancialSummary> {
    let mut best: Option<FinancialSummary> = None;
    for raw in statements {
        let candidate = normalize_statement(raw);
        match &best {
            None => best = Some(candidate),
            Some(current) if candidate.fiscal_year > current.fiscal_year => {
                best = Some(candidate);
            }
            Some(_) => {}
        }
    }
    best
}

// The endpoint serves either a statement array or a single statement object
// depending on deployment. Anything else is treated as no data.
pub(crate) fn parse_statements_body(body: &str) -> Option<FinancialSummary> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let statements: Vec<RawStatement> = if value.is_array() {
        serde_json::from_value(value).ok()?
    } else if value.is_object() {
        vec![serde_json::from_value(value).ok()?]
    } else {
        return None;
    };
    select_latest(statements)
}

#[derive(Clone, Debug)]
pub struct FinancialsClient {
    client: reqwest::Client,
    base_url: String,
}

impl FinancialsClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl StatementSource for FinancialsClient {
    // Every failure mode collapses to None: a missing summary is expected
    // data, not an error, and must never abort the rest of the batch.
    async fn fetch_statement(&self, org_number: &str) -> Option<FinancialSummary> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), org_number);
        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body = resp.text().await.ok()?;
        parse_statements_body(&body)
    }
}

pub async fn enrich<S>(
    source: &S,
    records: Vec<EntityRecord>,
    options: &EnrichOptions,
    pb: &ProgressBar,
) -> Vec<EnrichedRecord>
where
    S: StatementSource + Sync,
{
    if options.sequential {
        enrich_sequential(source, records, options.rate, pb).await
    } else {
        enrich_concurrent(source, records, options.concurrency.max(1), pb).await
    }
}

async fn enrich_concurrent<S>(
    source: &S,
    records: Vec<EntityRecord>,
    concurrency: usize,
    pb: &ProgressBar,
) -> Vec<EnrichedRecord>
where
    S: StatementSource + Sync,
{
    let lookups = records.into_iter().enumerate().map(|(idx, entity)| async move {
        let financials = source.fetch_statement(&entity.org_number).await;
        (idx, entity, financials)
    });

    let mut settled: Vec<(usize, EntityRecord, Option<FinancialSummary>)> = stream::iter(lookups)
        .buffer_unordered(concurrency)
        .map(|item| {
            pb.inc(1);
            item
        })
        .collect()
        .await;

    // Lookups settle in arbitrary order; the collection keeps load order.
    settled.sort_by_key(|(idx, _, _)| *idx);
    settled
        .into_iter()
        .map(|(_, entity, financials)| EnrichedRecord { entity, financials })
        .collect()
}

async fn enrich_sequential<S>(
    source: &S,
    records: Vec<EntityRecord>,
    rate: u32,
    pb: &ProgressBar,
) -> Vec<EnrichedRecord>
where
    S: StatementSource + Sync,
{
    let limiter = NonZeroU32::new(rate).map(|r| RateLimiter::direct(Quota::per_second(r)));

    let mut out = Vec::with_capacity(records.len());
    for entity in records {
        if let Some(limiter) = limiter.as_ref() {
            limiter.until_ready().await;
        }
        let financials = source.fetch_statement(&entity.org_number).await;
        pb.inc(1);
        out.push(EnrichedRecord { entity, financials });
    }
    out
}
