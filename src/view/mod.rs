use colored::Colorize;
use serde::Serialize;

use crate::facets::FacetSet;
use crate::financials::EnrichedRecord;
use crate::pipeline::{Collection, LoadState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total_companies: usize,
    pub large_companies: usize,
    pub total_employees: u64,
    pub distinct_industries: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub rows: Vec<EnrichedRecord>,
    pub page: usize,
    pub total_count: usize,
    pub total_pages: usize,
    pub summary: SummaryStats,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewModel {
    Loaded(PageView),
    Failed { message: String },
}

// Pure reduction over the whole filtered collection; pagination never
// changes the summary numbers.
fn summarize(records: &[EnrichedRecord], large_company_threshold: u32) -> SummaryStats {
    let mut industries: Vec<&str> = records
        .iter()
        .map(|r| r.entity.industry_code.as_str())
        .filter(|code| !code.is_empty())
        .collect();
    industries.sort_unstable();
    industries.dedup();

    SummaryStats {
        total_companies: records.len(),
        large_companies: records
            .iter()
            .filter(|r| r.entity.employees >= large_company_threshold)
            .count(),
        total_employees: records
            .iter()
            .map(|r| u64::from(r.entity.employees))
            .sum(),
        distinct_industries: industries.len(),
    }
}

pub fn build(
    collection: &Collection,
    state: &LoadState,
    page_size: usize,
    large_company_threshold: u32,
) -> ViewModel {
    if let LoadState::Failed(message) = state {
        return ViewModel::Failed {
            message: message.clone(),
        };
    }

    let records = collection.records();
    let page_size = page_size.max(1);
    let page = collection.page().max(1);
    let offset = (page - 1) * page_size;
    let rows: Vec<EnrichedRecord> = records
        .iter()
        .skip(offset)
        .take(page_size)
        .cloned()
        .collect();

    ViewModel::Loaded(PageView {
        rows,
        page,
        total_count: records.len(),
        total_pages: collection.total_pages(page_size),
        summary: summarize(records, large_company_threshold),
    })
}

// Thousands grouping without pulling in a locale stack; the upstream data
// is Norwegian so a thin-space group separator is close enough for a terminal.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

// Amounts render rounded to millions; absent means "not reported" and is
// shown as a placeholder, never as zero.
pub fn format_mnok(value: Option<i64>) -> String {
    match value {
        None => "–".to_string(),
        Some(amount) => {
            let millions = (amount as f64 / 1_000_000.0).round() as i64;
            if millions < 0 {
                format!("-{}", format_count(millions.unsigned_abs()))
            } else {
                format_count(millions as u64)
            }
        }
    }
}

pub fn render_json(view: &ViewModel) -> Vec<u8> {
    serde_json::to_vec_pretty(view).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render_text(view: &ViewModel, facets: &FacetSet) -> String {
    let mut out = String::new();
    match view {
        ViewModel::Failed { message } => {
            out.push_str(&format!("{} {}\n", "load failed:".red().bold(), message));
        }
        ViewModel::Loaded(page) => {
            out.push_str(&format!(
                ":: {:<10}: companies={} large={} employees={} industries={}\n",
                "Summary",
                page.summary.total_companies,
                page.summary.large_companies,
                format_count(page.summary.total_employees),
                page.summary.distinct_industries,
            ));
            out.push_str(&format!(
                ":: {:<10}: {}\n",
                "Industries",
                facets
                    .industries
                    .iter()
                    .map(|i| format!("{} {}", i.code, i.label))
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
            out.push('\n');

            out.push_str(&format!(
                "{:<34} {:>10} {:>10} {:>10} {:>10} {:>10} {:>6}\n",
                "Company".bold(),
                "Employees".bold(),
                "Revenue".bold(),
                "Result".bold(),
                "Equity".bold(),
                "Assets".bold(),
                "Year".bold(),
            ));
            for row in page.rows.iter() {
                let fin = row.financials;
                out.push_str(&format!(
                    "{:<34} {:>10} {:>10} {:>10} {:>10} {:>10} {:>6}\n",
                    truncate(&row.entity.name, 34),
                    format_count(u64::from(row.entity.employees)),
                    format_mnok(fin.and_then(|f| f.revenue)),
                    format_mnok(fin.and_then(|f| f.operating_result)),
                    format_mnok(fin.and_then(|f| f.equity)),
                    format_mnok(fin.and_then(|f| f.total_assets)),
                    fin.and_then(|f| f.fiscal_year)
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "–".to_string()),
                ));
            }
            if page.rows.is_empty() {
                out.push_str("no companies matched the active filters\n");
            }
            out.push('\n');
            out.push_str(&format!("Page {} / {}\n", page.page, page.total_pages));
        }
    }
    out
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
