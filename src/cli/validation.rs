use crate::cli::args::CliArgs;
use crate::pipeline::SortField;
use crate::registry::MAX_FETCH_LIMIT;
use crate::view::OutputFormat;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(limit) = args.limit {
        if limit == 0 || limit > MAX_FETCH_LIMIT {
            return Err(format!("invalid --limit, expected 1-{MAX_FETCH_LIMIT}"));
        }
    }
    if let Some(page_size) = args.page_size {
        if page_size == 0 {
            return Err("invalid --page-size, expected positive integer".to_string());
        }
    }
    if let Some(page) = args.page {
        if page == 0 {
            return Err("invalid --page, pages are 1-based".to_string());
        }
    }
    if let Some(raw) = args.sort.as_deref() {
        if SortField::parse(raw).is_none() {
            return Err(format!(
                "invalid --sort '{raw}', expected name, employees, revenue, result, equity or assets"
            ));
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --format '{raw}', expected text or json"));
        }
    }
    if let Some(mnok) = args.min_revenue_mnok {
        if mnok < 0 {
            return Err("invalid --min-revenue-mnok, expected non-negative value".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected positive integer".to_string());
        }
    }
    Ok(())
}
