use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::financials::{EnrichOptions, FinancialsClient, DEFAULT_FINANCIALS_URL};
use crate::pipeline::{LoadState, Pipeline, PipelineOptions, SortDirection, SortField, SortSpec};
use crate::registry::{FilterCriteria, RegistryClient, DEFAULT_REGISTRY_URL};
use crate::view::{self, OutputFormat};

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[derive(Clone, Debug)]
struct RunConfig {
    criteria: FilterCriteria,
    limit: usize,
    page: usize,
    page_size: usize,
    sort_field: Option<SortField>,
    ascending: bool,
    sequential: bool,
    rate: u32,
    concurrency: usize,
    timeout: usize,
    large_company_threshold: u32,
    registry_url: String,
    financials_url: String,
    output: Option<String>,
    output_format: Option<String>,
    no_color: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let name = args.name.or(cfg.name).unwrap_or_default();
    let min_employees = args.min_employees.or(cfg.min_employees).unwrap_or(0);
    let min_revenue_mnok = args
        .min_revenue_mnok
        .or(cfg.min_revenue_mnok)
        .unwrap_or(0);
    let industry_code = args.industry.or(cfg.industry).unwrap_or_default();
    let legal_form = args.org_form.or(cfg.org_form).unwrap_or_default();

    let criteria = FilterCriteria {
        name,
        min_employees,
        // The CLI takes millions; the core filters on raw NOK.
        min_revenue: min_revenue_mnok.saturating_mul(1_000_000),
        industry_code,
        legal_form,
    };

    let limit = args.limit.or(cfg.limit).unwrap_or(100);
    let page = args.page.or(cfg.page).unwrap_or(1);
    let page_size = args.page_size.or(cfg.page_size).unwrap_or(20);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);

    let sort_raw = args.sort.or(cfg.sort);
    let sort_field = match sort_raw.as_deref() {
        Some(raw) => Some(
            SortField::parse(raw)
                .ok_or_else(|| format!("invalid sort field '{raw}'"))?,
        ),
        None => None,
    };
    let ascending = args.ascending || cfg.ascending.unwrap_or(false);

    let sequential = args.sequential || cfg.sequential.unwrap_or(false);
    let rate = args.rate.or(cfg.rate).unwrap_or(4);
    let concurrency = args.concurrency.or(cfg.concurrency).unwrap_or(8);

    let large_company_threshold = args
        .large_threshold
        .or(cfg.large_company_threshold)
        .unwrap_or(1000);

    let registry_url = args
        .registry_url
        .or(cfg.registry_url)
        .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
    let financials_url = args
        .financials_url
        .or(cfg.financials_url)
        .unwrap_or_else(|| DEFAULT_FINANCIALS_URL.to_string());

    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let output_format = args.output_format.or(cfg.output_format);
    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    Ok(RunConfig {
        criteria,
        limit,
        page,
        page_size,
        sort_field,
        ascending,
        sequential,
        rate,
        concurrency,
        timeout,
        large_company_threshold,
        registry_url,
        financials_url,
        output,
        output_format,
        no_color,
    })
}

fn build_http_client(timeout_seconds: usize) -> Result<reqwest::Client, String> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static("orgdash (+https://github.com/orgdash/orgdash)"),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_seconds.try_into().unwrap_or(10)))
        .build()
        .map_err(|e| format!("failed to build http client: {e}"))
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    if run.criteria.is_unconstrained() {
        format_kv_line("Criteria", "none");
    } else {
        format_kv_line(
            "Criteria",
            &format!(
                "name={} min_employees={} min_revenue={} industry={} org_form={}",
                if run.criteria.name.is_empty() {
                    "any"
                } else {
                    run.criteria.name.as_str()
                },
                run.criteria.min_employees,
                run.criteria.min_revenue,
                if run.criteria.industry_code.is_empty() {
                    "any"
                } else {
                    run.criteria.industry_code.as_str()
                },
                if run.criteria.legal_form.is_empty() {
                    "any"
                } else {
                    run.criteria.legal_form.as_str()
                },
            ),
        );
    }
    format_kv_line(
        "Fetch",
        &format!(
            "limit={} timeout={}s sequential={} rate={} concurrency={}",
            run.limit,
            run.timeout,
            format_bool(run.sequential),
            run.rate,
            run.concurrency,
        ),
    );

    let client = build_http_client(run.timeout)?;
    let registry = RegistryClient::new(client.clone(), run.registry_url.clone());
    let financials = FinancialsClient::new(client, run.financials_url.clone());

    let pb = ProgressBar::new(0);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Enriching: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}]",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?
        .progress_chars(r#"#>-"#),
    );

    let options = PipelineOptions {
        limit: run.limit,
        page_size: run.page_size,
        large_company_threshold: run.large_company_threshold,
        enrich: EnrichOptions {
            sequential: run.sequential,
            concurrency: run.concurrency,
            rate: run.rate,
        },
    };
    let pipeline = Pipeline::new(registry, financials, options).with_progress(pb.clone());

    let now = Instant::now();
    let state = pipeline.load(run.criteria.clone()).await;
    pb.finish_and_clear();

    if let LoadState::Failed(message) = &state {
        // The pipeline keeps the failed state for its consumers; the CLI is
        // a one-shot run so it also reports the failure as its exit status.
        let rendered = view::render_text(&pipeline.view(), &pipeline.facets());
        print!("{rendered}");
        return Err(format!("load failed: {message}"));
    }

    let direction = if run.ascending {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    };
    pipeline.set_sort(SortSpec {
        field: run.sort_field.unwrap_or(SortField::Employees),
        direction,
    });
    pipeline.set_page(run.page);

    let view_model = pipeline.view();
    let facets = pipeline.facets();

    let rendered_table = view::render_text(&view_model, &facets);
    print!("{rendered_table}");

    if let Some(outfile_path) = run.output.as_ref() {
        let output_format = run
            .output_format
            .as_deref()
            .and_then(OutputFormat::parse)
            .or_else(|| view::infer_format_from_path(outfile_path))
            .unwrap_or(OutputFormat::Json);

        let rendered = match output_format {
            OutputFormat::Json => view::render_json(&view_model),
            OutputFormat::Text => {
                colored::control::set_override(false);
                let plain = view::render_text(&view_model, &facets).into_bytes();
                colored::control::unset_override();
                plain
            }
        };

        let mut outfile = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(outfile_path)
            .await
            .map_err(|e| format!("failed to open output file: {e}"))?;
        outfile
            .write_all(&rendered)
            .await
            .map_err(|_| "failed to write output file".to_string())?;
    }

    println!();
    println!(
        ":: Completed :: load took {}s ::",
        now.elapsed().as_secs()
    );
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.clone() {
        Some(path) => {
            let path = config::expand_tilde(&path);
            config::load_config(&path, false)?
        }
        None => match config::default_config_path() {
            Some(path) => {
                config::ensure_default_config_file(&path)?;
                config::load_config(&path, true)?
            }
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
