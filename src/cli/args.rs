use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "orgdash",
    version,
    about = "company-registry dashboard for the terminal",
    long_about = "Orgdash queries the Norwegian business register, enriches each company with its latest financial statement and renders a filterable, sortable, paginated table.\n\nExamples:\n  orgdash --name bdo\n  orgdash --min-employees 100 --sort revenue --page-size 10\n  orgdash --industry 69.201 --org-form AS --format json -o companies.json\n\nTip: Use --config to persist criteria and keep invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'n',
        long = "name",
        value_name = "SUBSTRING",
        help_heading = "Criteria",
        help = "Company name substring (case-insensitive)."
    )]
    pub name: Option<String>,

    #[arg(
        short = 'e',
        long = "min-employees",
        value_name = "N",
        help_heading = "Criteria",
        help = "Keep companies with at least N employees."
    )]
    pub min_employees: Option<u32>,

    #[arg(
        short = 'm',
        long = "min-revenue-mnok",
        value_name = "MNOK",
        help_heading = "Criteria",
        help = "Keep companies with revenue of at least MNOK million (companies without a statement are excluded)."
    )]
    pub min_revenue_mnok: Option<i64>,

    #[arg(
        short = 'I',
        long = "industry",
        value_name = "CODE",
        help_heading = "Criteria",
        help = "Exact industry (NACE) code, e.g. 69.201."
    )]
    pub industry: Option<String>,

    #[arg(
        short = 'F',
        long = "org-form",
        value_name = "CODE",
        help_heading = "Criteria",
        help = "Exact organization-form code, e.g. AS."
    )]
    pub org_form: Option<String>,

    #[arg(
        short = 'l',
        long = "limit",
        value_name = "N",
        help_heading = "Fetch",
        help = "Max companies to fetch from the registry (1-500)."
    )]
    pub limit: Option<usize>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "Fetch",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        long = "registry-url",
        value_name = "URL",
        help_heading = "Fetch",
        help = "Override the registry list endpoint."
    )]
    pub registry_url: Option<String>,

    #[arg(
        long = "financials-url",
        value_name = "URL",
        help_heading = "Fetch",
        help = "Override the financial-statement endpoint."
    )]
    pub financials_url: Option<String>,

    #[arg(
        long = "sequential",
        help_heading = "Enrichment",
        help = "Fetch statements one at a time instead of fanning out."
    )]
    pub sequential: bool,

    #[arg(
        short = 'r',
        long = "rate",
        value_name = "RPS",
        help_heading = "Enrichment",
        help = "Statement lookups per second in sequential mode (0 = unpaced)."
    )]
    pub rate: Option<u32>,

    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Enrichment",
        help = "Concurrent statement lookups in fan-out mode."
    )]
    pub concurrency: Option<usize>,

    #[arg(
        short = 's',
        long = "sort",
        value_name = "FIELD",
        help_heading = "Table",
        help = "Sort field: name, employees, revenue, result, equity, assets."
    )]
    pub sort: Option<String>,

    #[arg(
        short = 'a',
        long = "ascending",
        help_heading = "Table",
        help = "Sort ascending (default is descending)."
    )]
    pub ascending: bool,

    #[arg(
        short = 'p',
        long = "page",
        value_name = "N",
        help_heading = "Table",
        help = "Page to show (1-based, clamped to the available range)."
    )]
    pub page: Option<usize>,

    #[arg(
        short = 'P',
        long = "page-size",
        value_name = "N",
        help_heading = "Table",
        help = "Rows per page."
    )]
    pub page_size: Option<usize>,

    #[arg(
        long = "large-threshold",
        value_name = "N",
        help_heading = "Table",
        help = "Employee count from which a company counts as large."
    )]
    pub large_threshold: Option<u32>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the view model to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'f',
        long = "format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text or json (inferred from -o extension)."
    )]
    pub output_format: Option<String>,

    #[arg(long = "no-color", help_heading = "Output", help = "Disable colored output.")]
    pub no_color: bool,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.orgdash/config.yml)."
    )]
    pub config: Option<String>,
}
