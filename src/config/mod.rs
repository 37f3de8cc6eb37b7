use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub min_employees: Option<u32>,
    pub min_revenue_mnok: Option<i64>,
    pub industry: Option<String>,
    pub org_form: Option<String>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub sort: Option<String>,
    pub ascending: Option<bool>,
    pub sequential: Option<bool>,
    pub rate: Option<u32>,
    pub concurrency: Option<usize>,
    pub timeout: Option<usize>,
    pub large_company_threshold: Option<u32>,
    pub registry_url: Option<String>,
    pub financials_url: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".orgdash").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# Orgdash config
#
# Location (default):
#   ~/.orgdash/config.yml

# Filter criteria (all optional; empty means no constraint)
# name: bdo
# min_employees: 100
# min_revenue_mnok: 10
# industry: "69.201"
# org_form: AS

# Fetch
limit: 100
timeout: 10

# Paging / sorting
page: 1
page_size: 20
sort: employees
ascending: false

# Enrichment
# sequential: true paces one statement lookup at a time; rate is
# lookups per second (0 disables pacing). concurrency applies to the
# default fan-out mode.
sequential: false
rate: 4
concurrency: 8

# Summary
large_company_threshold: 1000

# Endpoints
# registry_url: https://data.brreg.no/enhetsregisteret/api/enheter
# financials_url: https://data.brreg.no/regnskapsregisteret/regnskap

# Output (optional)
# output: ./companies.json
# output_format: json
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
