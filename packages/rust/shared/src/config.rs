//! Application configuration for crmsync.
//!
//! User config lives at `~/.crmsync/crmsync.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CrmSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "crmsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".crmsync";

/// Keywords scored by the feedback classifier when the config does not override them.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "number", "phone", "contact", "email", "address",
    "urgent", "asap", "immediately", "right away",
    "issue", "problem", "error", "bug", "broken",
    "security", "hack", "breach", "vulnerability",
    "complaint", "unhappy", "dissatisfied", "angry",
    "better", "improve", "enhance", "upgrade",
    "suggestion", "recommend", "advise", "propose",
    "location", "venue", "place", "room",
    "food", "coffee", "breakfast", "lunch", "dinner",
    "time", "schedule", "timing", "duration",
];

// ---------------------------------------------------------------------------
// Config structs (matching crmsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote data API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Output file locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// New-contact creation settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Feedback classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL both endpoints are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the CRM export endpoint (CSV).
    #[serde(default = "default_crm_path")]
    pub crm_path: String,

    /// Path of the form submissions endpoint (JSON).
    #[serde(default = "default_forms_path")]
    pub forms_path: String,

    /// Name of the env var holding the bearer token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            crm_path: default_crm_path(),
            forms_path: default_forms_path(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://it-hiring.blackbird.vc".into()
}
fn default_crm_path() -> String {
    "/api/data/crm".into()
}
fn default_forms_path() -> String {
    "/api/data/form-submissions".into()
}
fn default_token_env() -> String {
    "CRMSYNC_API_TOKEN".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the CSV files are written to.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Parsed form submissions, for reference.
    #[serde(default = "default_raw_form_file")]
    pub raw_form_file: String,

    /// Parsed CRM export, for reference.
    #[serde(default = "default_raw_crm_file")]
    pub raw_crm_file: String,

    /// Final merged, classified and sorted table.
    #[serde(default = "default_update_file")]
    pub update_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            raw_form_file: default_raw_form_file(),
            raw_crm_file: default_raw_crm_file(),
            update_file: default_update_file(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_raw_form_file() -> String {
    "raw_form.csv".into()
}
fn default_raw_crm_file() -> String {
    "raw_crm.csv".into()
}
fn default_update_file() -> String {
    "crm_update.csv".into()
}

/// `[merge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Prefix for synthesized contact ids (`{prefix}-{n}`).
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
        }
    }
}

fn default_id_prefix() -> String {
    "bfx".into()
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Keywords counted (case-insensitive substring) in the latest contact text.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| (*k).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Sync config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime sync configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the data API.
    pub base_url: Url,
    /// Path of the CRM export endpoint.
    pub crm_path: String,
    /// Path of the form submissions endpoint.
    pub forms_path: String,
    /// Bearer token sent with both requests.
    pub token: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Directory the CSV files are written to.
    pub output_dir: PathBuf,
    /// File name of the parsed form table.
    pub raw_form_file: String,
    /// File name of the parsed CRM table.
    pub raw_crm_file: String,
    /// File name of the final table.
    pub update_file: String,
    /// Prefix for synthesized contact ids.
    pub id_prefix: String,
    /// Classifier keywords.
    pub keywords: Vec<String>,
}

impl SyncConfig {
    /// Build the runtime config from the file config and an already-resolved token.
    pub fn from_app(config: &AppConfig, token: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(&config.api.base_url).map_err(|e| {
            CrmSyncError::config(format!("invalid base_url '{}': {e}", config.api.base_url))
        })?;

        if config.merge.id_prefix.trim().is_empty() {
            return Err(CrmSyncError::config("merge.id_prefix must not be empty"));
        }

        Ok(Self {
            base_url,
            crm_path: config.api.crm_path.clone(),
            forms_path: config.api.forms_path.clone(),
            token: token.into(),
            timeout_secs: config.api.timeout_secs,
            output_dir: PathBuf::from(&config.output.dir),
            raw_form_file: config.output.raw_form_file.clone(),
            raw_crm_file: config.output.raw_crm_file.clone(),
            update_file: config.output.update_file.clone(),
            id_prefix: config.merge.id_prefix.clone(),
            keywords: config.classifier.keywords.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.crmsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CrmSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.crmsync/crmsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CrmSyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CrmSyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CrmSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CrmSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CrmSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the bearer token from the env var named in the config.
pub fn validate_api_token(config: &AppConfig) -> Result<String> {
    let var_name = &config.api.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(CrmSyncError::config(format!(
            "API token not found. Set the {var_name} environment variable."
        ))),
    }
}
