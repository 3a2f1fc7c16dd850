//! Authenticated fetchers for the two upstream data sources.
//!
//! The CRM export is served as CSV and the form submissions as a JSON array.
//! Both endpoints live under the same base URL and take the same static
//! bearer token.

mod crm;
mod forms;

use std::time::Duration;

use crmsync_shared::{CrmRecord, CrmSyncError, RawFormSubmission, Result, SyncConfig};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

pub use crm::parse_crm_csv;
pub use forms::parse_form_json;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Default timeout in seconds for each request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum response size we accept (20 MB).
const MAX_RESPONSE_SIZE: u64 = 20 * 1024 * 1024;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("crmsync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Source options
// ---------------------------------------------------------------------------

/// Where and how to fetch the two data sources.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Base URL both endpoint paths are appended to.
    pub base_url: Url,
    /// Path of the CSV CRM export.
    pub crm_path: String,
    /// Path of the JSON form submissions.
    pub forms_path: String,
    /// Static bearer token.
    pub token: String,
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
    /// Largest response body accepted, in bytes.
    pub max_response_bytes: u64,
}

impl SourceOptions {
    /// Options for the default endpoint paths under `base_url`.
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            base_url,
            crm_path: "/api/data/crm".into(),
            forms_path: "/api/data/form-submissions".into(),
            token: token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_response_bytes: MAX_RESPONSE_SIZE,
        }
    }
}

impl From<&SyncConfig> for SourceOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            crm_path: config.crm_path.clone(),
            forms_path: config.forms_path.clone(),
            token: config.token.clone(),
            timeout_secs: config.timeout_secs,
            max_response_bytes: MAX_RESPONSE_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// HTTP client bound to one data API.
#[derive(Debug, Clone)]
pub struct DataSource {
    client: Client,
    opts: SourceOptions,
}

impl DataSource {
    /// Build the HTTP client for `opts`.
    pub fn new(opts: SourceOptions) -> Result<Self> {
        let client = build_client(&opts)?;
        Ok(Self { client, opts })
    }

    /// Full URL of the CRM export.
    pub fn crm_url(&self) -> String {
        endpoint_url(&self.opts.base_url, &self.opts.crm_path)
    }

    /// Full URL of the form submissions.
    pub fn forms_url(&self) -> String {
        endpoint_url(&self.opts.base_url, &self.opts.forms_path)
    }

    /// Fetch and decode the CRM export.
    #[instrument(skip_all, fields(url = %self.crm_url()))]
    pub async fn fetch_crm(&self) -> Result<Vec<CrmRecord>> {
        let url = self.crm_url();
        info!(%url, "fetching CRM export");

        let body = self.get_text(&url).await?;
        let records = parse_crm_csv(&body)?;

        info!(records = records.len(), "CRM export decoded");
        Ok(records)
    }

    /// Fetch and decode the form submissions.
    #[instrument(skip_all, fields(url = %self.forms_url()))]
    pub async fn fetch_forms(&self) -> Result<Vec<RawFormSubmission>> {
        let url = self.forms_url();
        info!(%url, "fetching form submissions");

        let body = self.get_text(&url).await?;
        let forms = parse_form_json(&body)?;

        info!(submissions = forms.len(), "form submissions decoded");
        Ok(forms)
    }

    /// Authenticated GET returning the body as text.
    ///
    /// The size cap also holds for bodies without a `Content-Length`.
    async fn get_text(&self, url: &str) -> Result<String> {
        let mut response = self
            .client
            .get(url)
            .bearer_auth(&self.opts.token)
            .send()
            .await
            .map_err(|e| CrmSyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrmSyncError::Network(format!("{url}: HTTP {status}")));
        }

        let max = self.opts.max_response_bytes;
        if let Some(len) = response.content_length() {
            if len > max {
                return Err(too_large(url, len, max));
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CrmSyncError::Network(format!("{url}: failed to read body: {e}")))?
        {
            let len = (body.len() + chunk.len()) as u64;
            if len > max {
                return Err(too_large(url, len, max));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), "response body received");
        String::from_utf8(body)
            .map_err(|e| CrmSyncError::parse(format!("{url}: response is not UTF-8: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn too_large(url: &str, len: u64, max: u64) -> CrmSyncError {
    CrmSyncError::validation(format!("{url}: response too large ({len} bytes, max {max})"))
}

/// Append `path` to `base`, keeping any path prefix `base` already has.
fn endpoint_url(base: &Url, path: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &SourceOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| CrmSyncError::Network(format!("failed to build HTTP client: {e}")))
}
