//! Shared types, error model, and configuration for crmsync.
//!
//! This crate is the foundation depended on by all other crmsync crates.
//! It provides:
//! - [`CrmSyncError`] — the unified error type
//! - Domain types ([`CrmRecord`], [`FormSubmission`], [`Priority`])
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, ClassifierConfig, DEFAULT_KEYWORDS, MergeConfig, OutputConfig,
    SyncConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_token,
};
pub use error::{CrmSyncError, Result};
pub use types::{
    CRM_COLUMNS, CrmRecord, DATE_FORMAT, FormSubmission, HISTORY_SEPARATOR, PRIORITY_COLUMN,
    Priority, RawFormSubmission, clean_field, is_placeholder, keys_match, normalize_phone,
    parse_contact_date,
};
