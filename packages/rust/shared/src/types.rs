//! Core domain types for the CRM / form-submission reconciliation.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Column headers of the CRM export, in output order.
pub const CRM_COLUMNS: [&str; 8] = [
    "id",
    "first",
    "last",
    "email",
    "phone",
    "last contact date",
    "last contact text",
    "all contact text",
];

/// Header of the classifier column appended to the final table.
pub const PRIORITY_COLUMN: &str = "feedback_action_status";

/// Output date format for `last contact date` and history entries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Separator between entries of the contact history log.
pub const HISTORY_SEPARATOR: &str = "\n\n";

// ---------------------------------------------------------------------------
// CrmRecord
// ---------------------------------------------------------------------------

/// One row of the CRM table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrmRecord {
    /// Identity key.
    pub id: String,
    /// Given name.
    pub first: Option<String>,
    /// Family name (may contain several tokens).
    pub last: Option<String>,
    /// Email address as exported.
    pub email: Option<String>,
    /// Digits-only phone number.
    pub phone: Option<String>,
    /// Date of the most recent contact.
    pub last_contact_date: Option<NaiveDate>,
    /// Message of the most recent contact.
    pub last_contact_text: Option<String>,
    /// Reverse-chronological `date - message` log, entries separated by a blank line.
    pub all_contact_text: Option<String>,
}

// ---------------------------------------------------------------------------
// Form submissions
// ---------------------------------------------------------------------------

/// A form submission as delivered by the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFormSubmission {
    /// Free-text full name.
    #[serde(default)]
    pub form_name: Option<String>,
    /// Free-text message with embedded contact details.
    #[serde(default)]
    pub form_message: Option<String>,
}

/// A form submission with its contact fields pulled out of the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    /// Full name as submitted.
    pub name: Option<String>,
    /// First name token.
    pub first: Option<String>,
    /// Remaining name tokens.
    pub last: Option<String>,
    /// First email address found in the message.
    pub email: Option<String>,
    /// First run of 10+ digits found in the message.
    pub phone: Option<String>,
    /// First `YYYY-MM-DD` date found in the message.
    pub timestamp: Option<NaiveDate>,
    /// Message with the email, phone and date removed.
    pub body: String,
}

impl FormSubmission {
    /// The history entry this submission contributes: `date - body`, or just the body when undated.
    pub fn history_entry(&self) -> String {
        match self.timestamp {
            Some(date) => format!("{} - {}", date.format(DATE_FORMAT), self.body),
            None => self.body.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Feedback action status assigned by the keyword classifier.
///
/// Declaration order is the output sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Three or more keywords.
    UrgentReview,
    /// One or two keywords.
    ReviewForImprovement,
    /// No keywords, or no text.
    GeneralNote,
}

impl Priority {
    /// All priorities in sort order.
    pub const ALL: [Priority; 3] = [
        Self::UrgentReview,
        Self::ReviewForImprovement,
        Self::GeneralNote,
    ];

    /// Label written to the output table.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UrgentReview => "Urgent Review",
            Self::ReviewForImprovement => "Review for Improvement",
            Self::GeneralNote => "General Note",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Field normalization
// ---------------------------------------------------------------------------

/// Spreadsheet/dataframe placeholders for a missing value.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(nan|none|na|null)$").expect("placeholder regex"));

/// Whether `value` is one of the textual "missing" placeholders.
pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_RE.is_match(value.trim())
}

/// Trim a raw field; empty strings and placeholders become `None`.
pub fn clean_field(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || is_placeholder(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reduce a phone number to its digits, dropping a float-export `.0` suffix.
pub fn normalize_phone(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// Parse a contact date in any of the formats CRM exports are seen with.
pub fn parse_contact_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(value, "%m/%d/%Y").ok()
}

/// Case-insensitive equality of two optional keys; absent never matches.
pub fn keys_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}
