//! Contact-field extraction from free-text form submissions.
//!
//! Form messages carry the submitter's email, phone and date inline with the
//! message itself. Each field is pulled out with a fixed pattern (first match
//! wins) and every occurrence is then stripped from the message, leaving the
//! residual body.

use std::sync::LazyLock;

use chrono::NaiveDate;
use crmsync_shared::{DATE_FORMAT, FormSubmission, RawFormSubmission, clean_field};
use regex::Regex;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Email address.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email regex")
});

/// Phone number: any run of 10 or more digits.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{10,}").expect("phone regex"));

/// ISO calendar date.
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("date regex"));

/// Horizontal whitespace left behind by removals.
static SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("spaces regex"));

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Turn a raw API submission into a [`FormSubmission`].
pub fn extract_submission(raw: &RawFormSubmission) -> FormSubmission {
    let name = clean_field(raw.form_name.as_deref());
    let (first, last) = split_name(name.as_deref());
    let message = raw.form_message.as_deref().unwrap_or_default();

    let submission = FormSubmission {
        first,
        last,
        email: extract_email(message),
        phone: extract_phone(message),
        timestamp: extract_date(message),
        body: residual_body(message),
        name,
    };

    debug!(
        name = submission.name.as_deref().unwrap_or(""),
        has_email = submission.email.is_some(),
        has_phone = submission.phone.is_some(),
        has_date = submission.timestamp.is_some(),
        "form submission extracted"
    );

    submission
}

/// Extract every submission in order.
pub fn extract_all(raw: &[RawFormSubmission]) -> Vec<FormSubmission> {
    raw.iter().map(extract_submission).collect()
}

/// Split a full name into first token and the rest.
///
/// `"Mary Ann Smith"` → (`Mary`, `Ann Smith`); a single token has no last name.
pub fn split_name(full_name: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(full_name) = full_name else {
        return (None, None);
    };

    let mut parts = full_name.split_whitespace();
    let first = parts.next().map(str::to_string);
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    (first, last)
}

/// First email address in `message`.
pub fn extract_email(message: &str) -> Option<String> {
    EMAIL_RE.find(message).map(|m| m.as_str().to_string())
}

/// First phone number in `message`.
pub fn extract_phone(message: &str) -> Option<String> {
    PHONE_RE.find(message).map(|m| m.as_str().to_string())
}

/// First date in `message`; a date-shaped string that isn't a real date is ignored.
pub fn extract_date(message: &str) -> Option<NaiveDate> {
    let raw = DATE_RE.find(message)?.as_str();
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(value = raw, error = %e, "invalid date in form message, ignoring");
            None
        }
    }
}

/// `message` with every email, phone and date removed.
pub fn residual_body(message: &str) -> String {
    let without_email = EMAIL_RE.replace_all(message, "");
    let without_phone = PHONE_RE.replace_all(&without_email, "");
    let without_date = DATE_RE.replace_all(&without_phone, "");

    without_date
        .lines()
        .map(|line| SPACES_RE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
