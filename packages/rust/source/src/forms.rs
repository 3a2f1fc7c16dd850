//! JSON decoding of the form submissions.

use crmsync_shared::{CrmSyncError, RawFormSubmission, Result};

/// Decode the form submissions array.
///
/// Unknown keys are ignored; a missing or `null` name/message decodes as absent.
pub fn parse_form_json(content: &str) -> Result<Vec<RawFormSubmission>> {
    serde_json::from_str(content)
        .map_err(|e| CrmSyncError::parse(format!("form submissions: {e}")))
}
