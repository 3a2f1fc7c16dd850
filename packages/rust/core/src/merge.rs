//! Fold matched form submissions into the CRM table and create new contacts.

use std::collections::HashSet;

use crmsync_shared::{CrmRecord, FormSubmission, HISTORY_SEPARATOR};
use tracing::{debug, info};

use crate::matcher::{self, MatchKey, MatchOutcome};

/// Counters describing what a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Forms matched to an existing record by email.
    pub matched_by_email: usize,
    /// Forms matched to an existing record by phone.
    pub matched_by_phone: usize,
    /// Forms matched to an existing record by name.
    pub matched_by_name: usize,
    /// Of the matches above, forms whose record an earlier stage had already claimed.
    pub routed_to_claimed: usize,
    /// Matched forms without a date, which leave their record untouched.
    pub undated_skipped: usize,
    /// Contacts created from unmatched forms.
    pub new_contacts: usize,
    /// Unmatched forms folded into a contact created earlier in the same run.
    pub folded_into_new: usize,
}

/// Record `form` as the latest contact on `record` and prepend it to the history.
pub fn record_contact(record: &mut CrmRecord, form: &FormSubmission) {
    let entry = form.history_entry();

    record.last_contact_date = form.timestamp;
    record.last_contact_text = Some(form.body.clone());
    record.all_contact_text = Some(match record.all_contact_text.take() {
        Some(history) if !history.is_empty() => format!("{entry}{HISTORY_SEPARATOR}{history}"),
        _ => entry,
    });
}

/// Synthesize `{prefix}-{n}`, starting at `table_len + 1` and skipping ids already taken.
pub fn next_contact_id(taken: &HashSet<String>, prefix: &str, table_len: usize) -> String {
    let mut n = table_len + 1;
    loop {
        let id = format!("{prefix}-{n}");
        if !taken.contains(&id) {
            return id;
        }
        n += 1;
    }
}

/// Copy identity fields from `form` into the gaps of `record`.
fn fill_identity(record: &mut CrmRecord, form: &FormSubmission) {
    if record.first.is_none() {
        record.first.clone_from(&form.first);
    }
    if record.last.is_none() {
        record.last.clone_from(&form.last);
    }
    if record.email.is_none() {
        record.email.clone_from(&form.email);
    }
    if record.phone.is_none() {
        record.phone.clone_from(&form.phone);
    }
}

/// Apply the forms in `outcome` to `crm` and append new contacts for the unmatched ones.
///
/// A form the cascade left unmatched only because its record was already
/// claimed by an earlier stage is routed onto that record, never turned into
/// a duplicate contact. Forms landing on the same record are applied oldest
/// first so the newest entry ends up at the head of the history.
pub fn merge(
    mut crm: Vec<CrmRecord>,
    forms: &[FormSubmission],
    outcome: &MatchOutcome,
    id_prefix: &str,
) -> (Vec<CrmRecord>, MergeSummary) {
    let mut summary = MergeSummary {
        matched_by_email: outcome.count_by(MatchKey::Email),
        matched_by_phone: outcome.count_by(MatchKey::Phone),
        matched_by_name: outcome.count_by(MatchKey::Name),
        ..Default::default()
    };

    let existing = crm.len();
    let mut assigned: Vec<Vec<&FormSubmission>> = (0..existing)
        .map(|record_idx| outcome.forms_for(record_idx).map(|i| &forms[i]).collect())
        .collect();

    // --- Known contacts the cascade skipped ---
    let mut fresh: Vec<&FormSubmission> = Vec::new();
    for &form_idx in &outcome.unmatched {
        let form = &forms[form_idx];
        match matcher::find_record(&crm, form) {
            Some((record_idx, key)) => {
                let id = &crm[record_idx].id;
                debug!(%id, key = key.label(), "form routed to claimed record");
                match key {
                    MatchKey::Email => summary.matched_by_email += 1,
                    MatchKey::Phone => summary.matched_by_phone += 1,
                    MatchKey::Name => summary.matched_by_name += 1,
                }
                summary.routed_to_claimed += 1;
                assigned[record_idx].push(form);
            }
            None => fresh.push(form),
        }
    }

    // --- Existing records ---
    for (record, mut group) in crm.iter_mut().zip(assigned) {
        group.sort_by_key(|f| f.timestamp);

        for form in group {
            if form.timestamp.is_none() {
                debug!(id = %record.id, "matched form has no date, record left unchanged");
                summary.undated_skipped += 1;
                continue;
            }
            record_contact(record, form);
        }
    }

    // --- New contacts ---
    let mut taken: HashSet<String> = crm.iter().map(|r| r.id.clone()).collect();
    let mut members: Vec<Vec<&FormSubmission>> = Vec::new();

    for form in fresh {
        if let Some((offset, key)) = matcher::find_record(&crm[existing..], form) {
            let id = &crm[existing + offset].id;
            debug!(%id, key = key.label(), "form folded into new contact");
            fill_identity(&mut crm[existing + offset], form);
            members[offset].push(form);
            summary.folded_into_new += 1;
            continue;
        }

        let id = next_contact_id(&taken, id_prefix, crm.len());
        taken.insert(id.clone());

        let mut record = CrmRecord {
            id,
            ..Default::default()
        };
        fill_identity(&mut record, form);
        crm.push(record);
        members.push(vec![form]);
        summary.new_contacts += 1;
    }

    for (offset, mut group) in members.into_iter().enumerate() {
        group.sort_by_key(|f| f.timestamp);
        for form in group {
            record_contact(&mut crm[existing + offset], form);
        }
    }

    info!(
        by_email = summary.matched_by_email,
        by_phone = summary.matched_by_phone,
        by_name = summary.matched_by_name,
        new_contacts = summary.new_contacts,
        "merge complete"
    );

    (crm, summary)
}
