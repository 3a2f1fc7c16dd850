//! Contact cascade: assign form submissions to CRM records.
//!
//! Three stages run in priority order (email, phone, name). A stage only
//! looks at CRM records no earlier stage matched, and only at forms no earlier
//! assignment consumed. Within a stage a record collects every form that
//! matches it; a form matching several records goes to the first one in table
//! order.

use crmsync_shared::{CrmRecord, FormSubmission, keys_match};
use tracing::debug;

/// The key a form was matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Email,
    Phone,
    Name,
}

impl MatchKey {
    /// Cascade order.
    pub const CASCADE: [MatchKey; 3] = [Self::Email, Self::Phone, Self::Name];

    /// Whether `form` refers to the same contact as `record` under this key.
    pub fn matches(self, record: &CrmRecord, form: &FormSubmission) -> bool {
        match self {
            Self::Email => keys_match(record.email.as_deref(), form.email.as_deref()),
            Self::Phone => match (&record.phone, &form.phone) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            Self::Name => {
                keys_match(record.first.as_deref(), form.first.as_deref())
                    && keys_match(record.last.as_deref(), form.last.as_deref())
            }
        }
    }

    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Name => "name",
        }
    }
}

/// Find the record `form` belongs to, trying each key in cascade order.
pub fn find_record(records: &[CrmRecord], form: &FormSubmission) -> Option<(usize, MatchKey)> {
    MatchKey::CASCADE.into_iter().find_map(|key| {
        records
            .iter()
            .position(|record| key.matches(record, form))
            .map(|idx| (idx, key))
    })
}

/// One form assigned to one CRM record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Index into the form list.
    pub form: usize,
    /// Index into the CRM table.
    pub record: usize,
    /// Stage that produced the match.
    pub key: MatchKey,
}

/// Result of running the cascade.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Assignments in the order they were made.
    pub assignments: Vec<Assignment>,
    /// Forms no CRM record matched, in submission order.
    pub unmatched: Vec<usize>,
}

impl MatchOutcome {
    /// Number of forms matched under `key`.
    pub fn count_by(&self, key: MatchKey) -> usize {
        self.assignments.iter().filter(|a| a.key == key).count()
    }

    /// Forms assigned to `record`, in assignment order.
    pub fn forms_for(&self, record: usize) -> impl Iterator<Item = usize> + '_ {
        self.assignments
            .iter()
            .filter(move |a| a.record == record)
            .map(|a| a.form)
    }
}

/// Run the email → phone → name cascade.
pub fn match_forms(crm: &[CrmRecord], forms: &[FormSubmission]) -> MatchOutcome {
    let mut assigned = vec![false; forms.len()];
    let mut matched = vec![false; crm.len()];
    let mut outcome = MatchOutcome::default();

    for key in MatchKey::CASCADE {
        for (record_idx, record) in crm.iter().enumerate() {
            if matched[record_idx] {
                continue;
            }

            let mut hit = false;
            for (form_idx, form) in forms.iter().enumerate() {
                if assigned[form_idx] || !key.matches(record, form) {
                    continue;
                }
                assigned[form_idx] = true;
                hit = true;
                outcome.assignments.push(Assignment {
                    form: form_idx,
                    record: record_idx,
                    key,
                });
            }

            // Marked after the scan so the record collects every form of this stage.
            matched[record_idx] = hit;
        }

        debug!(key = key.label(), matches = outcome.count_by(key), "match stage done");
    }

    outcome.unmatched = assigned
        .iter()
        .enumerate()
        .filter(|(_, done)| !**done)
        .map(|(idx, _)| idx)
        .collect();

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        id: &str,
        first: &str,
        last: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> CrmRecord {
        CrmRecord {
            id: id.into(),
            first: Some(first.into()),
            last: Some(last.into()),
            email: email.map(Into::into),
            phone: phone.map(Into::into),
            ..Default::default()
        }
    }

    fn form(
        first: &str,
        last: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> FormSubmission {
        FormSubmission {
            first: Some(first.into()),
            last: last.map(Into::into),
            email: email.map(Into::into),
            phone: phone.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn cascade_uses_each_key() {
        let crm = vec![
            record("1", "Ada", "Lovelace", Some("ada@example.com"), None),
            record("2", "Alan", "Turing", None, Some("5550000003")),
            record("3", "Grace", "Hopper", None, None),
        ];
        let forms = vec![
            form("Grace", Some("Hopper"), None, None),
            form("A", None, Some("ADA@example.com"), None),
            form("Al", None, None, Some("5550000003")),
            form("Nobody", Some("Known"), Some("x@y.io"), None),
        ];

        let outcome = match_forms(&crm, &forms);

        assert_eq!(outcome.count_by(MatchKey::Email), 1);
        assert_eq!(outcome.count_by(MatchKey::Phone), 1);
        assert_eq!(outcome.count_by(MatchKey::Name), 1);
        assert_eq!(outcome.forms_for(0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(outcome.forms_for(1).collect::<Vec<_>>(), vec![2]);
        assert_eq!(outcome.forms_for(2).collect::<Vec<_>>(), vec![0]);
        assert_eq!(outcome.unmatched, vec![3]);
    }

    #[test]
    fn email_matched_record_skips_later_stages() {
        // Record 0 matched by email; its phone must not pull in another form.
        let crm = vec![record("1", "Ada", "Lovelace", Some("ada@example.com"), Some("5550000001"))];
        let forms = vec![
            form("Ada", None, Some("ada@example.com"), None),
            form("Someone", None, None, Some("5550000001")),
        ];

        let outcome = match_forms(&crm, &forms);
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.unmatched, vec![1]);
    }

    #[test]
    fn record_collects_all_forms_of_its_stage() {
        let crm = vec![record("1", "Ada", "Lovelace", Some("ada@example.com"), None)];
        let forms = vec![
            form("Ada", None, Some("ada@example.com"), None),
            form("Ada", None, Some("ada@example.com"), None),
        ];

        let outcome = match_forms(&crm, &forms);
        assert_eq!(outcome.forms_for(0).count(), 2);
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn first_record_wins_ties() {
        let crm = vec![
            record("1", "Sam", "Lee", None, Some("5551112222")),
            record("2", "Sam", "Lee", None, Some("5551112222")),
        ];
        let forms = vec![form("Sam", Some("Lee"), None, Some("5551112222"))];

        let outcome = match_forms(&crm, &forms);
        assert_eq!(outcome.assignments[0].record, 0);
        assert_eq!(outcome.forms_for(1).count(), 0);
    }

    #[test]
    fn name_match_needs_both_parts() {
        let crm = vec![record("1", "Cher", "Sarkisian", None, None)];
        let forms = vec![form("Cher", None, None, None)];

        let outcome = match_forms(&crm, &forms);
        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.unmatched, vec![0]);
    }

    #[test]
    fn email_beats_phone_across_records() {
        let crm = vec![
            record("1", "Sam", "Lee", None, Some("5551112222")),
            record("2", "Samuel", "Lee", Some("sam@lee.io"), None),
        ];
        let forms = vec![form("Sam", None, Some("sam@lee.io"), Some("5551112222"))];

        let outcome = match_forms(&crm, &forms);
        assert_eq!(
            outcome.assignments,
            vec![Assignment {
                form: 0,
                record: 1,
                key: MatchKey::Email,
            }]
        );
        assert_eq!(outcome.forms_for(0).count(), 0);
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn find_record_prefers_email_over_name() {
        let records = vec![
            record("1", "Sam", "Lee", None, None),
            record("2", "Other", "Person", Some("sam@lee.io"), None),
        ];
        let f = form("Sam", Some("Lee"), Some("sam@lee.io"), None);
        assert_eq!(find_record(&records, &f), Some((1, MatchKey::Email)));
    }
}
