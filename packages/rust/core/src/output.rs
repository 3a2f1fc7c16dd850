//! CSV output: the raw reference tables and the final sorted CRM update.

use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use crmsync_shared::{
    CRM_COLUMNS, CrmRecord, CrmSyncError, DATE_FORMAT, FormSubmission, PRIORITY_COLUMN, Priority,
    Result, is_placeholder,
};

/// Columns of `raw_form.csv`.
const FORM_COLUMNS: [&str; 7] = [
    "form_name",
    "form_message",
    "form_first",
    "form_last",
    "form_email",
    "form_phone",
    "form_timestamp",
];

/// A CRM record with its classifier label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: CrmRecord,
    pub priority: Priority,
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Latest contact first (undated last), then by priority. Stable.
pub fn sort_records(rows: &mut [ClassifiedRecord]) {
    rows.sort_by(|a, b| {
        compare_dates_desc(a.record.last_contact_date, b.record.last_contact_date)
            .then(a.priority.cmp(&b.priority))
    });
}

fn compare_dates_desc(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Field rendering
// ---------------------------------------------------------------------------

/// Render an optional text field; placeholders come out empty.
fn text(value: Option<&str>) -> &str {
    match value {
        Some(v) if !is_placeholder(v) => v,
        _ => "",
    }
}

fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn crm_fields(record: &CrmRecord) -> [String; CRM_COLUMNS.len()] {
    [
        text(Some(record.id.as_str())).to_string(),
        text(record.first.as_deref()).to_string(),
        text(record.last.as_deref()).to_string(),
        text(record.email.as_deref()).to_string(),
        text(record.phone.as_deref()).to_string(),
        date(record.last_contact_date),
        text(record.last_contact_text.as_deref()).to_string(),
        text(record.all_contact_text.as_deref()).to_string(),
    ]
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// CSV writer with `\n` record terminators.
fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

fn csv_error(e: csv::Error) -> CrmSyncError {
    CrmSyncError::Output(e.to_string())
}

/// Write the CRM table as parsed.
pub fn write_crm<W: Write>(out: W, records: &[CrmRecord]) -> Result<()> {
    let mut writer = csv_writer(out);
    writer.write_record(CRM_COLUMNS).map_err(csv_error)?;
    for record in records {
        writer.write_record(crm_fields(record)).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| CrmSyncError::Output(e.to_string()))
}

/// Write the extracted form submissions.
pub fn write_forms<W: Write>(out: W, forms: &[FormSubmission]) -> Result<()> {
    let mut writer = csv_writer(out);
    writer.write_record(FORM_COLUMNS).map_err(csv_error)?;
    for form in forms {
        let timestamp = date(form.timestamp);
        writer
            .write_record([
                text(form.name.as_deref()),
                text(Some(form.body.as_str())),
                text(form.first.as_deref()),
                text(form.last.as_deref()),
                text(form.email.as_deref()),
                text(form.phone.as_deref()),
                timestamp.as_str(),
            ])
            .map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| CrmSyncError::Output(e.to_string()))
}

/// Write the final table, with the classifier column appended.
pub fn write_update<W: Write>(out: W, rows: &[ClassifiedRecord]) -> Result<()> {
    let mut writer = csv_writer(out);
    writer
        .write_record(CRM_COLUMNS.into_iter().chain([PRIORITY_COLUMN]))
        .map_err(csv_error)?;
    for row in rows {
        let fields = crm_fields(&row.record);
        writer
            .write_record(fields.iter().map(String::as_str).chain([row.priority.label()]))
            .map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| CrmSyncError::Output(e.to_string()))
}

/// Create `path` and run `write` against it.
pub fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(std::fs::File) -> Result<()>,
{
    let file = std::fs::File::create(path).map_err(|e| CrmSyncError::io(path, e))?;
    write(file).map_err(|e| match e {
        CrmSyncError::Output(msg) => CrmSyncError::Output(format!("{}: {msg}", path.display())),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, date: Option<NaiveDate>, priority: Priority) -> ClassifiedRecord {
        ClassifiedRecord {
            record: CrmRecord {
                id: id.into(),
                last_contact_date: date,
                ..Default::default()
            },
            priority,
        }
    }

    fn ids(rows: &[ClassifiedRecord]) -> Vec<&str> {
        rows.iter().map(|r| r.record.id.as_str()).collect()
    }

    #[test]
    fn sort_date_desc_nulls_last_then_priority() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day);
        let mut rows = vec![
            row("undated-urgent", None, Priority::UrgentReview),
            row("old", d(1), Priority::UrgentReview),
            row("new-note", d(9), Priority::GeneralNote),
            row("new-urgent", d(9), Priority::UrgentReview),
            row("new-review", d(9), Priority::ReviewForImprovement),
            row("undated-note", None, Priority::GeneralNote),
        ];

        sort_records(&mut rows);

        assert_eq!(
            ids(&rows),
            vec![
                "new-urgent",
                "new-review",
                "new-note",
                "old",
                "undated-urgent",
                "undated-note",
            ]
        );
    }

    #[test]
    fn sort_is_stable_on_full_ties() {
        let mut rows = vec![
            row("a", None, Priority::GeneralNote),
            row("b", None, Priority::GeneralNote),
        ];
        sort_records(&mut rows);
        assert_eq!(ids(&rows), vec!["a", "b"]);
    }

    #[test]
    fn update_csv_layout() {
        let rows = vec![ClassifiedRecord {
            record: CrmRecord {
                id: "bfx-1".into(),
                first: Some("Ada".into()),
                last: Some("None".into()),
                email: Some("ada@example.com".into()),
                phone: Some("5550000001".into()),
                last_contact_date: NaiveDate::from_ymd_opt(2024, 3, 5),
                last_contact_text: Some("hi".into()),
                all_contact_text: Some("2024-03-05 - hi\n\n2024-01-01 - hey".into()),
            },
            priority: Priority::GeneralNote,
        }];

        let mut buf = Vec::new();
        write_update(&mut buf, &rows).unwrap();
        let out = String::from_utf8(buf).unwrap();

        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("id,first,last,email,phone,last contact date,last contact text,all contact text,feedback_action_status")
        );
        assert!(out.contains("bfx-1,Ada,,ada@example.com,5550000001,2024-03-05,hi,\"2024-03-05 - hi\n\n2024-01-01 - hey\",General Note"));
    }

    #[test]
    fn form_csv_layout() {
        let forms = vec![FormSubmission {
            name: Some("Ada Lovelace".into()),
            first: Some("Ada".into()),
            last: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            phone: None,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 5),
            body: "hello".into(),
        }];

        let mut buf = Vec::new();
        write_forms(&mut buf, &forms).unwrap();
        let out = String::from_utf8(buf).unwrap();

        assert_eq!(
            out,
            "form_name,form_message,form_first,form_last,form_email,form_phone,form_timestamp\n\
             Ada Lovelace,hello,Ada,Lovelace,ada@example.com,,2024-03-05\n"
        );
    }

    #[test]
    fn write_file_reports_missing_directory() {
        let path = Path::new("/definitely/not/here/crm_update.csv");
        let err = write_file(path, |f| write_update(f, &[])).unwrap_err();
        assert!(matches!(err, CrmSyncError::Io { .. }));
    }
}
