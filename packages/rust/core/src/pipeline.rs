//! End-to-end `run` pipeline: fetch → extract → match → merge → classify → sort → write.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crmsync_extract::extract_all;
use crmsync_shared::{CrmRecord, CrmSyncError, FormSubmission, Priority, Result, SyncConfig};
use crmsync_source::{DataSource, SourceOptions};

use crate::classify::Classifier;
use crate::matcher::match_forms;
use crate::merge::{MergeSummary, merge};
use crate::output::{self, ClassifiedRecord};

/// Result of a pipeline run.
#[derive(Debug)]
pub struct SyncReport {
    /// Records in the CRM export.
    pub crm_records: usize,
    /// Form submissions received.
    pub form_submissions: usize,
    /// What the merge did.
    pub merge: MergeSummary,
    /// Rows in the final table per priority.
    pub priorities: BTreeMap<Priority, usize>,
    /// Path of the parsed form table.
    pub raw_form_path: PathBuf,
    /// Path of the parsed CRM table.
    pub raw_crm_path: PathBuf,
    /// Path of the final table.
    pub update_path: PathBuf,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl SyncReport {
    /// Rows in the final table.
    pub fn total_rows(&self) -> usize {
        self.priorities.values().sum()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, report: &SyncReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _report: &SyncReport) {}
}

/// In-memory outcome of reconciling the two sources.
#[derive(Debug)]
pub struct Reconciliation {
    /// Final rows, sorted for output.
    pub rows: Vec<ClassifiedRecord>,
    /// What the merge did.
    pub summary: MergeSummary,
}

/// Match, merge, classify and sort. No I/O.
pub fn reconcile(
    crm: Vec<CrmRecord>,
    forms: &[FormSubmission],
    id_prefix: &str,
    classifier: &Classifier,
) -> Reconciliation {
    let outcome = match_forms(&crm, forms);
    let (table, summary) = merge(crm, forms, &outcome, id_prefix);

    let mut rows: Vec<ClassifiedRecord> = table
        .into_iter()
        .map(|record| {
            let priority = classifier.classify(record.last_contact_text.as_deref());
            ClassifiedRecord { record, priority }
        })
        .collect();
    output::sort_records(&mut rows);

    Reconciliation { rows, summary }
}

/// Run the full pipeline.
///
/// 1. Fetch the CRM export, then the form submissions
/// 2. Extract contact fields from the form messages
/// 3. Write `raw_form.csv` and `raw_crm.csv`
/// 4. Reconcile (match, merge, classify, sort)
/// 5. Write `crm_update.csv`
#[instrument(skip_all, fields(base_url = %config.base_url))]
pub async fn run_sync(config: &SyncConfig, progress: &dyn ProgressReporter) -> Result<SyncReport> {
    let start = Instant::now();

    // --- Phase 1: Fetch ---
    progress.phase("Fetching CRM export");
    let source = DataSource::new(SourceOptions::from(config))?;
    let crm = source.fetch_crm().await?;

    progress.phase("Fetching form submissions");
    let raw_forms = source.fetch_forms().await?;

    // --- Phase 2: Extract ---
    progress.phase("Extracting contact details");
    let forms = extract_all(&raw_forms);

    // --- Phase 3: Reference tables ---
    progress.phase("Writing reference tables");
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| CrmSyncError::io(&config.output_dir, e))?;

    let raw_form_path = config.output_dir.join(&config.raw_form_file);
    output::write_file(&raw_form_path, |f| output::write_forms(f, &forms))?;

    let raw_crm_path = config.output_dir.join(&config.raw_crm_file);
    output::write_file(&raw_crm_path, |f| output::write_crm(f, &crm))?;

    // --- Phase 4: Reconcile ---
    progress.phase("Reconciling contacts");
    let crm_records = crm.len();
    let classifier = Classifier::new(config.keywords.as_slice());
    let reconciliation = reconcile(crm, &forms, &config.id_prefix, &classifier);

    // --- Phase 5: Final table ---
    progress.phase("Writing CRM update");
    let update_path = config.output_dir.join(&config.update_file);
    output::write_file(&update_path, |f| output::write_update(f, &reconciliation.rows))?;

    let mut priorities: BTreeMap<Priority, usize> =
        Priority::ALL.into_iter().map(|p| (p, 0)).collect();
    for row in &reconciliation.rows {
        *priorities.entry(row.priority).or_default() += 1;
    }

    let report = SyncReport {
        crm_records,
        form_submissions: forms.len(),
        merge: reconciliation.summary,
        priorities,
        raw_form_path,
        raw_crm_path,
        update_path,
        elapsed: start.elapsed(),
    };

    info!(
        rows = report.total_rows(),
        path = %report.update_path.display(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "CRM update written"
    );

    progress.done(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmsync_shared::AppConfig;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_api() -> MockServer {
        let server = MockServer::start().await;

        let crm = std::fs::read_to_string("../../../fixtures/crm/crm.csv").expect("crm fixture");
        let forms = std::fs::read_to_string("../../../fixtures/forms/form-submissions.json")
            .expect("forms fixture");

        Mock::given(method("GET"))
            .and(path("/api/data/crm"))
            .and(header("authorization", "Bearer pipeline-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(crm))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/data/form-submissions"))
            .and(header("authorization", "Bearer pipeline-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(forms))
            .mount(&server)
            .await;

        server
    }

    fn config_for(server: &MockServer, out: &std::path::Path) -> SyncConfig {
        let mut config = SyncConfig::from_app(&AppConfig::default(), "pipeline-token").unwrap();
        config.base_url = Url::parse(&server.uri()).unwrap();
        config.output_dir = out.to_path_buf();
        config
    }

    #[tokio::test]
    async fn full_run_writes_sorted_update() {
        let server = mock_api().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path());

        let report = run_sync(&config, &SilentProgress).await.unwrap();

        assert_eq!(report.crm_records, 4);
        assert_eq!(report.form_submissions, 5);
        assert_eq!(report.merge.matched_by_email, 1);
        assert_eq!(report.merge.matched_by_phone, 1);
        assert_eq!(report.merge.matched_by_name, 1);
        assert_eq!(report.merge.new_contacts, 1);
        assert_eq!(report.merge.folded_into_new, 1);
        assert_eq!(report.total_rows(), 5);
        assert_eq!(report.priorities[&Priority::UrgentReview], 1);

        assert!(report.raw_form_path.exists());
        assert!(report.raw_crm_path.exists());

        let update = std::fs::read_to_string(&report.update_path).unwrap();
        let mut reader = csv::Reader::from_reader(update.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        let ids: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
        assert_eq!(ids, vec!["bfx-5", "bfx-1", "bfx-3", "bfx-4", "bfx-2"]);

        let ada = &rows[1];
        assert_eq!(&ada[5], "2024-03-05");
        assert_eq!(&ada[6], "urgent issue with broken coffee machine, call asap");
        assert!(ada[7].starts_with("2024-03-05 - urgent issue"));
        assert!(ada[7].ends_with("2023-11-02 - First hello"));
        assert_eq!(&ada[8], "Urgent Review");

        let linus = &rows[0];
        assert_eq!(&linus[1], "Linus");
        assert_eq!(&linus[3], "linus@kernel.org");
        assert_eq!(&linus[4], "5559990000");
        assert_eq!(
            &linus[7],
            "2024-03-12 - Following up, thanks\n\n2024-03-10 - Please send the address of the room"
        );
        assert_eq!(&linus[8], "General Note");

        let alan = &rows[2];
        assert_eq!(&alan[3], "");
        assert_eq!(&alan[8], "Review for Improvement");

        let grace = &rows[4];
        assert_eq!(&grace[4], "5550000002");
        assert_eq!(&grace[5], "2023-12-01");
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path());

        let err = run_sync(&config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, CrmSyncError::Network(_)));
        assert!(!dir.path().join("crm_update.csv").exists());
        assert!(!dir.path().join("raw_crm.csv").exists());
    }

    #[test]
    fn reconcile_keeps_unmatched_crm_rows() {
        let crm = vec![CrmRecord {
            id: "c-1".into(),
            first: Some("Quiet".into()),
            last: Some("Customer".into()),
            ..Default::default()
        }];

        let result = reconcile(crm, &[], "bfx", &Classifier::default());
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].priority, Priority::GeneralNote);
        assert_eq!(result.summary, MergeSummary::default());
    }
}
