//! CSV decoding of the CRM export.

use crmsync_shared::{
    CRM_COLUMNS, CrmRecord, CrmSyncError, Result, clean_field, normalize_phone,
    parse_contact_date,
};
use csv::StringRecord;
use tracing::warn;

/// Column positions resolved from the header row.
struct ColumnIndex {
    positions: [Option<usize>; CRM_COLUMNS.len()],
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut positions = [None; CRM_COLUMNS.len()];
        for (slot, name) in positions.iter_mut().zip(CRM_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name));
        }

        if positions[0].is_none() {
            return Err(CrmSyncError::validation("CRM export has no `id` column"));
        }

        Ok(Self { positions })
    }

    /// Raw value of column `col` (index into [`CRM_COLUMNS`]) in `row`.
    fn get<'r>(&self, row: &'r StringRecord, col: usize) -> Option<&'r str> {
        self.positions[col].and_then(|i| row.get(i))
    }
}

/// Decode a CRM CSV export.
///
/// Columns are located by header name (case-insensitive), so column order and
/// extra columns don't matter. Only `id` is required.
pub fn parse_crm_csv(content: &str) -> Result<Vec<CrmRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| CrmSyncError::parse(format!("CRM header row: {e}")))?
        .clone();
    let columns = ColumnIndex::from_headers(&headers)?;

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row = result.map_err(|e| CrmSyncError::parse(format!("CRM row {}: {e}", line + 1)))?;
        records.push(decode_row(&columns, &row, line + 1));
    }

    Ok(records)
}

fn decode_row(columns: &ColumnIndex, row: &StringRecord, line: usize) -> CrmRecord {
    let field = |col: usize| clean_field(columns.get(row, col));

    let id = field(0).unwrap_or_default();
    if id.is_empty() {
        warn!(line, "CRM row without an id");
    }

    let last_contact_date = field(5).and_then(|raw| {
        let parsed = parse_contact_date(&raw);
        if parsed.is_none() {
            warn!(line, value = %raw, "unparseable last contact date, treating as empty");
        }
        parsed
    });

    CrmRecord {
        id,
        first: field(1),
        last: field(2),
        email: field(3),
        phone: field(4).and_then(|p| normalize_phone(&p)),
        last_contact_date,
        last_contact_text: field(6),
        all_contact_text: field(7),
    }
}
