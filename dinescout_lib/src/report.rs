//! Report of cleaned restaurants that never made it into the enriched file.

use std::collections::HashSet;
use std::path::Path;

use crate::enrich::NAME_COLUMN;
use crate::error::PipelineError;
use crate::records::RecordTable;

/// Rows of `cleaned` whose name does not appear in `enriched`.
///
/// Matching is on the trimmed restaurant name only.
pub fn missing_rows(cleaned: &RecordTable, enriched: &RecordTable) -> Result<RecordTable, PipelineError> {
    cleaned.require_columns(&[NAME_COLUMN])?;
    let Some(name_idx) = cleaned.column(NAME_COLUMN) else {
        return Ok(RecordTable::new(cleaned.headers().to_vec()));
    };

    let done: HashSet<&str> = match enriched.column(NAME_COLUMN) {
        Some(idx) => enriched
            .rows()
            .iter()
            .filter_map(|r| r.get(idx))
            .map(str::trim)
            .collect(),
        None => HashSet::new(),
    };

    let mut missing = RecordTable::new(cleaned.headers().to_vec());
    for row in cleaned.rows() {
        let name = row.get(name_idx).unwrap_or_default().trim();
        if !done.contains(name) {
            missing.push(row.clone());
        }
    }
    Ok(missing)
}

/// Writes the missing-rows report to `out` and returns its row count.
///
/// An absent enriched file means every cleaned row is missing.
pub fn write_missing_report(cleaned: &Path, enriched: &Path, out: &Path) -> Result<usize, PipelineError> {
    let cleaned = RecordTable::read(cleaned)?;
    let enriched = RecordTable::read_if_exists(enriched)?;
    let missing = missing_rows(&cleaned, &enriched)?;
    missing.write_atomic(out)?;
    tracing::info!(
        "{} of {} cleaned restaurants missing from enriched output; wrote {}",
        missing.len(),
        cleaned.len(),
        out.display()
    );
    Ok(missing.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reports_rows_absent_from_enriched() {
        let dir = tempfile::tempdir().unwrap();
        let cleaned = dir.path().join("cleaned.csv");
        let enriched = dir.path().join("enriched.csv");
        let out = dir.path().join("processed/missing.csv");
        fs::write(
            &cleaned,
            "Restaurant Name,Address,City\nCafe,1 Main St,Austin\nDiner,2 Oak St,Austin\nBar,3 Elm St,Dallas\n",
        )
        .unwrap();
        fs::write(&enriched, "Restaurant Name,Star Rating\nCafe ,4.5\n").unwrap();

        let count = write_missing_report(&cleaned, &enriched, &out).unwrap();
        assert_eq!(count, 2);

        let report = RecordTable::read(&out).unwrap();
        assert_eq!(report.headers(), &["Restaurant Name", "Address", "City"]);
        assert_eq!(report.get(0, "Restaurant Name"), Some("Diner"));
        assert_eq!(report.get(1, "Restaurant Name"), Some("Bar"));
    }

    #[test]
    fn absent_enriched_file_reports_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cleaned = dir.path().join("cleaned.csv");
        fs::write(&cleaned, "Restaurant Name,Address\nCafe,1 Main St\n").unwrap();
        let count = write_missing_report(
            &cleaned,
            &dir.path().join("nope.csv"),
            &dir.path().join("missing.csv"),
        )
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn cleaned_without_name_column_is_rejected() {
        let cleaned = RecordTable::new(vec!["Address".to_string()]);
        let enriched = RecordTable::default();
        assert!(matches!(
            missing_rows(&cleaned, &enriched),
            Err(PipelineError::RecordFile(_))
        ));
    }
}
