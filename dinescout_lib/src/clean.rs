//! Batch cleaning: re-normalize a record file, fill cities, drop duplicates.

use std::path::Path;

use dinescout_api::types::{CleanedRecord, RestaurantStub, CLEANED_HEADERS};

use crate::address::normalize;
use crate::dedup::{fill_missing_city, remove_duplicates, CleaningStats};
use crate::error::PipelineError;
use crate::records::{read_records, write_records_atomic, RecordFileError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub rows_read: usize,
    /// Rows whose address yielded no zip.
    pub without_zip: usize,
    pub after_city_fill: CleaningStats,
    pub after_dedup: CleaningStats,
}

fn normalize_all(stubs: Vec<RestaurantStub>) -> (Vec<CleanedRecord>, usize) {
    let mut without_zip = 0;
    let mut cleaned = Vec::with_capacity(stubs.len());
    for stub in stubs {
        let address = normalize(&stub.address);
        if address.zip.is_empty() {
            without_zip += 1;
            continue;
        }
        cleaned.push(CleanedRecord::from_stub(stub, address));
    }
    (cleaned, without_zip)
}

/// Cleans `input` (a raw or previously cleaned file) into `output`.
///
/// Address columns are always derived again from the `Address` column, so
/// running this over its own output is a no-op.
pub fn clean_file(input: &Path, output: &Path) -> Result<CleanSummary, PipelineError> {
    let stubs: Vec<RestaurantStub> = read_records(input)?;
    let rows_read = stubs.len();

    let (cleaned, without_zip) = normalize_all(stubs);

    let filled = fill_missing_city(cleaned);
    let after_city_fill = CleaningStats::collect(&filled);
    after_city_fill.log("After city fill");

    let deduped = remove_duplicates(filled);
    let after_dedup = CleaningStats::collect(&deduped);
    after_dedup.log("After duplicate removal");

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RecordFileError::io(parent, e))?;
    }
    write_records_atomic(output, CLEANED_HEADERS, &deduped)?;
    tracing::info!(
        "Cleaned {} rows into {} ({} without zip)",
        rows_read,
        output.display(),
        without_zip
    );

    Ok(CleanSummary {
        rows_read,
        without_zip,
        after_city_fill,
        after_dedup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dinescout_api::types::RAW_HEADERS;
    use std::fs;

    fn write_raw(path: &Path, rows: &[(&str, &str)]) {
        let mut out = RAW_HEADERS.join(",");
        out.push('\n');
        for (name, address) in rows {
            out.push_str(&format!("{},desc,\"{}\",,,,,\n", name, address));
        }
        fs::write(path, out).unwrap();
    }

    #[test]
    fn cleans_and_dedups_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let out = dir.path().join("out/cleaned.csv");
        write_raw(
            &raw,
            &[
                ("Cafe", "1 Main St, Austin, TX 78701"),
                ("Cafe", "1 Main St , Austin, TX 78701"),
                ("Diner", "2 Oak St, TX 78701"),
                ("Truck", "Parked somewhere"),
            ],
        );

        let summary = clean_file(&raw, &out).unwrap();
        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.without_zip, 1);
        assert_eq!(summary.after_city_fill.missing_city, 0);
        assert_eq!(summary.after_dedup.total, 2);

        let rows: Vec<CleanedRecord> = read_records(&out).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.city == "Austin"));
    }

    #[test]
    fn cleaning_own_output_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        write_raw(
            &raw,
            &[
                ("Cafe", "1 Main St, Austin, TX 78701"),
                ("Bistro", "9 Elm St, Washington, DC 20001"),
            ],
        );
        clean_file(&raw, &first).unwrap();
        clean_file(&first, &second).unwrap();
        assert_eq!(fs::read_to_string(first).unwrap(), fs::read_to_string(second).unwrap());
    }

    #[test]
    fn normalize_drops_zipless() {
        let stubs = vec![
            RestaurantStub {
                name: "A".into(),
                address: "1 Main St, Austin, TX 78701".into(),
                ..RestaurantStub::default()
            },
            RestaurantStub {
                name: "B".into(),
                address: "nowhere".into(),
                ..RestaurantStub::default()
            },
        ];
        let (cleaned, without_zip) = normalize_all(stubs);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(without_zip, 1);
    }
}
