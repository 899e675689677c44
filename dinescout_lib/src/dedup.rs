//! City filling and layered duplicate removal over cleaned records.

use std::collections::{HashMap, HashSet};

use dinescout_api::types::CleanedRecord;

/// Fills empty cities from siblings sharing the same (state, zip).
///
/// A group is filled only when its non-empty cities agree on exactly one
/// value. Records without a zip are never grouped.
pub fn fill_missing_city(mut records: Vec<CleanedRecord>) -> Vec<CleanedRecord> {
    let mut cities: HashMap<(String, String), HashSet<String>> = HashMap::new();
    for r in &records {
        if r.zip.is_empty() {
            continue;
        }
        let entry = cities.entry((r.state.clone(), r.zip.clone())).or_default();
        if !r.city.is_empty() {
            entry.insert(r.city.clone());
        }
    }

    let mut filled = 0usize;
    for r in records.iter_mut() {
        if !r.city.is_empty() || r.zip.is_empty() {
            continue;
        }
        let Some(known) = cities.get(&(r.state.clone(), r.zip.clone())) else {
            continue;
        };
        if known.len() == 1 {
            if let Some(city) = known.iter().next() {
                r.city = city.clone();
                filled += 1;
            }
        }
    }
    if filled > 0 {
        tracing::debug!("Filled {} missing cities from state/zip siblings", filled);
    }
    records
}

/// Sort key component that places empty values after every non-empty one.
fn empty_last(value: &str) -> (bool, &str) {
    (value.is_empty(), value)
}

fn keep_first<F>(records: Vec<CleanedRecord>, key: F) -> Vec<CleanedRecord>
where
    F: Fn(&CleanedRecord) -> (String, String),
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(key(r)))
        .collect()
}

/// Removes duplicate restaurants, keeping the most complete record of each.
///
/// Passes run in a fixed order: sort by (name, street, city, zip) with empty
/// values last, drop repeats of (name, street), then (name, city), re-sort by
/// city and drop repeats of (name, zip), finally drop records with neither a
/// city nor a zip. Empty values compare equal to each other.
pub fn remove_duplicates(mut records: Vec<CleanedRecord>) -> Vec<CleanedRecord> {
    let before = records.len();

    records.sort_by(|a, b| {
        empty_last(&a.name)
            .cmp(&empty_last(&b.name))
            .then_with(|| empty_last(&a.street).cmp(&empty_last(&b.street)))
            .then_with(|| empty_last(&a.city).cmp(&empty_last(&b.city)))
            .then_with(|| empty_last(&a.zip).cmp(&empty_last(&b.zip)))
    });

    let records = keep_first(records, |r| (r.name.clone(), r.street.clone()));
    let mut records = keep_first(records, |r| (r.name.clone(), r.city.clone()));

    records.sort_by(|a, b| empty_last(&a.city).cmp(&empty_last(&b.city)));
    let records = keep_first(records, |r| (r.name.clone(), r.zip.clone()));

    let records: Vec<CleanedRecord> = records.into_iter().filter(|r| r.has_location()).collect();

    tracing::debug!(
        "Duplicate removal kept {} of {} records",
        records.len(),
        before
    );
    records
}

/// Completeness counts logged after each cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningStats {
    pub total: usize,
    pub missing_city: usize,
    /// City, state and zip all present.
    pub complete: usize,
}

impl CleaningStats {
    pub fn collect(records: &[CleanedRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for r in records {
            if r.city.is_empty() {
                stats.missing_city += 1;
            }
            if !r.city.is_empty() && !r.state.is_empty() && !r.zip.is_empty() {
                stats.complete += 1;
            }
        }
        stats
    }

    pub fn log(&self, stage: &str) {
        tracing::info!(
            "{}: {} entries, {} missing city, {} complete",
            stage,
            self.total,
            self.missing_city,
            self.complete
        );
    }
}
