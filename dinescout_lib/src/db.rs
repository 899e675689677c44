//! SQLite storage for enriched restaurant records.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use dinescout_api::types::{NAME_NOT_FOUND, NOT_AVAILABLE};

use crate::address::normalize;
use crate::records::RecordTable;

const NAME_HEADER: &str = "Restaurant Name";
const ADDRESS_HEADER: &str = "Address";
const CLEANED_ADDRESS_HEADER: &str = "Cleaned Address";

/// Columns managed by the store itself; CSV headers never map onto them.
const RESERVED_COLUMNS: &[&str] = &["id", "created_at", "updated_at"];

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("input has no '{0}' column")]
    MissingColumn(String),
}

/// Outcome of one bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_read: usize,
    /// Rows dropped for lacking a restaurant name.
    pub skipped: usize,
    pub upserted: usize,
}

/// A stored row as shown by the status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestaurantSample {
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// SQL column name for a CSV header: lowercase, runs of anything other
/// than ASCII letters and digits collapsed to `_`.
pub fn db_column_name(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut pending_sep = false;
    for c in header.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else if c == '\'' || c == '\u{2019}' {
            // "Doesn't" and "Doesnt" map to the same column.
        } else {
            pending_sep = true;
        }
    }
    out
}

fn null_if_blank(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v == NOT_AVAILABLE {
        None
    } else {
        Some(v.to_string())
    }
}

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    #[doc(hidden)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, DbError> {
        self.conn
            .query_row(
                "SELECT value FROM ingest_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn restaurant_count(&self) -> Result<i64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM restaurants", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn sample_restaurants(&self, limit: usize) -> Result<Vec<RestaurantSample>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT restaurant_name, city, state FROM restaurants ORDER BY id LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RestaurantSample {
                name: row.get(0)?,
                city: row.get(1)?,
                state: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn restaurant_columns(&self) -> Result<HashSet<String>, DbError> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(restaurants)")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut out = HashSet::new();
        for row in rows {
            out.insert(row?);
        }
        Ok(out)
    }

    /// Upserts every row of an enriched table in one transaction.
    ///
    /// Rows without a restaurant name are dropped. Blank and "Not available"
    /// values are stored as NULL, and on an identity conflict a NULL never
    /// overwrites a stored value. Any error rolls the whole batch back.
    pub fn load_enriched(&mut self, table: &RecordTable) -> Result<LoadSummary, DbError> {
        let name_idx = table
            .column(NAME_HEADER)
            .ok_or_else(|| DbError::MissingColumn(NAME_HEADER.to_string()))?;
        let cleaned_idx = table.column(CLEANED_ADDRESS_HEADER);
        let address_idx = table.column(ADDRESS_HEADER);
        if cleaned_idx.is_none() && address_idx.is_none() {
            return Err(DbError::MissingColumn(CLEANED_ADDRESS_HEADER.to_string()));
        }

        // (csv index, sql column) for every non-identity column, first header wins.
        let mut seen: HashSet<String> = ["restaurant_name", "cleaned_address"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut columns: Vec<(usize, String)> = Vec::new();
        for (idx, header) in table.headers().iter().enumerate() {
            let col = db_column_name(header);
            if col.is_empty() || RESERVED_COLUMNS.contains(&col.as_str()) {
                tracing::warn!("Ignoring column {:?}: no usable database name", header);
                continue;
            }
            if seen.insert(col.clone()) {
                columns.push((idx, col));
            }
        }

        let existing = self.restaurant_columns()?;
        let tx = self.conn.transaction()?;

        for (_, col) in columns.iter().filter(|(_, c)| !existing.contains(c)) {
            tracing::info!("Adding column {} to restaurants", col);
            match tx.execute(&format!("ALTER TABLE restaurants ADD COLUMN \"{}\" TEXT", col), []) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
                    if msg.contains("duplicate column name") => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut summary = LoadSummary::default();
        {
            let names: Vec<String> = columns.iter().map(|(_, c)| format!("\"{}\"", c)).collect();
            let placeholders: Vec<String> =
                (3..columns.len() + 3).map(|i| format!("?{}", i)).collect();
            let updates: Vec<String> = columns
                .iter()
                .map(|(_, c)| format!("\"{0}\" = COALESCE(excluded.\"{0}\", restaurants.\"{0}\")", c))
                .chain(std::iter::once("updated_at = datetime('now')".to_string()))
                .collect();
            let sql = format!(
                "INSERT INTO restaurants (restaurant_name, cleaned_address{}{})
                 VALUES (?1, ?2{}{})
                 ON CONFLICT(restaurant_name, cleaned_address) DO UPDATE SET {}",
                if names.is_empty() { "" } else { ", " },
                names.join(", "),
                if placeholders.is_empty() { "" } else { ", " },
                placeholders.join(", "),
                updates.join(", "),
            );
            let mut stmt = tx.prepare(&sql)?;

            for (row_idx, row) in table.rows().iter().enumerate() {
                summary.rows_read += 1;
                let name = row.get(name_idx).and_then(null_if_blank);
                let Some(name) = name.filter(|n| n != NAME_NOT_FOUND) else {
                    tracing::warn!("Row {}: no restaurant name, skipping", row_idx + 1);
                    summary.skipped += 1;
                    continue;
                };
                let cleaned = match cleaned_idx {
                    Some(i) => row.get(i).unwrap_or_default().trim().to_string(),
                    None => normalize(address_idx.and_then(|i| row.get(i)).unwrap_or_default())
                        .street,
                };

                let mut values: Vec<Option<String>> = Vec::with_capacity(columns.len() + 2);
                values.push(Some(name));
                values.push(Some(cleaned));
                for (idx, _) in &columns {
                    values.push(row.get(*idx).and_then(null_if_blank));
                }
                stmt.execute(params_from_iter(values.iter()))?;
                summary.upserted += 1;
            }
        }

        tx.execute(
            "INSERT INTO ingest_meta (key, value) VALUES ('last_load_at', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(summary)
    }
}
