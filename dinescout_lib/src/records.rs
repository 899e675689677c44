//! CSV record files shared by the pipeline stages.
//!
//! Output files are append-only: each row is serialized into a buffer and
//! written with one `write_all` on a handle opened in append mode, so rows
//! from concurrent writers may interleave but are never torn.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum RecordFileError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} is missing required columns: {}", columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },
    #[error("{path} has header [{}], expected [{}]", found.join(", "), expected.join(", "))]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl RecordFileError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).flexible(true);
    builder
}

/// An untyped CSV table: header plus rows, with lookups by column name.
///
/// Used where a stage must carry through whatever columns its input has.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    source: Option<PathBuf>,
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

impl RecordTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            source: None,
            headers,
            rows: Vec::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, RecordFileError> {
        let mut reader = reader_builder()
            .from_path(path)
            .map_err(|e| RecordFileError::csv(path, e))?;
        let headers = reader
            .headers()
            .map_err(|e| RecordFileError::csv(path, e))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for row in reader.records() {
            rows.push(row.map_err(|e| RecordFileError::csv(path, e))?);
        }
        Ok(Self {
            source: Some(path.to_path_buf()),
            headers,
            rows,
        })
    }

    /// Reads `path`, or returns an empty table when the file does not exist.
    pub fn read_if_exists(path: &Path) -> Result<Self, RecordFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::read(path)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[csv::StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: csv::StringRecord) {
        self.rows.push(row);
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of column `name` in row `row`; `None` when either is absent.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column(name)?;
        self.rows.get(row)?.get(idx)
    }

    /// Fails with the list of absent columns, if any.
    pub fn require_columns(&self, required: &[&str]) -> Result<(), RecordFileError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|c| self.column(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RecordFileError::MissingColumns {
                path: self.source.clone().unwrap_or_default(),
                columns: missing,
            })
        }
    }

    /// Set of (name, address) pairs present in the table.
    pub fn keys(&self, name_col: &str, address_col: &str) -> Vec<(String, String)> {
        let (Some(n), Some(a)) = (self.column(name_col), self.column(address_col)) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .map(|r| {
                (
                    r.get(n).unwrap_or_default().to_string(),
                    r.get(a).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    /// Replaces `path` with this table via a sibling temp file.
    pub fn write_atomic(&self, path: &Path) -> Result<(), RecordFileError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RecordFileError::io(parent, e))?;
        }
        let tmp = temp_sibling(path);
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&tmp)
                .map_err(|e| RecordFileError::csv(&tmp, e))?;
            writer
                .write_record(&self.headers)
                .map_err(|e| RecordFileError::csv(&tmp, e))?;
            for row in &self.rows {
                writer
                    .write_record(row)
                    .map_err(|e| RecordFileError::csv(&tmp, e))?;
            }
            writer.flush().map_err(|e| RecordFileError::io(&tmp, e))?;
        }
        fs::rename(&tmp, path).map_err(|e| RecordFileError::io(path, e))
    }
}

/// Reads every row of `path` into `T`.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RecordFileError> {
    let mut reader = reader_builder()
        .from_path(path)
        .map_err(|e| RecordFileError::csv(path, e))?;
    let mut out = Vec::new();
    for row in reader.deserialize() {
        out.push(row.map_err(|e| RecordFileError::csv(path, e))?);
    }
    Ok(out)
}

/// Replaces `path` with `records`, writing a sibling temp file first and
/// renaming it into place.
pub fn write_records_atomic<T: Serialize>(
    path: &Path,
    headers: &[&str],
    records: &[T],
) -> Result<(), RecordFileError> {
    let tmp = temp_sibling(path);
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .map_err(|e| RecordFileError::csv(&tmp, e))?;
        writer
            .write_record(headers)
            .map_err(|e| RecordFileError::csv(&tmp, e))?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| RecordFileError::csv(&tmp, e))?;
        }
        writer.flush().map_err(|e| RecordFileError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| RecordFileError::io(path, e))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode_row<I, S>(path: &Path, fields: I) -> Result<Vec<u8>, RecordFileError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| RecordFileError::csv(path, e))?;
    writer
        .into_inner()
        .map_err(|e| RecordFileError::io(path, e.into_error()))
}

/// Append-only CSV writer shared by reference across threads.
///
/// Cloning is cheap and every clone appends to the same handle.
#[derive(Debug, Clone)]
pub struct AppendWriter {
    path: PathBuf,
    file: Arc<File>,
}

impl AppendWriter {
    /// Opens `path` for appending. A new or empty file gets `headers` as its
    /// first row; an existing file must already carry exactly `headers`.
    pub fn open(path: &Path, headers: &[String]) -> Result<Self, RecordFileError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RecordFileError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RecordFileError::io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| RecordFileError::io(path, e))?
            .len();

        let writer = Self {
            path: path.to_path_buf(),
            file: Arc::new(file),
        };

        if len == 0 {
            writer.append_fields(headers)?;
        } else {
            let found = RecordTable::read(path)?.headers;
            if found != headers {
                return Err(RecordFileError::HeaderMismatch {
                    path: path.to_path_buf(),
                    expected: headers.to_vec(),
                    found,
                });
            }
        }
        Ok(writer)
    }

    /// Appends one row as a single write.
    pub fn append_fields<S: AsRef<str>>(&self, fields: &[S]) -> Result<(), RecordFileError> {
        let buf = encode_row(&self.path, fields.iter().map(|f| f.as_ref().as_bytes()))?;
        (&*self.file)
            .write_all(&buf)
            .map_err(|e| RecordFileError::io(&self.path, e))
    }

    /// Serializes `record` and appends it as a single write.
    pub fn append<T: Serialize>(&self, record: &T) -> Result<(), RecordFileError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .serialize(record)
            .map_err(|e| RecordFileError::csv(&self.path, e))?;
        let buf = writer
            .into_inner()
            .map_err(|e| RecordFileError::io(&self.path, e.into_error()))?;
        (&*self.file)
            .write_all(&buf)
            .map_err(|e| RecordFileError::io(&self.path, e))
    }
}
