//! The `status` subcommand: stage file sizes and what the database holds.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use dinescout_lib::{Db, PipelineConfig, RecordTable};
use serde::Serialize;

use crate::output::{build_restaurant_rows, print_json, print_rows, FileRow, OutputFormat};

#[derive(Args)]
pub struct StatusArgs {
    /// SQLite database path (default: from config)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Number of stored restaurants to list
    #[arg(long, default_value_t = 5)]
    pub limit: usize,
}

#[derive(Serialize)]
struct StatusReport {
    files: Vec<FileRow>,
    restaurants: i64,
    last_load_at: Option<String>,
}

fn file_row(stage: &str, path: &Path) -> FileRow {
    let rows = if path.exists() {
        match RecordTable::read(path) {
            Ok(table) => table.len().to_string(),
            Err(e) => format!("unreadable: {}", e),
        }
    } else {
        "-".to_string()
    };
    FileRow {
        stage: stage.to_string(),
        path: path.display().to_string(),
        rows,
    }
}

/// Local time for an RFC 3339 timestamp; unparseable values pass through.
fn display_time(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

pub fn run(args: &StatusArgs, config: &PipelineConfig, format: &OutputFormat) -> Result<()> {
    let paths = &config.paths;
    let files = vec![
        file_row("raw", &paths.raw_path()),
        file_row("cleaned", &paths.cleaned_path()),
        file_row("enriched", &paths.enriched_path()),
        file_row("missing", &paths.missing_path()),
    ];

    let db_path = args.db.clone().unwrap_or_else(|| paths.database_path());
    if !db_path.is_file() {
        print_rows(&files, format)?;
        bail!("database {} not found; run `dinescout load` first", db_path.display());
    }
    let db = Db::open(&db_path)?;
    if !db.table_exists("restaurants")? {
        print_rows(&files, format)?;
        bail!("database {} has no restaurants table", db_path.display());
    }
    db.init()?;
    let restaurants = db.restaurant_count()?;
    let last_load_at = db.get_meta("last_load_at")?;

    if *format == OutputFormat::Json {
        print_json(&StatusReport {
            files,
            restaurants,
            last_load_at,
        });
        return Ok(());
    }

    print_rows(&files, format)?;
    eprintln!(
        "{} restaurants in {} (last load: {})",
        restaurants,
        db_path.display(),
        last_load_at
            .as_deref()
            .map(display_time)
            .unwrap_or_else(|| "never".to_string())
    );
    let samples = db.sample_restaurants(args.limit)?;
    if !samples.is_empty() {
        print_rows(&build_restaurant_rows(&samples), format)?;
    }
    Ok(())
}
