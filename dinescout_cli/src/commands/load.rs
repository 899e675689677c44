//! The `load` subcommand: upsert the enriched file into SQLite.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use dinescout_lib::validation::validate_input_file;
use dinescout_lib::{Db, LoadSummary, PipelineConfig, RecordTable};

#[derive(Args)]
pub struct LoadArgs {
    /// Enriched input file (default: from config)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// SQLite database path (default: from config)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub(crate) fn load(input: &Path, db_path: &Path) -> Result<LoadSummary> {
    validate_input_file(input)?;
    let table = RecordTable::read(input)?;

    let mut db = Db::open(db_path)?;
    db.init()?;
    let summary = db.load_enriched(&table)?;

    eprintln!(
        "Loaded {} of {} rows into {} ({} without a name skipped)",
        summary.upserted,
        summary.rows_read,
        db_path.display(),
        summary.skipped
    );
    eprintln!("  {} restaurants stored", db.restaurant_count()?);
    Ok(summary)
}

pub fn run(args: &LoadArgs, config: &PipelineConfig) -> Result<()> {
    let input = args
        .input
        .clone()
        .unwrap_or_else(|| config.paths.enriched_path());
    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.paths.database_path());
    load(&input, &db_path)?;
    Ok(())
}
