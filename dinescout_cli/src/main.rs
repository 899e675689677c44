mod commands;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dinescout_lib::validation::{validate_config, validate_timeout};
use dinescout_lib::{Deadline, PipelineConfig};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "dinescout")]
#[command(about = "Scrape, clean, enrich and store restaurant listings")]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Wall-clock budget for the whole invocation, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Output format for reports: table, json, csv, markdown
    #[arg(long, default_value = "table", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape listing articles into the raw and cleaned files
    Scrape(commands::scrape::ScrapeArgs),
    /// Re-normalize, fill cities and deduplicate a record file
    Clean(commands::clean::CleanArgs),
    /// Enrich cleaned records from the map provider
    Enrich(commands::enrich::EnrichArgs),
    /// Upsert the enriched file into SQLite
    Load(commands::load::LoadArgs),
    /// Run scrape, clean, enrich and load in sequence
    Run(commands::run::RunArgs),
    /// Write cleaned records missing from the enriched file
    Missing(commands::missing::MissingArgs),
    /// Show what the database holds
    Status(commands::status::StatusArgs),
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(secs) = cli.timeout {
        config.run.timeout_secs = validate_timeout("--timeout", secs)?;
    }
    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dinescout=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);
    let config = load_config(&cli)?;

    let budget = Duration::from_secs(config.run.timeout_secs);
    let deadline = Deadline::after(budget);

    let work = async {
        match &cli.command {
            Commands::Scrape(args) => commands::scrape::run(args, &config, deadline).await,
            Commands::Clean(args) => commands::clean::run(args, &config),
            Commands::Enrich(args) => commands::enrich::run(args, &config, deadline).await,
            Commands::Load(args) => commands::load::run(args, &config),
            Commands::Run(args) => commands::run::run(args, &config, deadline).await,
            Commands::Missing(args) => commands::missing::run(args, &config),
            Commands::Status(args) => commands::status::run(args, &config, &format),
        }
    };

    let Some(left) = deadline.remaining() else {
        return work.await;
    };
    match tokio::time::timeout(left, work).await {
        Ok(result) => result,
        Err(_) => bail!(
            "run exceeded its {}s budget; rows already written are kept",
            budget.as_secs()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_enrich_flags() {
        let cli = Cli::try_parse_from([
            "dinescout",
            "--timeout",
            "60",
            "enrich",
            "--resume",
            "--workers",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.timeout, Some(60));
        match cli.command {
            Commands::Enrich(args) => {
                assert!(args.resume);
                assert_eq!(args.workers, Some(2));
            }
            _ => panic!("expected enrich"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dinescout", "status", "--format", "json"]).unwrap();
        assert_eq!(cli.format, "json");
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["dinescout", "frobnicate"]).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cli = Cli::try_parse_from(["dinescout", "--timeout", "0", "status"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
