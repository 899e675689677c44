//! CLI subcommand implementations.

pub mod clean;
pub mod enrich;
pub mod load;
pub mod missing;
pub mod run;
pub mod scrape;
pub mod status;
