use anyhow::Result;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use dinescout_lib::db::RestaurantSample;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    /// Unknown names fall back to a table.
    pub fn parse(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "csv" => Self::Csv,
            "markdown" | "md" => Self::Markdown,
            _ => Self::Table,
        }
    }
}

#[derive(Tabled, Serialize, Debug, PartialEq)]
pub struct RestaurantRow {
    #[tabled(rename = "Name")]
    #[serde(rename = "Name")]
    pub name: String,
    #[tabled(rename = "City")]
    #[serde(rename = "City")]
    pub city: String,
    #[tabled(rename = "State")]
    #[serde(rename = "State")]
    pub state: String,
}

#[derive(Tabled, Serialize, Debug, PartialEq)]
pub struct FileRow {
    #[tabled(rename = "Stage")]
    #[serde(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "Path")]
    #[serde(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Rows")]
    #[serde(rename = "Rows")]
    pub rows: String,
}

pub fn build_restaurant_rows(samples: &[RestaurantSample]) -> Vec<RestaurantRow> {
    samples
        .iter()
        .map(|s| RestaurantRow {
            name: s.name.clone(),
            city: s.city.clone().unwrap_or_default(),
            state: s.state.clone().unwrap_or_default(),
        })
        .collect()
}

/// Prints `rows` to stdout in `format`.
pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}

pub fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}
