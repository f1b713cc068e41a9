use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use marketcap::config::{Config, Sample};
use marketcap::load::QueryResult;
use marketcap::types::{Dataset, EnrichedTable};
use marketcap::utils::format_float;
use marketcap::{Pipeline, RunReport};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "marketcap")]
#[command(
    about = "Extract a ranked table, convert its metric across currencies and load it into CSV and SQLite",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        short = 'd',
        long,
        value_parser = parse_dataset,
        default_value = "banks",
        help = "Dataset preset (banks or gdp)"
    )]
    dataset: Dataset,

    #[arg(long, value_name = "URL_OR_PATH", help = "Page holding the source table")]
    url: Option<String>,

    #[arg(
        long,
        value_name = "URL_OR_PATH",
        help = "Exchange rate CSV with Currency and Rate columns"
    )]
    rates: Option<String>,

    #[arg(long, value_name = "PATH", help = "Where to write the CSV output")]
    csv: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "SQLite database file")]
    db: Option<PathBuf>,

    #[arg(long, help = "Database table to replace")]
    table: Option<String>,

    #[arg(long = "log-file", value_name = "PATH", help = "Append-only progress log")]
    log_file: Option<PathBuf>,

    #[arg(
        long = "query",
        value_name = "SQL",
        help = "Read-only query to run after loading, may be repeated"
    )]
    queries: Vec<String>,

    #[arg(long, default_value_t = 4, help = "Row of the sample value to print")]
    sample_row: usize,

    #[arg(long, default_value = "EUR", help = "Unit of the sample value to print")]
    sample_unit: String,

    #[arg(long, help = "Do not print a sample value", conflicts_with_all = ["sample_row", "sample_unit"])]
    no_sample: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    format: OutputFormat,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env(self.dataset);

        if let Some(url) = &self.url {
            config.source_url = url.clone();
        }
        if let Some(rates) = &self.rates {
            config.rates_source = rates.clone();
        }
        if let Some(csv) = &self.csv {
            config.csv_path = csv.clone();
        }
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        if let Some(table) = &self.table {
            config.table_name = table.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_path = log_file.clone();
        }
        if !self.queries.is_empty() {
            config.queries = self.queries.clone();
        }

        config.sample = (!self.no_sample).then(|| Sample {
            row: self.sample_row,
            unit: self.sample_unit.clone(),
        });

        config
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_dataset(s: &str) -> Result<Dataset, String> {
    Dataset::from_str(s).map_err(|e| e.to_string())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    table: &'a EnrichedTable,
    sample: Option<f64>,
    queries: Vec<JsonQuery<'a>>,
}

#[derive(Serialize)]
struct JsonQuery<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<&'a QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn serialize_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn print_text(report: &RunReport, config: &Config) {
    if let (Some(sample), Some(value)) = (&config.sample, report.sample) {
        println!(
            "\n{} (row {}): {}\n",
            config.columns.metric_column(&sample.unit),
            sample.row,
            format_float(value)
        );
    }

    println!("\n{}\n", report.table);

    for outcome in &report.queries {
        println!("{}", outcome.query);
        match &outcome.result {
            Ok(result) => println!("{}\n", result),
            Err(e) => println!("Query failed: {}\n", e),
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let config = cli.config();

    log::info!("{} from {}", config.dataset, config.source_url);

    let pipeline = Pipeline::new(config).unwrap_or_else(|e| {
        log::error!("Error creating pipeline: {}", e);
        process::exit(1);
    });

    let report = pipeline.run().await.unwrap_or_else(|e| {
        log::error!("{}", e);
        process::exit(1);
    });

    match cli.format {
        OutputFormat::Json => serialize_json(&JsonReport {
            table: &report.table,
            sample: report.sample,
            queries: report
                .queries
                .iter()
                .map(|q| JsonQuery {
                    query: &q.query,
                    rows: q.result.as_ref().ok(),
                    error: q.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
        }),
        OutputFormat::Text => print_text(&report, pipeline.config()),
    }

    let failures = report.failures();
    if failures > 0 {
        log::warn!(
            "{} load step(s) failed, see {}",
            failures,
            pipeline.progress_log().path().display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "marketcap",
            "--dataset",
            "gdp",
            "--db",
            "/tmp/economies.db",
            "--table",
            "Gdp_2023",
            "--query",
            "SELECT COUNT(*) FROM Gdp_2023",
            "--no-sample",
        ]);

        let config = cli.config();
        assert_eq!(config.dataset, Dataset::Gdp);
        assert_eq!(config.db_path, PathBuf::from("/tmp/economies.db"));
        assert_eq!(config.table_name, "Gdp_2023");
        assert_eq!(
            config.read_back_queries(),
            vec!["SELECT COUNT(*) FROM Gdp_2023"]
        );
        assert_eq!(config.sample, None);
    }

    #[test]
    fn test_sample_flags() {
        let cli = Cli::parse_from(["marketcap", "--sample-row", "0", "--sample-unit", "GBP"]);

        let config = cli.config();
        assert_eq!(config.dataset, Dataset::Banks);
        assert_eq!(
            config.sample,
            Some(Sample {
                row: 0,
                unit: "GBP".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        assert!(Cli::try_parse_from(["marketcap", "--dataset", "planets"]).is_err());
    }
}
