use std::path::PathBuf;

use crate::load::quote_ident;
use crate::types::{ColumnScheme, Dataset, TableLocator};

pub const BANKS_URL: &str = "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks";
pub const GDP_URL: &str = "https://web.archive.org/web/20230902185326/https://en.wikipedia.org/wiki/List_of_countries_by_GDP_%28nominal%29";
pub const EXCHANGE_RATES_URL: &str = "https://cf-courses-data.s3.us.cloud-object-storage.appdomain.cloud/IBMSkillsNetwork-PY0221EN-Coursera/labs/v2/exchange_rate.csv";
pub const LOG_PATH: &str = "code_log.txt";
pub const LOG_PATH_ENV: &str = "ETL_LOG";

/// Derived value printed after the transform step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub row: usize,
    pub unit: String,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            row: 4,
            unit: "EUR".to_string(),
        }
    }
}

/// Everything a pipeline run reads, resolved once before the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub dataset: Dataset,
    pub source_url: String,
    pub rates_source: String,
    pub csv_path: PathBuf,
    pub db_path: PathBuf,
    pub table_name: String,
    pub log_path: PathBuf,
    pub locator: TableLocator,
    pub columns: ColumnScheme,
    pub sample: Option<Sample>,
    /// Read-back queries. Empty means the default `SELECT <name> ... LIMIT 5`.
    pub queries: Vec<String>,
}

impl Config {
    pub fn for_dataset(dataset: Dataset) -> Self {
        let (source_url, csv_path, db_path, table_name) = match dataset {
            Dataset::Banks => (
                BANKS_URL,
                "./Largest_banks_data.csv",
                "Banks.db",
                "Largest_banks",
            ),
            Dataset::Gdp => (
                GDP_URL,
                "./Countries_by_GDP.csv",
                "World_Economies.db",
                "Countries_by_GDP",
            ),
        };

        Self {
            dataset,
            source_url: source_url.to_string(),
            rates_source: EXCHANGE_RATES_URL.to_string(),
            csv_path: PathBuf::from(csv_path),
            db_path: PathBuf::from(db_path),
            table_name: table_name.to_string(),
            log_path: PathBuf::from(LOG_PATH),
            locator: dataset.locator(),
            columns: dataset.columns(),
            sample: Some(Sample::default()),
            queries: Vec::new(),
        }
    }

    /// Defaults for `dataset`, overridden by `<PREFIX>_URL`, `<PREFIX>_RATES`,
    /// `<PREFIX>_CSV`, `<PREFIX>_DB`, `<PREFIX>_TABLE` and `ETL_LOG`.
    pub fn from_env(dataset: Dataset) -> Self {
        Self::from_lookup(dataset, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(dataset: Dataset, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::for_dataset(dataset);
        let var = |suffix: &str| {
            lookup(&format!("{}_{}", dataset.env_prefix(), suffix))
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(url) = var("URL") {
            config.source_url = url;
        }
        if let Some(rates) = var("RATES") {
            config.rates_source = rates;
        }
        if let Some(csv) = var("CSV") {
            config.csv_path = PathBuf::from(csv);
        }
        if let Some(db) = var("DB") {
            config.db_path = PathBuf::from(db);
        }
        if let Some(table) = var("TABLE") {
            config.table_name = table;
        }
        if let Some(log_path) = lookup(LOG_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            config.log_path = PathBuf::from(log_path);
        }

        config
    }

    pub fn read_back_queries(&self) -> Vec<String> {
        if !self.queries.is_empty() {
            return self.queries.clone();
        }
        vec![format!(
            "SELECT {} FROM {} LIMIT 5",
            quote_ident(&self.columns.name),
            quote_ident(&self.table_name)
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_bank_defaults() {
        let config = Config::for_dataset(Dataset::Banks);

        assert_eq!(config.source_url, BANKS_URL);
        assert_eq!(config.rates_source, EXCHANGE_RATES_URL);
        assert_eq!(config.csv_path, PathBuf::from("./Largest_banks_data.csv"));
        assert_eq!(config.db_path, PathBuf::from("Banks.db"));
        assert_eq!(config.table_name, "Largest_banks");
        assert_eq!(config.log_path, PathBuf::from("code_log.txt"));
        assert_eq!(config.sample, Some(Sample::default()));
        assert_eq!(
            config.read_back_queries(),
            vec![r#"SELECT "Name" FROM "Largest_banks" LIMIT 5"#]
        );
    }

    #[test]
    fn test_gdp_defaults() {
        let config = Config::for_dataset(Dataset::Gdp);

        assert_eq!(config.db_path, PathBuf::from("World_Economies.db"));
        assert_eq!(config.table_name, "Countries_by_GDP");
        assert_eq!(config.locator.table_index, 2);
        assert_eq!(
            config.read_back_queries(),
            vec![r#"SELECT "Country" FROM "Countries_by_GDP" LIMIT 5"#]
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BANKS_DB", "/tmp/banks.sqlite"),
            ("BANKS_TABLE", "Banks_2023"),
            ("BANKS_RATES", "./exchange_rate.csv"),
            ("BANKS_CSV", ""),
            ("GDP_DB", "ignored.db"),
            ("ETL_LOG", "etl.log"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::from_lookup(Dataset::Banks, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/tmp/banks.sqlite"));
        assert_eq!(config.table_name, "Banks_2023");
        assert_eq!(config.rates_source, "./exchange_rate.csv");
        assert_eq!(config.csv_path, PathBuf::from("./Largest_banks_data.csv"));
        assert_eq!(config.log_path, PathBuf::from("etl.log"));
        assert_eq!(
            config.read_back_queries(),
            vec![r#"SELECT "Name" FROM "Banks_2023" LIMIT 5"#]
        );
    }

    #[test]
    fn test_explicit_queries_replace_default() {
        let mut config = Config::for_dataset(Dataset::Banks);
        config.queries = vec!["SELECT AVG(MC_GBP_Billion) FROM Largest_banks".to_string()];

        assert_eq!(config.read_back_queries(), config.queries);
    }
}
