use crate::config::Config;
use crate::load::{LoadError, QueryResult, Store, run_query, save_flat, save_relational};
use crate::logger::ProgressLog;
use crate::parser::{ParseError, extract};
use crate::rates::{RateError, load_rates};
use crate::scraper::{FetchError, WebScraper};
use crate::transform::transform;
use crate::types::{EnrichedTable, EntityRecord};

/// Failures that end a run. Load-stage failures are reported in [`RunReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Extraction failed: {0}")]
    Parse(#[from] ParseError),
    #[error("Rate table unavailable: {0}")]
    Rates(#[from] RateError),
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub query: String,
    pub result: Result<QueryResult, LoadError>,
}

/// Outcome of every stage of one run.
#[derive(Debug)]
pub struct RunReport {
    pub table: EnrichedTable,
    /// The configured sample value, when the table has that row and column.
    pub sample: Option<f64>,
    pub flat: Result<(), LoadError>,
    pub relational: Result<(), LoadError>,
    pub queries: Vec<QueryOutcome>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        usize::from(self.flat.is_err())
            + usize::from(self.relational.is_err())
            + self.queries.iter().filter(|q| q.result.is_err()).count()
    }
}

pub struct Pipeline {
    config: Config,
    scraper: WebScraper,
    log: ProgressLog,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let log = ProgressLog::new(&config.log_path);
        Ok(Self {
            scraper: WebScraper::new()?,
            log,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn progress_log(&self) -> &ProgressLog {
        &self.log
    }

    /// Runs extract, transform and load in order. Only fetch, rate and parse
    /// failures abort; everything after the transform is best effort.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        self.log.debug("Preliminaries complete. Initiating ETL process");

        let result = self.extract_and_transform().await;
        let (table, sample) = match result {
            Ok(output) => output,
            Err(e) => {
                self.log.error(format!("ETL process aborted: {}", e));
                return Err(e);
            }
        };

        Ok(self.load(table, sample))
    }

    pub async fn extract(&self) -> Result<Vec<EntityRecord>, PipelineError> {
        let doc = self.scraper.fetch(&self.config.source_url).await?;
        let records = extract(&doc, &self.config.locator)?;
        self.log
            .debug("Data extraction complete. Initiating Transformation process");
        Ok(records)
    }

    async fn extract_and_transform(&self) -> Result<(EnrichedTable, Option<f64>), PipelineError> {
        let records = self.extract().await?;
        let rates = load_rates(&self.scraper, &self.config.rates_source).await?;
        let table = transform(&records, &rates, &self.config.columns);

        let sample = self.config.sample.as_ref().and_then(|sample| {
            let column = self.config.columns.metric_column(&sample.unit);
            let value = table.value(sample.row, &column);
            if value.is_none() {
                self.log.warning(format!(
                    "Sample value unavailable: row {} of {}",
                    sample.row, column
                ));
            }
            value
        });

        self.log
            .debug("Data transformation complete. Initiating Loading process");
        Ok((table, sample))
    }

    /// Persists `table` to CSV and SQLite and runs the read-back queries.
    /// Each failure is logged and recorded; later stages still run.
    pub fn load(&self, table: EnrichedTable, sample: Option<f64>) -> RunReport {
        let flat = save_flat(&table, &self.config.csv_path);
        match &flat {
            Ok(()) => self.log.debug("Data saved to CSV file"),
            Err(e) => self.log.error(format!(
                "There was an error while loading data to csv file: {}",
                e
            )),
        }

        let store = Store::open(&self.config.db_path);
        if store.is_ok() {
            self.log.debug("SQL Connection initiated");
        }

        let relational = match &store {
            Ok(store) => save_relational(&table, store, &self.config.table_name),
            Err(e) => Err(LoadError::Unavailable(e.to_string())),
        };
        match &relational {
            Ok(()) => self
                .log
                .debug("Data loaded to Database as a table. Executing queries"),
            Err(e) => self.log.error(format!(
                "There was an error while loading data to db: {}",
                e
            )),
        }

        let queries: Vec<QueryOutcome> = self
            .config
            .read_back_queries()
            .into_iter()
            .map(|query| {
                let result = match &store {
                    Ok(store) => run_query(&query, store),
                    Err(e) => Err(LoadError::Unavailable(e.to_string())),
                };
                if let Err(e) = &result {
                    self.log.error(format!(
                        "There was an error while querying the database: {}",
                        e
                    ));
                }
                QueryOutcome { query, result }
            })
            .collect();

        self.log.debug("Process Complete");

        if let Ok(store) = store {
            match store.close() {
                Ok(()) => self.log.debug("Server Connection closed"),
                Err(e) => self
                    .log
                    .warning(format!("Failed to close the database connection: {}", e)),
            }
        }

        RunReport {
            table,
            sample,
            flat,
            relational,
            queries,
        }
    }
}
