use serde::Deserialize;

use crate::scraper::{FetchError, WebScraper};
use crate::types::RateTable;

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Failed to read rate source: {0}")]
    Fetch(#[from] FetchError),
    #[error("Malformed rate table: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct RateRow {
    #[serde(rename = "Currency")]
    currency: String,
    #[serde(rename = "Rate")]
    rate: f64,
}

/// Parses CSV text with `Currency` and `Rate` columns. Other columns are ignored.
pub fn parse_rates(text: &str) -> Result<RateTable, RateError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rates = RateTable::new();
    for row in reader.deserialize::<RateRow>() {
        let row = row?;
        if !rates.insert(row.currency.as_str(), row.rate) {
            log::warn!(
                "Duplicate rate for {} ({}), keeping the first one",
                row.currency,
                row.rate
            );
        }
    }

    Ok(rates)
}

pub async fn load_rates(scraper: &WebScraper, source: &str) -> Result<RateTable, RateError> {
    let text = scraper.fetch_text(source).await?;
    let rates = parse_rates(&text)?;
    log::info!("Loaded {} exchange rates", rates.len());
    Ok(rates)
}
