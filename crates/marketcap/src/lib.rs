pub mod config;
pub mod load;
pub mod logger;
pub mod parser;
pub mod pipeline;
pub mod rates;
pub mod scraper;
pub mod transform;
pub mod types;
pub mod utils;

pub use crate::scraper::WebScraper;
pub use config::Config;
pub use pipeline::{Pipeline, PipelineError, RunReport};
pub use types::Dataset;
