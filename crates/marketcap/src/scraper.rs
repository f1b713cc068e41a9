use crate::types::RawDocument;

use reqwest::{Client, Url};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid source '{0}': expected an http(s) URL or a file path")]
    InvalidSource(String),
}

/// Where a document or rate table is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Remote(Url),
    Local(PathBuf),
}

impl Source {
    pub fn parse(source: &str) -> Result<Self, FetchError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(FetchError::InvalidSource(source.to_string()));
        }

        if let Some(path) = source.strip_prefix("file://") {
            return Ok(Source::Local(PathBuf::from(path)));
        }

        if source.starts_with("http://") || source.starts_with("https://") {
            return Url::parse(source)
                .map(Source::Remote)
                .map_err(|_| FetchError::InvalidSource(source.to_string()));
        }

        if source.contains("://") {
            return Err(FetchError::InvalidSource(source.to_string()));
        }

        Ok(Source::Local(PathBuf::from(source)))
    }
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client })
    }

    /// Reads the whole document behind `source`. No retries.
    pub async fn fetch(&self, source: &str) -> Result<RawDocument, FetchError> {
        Ok(RawDocument::new(self.fetch_text(source).await?))
    }

    pub async fn fetch_text(&self, source: &str) -> Result<String, FetchError> {
        match Source::parse(source)? {
            Source::Remote(url) => {
                log::info!("Fetching {}...", url);
                self.get_text(url).await
            }
            Source::Local(path) => {
                log::info!("Reading {}...", path.display());
                std::fs::read_to_string(&path)
                    .map_err(|source| FetchError::ReadError { path, source })
            }
        }
    }

    async fn get_text(&self, url: Url) -> Result<String, FetchError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}
