//! Retrieval of donor bytes by URL.
//!
//! The merge engine never talks to the network itself. It asks a
//! [`Fetcher`] for the bytes behind each URL; [`HttpFetcher`] is the
//! production implementation and tests plug in in-memory fetchers.
//!
//! # Examples
//!
//! ```no_run
//! use pdfstitch::io::fetch::{Fetcher, HttpFetcher};
//! use pdfstitch::config::FetchConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(&FetchConfig::default())?;
//! let bytes = fetcher.fetch("https://example.com/report.pdf").await?;
//! println!("downloaded {} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::FetchConfig;

/// Failure to retrieve a donor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("server responded with HTTP status {code}")]
    Status {
        /// HTTP status code.
        code: u16,
    },

    /// The request could not be completed (DNS, connect, TLS, timeout,
    /// truncated body).
    #[error("request failed: {message}")]
    Request {
        /// Description from the HTTP client.
        message: String,
    },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status {
                code: status.as_u16(),
            },
            None => Self::Request {
                message: err.to_string(),
            },
        }
    }
}

/// Source of donor bytes.
///
/// Called once per donor URL. Implementations must be shareable across the
/// concurrent loads the merger runs.
pub trait Fetcher: Send + Sync {
    /// Download the document behind `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

impl<F: Fetcher> Fetcher for &F {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        (**self).fetch(url)
    }
}

/// HTTP(S) fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the configured timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the HTTP client cannot be
    /// initialised (for example when no TLS backend is available).
    pub fn new(config: &FetchConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body.to_vec())
    }
}
