//! Concurrent fetching and parsing of donor documents.
//!
//! Downloads and parses of independent donors overlap, bounded by the job
//! count, but results are always delivered in input order. Parsing runs on
//! the blocking pool so a large donor does not stall the runtime.
//!
//! # Examples
//!
//! ```no_run
//! use pdfstitch::config::{FetchConfig, UrlList};
//! use futures::StreamExt;
//! use pdfstitch::io::{DonorLoader, HttpFetcher, LoadStatistics};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let urls = UrlList::from_strings(["https://a.example/1.pdf", "https://b.example/2.pdf"])?;
//! let loader = DonorLoader::new(HttpFetcher::new(&FetchConfig::default())?, 4);
//! let mut donors = std::pin::pin!(loader.stream(&urls));
//! let mut stats = LoadStatistics::default();
//! while let Some(donor) = donors.next().await {
//!     stats.record(&donor?);
//! }
//! println!("{} donors, {} pages", stats.donor_count, stats.total_pages);
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use futures::stream::{self, Stream, StreamExt};
use tokio::task;
use tracing::debug;

use crate::config::UrlList;
use crate::error::{Result, StitchError};
use crate::io::fetch::Fetcher;
use crate::pdf::Document;
use crate::utils::format_file_size;

/// A parsed donor with where it came from.
#[derive(Debug)]
pub struct LoadedDonor {
    /// The parsed document.
    pub document: Document,

    /// Source URL.
    pub url: String,

    /// Zero-based position in the URL list.
    pub index: usize,

    /// Number of pages in the document.
    pub page_count: usize,

    /// Size of the downloaded bytes.
    pub byte_size: u64,

    /// Time spent downloading.
    pub fetch_time: Duration,

    /// Time spent parsing.
    pub parse_time: Duration,
}

/// Statistics for a batch of loaded donors.
#[derive(Debug, Clone, Default)]
pub struct LoadStatistics {
    /// Number of donors loaded.
    pub donor_count: usize,

    /// Wall-clock time until the last donor was loaded.
    pub total_time: Duration,

    /// Average fetch plus parse time per donor.
    pub average_time: Duration,

    /// Total downloaded bytes.
    pub total_size: u64,

    /// Total number of pages across donors.
    pub total_pages: usize,
}

impl LoadStatistics {
    /// Count one loaded donor.
    pub fn record(&mut self, donor: &LoadedDonor) {
        let busy = self.average_time * self.donor_count as u32;
        self.donor_count += 1;
        self.total_size += donor.byte_size;
        self.total_pages += donor.page_count;
        self.average_time = (busy + donor.fetch_time + donor.parse_time) / self.donor_count as u32;
    }

    /// Format total size as human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// Fetches donors through a [`Fetcher`] and parses them.
#[derive(Debug, Clone)]
pub struct DonorLoader<F> {
    fetcher: F,
    workers: usize,
}

impl<F: Fetcher> DonorLoader<F> {
    /// Create a loader running at most `workers` donors at once.
    pub fn new(fetcher: F, workers: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
        }
    }

    /// Number of donors processed concurrently.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch and parse a single donor.
    ///
    /// # Errors
    ///
    /// Returns [`StitchError::Transport`] if the fetch fails and
    /// [`StitchError::Parse`] if the bytes are not a readable PDF. Both name
    /// `url` and `index`.
    pub async fn load(&self, index: usize, url: &str) -> Result<LoadedDonor> {
        let start = Instant::now();
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| StitchError::transport(index, url, e))?;
        let fetch_time = start.elapsed();
        let byte_size = bytes.len() as u64;

        let start = Instant::now();
        let document = task::spawn_blocking(move || Document::load(bytes))
            .await
            .map_err(|e| StitchError::other(format!("Parse task failed: {e}")))?
            .map_err(|e| StitchError::parse(index, url, e))?;
        let parse_time = start.elapsed();

        let page_count = document.page_count();
        debug!(
            "Loaded donor {} ({}): {} page(s), {} object(s) in xref, {}",
            index,
            url,
            page_count,
            document.object_count(),
            format_file_size(byte_size)
        );

        Ok(LoadedDonor {
            document,
            url: url.to_string(),
            index,
            page_count,
            byte_size,
            fetch_time,
            parse_time,
        })
    }

    /// Load every donor, overlapping work but yielding in list order.
    ///
    /// Dropping the stream cancels the donors still in flight.
    pub fn stream<'a>(
        &'a self,
        urls: &'a UrlList,
    ) -> impl Stream<Item = Result<LoadedDonor>> + 'a {
        let tasks = urls
            .iter()
            .enumerate()
            .map(move |(index, url)| self.load(index, url));

        stream::iter(tasks).buffered(self.workers)
    }
}
