//! Input and output around the PDF engine: fetching donors, loading them
//! concurrently, and saving the merged result.

pub mod fetch;
pub mod loader;
pub mod writer;

pub use fetch::{Fetcher, HttpFetcher, TransportError};
pub use loader::{DonorLoader, LoadStatistics, LoadedDonor};
pub use writer::{OutputWriter, WriteStatistics};
