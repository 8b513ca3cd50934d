//! pdfstitch - Merge remote PDF documents into a single document.
//!
//! Given an ordered list of URLs, pdfstitch downloads each PDF, parses its
//! page tree, copies every page (with everything the page references) into
//! a new document, and writes that document back out. Pages appear in the
//! order of the URL list, and within one donor in the donor's own order.
//!
//! The crate is layered:
//!
//! - [`pdf`]: the engine (object model, parser, page cloner, document
//!   builder, serializer). Synchronous and free of I/O.
//! - [`io`]: fetching donors, loading them concurrently, saving output.
//! - [`merge`]: the orchestrator tying the two together.
//!
//! # Examples
//!
//! ## Merging URLs
//!
//! ```no_run
//! use pdfstitch::config::{MergeConfig, UrlList};
//! use pdfstitch::io::HttpFetcher;
//! use pdfstitch::merge::{MergeRequest, Merger};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let urls = UrlList::parse_json(r#"["https://a.example/1.pdf", "https://b.example/2.pdf"]"#)?;
//! let config = MergeConfig::new(urls);
//! config.validate()?;
//!
//! let merger = Merger::from_config(HttpFetcher::new(&config.fetch)?, &config);
//! let output = merger.merge(&MergeRequest::from_config(&config)).await?;
//! println!("{}", serde_json::to_string(&output.report)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the engine directly
//!
//! ```no_run
//! use pdfstitch::pdf::{Document, WriteOptions, clone_pages, serialize};
//!
//! # fn example(a: Vec<u8>, b: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut merged = Document::new();
//! for bytes in [a, b] {
//!     let mut donor = Document::load(bytes)?;
//!     let indices: Vec<usize> = (0..donor.page_count()).collect();
//!     for page in clone_pages(&mut donor, &indices, &mut merged)? {
//!         merged.append_page(page)?;
//!     }
//! }
//! let bytes = serialize(&mut merged, &WriteOptions::default())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod io;
pub mod merge;
pub mod pdf;
pub mod utils;

// Re-export commonly used types
pub use config::{MergeConfig, UrlList};
pub use error::{ErrorKind, Result, StitchError};
pub use merge::{MergeOutput, MergeReport, MergeRequest, Merger};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
