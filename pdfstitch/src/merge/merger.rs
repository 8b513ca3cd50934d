//! Merge orchestration.
//!
//! A merge creates an empty destination document, then for each donor in
//! list order clones all of its pages and appends them, and finally
//! serializes the result. Downloads and parses overlap (see
//! [`DonorLoader`]), but clone+append runs strictly in input order, and
//! the first failing donor fails the whole merge.

use std::pin::pin;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Serialize;
use tokio::task;
use tracing::{debug, info};

use crate::config::{MergeConfig, Metadata, UrlList};
use crate::error::{Result, StitchError};
use crate::io::fetch::Fetcher;
use crate::io::loader::{DonorLoader, LoadStatistics};
use crate::merge::metadata::MetadataWriter;
use crate::pdf::{
    CloneError, Document, PageHandle, WriteOptions, XrefFormat, clone_pages, write_document,
};
use crate::utils::format_file_size;

/// One batch item: the donors to merge and the name to report.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Donor URLs, in merge order.
    pub urls: UrlList,

    /// Name reported for the merged document.
    pub file_name: String,
}

impl MergeRequest {
    /// Create a request.
    pub fn new(urls: UrlList, file_name: impl Into<String>) -> Self {
        Self {
            urls,
            file_name: file_name.into(),
        }
    }

    /// The request described by a configuration.
    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(config.urls.clone(), config.file_name.clone())
    }
}

/// What a merge reports to its caller alongside the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Name of the merged document.
    pub file_name: String,

    /// Pages in the merged document.
    pub page_count: usize,

    /// Number of donors merged.
    pub source_count: usize,
}

/// Statistics about a merge operation.
#[derive(Debug, Clone, Default)]
pub struct MergeStatistics {
    /// Number of donors merged.
    pub donors_merged: usize,

    /// Total number of pages in merged document.
    pub total_pages: usize,

    /// Indirect objects in the serialized output.
    pub objects_written: usize,

    /// Size of the serialized output.
    pub output_size: u64,

    /// Donor loading: downloaded bytes, pages, time until the last donor
    /// was parsed.
    pub load: LoadStatistics,

    /// Total time taken for the merge.
    pub merge_time: Duration,
}

impl MergeStatistics {
    /// Format input size as human-readable string.
    pub fn format_input_size(&self) -> String {
        self.load.format_total_size()
    }

    /// Format output size as human-readable string.
    pub fn format_output_size(&self) -> String {
        format_file_size(self.output_size)
    }
}

/// Result of a merge operation.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// The merged PDF file.
    pub bytes: Vec<u8>,

    /// Caller-facing summary.
    pub report: MergeReport,

    /// Statistics about the merge.
    pub statistics: MergeStatistics,
}

/// Merges remote PDF documents into one.
#[derive(Debug, Clone)]
pub struct Merger<F> {
    loader: DonorLoader<F>,
    write_options: WriteOptions,
    metadata: Metadata,
    metadata_writer: MetadataWriter,
}

impl<F: Fetcher> Merger<F> {
    /// Create a merger loading at most `jobs` donors at once.
    pub fn new(fetcher: F, jobs: usize) -> Self {
        Self {
            loader: DonorLoader::new(fetcher, jobs),
            write_options: WriteOptions::default(),
            metadata: Metadata::default(),
            metadata_writer: MetadataWriter::new(),
        }
    }

    /// Create a merger with the concurrency, output format and metadata of
    /// `config`.
    pub fn from_config(fetcher: F, config: &MergeConfig) -> Self {
        Self::new(fetcher, config.effective_jobs())
            .with_xref_format(config.xref_format)
            .with_metadata(config.metadata.clone())
    }

    /// Choose the cross-reference layout of the output.
    pub fn with_xref_format(mut self, format: XrefFormat) -> Self {
        self.write_options.xref_format = format;
        self
    }

    /// Set the document information written to the output.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Merge the donors of one request.
    ///
    /// # Errors
    ///
    /// Fails with the first error met, in donor order: a
    /// [`StitchError::Transport`], [`StitchError::Parse`] or
    /// [`StitchError::Clone`] naming the donor, or a
    /// [`StitchError::Serialize`]. No output is produced on failure.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfstitch::config::{FetchConfig, UrlList};
    /// # use pdfstitch::io::HttpFetcher;
    /// # use pdfstitch::merge::{MergeRequest, Merger};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let urls = UrlList::parse_json(r#"["https://a.example/1.pdf", "https://b.example/2.pdf"]"#)?;
    /// let merger = Merger::new(HttpFetcher::new(&FetchConfig::default())?, 4);
    /// let output = merger.merge(&MergeRequest::new(urls, "merged.pdf")).await?;
    /// println!("{} pages from {} donors",
    ///          output.report.page_count,
    ///          output.report.source_count);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn merge(&self, request: &MergeRequest) -> Result<MergeOutput> {
        let merge_start = Instant::now();
        let mut merged = Document::new();
        let mut statistics = MergeStatistics::default();

        let mut donors = pin!(self.loader.stream(&request.urls));
        while let Some(loaded) = donors.next().await {
            let mut donor = loaded?;

            let handles = append_document(&mut merged, &mut donor.document)
                .map_err(|e| StitchError::clone_failed(donor.index, &donor.url, e))?;

            debug!(
                "Appended {} page(s) from donor {} ({})",
                handles.len(),
                donor.index,
                donor.url
            );

            statistics.donors_merged += 1;
            statistics.load.record(&donor);
        }
        statistics.load.total_time = merge_start.elapsed();

        self.metadata_writer.apply(&mut merged, &self.metadata);
        let page_count = merged.page_count();

        let options = self.write_options.clone();
        let serialized = task::spawn_blocking(move || write_document(&mut merged, &options))
            .await
            .map_err(|e| StitchError::other(format!("Serialize task failed: {e}")))??;

        statistics.total_pages = page_count;
        statistics.objects_written = serialized.object_count;
        statistics.output_size = serialized.bytes.len() as u64;
        statistics.merge_time = merge_start.elapsed();

        info!(
            "Merged {} donor(s) into {} page(s): {} in, {} out, {:?}",
            statistics.donors_merged,
            statistics.total_pages,
            statistics.format_input_size(),
            statistics.format_output_size(),
            statistics.merge_time
        );

        Ok(MergeOutput {
            bytes: serialized.bytes,
            report: MergeReport {
                file_name: request.file_name.clone(),
                page_count,
                source_count: statistics.donors_merged,
            },
            statistics,
        })
    }

    /// Merge several independent requests, in order.
    ///
    /// Each item is all-or-nothing; processing stops at the first failing
    /// item.
    ///
    /// # Errors
    ///
    /// The error of the first failing item.
    pub async fn merge_batch(&self, requests: &[MergeRequest]) -> Result<Vec<MergeOutput>> {
        let mut outputs = Vec::with_capacity(requests.len());
        for (item, request) in requests.iter().enumerate() {
            debug!("Merging batch item {} ({} donor(s))", item, request.urls.len());
            outputs.push(self.merge(request).await?);
        }
        Ok(outputs)
    }
}

/// Clone every page of `donor`, in page order, onto the end of `dest`.
///
/// # Errors
///
/// Returns a [`CloneError`] if a page or one of its resources cannot be
/// read from `donor`. `dest` may then hold unreachable copies, which the
/// serializer never writes.
pub fn append_document(
    dest: &mut Document,
    donor: &mut Document,
) -> std::result::Result<Vec<PageHandle>, CloneError> {
    let indices: Vec<usize> = (0..donor.page_count()).collect();
    let handles = clone_pages(donor, &indices, dest)?;
    for handle in &handles {
        dest.append_page(*handle)?;
    }
    Ok(handles)
}
