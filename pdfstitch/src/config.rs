//! Configuration for a merge.
//!
//! This module turns caller input into a validated configuration:
//! - [`UrlList`] parses and checks the ordered donor list
//! - [`MergeConfig`] carries output naming, concurrency and metadata
//! - [`FetchConfig`] tunes the HTTP fetcher
//!
//! Every check here runs before any network access.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::error::{Result, StitchError};

pub use crate::pdf::XrefFormat;

/// Default output file name.
pub const DEFAULT_FILE_NAME: &str = "merged.pdf";

/// Default name of the binary slot the merged document is reported under.
pub const DEFAULT_BINARY_PROPERTY: &str = "data";

/// The ordered, validated list of donor URLs.
///
/// Guaranteed non-empty, and every entry is a non-blank string with
/// surrounding whitespace removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlList {
    urls: Vec<String>,
}

impl UrlList {
    /// Parse a JSON array of URL strings.
    ///
    /// # Errors
    ///
    /// Returns [`StitchError::InvalidUrlList`] if the text is not JSON, is
    /// not an array, or is an empty array, and [`StitchError::InvalidUrl`]
    /// for the first entry that is not a non-blank string.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfstitch::config::UrlList;
    ///
    /// let list = UrlList::parse_json(r#"["https://a.example/1.pdf", "https://b.example/2.pdf"]"#).unwrap();
    /// assert_eq!(list.len(), 2);
    /// assert!(UrlList::parse_json("[]").is_err());
    /// assert!(UrlList::parse_json(r#"["ok", 3]"#).is_err());
    /// ```
    pub fn parse_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| StitchError::invalid_url_list(format!("not valid JSON ({e})")))?;

        let Value::Array(items) = value else {
            return Err(StitchError::invalid_url_list("expected a JSON array of strings"));
        };

        if items.is_empty() {
            return Err(StitchError::invalid_url_list("the list is empty"));
        }

        let mut urls = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::String(url) if !url.trim().is_empty() => urls.push(url.trim().to_string()),
                other => return Err(StitchError::invalid_url(index, other.to_string())),
            }
        }

        Ok(Self { urls })
    }

    /// Build a list from already separated strings (command-line input).
    ///
    /// # Errors
    ///
    /// Same rules as [`UrlList::parse_json`]: the list must be non-empty and
    /// no entry may be blank.
    pub fn from_strings<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut urls = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let url = item.as_ref().trim();
            if url.is_empty() {
                return Err(StitchError::invalid_url(index, format!("{:?}", item.as_ref())));
            }
            urls.push(url.to_string());
        }

        if urls.is_empty() {
            return Err(StitchError::invalid_url_list("the list is empty"));
        }

        Ok(Self { urls })
    }

    /// The URLs, in merge order.
    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    /// Iterate over the URLs in merge order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.urls.iter()
    }

    /// Number of donors.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<'a> IntoIterator for &'a UrlList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.iter()
    }
}

/// Settings for the HTTP fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

/// Document information to set on the merged output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Document title.
    pub title: Option<String>,
    /// Document author.
    pub author: Option<String>,
    /// Document subject.
    pub subject: Option<String>,
    /// Document keywords (comma-separated).
    pub keywords: Option<String>,
}

impl Metadata {
    /// Check if any metadata fields are set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.keywords.is_none()
    }

    /// Create metadata from optional strings, trimming whitespace.
    pub fn new(
        title: Option<String>,
        author: Option<String>,
        subject: Option<String>,
        keywords: Option<String>,
    ) -> Self {
        let clean = |opt: Option<String>| {
            opt.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Self {
            title: clean(title),
            author: clean(author),
            subject: clean(subject),
            keywords: clean(keywords),
        }
    }
}

/// Output file overwrite behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// Ask before overwriting; without a terminal this behaves like
    /// [`OverwriteMode::NoClobber`].
    #[default]
    Prompt,
    /// Always overwrite without prompting.
    Force,
    /// Never overwrite, error if file exists.
    NoClobber,
}

/// Complete configuration for one merge.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Donor URLs, in merge order.
    pub urls: UrlList,

    /// Name reported for (and used to save) the merged document.
    pub file_name: String,

    /// Name of the binary slot the merged document is reported under.
    pub binary_property: String,

    /// Directory the CLI saves the merged document into.
    pub output_dir: PathBuf,

    /// Number of donors fetched and parsed concurrently (None = auto-detect).
    pub jobs: Option<usize>,

    /// File overwrite behavior.
    pub overwrite_mode: OverwriteMode,

    /// Information dictionary entries for the output.
    pub metadata: Metadata,

    /// Cross-reference layout of the output.
    pub xref_format: XrefFormat,

    /// HTTP settings.
    pub fetch: FetchConfig,

    /// Verbose output mode.
    pub verbose: bool,

    /// Quiet mode - suppress non-error output.
    pub quiet: bool,
}

impl MergeConfig {
    /// Configuration with defaults for everything but the donor list.
    pub fn new(urls: UrlList) -> Self {
        Self {
            urls,
            file_name: DEFAULT_FILE_NAME.to_string(),
            binary_property: DEFAULT_BINARY_PROPERTY.to_string(),
            output_dir: PathBuf::from("."),
            jobs: None,
            overwrite_mode: OverwriteMode::default(),
            metadata: Metadata::default(),
            xref_format: XrefFormat::default(),
            fetch: FetchConfig::default(),
            verbose: false,
            quiet: false,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StitchError::InvalidConfig`] if:
    /// - Verbose and quiet modes are both enabled
    /// - Jobs count is zero
    /// - The file name is empty or contains a path separator
    /// - The binary property name is empty
    pub fn validate(&self) -> Result<()> {
        if self.verbose && self.quiet {
            return Err(StitchError::invalid_config(
                "Cannot use both --verbose and --quiet",
            ));
        }

        if self.jobs == Some(0) {
            return Err(StitchError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }

        let name = self.file_name.trim();
        if name.is_empty() {
            return Err(StitchError::invalid_config("File name cannot be empty"));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(StitchError::invalid_config(format!(
                "File name must not contain a path: {name}"
            )));
        }

        if self.binary_property.trim().is_empty() {
            return Err(StitchError::invalid_config(
                "Binary property name cannot be empty",
            ));
        }

        Ok(())
    }

    /// Get the effective number of concurrent donor loads.
    ///
    /// Returns the configured job count, or the number of CPU cores if
    /// auto-detect.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Where the CLI saves the merged document.
    pub fn output_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(self.file_name.trim())
    }

    /// Check if progress output should be displayed.
    pub fn should_print(&self) -> bool {
        !self.quiet
    }
}
