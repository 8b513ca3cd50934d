//! CLI argument parsing for pdfstitch.
//!
//! This module defines the command-line interface using `clap` and turns
//! the parsed arguments into a validated [`MergeConfig`].

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use pdfstitch::config::{FetchConfig, MergeConfig, Metadata, OverwriteMode, UrlList, XrefFormat};
use pdfstitch::error::{Result, StitchError};

/// Merge remote PDF documents into a single document.
///
/// pdfstitch downloads every URL, copies all pages in list order into a new
/// document, saves it, and prints a JSON report on stdout.
#[derive(Parser, Debug)]
#[command(name = "pdfstitch")]
#[command(version)]
#[command(about = "Merge remote PDF documents into a single document", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// URLs of the PDF documents to merge (in order)
    ///
    /// Examples:
    ///   pdfstitch https://a.example/1.pdf https://b.example/2.pdf
    ///   pdfstitch --urls '["https://a.example/1.pdf"]'
    #[arg(value_name = "URL", required_unless_present = "urls")]
    pub inputs: Vec<String>,

    /// URL list as a JSON array of strings
    ///
    /// Used instead of positional URLs.
    #[arg(long, value_name = "JSON", env = "PDFSTITCH_URLS", conflicts_with = "inputs")]
    pub urls: Option<String>,

    /// Name of the merged file
    #[arg(short = 'n', long, value_name = "NAME", default_value = "merged.pdf")]
    #[arg(env = "PDFSTITCH_FILE_NAME")]
    pub file_name: String,

    /// Name of the binary property the merged file is reported under
    #[arg(long, value_name = "NAME", default_value = "data")]
    #[arg(env = "PDFSTITCH_BINARY_PROPERTY")]
    pub binary_property: String,

    /// Directory to write the merged file into
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    #[arg(env = "PDFSTITCH_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Number of documents downloaded and parsed concurrently
    ///
    /// Default is number of CPU cores. Pages are always appended in URL
    /// order regardless of this setting.
    #[arg(short, long, value_name = "N", env = "PDFSTITCH_JOBS")]
    pub jobs: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30, env = "PDFSTITCH_TIMEOUT")]
    pub timeout: u64,

    /// User-Agent header sent with each request
    #[arg(long, value_name = "TEXT", env = "PDFSTITCH_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Cross-reference layout of the output
    ///
    /// - table: classic cross-reference table (default)
    /// - stream: compressed cross-reference stream (PDF 1.5+)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    #[arg(env = "PDFSTITCH_XREF_FORMAT")]
    pub xref_format: XrefFormat,

    /// Force overwrite of existing output file without confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Never overwrite existing output file
    #[arg(long, conflicts_with = "force")]
    pub no_clobber: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    ///
    /// Logs go to stderr; RUST_LOG overrides this flag.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Set title metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Set author metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub author: Option<String>,

    /// Set subject metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Set keywords metadata for output PDF (comma-separated)
    #[arg(long, value_name = "TEXT")]
    pub keywords: Option<String>,
}

impl Cli {
    /// The donor list, from `--urls` or the positional arguments.
    ///
    /// # Errors
    ///
    /// Returns an input error if the list is empty or has a blank entry.
    pub fn url_list(&self) -> Result<UrlList> {
        match &self.urls {
            Some(json) => UrlList::parse_json(json),
            None => UrlList::from_strings(&self.inputs),
        }
    }

    /// Convert CLI arguments into a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL list is invalid or the configuration
    /// fails validation.
    pub fn to_config(&self) -> Result<MergeConfig> {
        let overwrite_mode = if self.force {
            OverwriteMode::Force
        } else if self.no_clobber {
            OverwriteMode::NoClobber
        } else {
            OverwriteMode::Prompt
        };

        let mut fetch = FetchConfig {
            timeout: Duration::from_secs(self.timeout),
            ..FetchConfig::default()
        };
        if let Some(agent) = &self.user_agent {
            fetch.user_agent = agent.clone();
        }

        if self.timeout == 0 {
            return Err(StitchError::invalid_config("Timeout must be at least 1 second"));
        }

        let mut config = MergeConfig::new(self.url_list()?);
        config.file_name = self.file_name.trim().to_string();
        config.binary_property = self.binary_property.clone();
        config.output_dir = self.output_dir.clone();
        config.jobs = self.jobs;
        config.overwrite_mode = overwrite_mode;
        config.metadata = Metadata::new(
            self.title.clone(),
            self.author.clone(),
            self.subject.clone(),
            self.keywords.clone(),
        );
        config.xref_format = self.xref_format;
        config.fetch = fetch;
        config.verbose = self.verbose > 0;
        config.quiet = self.quiet;

        config.validate()?;
        Ok(config)
    }
}
