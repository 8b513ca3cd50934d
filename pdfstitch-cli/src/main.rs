//! pdfstitch - Merge remote PDF documents into a single document.
//!
//! Downloads every URL, merges the pages in order, saves the result and
//! prints a JSON report on stdout. Logs go to stderr.

mod cli;

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use pdfstitch::config::{MergeConfig, OverwriteMode};
use pdfstitch::error::StitchError;
use pdfstitch::io::{HttpFetcher, OutputWriter, WriteStatistics};
use pdfstitch::merge::{MergeReport, MergeRequest, Merger};
use pdfstitch::utils::format_millis;

/// MIME type of the merged document.
const PDF_MIME_TYPE: &str = "application/pdf";

/// The JSON printed on success: the report, and where the bytes went.
#[derive(Debug, Serialize)]
struct Envelope {
    json: MergeReport,
    binary: BTreeMap<String, BinaryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BinaryEntry {
    file_name: String,
    mime_type: &'static str,
    file_size: u64,
    path: PathBuf,
}

impl Envelope {
    fn new(config: &MergeConfig, report: MergeReport, written: &WriteStatistics) -> Self {
        let entry = BinaryEntry {
            file_name: report.file_name.clone(),
            mime_type: PDF_MIME_TYPE,
            file_size: written.file_size,
            path: written.output_path.clone(),
        };

        Self {
            json: report,
            binary: BTreeMap::from([(config.binary_property.clone(), entry)]),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<StitchError>() {
            Some(stitch) => {
                eprintln!("Error: {stitch}");
                process::exit(stitch.exit_code());
            }
            None => {
                eprintln!("Error: {err:#}");
                process::exit(1);
            }
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.to_config()?;
    info!("{} v{}", pdfstitch::NAME, pdfstitch::VERSION);

    let output_path = config.output_path();
    let writer = OutputWriter::new(config.overwrite_mode);

    // Settle overwriting before any download happens.
    let confirmed = confirm_overwrite(&writer, &output_path, &config).await?;

    let fetcher = HttpFetcher::new(&config.fetch)
        .map_err(|e| StitchError::invalid_config(format!("Cannot create HTTP client: {e}")))?;
    let merger = Merger::from_config(fetcher, &config);

    info!(
        "Merging {} document(s) with {} job(s)",
        config.urls.len(),
        config.effective_jobs()
    );
    let output = merger.merge(&MergeRequest::from_config(&config)).await?;
    debug!(
        "Merged {} object(s) in {:?} ({:?} loading)",
        output.statistics.objects_written,
        output.statistics.merge_time,
        output.statistics.load.total_time
    );

    let written = writer
        .save_confirmed(output.bytes, &output_path, confirmed)
        .await?;
    info!(
        "Created {} ({})",
        written.output_path.display(),
        written.format_file_size()
    );

    if config.should_print() {
        eprintln!(
            "Merged {} page(s) from {} document(s) into {} ({}, {})",
            output.report.page_count,
            output.report.source_count,
            written.output_path.display(),
            written.format_file_size(),
            format_millis(output.statistics.merge_time)
        );
    }

    let envelope = Envelope::new(&config, output.report, &written);
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &envelope).context("Failed to write report")?;
    writeln!(stdout).context("Failed to write report")?;

    Ok(())
}

/// Decide whether an existing output file may be replaced.
///
/// Prompts on the terminal in [`OverwriteMode::Prompt`] mode; without a
/// terminal, or in quiet mode, an existing file is never replaced.
async fn confirm_overwrite(
    writer: &OutputWriter,
    path: &Path,
    config: &MergeConfig,
) -> Result<bool, StitchError> {
    match writer.check(path, false).await {
        Ok(()) => return Ok(false),
        Err(StitchError::OutputExists { .. }) if config.overwrite_mode == OverwriteMode::Prompt => {}
        Err(err) => return Err(err),
    }

    if config.quiet || !io::stdin().is_terminal() {
        return Err(StitchError::output_exists(path.to_path_buf()));
    }

    eprint!(
        "Output file already exists: {}\nOverwrite? [y/N]: ",
        path.display()
    );
    io::stderr().flush().ok();

    let mut response = String::new();
    io::stdin()
        .read_line(&mut response)
        .map_err(|err| StitchError::other(format!("Failed to read input: {err}")))?;

    let response = response.trim().to_lowercase();
    if response == "y" || response == "yes" {
        Ok(true)
    } else {
        Err(StitchError::output_exists(path.to_path_buf()))
    }
}
