//! Saving merged documents to disk.
//!
//! Writes are atomic: bytes go to a temporary sibling file which is then
//! renamed over the destination, so a failed write never leaves a truncated
//! PDF behind.
//!
//! # Examples
//!
//! ```no_run
//! use pdfstitch::config::OverwriteMode;
//! use pdfstitch::io::writer::OutputWriter;
//! use std::path::Path;
//!
//! # async fn example(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let writer = OutputWriter::new(OverwriteMode::Force);
//! let stats = writer.save(bytes, Path::new("merged.pdf")).await?;
//! println!("Wrote {}", stats.format_file_size());
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::task;
use tracing::debug;

use crate::config::OverwriteMode;
use crate::error::{Result, StitchError};
use crate::utils::format_file_size;

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to write the file.
    pub write_time: Duration,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Path where the file was written.
    pub output_path: PathBuf,

    /// Whether an existing file was replaced.
    pub replaced: bool,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// Writes merged documents with a fixed overwrite policy.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    overwrite_mode: OverwriteMode,
    atomic: bool,
}

impl OutputWriter {
    /// Create an atomic writer with the given overwrite policy.
    pub fn new(overwrite_mode: OverwriteMode) -> Self {
        Self {
            overwrite_mode,
            atomic: true,
        }
    }

    /// Write directly to the destination (faster but less safe).
    pub fn non_atomic(mut self) -> Self {
        self.atomic = false;
        self
    }

    /// The configured overwrite policy.
    pub fn overwrite_mode(&self) -> OverwriteMode {
        self.overwrite_mode
    }

    /// Check whether `path` may be written under the overwrite policy.
    ///
    /// `confirmed` is the caller's answer to the overwrite prompt; it is only
    /// consulted in [`OverwriteMode::Prompt`] mode.
    ///
    /// # Errors
    ///
    /// Returns [`StitchError::OutputExists`] if the file exists and may not
    /// be replaced, and [`StitchError::InvalidConfig`] if the parent
    /// directory is missing.
    pub async fn check(&self, path: &Path, confirmed: bool) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && !tokio::fs::try_exists(parent).await.unwrap_or(false)
        {
            return Err(StitchError::invalid_config(format!(
                "Output directory does not exist: {}",
                parent.display()
            )));
        }

        if !self.exists(path).await {
            return Ok(());
        }

        match self.overwrite_mode {
            OverwriteMode::Force => Ok(()),
            OverwriteMode::Prompt if confirmed => Ok(()),
            OverwriteMode::Prompt | OverwriteMode::NoClobber => {
                Err(StitchError::output_exists(path.to_path_buf()))
            }
        }
    }

    /// Save `bytes` to `path`.
    ///
    /// The overwrite policy is enforced as if the prompt was declined; call
    /// [`OutputWriter::check`] first to handle prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists and may not be replaced
    /// - Output directory doesn't exist
    /// - The write or the final rename fails
    pub async fn save(&self, bytes: Vec<u8>, path: &Path) -> Result<WriteStatistics> {
        self.save_confirmed(bytes, path, false).await
    }

    /// Save `bytes` to `path`, with the caller's answer to the overwrite
    /// prompt.
    ///
    /// # Errors
    ///
    /// Same as [`OutputWriter::save`].
    pub async fn save_confirmed(
        &self,
        bytes: Vec<u8>,
        path: &Path,
        confirmed: bool,
    ) -> Result<WriteStatistics> {
        self.check(path, confirmed).await?;
        let replaced = self.exists(path).await;

        let path_buf = path.to_path_buf();
        let atomic = self.atomic;

        let stats = task::spawn_blocking(move || {
            let start = Instant::now();

            let write_path = if atomic {
                temp_path(&path_buf)
            } else {
                path_buf.clone()
            };

            let result = write_file(&write_path, &bytes);
            if let Err(err) = result {
                if atomic {
                    let _ = std::fs::remove_file(&write_path);
                }
                return Err(err);
            }

            if atomic {
                std::fs::rename(&write_path, &path_buf).map_err(|e| {
                    let _ = std::fs::remove_file(&write_path);
                    StitchError::FailedToWrite {
                        path: path_buf.clone(),
                        source: e,
                    }
                })?;
            }

            Ok::<_, StitchError>(WriteStatistics {
                write_time: start.elapsed(),
                file_size: bytes.len() as u64,
                output_path: path_buf,
                replaced,
            })
        })
        .await
        .map_err(|e| StitchError::other(format!("Write task failed: {e}")))??;

        debug!(
            "Wrote {} to {}",
            stats.format_file_size(),
            stats.output_path.display()
        );

        Ok(stats)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

impl Default for OutputWriter {
    fn default() -> Self {
        Self::new(OverwriteMode::default())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let to_error = |source| StitchError::FailedToWrite {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::create(path).map_err(to_error)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(bytes).map_err(to_error)?;
    writer.flush().map_err(to_error)?;
    writer
        .into_inner()
        .map_err(|e| to_error(e.into_error()))?
        .sync_all()
        .map_err(to_error)?;
    Ok(())
}
