//! Error types for pdfstitch.
//!
//! The PDF engine reports its own narrow errors ([`ParseError`],
//! [`CloneError`], [`SerializeError`]). This module wraps them together
//! with the donor they came from, so a caller can tell which URL to retry.
//!
//! # Error Categories
//!
//! - **Input**: the URL list is malformed, empty, or has a blank entry
//! - **Transport**: a donor could not be downloaded
//! - **Parse / Clone**: a donor was downloaded but is not a usable PDF
//! - **Serialize**: the merged document could not be written (internal bug)
//! - **Output / Config**: local file system and option problems

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::io::fetch::TransportError;
use crate::pdf::{CloneError, ObjectId, ParseError, SerializeError};

/// Result type alias for pdfstitch operations.
pub type Result<T> = std::result::Result<T, StitchError>;

/// Coarse classification of a [`StitchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The donor list itself is unusable.
    Input,
    /// A donor could not be fetched.
    Transport,
    /// A donor is not a readable PDF.
    Parse,
    /// Pages could not be copied out of a donor.
    Clone,
    /// The merged document could not be serialized.
    Serialize,
    /// The merged document could not be saved.
    Output,
    /// Options are inconsistent.
    Config,
}

/// Main error type for pdfstitch operations.
#[derive(Debug, Error)]
pub enum StitchError {
    /// The URL list is not a non-empty list of strings.
    #[error("Invalid URL list: {reason}")]
    InvalidUrlList {
        /// What is wrong with the list.
        reason: String,
    },

    /// One entry of the URL list is blank or not a string.
    #[error("Invalid URL at position {index}: {value}\n  Hint: every entry must be a non-empty string")]
    InvalidUrl {
        /// Zero-based position in the list.
        index: usize,
        /// The offending entry as it appeared in the input.
        value: String,
    },

    /// A donor could not be downloaded.
    #[error("Failed to fetch PDF: {url}\n  Reason: {source}")]
    Transport {
        /// Donor URL.
        url: String,
        /// Zero-based donor position.
        index: usize,
        /// Transport failure.
        #[source]
        source: TransportError,
    },

    /// A donor was fetched but could not be parsed.
    #[error("Failed to parse PDF: {url}\n  Reason: {source}")]
    Parse {
        /// Donor URL.
        url: String,
        /// Zero-based donor position.
        index: usize,
        /// Parser failure.
        #[source]
        source: ParseError,
    },

    /// Pages of a donor could not be copied into the merged document.
    #[error("Failed to copy pages from: {url}\n  Reason: {source}")]
    Clone {
        /// Donor URL.
        url: String,
        /// Zero-based donor position.
        index: usize,
        /// Cloner failure.
        #[source]
        source: CloneError,
    },

    /// The merged document could not be serialized.
    #[error("Failed to serialize merged document\n  Reason: {source}")]
    Serialize {
        /// Serializer failure.
        #[from]
        source: SerializeError,
    },

    /// Output file already exists and overwrite is not allowed.
    #[error(
        "Output file already exists: {}\n  Use --force to overwrite or choose a different file name",
        .path.display()
    )]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// Failed to write the output file.
    #[error("Failed to write to output file: {}\n  Reason: {source}", .path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl StitchError {
    /// Create an InvalidUrlList error.
    pub fn invalid_url_list(reason: impl Into<String>) -> Self {
        Self::InvalidUrlList {
            reason: reason.into(),
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(index: usize, value: impl Into<String>) -> Self {
        Self::InvalidUrl {
            index,
            value: value.into(),
        }
    }

    /// Create a Transport error for the donor at `index`.
    pub fn transport(index: usize, url: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            url: url.into(),
            index,
            source,
        }
    }

    /// Create a Parse error for the donor at `index`.
    pub fn parse(index: usize, url: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            url: url.into(),
            index,
            source,
        }
    }

    /// Create a Clone error for the donor at `index`.
    pub fn clone_failed(index: usize, url: impl Into<String>, source: CloneError) -> Self {
        Self::Clone {
            url: url.into(),
            index,
            source,
        }
    }

    /// Create an OutputExists error.
    pub fn output_exists(path: PathBuf) -> Self {
        Self::OutputExists { path }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrlList { .. } | Self::InvalidUrl { .. } => ErrorKind::Input,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Clone { .. } => ErrorKind::Clone,
            Self::Serialize { .. } => ErrorKind::Serialize,
            Self::OutputExists { .. } | Self::FailedToWrite { .. } | Self::Io { .. } => {
                ErrorKind::Output
            }
            Self::InvalidConfig { .. } | Self::Other { .. } => ErrorKind::Config,
        }
    }

    /// The donor URL this error is about, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transport { url, .. } | Self::Parse { url, .. } | Self::Clone { url, .. } => {
                Some(url)
            }
            _ => None,
        }
    }

    /// Zero-based position of the donor (or list entry) this error is about.
    pub fn donor_index(&self) -> Option<usize> {
        match self {
            Self::InvalidUrl { index, .. }
            | Self::Transport { index, .. }
            | Self::Parse { index, .. }
            | Self::Clone { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The offending object inside a donor, when the engine could name one.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Self::Parse { source, .. } => source.object(),
            Self::Clone {
                source: CloneError::Source(source),
                ..
            } => source.object(),
            Self::Clone {
                source: CloneError::UnknownPage { id },
                ..
            } => Some(*id),
            Self::Serialize {
                source: SerializeError::UnresolvedReference { id },
            } => Some(*id),
            _ => None,
        }
    }

    /// Check if this error points at an internal inconsistency rather than
    /// bad input.
    ///
    /// Retrying a fatal error with the same donors will fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Serialize) || matches!(self, Self::Other { .. })
    }

    /// Check if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Input => 2,
            ErrorKind::Transport => 3,
            ErrorKind::Parse | ErrorKind::Clone => 4,
            ErrorKind::Serialize => 6,
            ErrorKind::Output => match self {
                Self::OutputExists { .. } => 5,
                _ => 7,
            },
            ErrorKind::Config => 1,
        }
    }
}
