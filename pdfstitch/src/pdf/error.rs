//! Errors raised by the PDF engine.
//!
//! Each stage has its own enum so callers can tell a broken donor
//! ([`ParseError`]) from a bad page request ([`CloneError`]) or an internal
//! inconsistency while writing ([`SerializeError`]).

use thiserror::Error;

use crate::pdf::object::ObjectId;

/// Failure to undo a stream filter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// The filter is not implemented.
    #[error("unsupported stream filter /{0}")]
    UnsupportedFilter(String),

    /// The payload is not valid for its filter.
    #[error("corrupt {filter} data: {reason}")]
    Corrupt {
        /// Filter name.
        filter: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// Predictor parameters are invalid or unsupported.
    #[error("unsupported predictor {0}")]
    UnsupportedPredictor(i64),
}

/// Failure to turn bytes into a document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// No `%PDF-` header near the start of the buffer.
    #[error("missing %PDF- header")]
    MissingHeader,

    /// No `startxref` marker, or the trailer it leads to is unreadable.
    #[error("missing or unreadable trailer: {reason}")]
    MissingTrailer {
        /// What was missing.
        reason: String,
    },

    /// Cross-reference data is malformed.
    #[error("corrupt cross-reference data at byte {offset}: {reason}")]
    CorruptXref {
        /// Byte offset of the section.
        offset: usize,
        /// What was wrong.
        reason: String,
    },

    /// One cross-reference section lists an object twice with different data.
    #[error("contradictory cross-reference entries for object {number}")]
    ConflictingXrefEntry {
        /// Object number listed twice.
        number: u32,
    },

    /// A reference points at an object absent from every xref section.
    #[error("object {} {} R is referenced but not present in the file", .id.0, .id.1)]
    DanglingReference {
        /// The unresolved reference.
        id: ObjectId,
    },

    /// The page tree visits a node twice.
    #[error("page tree cycle through object {} {} R", .id.0, .id.1)]
    PageTreeCycle {
        /// Node visited twice.
        id: ObjectId,
    },

    /// A page tree node is not shaped like a Pages or Page node.
    #[error("invalid page tree node {} {} R: {reason}", .id.0, .id.1)]
    InvalidPageTree {
        /// Offending node.
        id: ObjectId,
        /// What was wrong.
        reason: String,
    },

    /// The trailer has no usable `/Root` catalog.
    #[error("document catalog is missing or not a dictionary")]
    MissingCatalog,

    /// An indirect object body is malformed.
    #[error("syntax error at byte {offset}: {message}")]
    Syntax {
        /// Byte offset where parsing failed.
        offset: usize,
        /// What was expected.
        message: String,
    },

    /// An indirect object could not be read.
    #[error("object {} {} R is corrupt: {reason}", .id.0, .id.1)]
    CorruptObject {
        /// Offending object.
        id: ObjectId,
        /// What was wrong.
        reason: String,
    },

    /// A stream needed for parsing could not be decoded.
    #[error("cannot decode stream {} {} R: {source}", .id.0, .id.1)]
    Decode {
        /// Stream object.
        id: ObjectId,
        /// Filter failure.
        source: DecodeError,
    },

    /// The document is encrypted.
    #[error("document is encrypted; decrypt it before merging")]
    Encrypted,
}

impl ParseError {
    /// The object this error is about, when one is known.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Self::DanglingReference { id }
            | Self::PageTreeCycle { id }
            | Self::InvalidPageTree { id, .. }
            | Self::CorruptObject { id, .. }
            | Self::Decode { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn corrupt_xref(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptXref {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt_object(id: ObjectId, reason: impl Into<String>) -> Self {
        Self::CorruptObject {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_page_tree(id: ObjectId, reason: impl Into<String>) -> Self {
        Self::InvalidPageTree {
            id,
            reason: reason.into(),
        }
    }
}

/// Failure to copy pages between documents.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CloneError {
    /// Requested page index does not exist in the source.
    #[error("page index {index} is out of range (document has {page_count} pages)")]
    PageOutOfRange {
        /// Requested zero-based index.
        index: usize,
        /// Pages in the source.
        page_count: usize,
    },

    /// A page handle does not name a page dictionary in the document.
    #[error("object {} {} R is not a page of this document", .id.0, .id.1)]
    UnknownPage {
        /// The handle's object id.
        id: ObjectId,
    },

    /// The source document could not supply an object.
    #[error(transparent)]
    Source(#[from] ParseError),
}

/// Failure to write a document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SerializeError {
    /// The trailer has no `/Root` reference.
    #[error("document has no catalog to write")]
    MissingCatalog,

    /// A reachable reference has no object behind it.
    #[error("unresolved reference {} {} R at write time", .id.0, .id.1)]
    UnresolvedReference {
        /// The unresolved reference.
        id: ObjectId,
    },

    /// Compressing the cross-reference stream failed.
    #[error("failed to encode cross-reference stream: {0}")]
    Encode(String),
}
