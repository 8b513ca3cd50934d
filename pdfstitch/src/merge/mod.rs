//! Merging donors into one document.

pub mod merger;
pub mod metadata;

pub use merger::{
    MergeOutput, MergeReport, MergeRequest, MergeStatistics, Merger, append_document,
};
pub use metadata::MetadataWriter;
