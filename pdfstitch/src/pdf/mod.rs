//! The PDF engine: object model, parser, page cloner, document builder
//! and serializer.

pub mod clone;
pub mod document;
pub mod error;
pub mod filter;
pub mod object;
pub mod page_tree;
pub mod parser;
pub mod writer;
pub mod xref;

#[cfg(test)]
pub(crate) mod fixtures;

pub use clone::{PageHandle, Remapping, clone_pages, remap_subgraph};
pub use document::Document;
pub use error::{CloneError, DecodeError, ParseError, SerializeError};
pub use object::{Dictionary, ObjectId, PdfValue, Stream, StringFormat};
pub use page_tree::PageEntry;
pub use writer::{Serialized, WriteOptions, XrefFormat, serialize, write_document};
