//! Document information for the merged output.
//!
//! The merged document gets a fresh Info dictionary: who produced it, when,
//! and whatever title/author/subject/keywords the caller configured. Donor
//! Info dictionaries are never copied because the cloner only follows page
//! subtrees.

use std::fmt;

use chrono::{DateTime, Offset, TimeZone, Utc};

use crate::config::Metadata;
use crate::pdf::{Dictionary, Document, ObjectId, PdfValue, StringFormat};

/// Writes the `/Info` dictionary of a document.
#[derive(Debug, Clone)]
pub struct MetadataWriter {
    producer: String,
}

impl Default for MetadataWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataWriter {
    /// Create a writer that stamps documents as produced by this crate.
    pub fn new() -> Self {
        Self {
            producer: format!("{} {}", crate::NAME, crate::VERSION),
        }
    }

    /// Stamp `doc` with `metadata`, timestamped now.
    ///
    /// Returns the id of the Info dictionary.
    pub fn apply(&self, doc: &mut Document, metadata: &Metadata) -> ObjectId {
        self.apply_at(doc, metadata, &Utc::now())
    }

    /// Stamp `doc` with `metadata` and an explicit timestamp.
    ///
    /// An existing Info dictionary is updated in place; otherwise one is
    /// created and linked from the trailer.
    pub fn apply_at<Tz: TimeZone>(
        &self,
        doc: &mut Document,
        metadata: &Metadata,
        now: &DateTime<Tz>,
    ) -> ObjectId
    where
        Tz::Offset: fmt::Display,
    {
        let existing = doc
            .trailer()
            .get(b"Info")
            .and_then(PdfValue::as_reference)
            .filter(|id| matches!(doc.object(*id), Some(PdfValue::Dictionary(_))));

        let info_id = match existing {
            Some(id) => id,
            None => {
                let id = doc.add_object(Dictionary::new());
                doc.trailer_mut().set("Info", id);
                id
            }
        };

        let date = pdf_date(now);
        let fields = [
            ("Title", metadata.title.as_deref()),
            ("Author", metadata.author.as_deref()),
            ("Subject", metadata.subject.as_deref()),
            ("Keywords", metadata.keywords.as_deref()),
            ("Creator", Some(crate::NAME)),
            ("Producer", Some(self.producer.as_str())),
        ];

        if let Some(info) = doc.object_mut(info_id).and_then(PdfValue::as_dict_mut) {
            for (key, value) in fields {
                if let Some(value) = value {
                    info.set(key, text_string(value));
                }
            }
            if !info.has(b"CreationDate") {
                info.set("CreationDate", PdfValue::string_literal(date.clone()));
            }
            info.set("ModDate", PdfValue::string_literal(date));
        }

        info_id
    }
}

/// Format a timestamp as a PDF date string, `D:YYYYMMDDHHmmSS+HH'mm'`.
pub fn pdf_date<Tz: TimeZone>(when: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    let offset = when.offset().fix().local_minus_utc();
    let base = when.format("D:%Y%m%d%H%M%S");
    if offset == 0 {
        return format!("{base}Z");
    }

    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!("{base}{sign}{:02}'{:02}'", minutes / 60, minutes % 60)
}

/// Encode text as a PDF text string: literal for ASCII, UTF-16BE with a
/// byte order mark otherwise.
pub fn text_string(text: &str) -> PdfValue {
    if text.is_ascii() {
        return PdfValue::string_literal(text);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    PdfValue::String(bytes, StringFormat::Hexadecimal)
}
