//! Serialization of a document to bytes.
//!
//! Only objects reachable from the trailer's `/Root` (and `/Info`) are
//! written. They are renumbered `1..=n` in breadth-first discovery order,
//! so the output never contains holes or orphans.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::pdf::document::Document;
use crate::pdf::error::SerializeError;
use crate::pdf::filter::flate_encode;
use crate::pdf::object::{Dictionary, ObjectId, PdfValue, StringFormat};
use crate::pdf::parser::is_delimiter;

/// How the cross-reference section is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XrefFormat {
    /// Classic `xref` table with 20-byte entries.
    #[default]
    Table,
    /// Compressed `/Type /XRef` stream.
    Stream,
}

impl FromStr for XrefFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "classic" => Ok(Self::Table),
            "stream" | "compressed" => Ok(Self::Stream),
            _ => Err(format!(
                "Invalid cross-reference format: {s}. Valid options: table, stream"
            )),
        }
    }
}

impl fmt::Display for XrefFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Stream => write!(f, "stream"),
        }
    }
}

/// Options for [`serialize`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Cross-reference flavour.
    pub xref_format: XrefFormat,
}

/// Bytes of a written document and how many objects went into it.
#[derive(Debug, Clone)]
pub struct Serialized {
    /// The complete file.
    pub bytes: Vec<u8>,
    /// Indirect objects written, the cross-reference stream excluded.
    pub object_count: usize,
}

/// Write `doc` as a complete PDF file.
pub fn serialize(doc: &mut Document, options: &WriteOptions) -> Result<Vec<u8>, SerializeError> {
    write_document(doc, options).map(|serialized| serialized.bytes)
}

/// Like [`serialize`], also reporting the number of objects written.
pub fn write_document(
    doc: &mut Document,
    options: &WriteOptions,
) -> Result<Serialized, SerializeError> {
    let root = doc.catalog_id().ok_or(SerializeError::MissingCatalog)?;
    let info = doc.trailer().get(b"Info").and_then(PdfValue::as_reference);

    let order = mark(doc, root, info)?;
    let numbers: HashMap<ObjectId, ObjectId> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, (i as u32 + 1, 0)))
        .collect();
    let renumber = |id: ObjectId| numbers.get(&id).copied().unwrap_or(id);

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n");

    let mut offsets = Vec::with_capacity(order.len());
    for (i, id) in order.iter().enumerate() {
        let mut value = doc
            .object(*id)
            .cloned()
            .ok_or(SerializeError::UnresolvedReference { id: *id })?;
        value.remap_references(&mut |old| renumber(old));
        if let PdfValue::Stream(stream) = &mut value {
            stream.dict.set("Length", stream.content.len() as i64);
        }

        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        write_value(&mut out, &value);
        out.extend_from_slice(b"\nendobj\n");
    }

    let mut trailer = Dictionary::new();
    trailer.set("Root", PdfValue::Reference(renumber(root)));
    if let Some(info) = info {
        trailer.set("Info", PdfValue::Reference(renumber(info)));
    }
    if let Some(PdfValue::Array(ids)) = doc.trailer().get(b"ID") {
        trailer.set("ID", PdfValue::Array(ids.clone()));
    }

    match options.xref_format {
        XrefFormat::Table => write_xref_table(&mut out, &offsets, trailer),
        XrefFormat::Stream => write_xref_stream(&mut out, &offsets, trailer)?,
    }

    debug!(
        "Serialized {} object(s) into {} bytes ({} cross-reference)",
        order.len(),
        out.len(),
        options.xref_format
    );

    Ok(Serialized {
        bytes: out,
        object_count: order.len(),
    })
}

/// Breadth-first discovery of every object reachable from the roots.
fn mark(
    doc: &mut Document,
    root: ObjectId,
    info: Option<ObjectId>,
) -> Result<Vec<ObjectId>, SerializeError> {
    let mut order = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut queue: VecDeque<ObjectId> = std::iter::once(root).chain(info).collect();
    seen.extend(queue.iter().copied());

    while let Some(id) = queue.pop_front() {
        let value = doc
            .get(id)
            .map_err(|_| SerializeError::UnresolvedReference { id })?;
        for reference in value.references() {
            if seen.insert(reference) {
                queue.push_back(reference);
            }
        }
        order.push(id);
    }

    Ok(order)
}

fn write_xref_table(out: &mut Vec<u8>, offsets: &[usize], mut trailer: Dictionary) {
    let xref_at = out.len();
    let size = offsets.len() + 1;

    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }

    trailer.set("Size", size as i64);
    out.extend_from_slice(b"trailer\n");
    write_dictionary(out, &trailer);
    out.extend_from_slice(format!("\nstartxref\n{xref_at}\n%%EOF\n").as_bytes());
}

fn write_xref_stream(
    out: &mut Vec<u8>,
    offsets: &[usize],
    mut dict: Dictionary,
) -> Result<(), SerializeError> {
    let xref_at = out.len();
    let number = offsets.len() + 1;
    let size = number + 1;
    let width = byte_width(xref_at);

    let mut rows = Vec::with_capacity(size * (width + 3));
    push_row(&mut rows, 0, 0, width, 0xffff);
    for offset in offsets.iter().copied().chain(std::iter::once(xref_at)) {
        push_row(&mut rows, 1, offset, width, 0);
    }

    let content = flate_encode(&rows).map_err(|err| SerializeError::Encode(err.to_string()))?;

    dict.set("Type", PdfValue::name("XRef"));
    dict.set("Size", size as i64);
    dict.set(
        "W",
        vec![
            PdfValue::Integer(1),
            PdfValue::Integer(width as i64),
            PdfValue::Integer(2),
        ],
    );
    dict.set("Filter", PdfValue::name("FlateDecode"));
    dict.set("Length", content.len() as i64);

    out.extend_from_slice(format!("{number} 0 obj\n").as_bytes());
    write_dictionary(out, &dict);
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(&content);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
    Ok(())
}

fn push_row(rows: &mut Vec<u8>, kind: u8, field: usize, width: usize, generation: u16) {
    rows.push(kind);
    let bytes = (field as u64).to_be_bytes();
    rows.extend_from_slice(&bytes[bytes.len() - width..]);
    rows.extend_from_slice(&generation.to_be_bytes());
}

/// Bytes needed to hold `value`, at least one.
fn byte_width(value: usize) -> usize {
    let bits = usize::BITS - value.leading_zeros();
    (bits as usize).div_ceil(8).max(1)
}

/// Append the textual form of a value.
pub fn write_value(out: &mut Vec<u8>, value: &PdfValue) {
    match value {
        PdfValue::Null => out.extend_from_slice(b"null"),
        PdfValue::Boolean(true) => out.extend_from_slice(b"true"),
        PdfValue::Boolean(false) => out.extend_from_slice(b"false"),
        PdfValue::Integer(n) => out.extend_from_slice(n.to_string().as_bytes()),
        PdfValue::Real(n) => out.extend_from_slice(format_real(*n).as_bytes()),
        PdfValue::String(bytes, StringFormat::Literal) => write_literal_string(out, bytes),
        PdfValue::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            for byte in bytes {
                out.extend_from_slice(format!("{byte:02x}").as_bytes());
            }
            out.push(b'>');
        }
        PdfValue::Name(name) => write_name(out, name),
        PdfValue::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        PdfValue::Dictionary(dict) => write_dictionary(out, dict),
        PdfValue::Stream(stream) => {
            write_dictionary(out, &stream.dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        PdfValue::Reference((number, generation)) => {
            out.extend_from_slice(format!("{number} {generation} R").as_bytes());
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (i, (key, value)) in dict.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        write_name(out, key);
        out.push(b' ');
        write_value(out, value);
    }
    out.extend_from_slice(b">>");
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        if byte == b'#' || !(0x21..=0x7e).contains(&byte) || is_delimiter(byte) {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            b'\x08' => out.extend_from_slice(b"\\b"),
            b'\x0c' => out.extend_from_slice(b"\\f"),
            _ if byte < 0x20 || byte == 0x7f => {
                out.extend_from_slice(format!("\\{byte:03o}").as_bytes());
            }
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

/// Fixed-point form, no exponent, no trailing zeros.
/// Shortest decimal that reads back as `value`. `Display` for `f64` never
/// uses exponent notation.
fn format_real(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}
