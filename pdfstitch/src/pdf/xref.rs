//! Cross-reference data: classic tables, cross-reference streams, hybrid
//! files and `/Prev` chains.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::pdf::error::ParseError;
use crate::pdf::object::{Dictionary, PdfValue, Stream};
use crate::pdf::parser::{ObjectBody, Parser, stream_content};

/// Where an object lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Free or deleted object.
    Free,
    /// Uncompressed object at a byte offset.
    Normal {
        /// Byte offset of the `n g obj` header.
        offset: usize,
        /// Generation recorded in the table.
        generation: u16,
    },
    /// Object stored inside an object stream.
    Compressed {
        /// Object number of the containing `/ObjStm`.
        container: u32,
        /// Index of the object within the container.
        index: usize,
    },
}

/// Cross-reference data merged across every section of a file.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: BTreeMap<u32, XrefEntry>,
    trailer: Dictionary,
}

impl XrefTable {
    /// Entry for an object number.
    pub fn get(&self, number: u32) -> Option<XrefEntry> {
        self.entries.get(&number).copied()
    }

    /// The effective trailer: newest keys win.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest object number listed.
    pub fn max_number(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// Entries in object-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, XrefEntry)> + '_ {
        self.entries.iter().map(|(number, entry)| (*number, *entry))
    }
}

/// One section of cross-reference data and the trailer that came with it.
#[derive(Debug, Default)]
struct Section {
    entries: BTreeMap<u32, XrefEntry>,
    trailer: Dictionary,
}

impl Section {
    fn insert(&mut self, number: u32, entry: XrefEntry) -> Result<(), ParseError> {
        match self.entries.get(&number) {
            Some(existing) if *existing != entry => {
                Err(ParseError::ConflictingXrefEntry { number })
            }
            Some(_) => Ok(()),
            None => {
                self.entries.insert(number, entry);
                Ok(())
            }
        }
    }
}

/// Read every cross-reference section reachable from the final
/// `startxref`, newest first, and merge them.
pub fn read_xref(data: &[u8]) -> Result<XrefTable, ParseError> {
    let mut offset = find_startxref(data)?;
    let mut visited = HashSet::new();
    let mut sections = Vec::new();

    loop {
        if !visited.insert(offset) {
            warn!("Cross-reference /Prev chain loops back to byte {}", offset);
            break;
        }

        let section = read_section(data, offset)?;
        let prev = section.trailer.get(b"Prev").and_then(PdfValue::as_i64);
        sections.push(section);

        match prev {
            Some(prev) => {
                offset = usize::try_from(prev)
                    .ok()
                    .filter(|prev| *prev < data.len())
                    .ok_or_else(|| {
                        ParseError::corrupt_xref(offset, format!("/Prev {prev} is out of bounds"))
                    })?;
            }
            None => break,
        }
    }

    debug!("Read {} cross-reference section(s)", sections.len());
    Ok(merge_sections(sections))
}

/// Newest section first; older sections only fill gaps.
fn merge_sections(sections: Vec<Section>) -> XrefTable {
    let mut table = XrefTable::default();

    for section in sections {
        for (number, entry) in section.entries {
            table.entries.entry(number).or_insert(entry);
        }
        for (key, value) in &section.trailer {
            if key.as_slice() == b"Prev" || key.as_slice() == b"XRefStm" {
                continue;
            }
            if !table.trailer.has(key) {
                table.trailer.set(key.clone(), value.clone());
            }
        }
    }

    if let Some(size) = table.trailer.get(b"Size").and_then(PdfValue::as_i64) {
        if size <= i64::from(table.max_number()) {
            warn!(
                "Trailer /Size {} is smaller than the highest object number {}",
                size,
                table.max_number()
            );
        }
    }

    table
}

/// Offset recorded after the last `startxref` keyword.
fn find_startxref(data: &[u8]) -> Result<usize, ParseError> {
    let keyword = b"startxref";
    let position = data
        .windows(keyword.len())
        .rposition(|window| window == keyword)
        .ok_or_else(|| ParseError::MissingTrailer {
            reason: "no startxref marker".to_string(),
        })?;

    let mut parser = Parser::at(data, position + keyword.len());
    let offset = parser
        .read_unsigned()
        .and_then(|offset| usize::try_from(offset).ok())
        .ok_or_else(|| ParseError::MissingTrailer {
            reason: "startxref is not followed by an offset".to_string(),
        })?;

    if offset >= data.len() {
        return Err(ParseError::MissingTrailer {
            reason: format!("startxref offset {offset} is past the end of the file"),
        });
    }

    Ok(offset)
}

fn read_section(data: &[u8], offset: usize) -> Result<Section, ParseError> {
    let mut parser = Parser::at(data, offset);
    if parser.peek_keyword(b"xref") {
        read_table_section(data, offset)
    } else {
        read_stream_section(data, offset)
    }
}

fn read_table_section(data: &[u8], offset: usize) -> Result<Section, ParseError> {
    let mut parser = Parser::at(data, offset);
    parser.expect_keyword(b"xref")?;
    let mut section = Section::default();

    while !parser.peek_keyword(b"trailer") {
        if parser.at_end() {
            return Err(ParseError::MissingTrailer {
                reason: "cross-reference table has no trailer".to_string(),
            });
        }

        let start = parser.read_unsigned();
        let count = parser.read_unsigned();
        let (Some(start), Some(count)) = (start, count) else {
            return Err(ParseError::corrupt_xref(
                parser.pos(),
                "expected subsection start and count",
            ));
        };

        for i in 0..count {
            let number = u32::try_from(start + i).map_err(|_| {
                ParseError::corrupt_xref(parser.pos(), "object number out of range")
            })?;
            let entry = read_table_entry(&mut parser)?;
            section.insert(number, entry)?;
        }
    }

    parser.expect_keyword(b"trailer")?;
    section.trailer = match parser.parse_value() {
        Ok(PdfValue::Dictionary(dict)) => dict,
        _ => {
            return Err(ParseError::MissingTrailer {
                reason: format!("no trailer dictionary after table at byte {offset}"),
            });
        }
    };

    // Hybrid files keep compressed entries in a side stream.
    if let Some(side) = section.trailer.get(b"XRefStm").and_then(PdfValue::as_i64) {
        let side = usize::try_from(side)
            .ok()
            .filter(|side| *side < data.len())
            .ok_or_else(|| ParseError::corrupt_xref(offset, "/XRefStm is out of bounds"))?;
        let stream_section = read_stream_section(data, side)?;
        for (number, entry) in stream_section.entries {
            section.entries.entry(number).or_insert(entry);
        }
    }

    Ok(section)
}

fn read_table_entry(parser: &mut Parser<'_>) -> Result<XrefEntry, ParseError> {
    let position = parser.pos();
    let offset = parser.read_unsigned();
    let generation = parser.read_unsigned();
    let kind = parser.read_token();

    match (offset, generation, kind) {
        (Some(offset), Some(generation), b"n") => Ok(XrefEntry::Normal {
            offset: usize::try_from(offset)
                .map_err(|_| ParseError::corrupt_xref(position, "offset out of range"))?,
            generation: u16::try_from(generation)
                .map_err(|_| ParseError::corrupt_xref(position, "generation out of range"))?,
        }),
        (Some(_), Some(_), b"f") => Ok(XrefEntry::Free),
        _ => Err(ParseError::corrupt_xref(position, "malformed table entry")),
    }
}

fn read_stream_section(data: &[u8], offset: usize) -> Result<Section, ParseError> {
    let mut parser = Parser::at(data, offset);
    let (id, body) = parser
        .read_indirect()
        .map_err(|err| ParseError::corrupt_xref(offset, err.to_string()))?;

    let ObjectBody::Stream { dict, data_start } = body else {
        return Err(ParseError::corrupt_xref(
            offset,
            "expected 'xref' or a cross-reference stream",
        ));
    };
    if !dict.has_type(b"XRef") {
        return Err(ParseError::corrupt_xref(offset, "stream is not /Type /XRef"));
    }

    let length = dict
        .get(b"Length")
        .and_then(PdfValue::as_i64)
        .and_then(|length| usize::try_from(length).ok());
    let (content, _) = stream_content(data, data_start, length)?;
    let stream = Stream { dict, content };
    let decoded = stream
        .decoded()
        .map_err(|source| ParseError::Decode { id, source })?;

    let widths = field_widths(&stream.dict, offset)?;
    let ranges = index_ranges(&stream.dict, offset)?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(ParseError::corrupt_xref(offset, "/W describes empty rows"));
    }

    let mut section = Section::default();
    let mut rows = decoded.chunks_exact(row_len);

    for (start, count) in ranges {
        for i in 0..count {
            let row = rows.next().ok_or_else(|| {
                ParseError::corrupt_xref(offset, "stream ends before its /Index is covered")
            })?;
            let number = start.checked_add(i).ok_or_else(|| {
                ParseError::corrupt_xref(offset, "object number out of range")
            })?;

            let (kind, rest) = row.split_at(widths[0]);
            let (second, third) = rest.split_at(widths[1]);
            // A zero-width type field means "uncompressed object".
            let kind = if widths[0] == 0 { 1 } else { read_be(kind) };
            let second = read_be(second);
            let third = read_be(third);

            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::Normal {
                    offset: usize::try_from(second)
                        .map_err(|_| ParseError::corrupt_xref(offset, "offset out of range"))?,
                    generation: u16::try_from(third)
                        .map_err(|_| ParseError::corrupt_xref(offset, "generation out of range"))?,
                },
                2 => XrefEntry::Compressed {
                    container: u32::try_from(second)
                        .map_err(|_| ParseError::corrupt_xref(offset, "container out of range"))?,
                    index: usize::try_from(third)
                        .map_err(|_| ParseError::corrupt_xref(offset, "index out of range"))?,
                },
                // Unknown entry types are treated as references to null.
                _ => XrefEntry::Free,
            };
            section.insert(number, entry)?;
        }
    }

    section.trailer = stream.dict;
    Ok(section)
}

fn field_widths(dict: &Dictionary, offset: usize) -> Result<[usize; 3], ParseError> {
    let widths = dict
        .get(b"W")
        .and_then(PdfValue::as_array)
        .ok_or_else(|| ParseError::corrupt_xref(offset, "missing /W"))?;

    if widths.len() != 3 {
        return Err(ParseError::corrupt_xref(offset, "/W must have three entries"));
    }

    let mut out = [0usize; 3];
    for (slot, width) in out.iter_mut().zip(widths) {
        *slot = width
            .as_i64()
            .and_then(|w| usize::try_from(w).ok())
            .filter(|w| *w <= 8)
            .ok_or_else(|| ParseError::corrupt_xref(offset, "invalid /W entry"))?;
    }
    Ok(out)
}

fn index_ranges(dict: &Dictionary, offset: usize) -> Result<Vec<(u32, u32)>, ParseError> {
    let to_u32 = |value: &PdfValue| value.as_i64().and_then(|n| u32::try_from(n).ok());

    match dict.get(b"Index") {
        Some(PdfValue::Array(items)) => {
            if items.len() % 2 != 0 {
                return Err(ParseError::corrupt_xref(offset, "/Index has odd length"));
            }
            items
                .chunks_exact(2)
                .map(|pair| match (to_u32(&pair[0]), to_u32(&pair[1])) {
                    (Some(start), Some(count)) => Ok((start, count)),
                    _ => Err(ParseError::corrupt_xref(offset, "invalid /Index entry")),
                })
                .collect()
        }
        Some(_) => Err(ParseError::corrupt_xref(offset, "/Index is not an array")),
        None => {
            let size = dict
                .get(b"Size")
                .and_then(to_u32)
                .ok_or_else(|| ParseError::corrupt_xref(offset, "missing /Size"))?;
            Ok(vec![(0, size)])
        }
    }
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
}
