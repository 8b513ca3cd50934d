//! Object syntax: a byte cursor that reads direct values and indirect
//! object headers.
//!
//! The cursor knows nothing about cross-reference data; callers position it
//! at an offset and ask for a value.

use crate::pdf::error::ParseError;
use crate::pdf::filter::hex_value;
use crate::pdf::object::{Dictionary, ObjectId, PdfValue, StringFormat};

/// Arrays and dictionaries nested deeper than this are rejected.
const MAX_DEPTH: usize = 256;

pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

pub(crate) fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

/// Body of an indirect object, up to the point where a stream payload
/// would start.
#[derive(Debug)]
pub(crate) enum ObjectBody {
    /// A plain value, `endobj` already consumed (or tolerated as missing).
    Value(PdfValue),
    /// A stream dictionary; the payload begins at `data_start`.
    Stream {
        dict: Dictionary,
        data_start: usize,
    },
}

/// Byte cursor over a PDF buffer.
pub struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.data.get(self.pos + ahead).copied()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax(self.pos, message)
    }

    /// Skip whitespace and `%` comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while let Some(byte) = self.peek() {
                    if byte == b'\n' || byte == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Whether the input is exhausted (after whitespace).
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.data.len()
    }

    /// Read a run of regular characters without consuming anything else.
    pub fn read_token(&mut self) -> &'a [u8] {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Whether the next token is exactly `keyword`. Consumes nothing.
    pub fn peek_keyword(&mut self, keyword: &[u8]) -> bool {
        let saved = self.pos;
        let found = self.read_token() == keyword;
        self.pos = saved;
        found
    }

    /// Consume `keyword` or fail.
    pub fn expect_keyword(&mut self, keyword: &[u8]) -> Result<(), ParseError> {
        let saved = self.pos;
        if self.read_token() == keyword {
            Ok(())
        } else {
            self.pos = saved;
            Err(self.error(format!(
                "expected '{}'",
                String::from_utf8_lossy(keyword)
            )))
        }
    }

    /// Read an unsigned decimal integer token.
    pub fn read_unsigned(&mut self) -> Option<u64> {
        let saved = self.pos;
        let token = self.read_token();
        let parsed = std::str::from_utf8(token)
            .ok()
            .filter(|text| !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|text| text.parse().ok());
        if parsed.is_none() {
            self.pos = saved;
        }
        parsed
    }

    /// Read an `n g obj` header.
    pub fn read_object_header(&mut self) -> Result<ObjectId, ParseError> {
        let number = self
            .read_unsigned()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.error("expected object number"))?;
        let generation = self
            .read_unsigned()
            .and_then(|g| u16::try_from(g).ok())
            .ok_or_else(|| self.error("expected generation number"))?;
        self.expect_keyword(b"obj")?;
        Ok((number, generation))
    }

    /// Read an indirect object from the cursor: header, value, and either
    /// `endobj` or the start of a stream payload.
    pub(crate) fn read_indirect(&mut self) -> Result<(ObjectId, ObjectBody), ParseError> {
        let id = self.read_object_header()?;
        let value = self.parse_value()?;

        if let PdfValue::Dictionary(dict) = value {
            if self.peek_keyword(b"stream") {
                self.expect_keyword(b"stream")?;
                // The keyword is followed by CRLF or LF; a bare CR is tolerated.
                match (self.peek(), self.peek_at(1)) {
                    (Some(b'\r'), Some(b'\n')) => self.pos += 2,
                    (Some(b'\n'), _) | (Some(b'\r'), _) => self.pos += 1,
                    _ => {}
                }
                return Ok((
                    id,
                    ObjectBody::Stream {
                        dict,
                        data_start: self.pos,
                    },
                ));
            }
            self.finish_object();
            return Ok((id, ObjectBody::Value(PdfValue::Dictionary(dict))));
        }

        self.finish_object();
        Ok((id, ObjectBody::Value(value)))
    }

    /// Consume a trailing `endobj` if present. Producers that forget it are
    /// common enough not to fail on.
    fn finish_object(&mut self) {
        if self.peek_keyword(b"endobj") {
            self.read_token();
        }
    }

    /// Parse one direct value.
    pub fn parse_value(&mut self) -> Result<PdfValue, ParseError> {
        self.parse_value_at_depth(0)
    }

    fn parse_value_at_depth(&mut self, depth: usize) -> Result<PdfValue, ParseError> {
        if depth > MAX_DEPTH {
            return Err(self.error("objects nested too deeply"));
        }

        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of data")),
            Some(b'/') => self.parse_name(),
            Some(b'(') => self.parse_literal_string(),
            Some(b'<') if self.peek_at(1) == Some(b'<') => {
                self.parse_dictionary(depth).map(PdfValue::Dictionary)
            }
            Some(b'<') => self.parse_hex_string(),
            Some(b'[') => self.parse_array(depth),
            Some(b'+' | b'-' | b'.' | b'0'..=b'9') => self.parse_number_or_reference(),
            Some(_) => {
                let start = self.pos;
                match self.read_token() {
                    b"true" => Ok(PdfValue::Boolean(true)),
                    b"false" => Ok(PdfValue::Boolean(false)),
                    b"null" => Ok(PdfValue::Null),
                    b"" => Err(self.error("unexpected delimiter")),
                    other => {
                        let message =
                            format!("unexpected keyword '{}'", String::from_utf8_lossy(other));
                        self.pos = start;
                        Err(self.error(message))
                    }
                }
            }
        }
    }

    fn parse_number_or_reference(&mut self) -> Result<PdfValue, ParseError> {
        let start = self.pos;
        let token = self.read_token();
        let text = std::str::from_utf8(token).map_err(|_| self.error("invalid number"))?;

        if !text.contains('.') {
            let number: i64 = text
                .parse()
                .map_err(|_| ParseError::syntax(start, format!("invalid number '{text}'")))?;

            if let Ok(number) = u32::try_from(number) {
                if let Some(id) = self.try_reference_tail(number) {
                    return Ok(PdfValue::Reference(id));
                }
            }
            return Ok(PdfValue::Integer(number));
        }

        // Tolerate forms like "-.5" and "4." that `f64::from_str` rejects or
        // reads differently.
        let normalized = match text {
            "." | "-." | "+." => "0".to_string(),
            _ if text.ends_with('.') => format!("{text}0"),
            _ => text.to_string(),
        };
        normalized
            .parse::<f64>()
            .map(PdfValue::Real)
            .map_err(|_| ParseError::syntax(start, format!("invalid number '{text}'")))
    }

    /// After an unsigned integer, look ahead for `g R`.
    fn try_reference_tail(&mut self, number: u32) -> Option<ObjectId> {
        let saved = self.pos;
        let generation = self.read_unsigned().and_then(|g| u16::try_from(g).ok());
        if let Some(generation) = generation {
            if self.read_token() == b"R" {
                return Some((number, generation));
            }
        }
        self.pos = saved;
        None
    }

    fn parse_name(&mut self) -> Result<PdfValue, ParseError> {
        self.pos += 1;
        let mut name = Vec::new();
        while let Some(byte) = self.peek() {
            if !is_regular(byte) {
                break;
            }
            if byte == b'#' {
                let high = self.peek_at(1).and_then(hex_value);
                let low = self.peek_at(2).and_then(hex_value);
                if let (Some(high), Some(low)) = (high, low) {
                    name.push((high << 4) | low);
                    self.pos += 3;
                    continue;
                }
            }
            name.push(byte);
            self.pos += 1;
        }
        Ok(PdfValue::Name(name))
    }

    fn parse_literal_string(&mut self) -> Result<PdfValue, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1usize;

        loop {
            let byte = self
                .peek()
                .ok_or_else(|| ParseError::syntax(start, "unterminated string"))?;
            self.pos += 1;

            match byte {
                b'(' => {
                    depth += 1;
                    out.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(byte);
                }
                b'\\' => self.read_escape(&mut out),
                b'\r' => {
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    out.push(b'\n');
                }
                _ => out.push(byte),
            }
        }

        Ok(PdfValue::String(out, StringFormat::Literal))
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) {
        let Some(byte) = self.peek() else {
            return;
        };
        self.pos += 1;

        match byte {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(b'\x08'),
            b'f' => out.push(b'\x0c'),
            b'0'..=b'7' => {
                let mut value = u32::from(byte - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(digit @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(digit - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            // Line continuation.
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            other => out.push(other),
        }
    }

    fn parse_hex_string(&mut self) -> Result<PdfValue, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let byte = self
                .peek()
                .ok_or_else(|| ParseError::syntax(start, "unterminated hex string"))?;
            self.pos += 1;

            if byte == b'>' {
                break;
            }
            if is_whitespace(byte) {
                continue;
            }
            let nibble = hex_value(byte)
                .ok_or_else(|| ParseError::syntax(self.pos - 1, "invalid hex digit"))?;
            match high.take() {
                Some(h) => out.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }

        if let Some(h) = high {
            out.push(h << 4);
        }

        Ok(PdfValue::String(out, StringFormat::Hexadecimal))
    }

    fn parse_array(&mut self, depth: usize) -> Result<PdfValue, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::syntax(start, "unterminated array")),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => items.push(self.parse_value_at_depth(depth + 1)?),
            }
        }

        Ok(PdfValue::Array(items))
    }

    fn parse_dictionary(&mut self, depth: usize) -> Result<Dictionary, ParseError> {
        let start = self.pos;
        self.pos += 2;
        let mut dict = Dictionary::new();

        loop {
            self.skip_whitespace();
            match (self.peek(), self.peek_at(1)) {
                (None, _) => return Err(ParseError::syntax(start, "unterminated dictionary")),
                (Some(b'>'), Some(b'>')) => {
                    self.pos += 2;
                    break;
                }
                (Some(b'/'), _) => {
                    let PdfValue::Name(key) = self.parse_name()? else {
                        return Err(self.error("expected dictionary key"));
                    };
                    let value = self.parse_value_at_depth(depth + 1)?;
                    dict.set(key, value);
                }
                _ => return Err(self.error("expected name as dictionary key")),
            }
        }

        Ok(dict)
    }
}

/// Extract a stream payload starting at `start`.
///
/// A declared length is trusted only when `endstream` follows it;
/// otherwise the payload runs up to the next `endstream`, minus the end of
/// line that precedes the keyword. Returns the payload and the offset just
/// past `endstream`.
pub(crate) fn stream_content(
    data: &[u8],
    start: usize,
    length: Option<usize>,
) -> Result<(Vec<u8>, usize), ParseError> {
    if let Some(length) = length {
        if let Some(end) = start.checked_add(length).filter(|end| *end <= data.len()) {
            let mut cursor = Parser::at(data, end);
            if cursor.peek_keyword(b"endstream") {
                cursor.expect_keyword(b"endstream")?;
                return Ok((data[start..end].to_vec(), cursor.pos()));
            }
        }
    }

    let keyword = b"endstream";
    let found = data
        .get(start..)
        .and_then(|rest| rest.windows(keyword.len()).position(|w| w == keyword))
        .ok_or_else(|| ParseError::syntax(start, "stream without endstream"))?;

    let mut end = start + found;
    if end > start && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && data[end - 1] == b'\r' {
        end -= 1;
    }

    Ok((data[start..end].to_vec(), start + found + keyword.len()))
}
