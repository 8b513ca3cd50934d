//! In-memory PDF object model.
//!
//! Values form a closed tagged union ([`PdfValue`]). Indirect objects are
//! stored by [`ObjectId`] in a document's object table and referenced from
//! other values through [`PdfValue::Reference`], so cyclic graphs (a page
//! pointing back at its parent) never turn into cyclic ownership.

use indexmap::IndexMap;

use crate::pdf::error::DecodeError;
use crate::pdf::filter;

/// Identifier of an indirect object: object number and generation.
///
/// Only meaningful inside the document that issued it.
pub type ObjectId = (u32, u16);

/// How a string was (or should be) written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `(...)` with backslash escapes.
    #[default]
    Literal,
    /// `<...>` hexadecimal digits.
    Hexadecimal,
}

/// A PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    /// `null`.
    Null,
    /// `true` / `false`.
    Boolean(bool),
    /// Integer number.
    Integer(i64),
    /// Real number.
    Real(f64),
    /// Byte string together with its written form.
    String(Vec<u8>, StringFormat),
    /// Name, without the leading slash and with `#xx` escapes decoded.
    Name(Vec<u8>),
    /// Ordered sequence of values.
    Array(Vec<PdfValue>),
    /// Dictionary with insertion order preserved.
    Dictionary(Dictionary),
    /// Stream dictionary plus raw payload.
    Stream(Stream),
    /// Indirect reference `n g R`.
    Reference(ObjectId),
}

impl PdfValue {
    /// Build a name value.
    pub fn name(name: impl Into<Vec<u8>>) -> Self {
        Self::Name(name.into())
    }

    /// Build a literal string value.
    pub fn string_literal(text: impl Into<Vec<u8>>) -> Self {
        Self::String(text.into(), StringFormat::Literal)
    }

    /// Returns the referenced id if this value is a reference.
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the integer if this value is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the numeric value of an integer or real.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Real(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the name bytes if this value is a name.
    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the items if this value is an array.
    pub fn as_array(&self) -> Option<&[PdfValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the dictionary of a dictionary value, or of a stream.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            Self::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Mutable variant of [`as_dict`](Self::as_dict).
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            Self::Stream(stream) => Some(&mut stream.dict),
            _ => None,
        }
    }

    /// Returns the stream if this value is a stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Value of `/Type` for dictionaries and streams.
    pub fn type_name(&self) -> Option<&[u8]> {
        self.as_dict().and_then(Dictionary::type_name)
    }

    /// Every reference embedded in this value, in encounter order.
    ///
    /// References are reported, never followed. A stream's `/Length` entry
    /// is not reported: writers always emit the length as a direct integer.
    pub fn references(&self) -> Vec<ObjectId> {
        let mut found = Vec::new();
        let mut stack = vec![self];

        while let Some(value) = stack.pop() {
            match value {
                Self::Reference(id) => found.push(*id),
                Self::Array(items) => stack.extend(items.iter().rev()),
                Self::Dictionary(dict) => stack.extend(dict.values().rev()),
                Self::Stream(stream) => stack.extend(
                    stream
                        .dict
                        .iter()
                        .filter(|(key, _)| key.as_slice() != b"Length")
                        .map(|(_, value)| value)
                        .rev(),
                ),
                Self::Null
                | Self::Boolean(_)
                | Self::Integer(_)
                | Self::Real(_)
                | Self::String(..)
                | Self::Name(_) => {}
            }
        }

        found
    }

    /// Rewrite every embedded reference through `map`.
    pub fn remap_references<F>(&mut self, map: &mut F)
    where
        F: FnMut(ObjectId) -> ObjectId,
    {
        match self {
            Self::Reference(id) => *id = map(*id),
            Self::Array(items) => {
                for item in items {
                    item.remap_references(map);
                }
            }
            Self::Dictionary(dict) => dict.remap_references(map),
            Self::Stream(stream) => stream.dict.remap_references(map),
            Self::Null
            | Self::Boolean(_)
            | Self::Integer(_)
            | Self::Real(_)
            | Self::String(..)
            | Self::Name(_) => {}
        }
    }
}

impl From<bool> for PdfValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PdfValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for PdfValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for PdfValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for PdfValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for PdfValue {
    fn from(value: &str) -> Self {
        Self::Name(value.as_bytes().to_vec())
    }
}

impl From<ObjectId> for PdfValue {
    fn from(value: ObjectId) -> Self {
        Self::Reference(value)
    }
}

impl From<Vec<PdfValue>> for PdfValue {
    fn from(value: Vec<PdfValue>) -> Self {
        Self::Array(value)
    }
}

impl From<Dictionary> for PdfValue {
    fn from(value: Dictionary) -> Self {
        Self::Dictionary(value)
    }
}

impl From<Stream> for PdfValue {
    fn from(value: Stream) -> Self {
        Self::Stream(value)
    }
}

/// Dictionary keyed by decoded name bytes, preserving insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Vec<u8>, PdfValue>);

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Look up a key.
    pub fn get(&self, key: &[u8]) -> Option<&PdfValue> {
        self.0.get(key)
    }

    /// Look up a key mutably.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut PdfValue> {
        self.0.get_mut(key)
    }

    /// Insert or replace a key. A replaced key keeps its position.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<PdfValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &[u8]) -> Option<PdfValue> {
        self.0.shift_remove(key)
    }

    /// Whether the key is present.
    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, Vec<u8>, PdfValue> {
        self.0.iter()
    }

    /// Values in insertion order.
    pub fn values(&self) -> indexmap::map::Values<'_, Vec<u8>, PdfValue> {
        self.0.values()
    }

    /// Value of `/Type`, if it is a name.
    pub fn type_name(&self) -> Option<&[u8]> {
        self.get(b"Type").and_then(PdfValue::as_name)
    }

    /// Whether `/Type` equals `name`.
    pub fn has_type(&self, name: &[u8]) -> bool {
        self.type_name() == Some(name)
    }

    fn remap_references<F>(&mut self, map: &mut F)
    where
        F: FnMut(ObjectId) -> ObjectId,
    {
        for value in self.0.values_mut() {
            value.remap_references(map);
        }
    }
}

impl<K: Into<Vec<u8>>, V: Into<PdfValue>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Vec<u8>, &'a PdfValue);
    type IntoIter = indexmap::map::Iter<'a, Vec<u8>, PdfValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A stream: dictionary plus raw payload as stored in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary (`/Length`, `/Filter`, ...).
    pub dict: Dictionary,
    /// Payload bytes, still encoded with the dictionary's filters.
    pub content: Vec<u8>,
}

impl Stream {
    /// Create a stream and set its `/Length`.
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Self {
        dict.set("Length", content.len() as i64);
        Self { dict, content }
    }

    /// Names of the filters applied to the payload, outermost first.
    pub fn filters(&self) -> Vec<Vec<u8>> {
        match self.dict.get(b"Filter") {
            Some(PdfValue::Name(name)) => vec![name.clone()],
            Some(PdfValue::Array(items)) => items
                .iter()
                .filter_map(PdfValue::as_name)
                .map(<[u8]>::to_vec)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Payload with every filter undone.
    pub fn decoded(&self) -> Result<Vec<u8>, DecodeError> {
        filter::decode_stream(self)
    }
}
