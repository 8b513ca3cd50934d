//! Documents: the parsed view of a donor file and the destination being
//! assembled.
//!
//! A parsed document keeps its source bytes and cross-reference data and
//! materializes indirect objects on first access into a per-document memo
//! table. A built document starts empty and only ever holds objects that
//! were inserted into it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::pdf::clone::PageHandle;
use crate::pdf::error::{CloneError, ParseError};
use crate::pdf::object::{Dictionary, ObjectId, PdfValue, Stream};
use crate::pdf::page_tree::{self, PageEntry};
use crate::pdf::parser::{ObjectBody, Parser, stream_content};
use crate::pdf::xref::{XrefEntry, XrefTable, read_xref};

/// How far into the buffer the `%PDF-` header may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Version written for documents that were not parsed from bytes.
pub const DEFAULT_VERSION: &str = "1.7";

#[derive(Debug)]
struct Source {
    data: Arc<[u8]>,
    xref: XrefTable,
}

/// A PDF document.
#[derive(Debug)]
pub struct Document {
    version: String,
    objects: BTreeMap<ObjectId, PdfValue>,
    trailer: Dictionary,
    source: Option<Source>,
    pages: Vec<PageEntry>,
    pages_root: Option<ObjectId>,
    max_id: u32,
    loading: HashSet<ObjectId>,
    decoded_containers: HashSet<u32>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document: a catalog (`1 0 R`) pointing at an empty page
    /// tree root (`2 0 R`).
    pub fn new() -> Self {
        let catalog: ObjectId = (1, 0);
        let pages_root: ObjectId = (2, 0);

        let mut objects = BTreeMap::new();
        objects.insert(
            catalog,
            PdfValue::Dictionary(Dictionary::from_iter([
                ("Type", PdfValue::name("Catalog")),
                ("Pages", PdfValue::Reference(pages_root)),
            ])),
        );
        objects.insert(
            pages_root,
            PdfValue::Dictionary(Dictionary::from_iter([
                ("Type", PdfValue::name("Pages")),
                ("Kids", PdfValue::Array(Vec::new())),
                ("Count", PdfValue::Integer(0)),
            ])),
        );

        Self {
            version: DEFAULT_VERSION.to_string(),
            objects,
            trailer: Dictionary::from_iter([("Root", PdfValue::Reference(catalog))]),
            source: None,
            pages: Vec::new(),
            pages_root: Some(pages_root),
            max_id: 2,
            loading: HashSet::new(),
            decoded_containers: HashSet::new(),
        }
    }

    /// Parse a document from its bytes.
    ///
    /// Cross-reference data is read eagerly and the page tree is flattened
    /// up front; every other object is parsed on first access.
    pub fn load(bytes: impl Into<Vec<u8>>) -> Result<Self, ParseError> {
        let data: Arc<[u8]> = Arc::from(bytes.into());
        let version = read_header(&data)?;
        let xref = read_xref(&data)?;
        let trailer = xref.trailer().clone();

        if trailer.has(b"Encrypt") {
            return Err(ParseError::Encrypted);
        }

        let catalog = trailer
            .get(b"Root")
            .and_then(PdfValue::as_reference)
            .ok_or(ParseError::MissingCatalog)?;

        let max_id = xref.max_number();
        let entries = xref.len();
        let mut doc = Self {
            version,
            objects: BTreeMap::new(),
            trailer,
            source: Some(Source { data, xref }),
            pages: Vec::new(),
            pages_root: None,
            max_id,
            loading: HashSet::new(),
            decoded_containers: HashSet::new(),
        };

        let pages_root = match doc.get(catalog) {
            Ok(PdfValue::Dictionary(dict)) => dict.get(b"Pages").and_then(PdfValue::as_reference),
            Ok(_) | Err(ParseError::DanglingReference { .. }) => {
                return Err(ParseError::MissingCatalog);
            }
            Err(err) => return Err(err),
        }
        .ok_or_else(|| ParseError::invalid_page_tree(catalog, "catalog has no /Pages reference"))?;

        let pages = page_tree::flatten(&mut doc, pages_root)?;
        doc.pages = pages;
        doc.pages_root = Some(pages_root);

        debug!(
            "Parsed PDF {} with {} page(s) and {} cross-reference entries",
            doc.version,
            doc.pages.len(),
            entries
        );

        Ok(doc)
    }

    /// Header version, e.g. `1.7`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Mutable trailer, for `/Info` and friends.
    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// The catalog's id, from the trailer's `/Root`.
    pub fn catalog_id(&self) -> Option<ObjectId> {
        self.trailer.get(b"Root").and_then(PdfValue::as_reference)
    }

    /// Root of the page tree.
    pub fn pages_root(&self) -> Option<ObjectId> {
        self.pages_root
    }

    /// Number of pages in the flattened page list.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.pages.iter().map(|page| page.id).collect()
    }

    /// Flattened page list with the attributes each page inherits.
    pub fn pages(&self) -> &[PageEntry] {
        &self.pages
    }

    /// Highest object number in use.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// Number of objects materialized so far.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// A materialized object. Never triggers parsing.
    pub fn object(&self, id: ObjectId) -> Option<&PdfValue> {
        self.objects.get(&id)
    }

    /// Mutable access to a materialized object.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut PdfValue> {
        self.objects.get_mut(&id)
    }

    /// Materialized objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &PdfValue)> {
        self.objects.iter().map(|(id, value)| (*id, value))
    }

    /// Resolve an object, parsing it on first access.
    pub fn get(&mut self, id: ObjectId) -> Result<&PdfValue, ParseError> {
        if !self.objects.contains_key(&id) {
            self.materialize(id)?;
        }
        self.objects
            .get(&id)
            .ok_or(ParseError::DanglingReference { id })
    }

    /// Resolve an object that must be a dictionary (or a stream).
    pub fn get_dict(&mut self, id: ObjectId) -> Result<&Dictionary, ParseError> {
        self.get(id)?
            .as_dict()
            .ok_or_else(|| ParseError::corrupt_object(id, "expected a dictionary"))
    }

    /// Parse every object listed in the cross-reference data.
    pub fn load_all(&mut self) -> Result<(), ParseError> {
        let ids: Vec<ObjectId> = match &self.source {
            Some(source) => source
                .xref
                .iter()
                .filter_map(|(number, entry)| match entry {
                    XrefEntry::Normal { generation, .. } => Some((number, generation)),
                    XrefEntry::Compressed { .. } => Some((number, 0)),
                    XrefEntry::Free => None,
                })
                .collect(),
            None => return Ok(()),
        };

        for id in ids {
            self.get(id)?;
        }
        Ok(())
    }

    /// Reserve a fresh object id.
    pub fn allocate_id(&mut self) -> ObjectId {
        self.max_id += 1;
        (self.max_id, 0)
    }

    /// Store an object under `id`, replacing any previous value.
    pub fn insert(&mut self, id: ObjectId, value: impl Into<PdfValue>) {
        self.max_id = self.max_id.max(id.0);
        self.objects.insert(id, value.into());
    }

    /// Store an object under a fresh id.
    pub fn add_object(&mut self, value: impl Into<PdfValue>) -> ObjectId {
        let id = self.allocate_id();
        self.objects.insert(id, value.into());
        id
    }

    /// Append a page to the end of the root page list and point its
    /// `/Parent` at the root.
    pub fn append_page(&mut self, page: PageHandle) -> Result<(), CloneError> {
        let id = page.id();
        let root = self
            .pages_root
            .ok_or_else(|| ParseError::invalid_page_tree(id, "document has no page tree"))?;
        self.get(root)?;

        let page_dict = self
            .objects
            .get_mut(&id)
            .and_then(PdfValue::as_dict_mut)
            .ok_or(CloneError::UnknownPage { id })?;
        page_dict.set("Parent", PdfValue::Reference(root));

        let root_dict = self
            .objects
            .get_mut(&root)
            .and_then(PdfValue::as_dict_mut)
            .ok_or_else(|| ParseError::corrupt_object(root, "page tree root is not a dictionary"))?;

        match root_dict.get_mut(b"Kids") {
            Some(PdfValue::Array(kids)) => kids.push(PdfValue::Reference(id)),
            _ => root_dict.set("Kids", vec![PdfValue::Reference(id)]),
        }
        let count = root_dict.get(b"Count").and_then(PdfValue::as_i64).unwrap_or(0);
        root_dict.set("Count", count + 1);

        self.pages.push(PageEntry {
            id,
            inherited: Dictionary::new(),
        });
        Ok(())
    }

    fn materialize(&mut self, id: ObjectId) -> Result<(), ParseError> {
        let Some(source) = &self.source else {
            return Err(ParseError::DanglingReference { id });
        };
        let data = Arc::clone(&source.data);

        match source.xref.get(id.0) {
            Some(XrefEntry::Normal { offset, generation }) if generation == id.1 => {
                if !self.loading.insert(id) {
                    return Err(ParseError::corrupt_object(id, "object depends on itself"));
                }
                let result = self.read_object_at(&data, id, offset);
                self.loading.remove(&id);
                let value = result?;
                self.objects.insert(id, value);
                Ok(())
            }
            Some(XrefEntry::Compressed { container, .. }) if id.1 == 0 => {
                self.load_object_stream(container)?;
                if self.objects.contains_key(&id) {
                    Ok(())
                } else {
                    Err(ParseError::DanglingReference { id })
                }
            }
            _ => Err(ParseError::DanglingReference { id }),
        }
    }

    fn read_object_at(
        &mut self,
        data: &[u8],
        id: ObjectId,
        offset: usize,
    ) -> Result<PdfValue, ParseError> {
        let (found, body) = Parser::at(data, offset).read_indirect()?;
        if found != id {
            return Err(ParseError::corrupt_object(
                id,
                format!(
                    "cross-reference points at object {} {} R instead",
                    found.0, found.1
                ),
            ));
        }

        match body {
            ObjectBody::Value(value) => Ok(value),
            ObjectBody::Stream { dict, data_start } => {
                let length = match dict.get(b"Length") {
                    Some(PdfValue::Integer(length)) => usize::try_from(*length).ok(),
                    Some(PdfValue::Reference(length_id)) if *length_id != id => self
                        .get(*length_id)
                        .ok()
                        .and_then(PdfValue::as_i64)
                        .and_then(|length| usize::try_from(length).ok()),
                    _ => None,
                };
                let (content, _) = stream_content(data, data_start, length)?;
                Ok(PdfValue::Stream(Stream { dict, content }))
            }
        }
    }

    /// Decode an object stream once and memoise every member the
    /// cross-reference data still attributes to it.
    fn load_object_stream(&mut self, container: u32) -> Result<(), ParseError> {
        if !self.decoded_containers.insert(container) {
            return Ok(());
        }

        let container_id = (container, 0);
        let (decoded, count, first) = match self.get(container_id)? {
            PdfValue::Stream(stream) if stream.dict.has_type(b"ObjStm") => {
                let decoded = stream.decoded().map_err(|source| ParseError::Decode {
                    id: container_id,
                    source,
                })?;
                let count = stream.dict.get(b"N").and_then(PdfValue::as_i64);
                let first = stream.dict.get(b"First").and_then(PdfValue::as_i64);
                (decoded, count, first)
            }
            _ => {
                return Err(ParseError::corrupt_object(
                    container_id,
                    "expected an object stream",
                ));
            }
        };

        let (Some(count), Some(first)) = (
            count.and_then(|n| usize::try_from(n).ok()),
            first.and_then(|f| usize::try_from(f).ok()),
        ) else {
            return Err(ParseError::corrupt_object(
                container_id,
                "object stream lacks /N or /First",
            ));
        };

        let mut header = Parser::new(&decoded);
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let number = header.read_unsigned().and_then(|n| u32::try_from(n).ok());
            let offset = header.read_unsigned().and_then(|o| usize::try_from(o).ok());
            match (number, offset) {
                (Some(number), Some(offset)) => members.push((number, offset)),
                _ => {
                    return Err(ParseError::corrupt_object(
                        container_id,
                        "malformed object stream header",
                    ));
                }
            }
        }

        let Some(source) = &self.source else {
            return Ok(());
        };
        let owned: Vec<(usize, u32, usize)> = members
            .into_iter()
            .enumerate()
            .filter(|(index, (number, _))| {
                source.xref.get(*number)
                    == Some(XrefEntry::Compressed {
                        container,
                        index: *index,
                    })
            })
            .map(|(index, (number, offset))| (index, number, offset))
            .collect();

        for (_, number, offset) in owned {
            let id = (number, 0);
            if self.objects.contains_key(&id) {
                continue;
            }
            let value = Parser::at(&decoded, first.saturating_add(offset))
                .parse_value()
                .map_err(|err| ParseError::corrupt_object(id, err.to_string()))?;
            self.objects.insert(id, value);
        }

        Ok(())
    }
}

/// Find `%PDF-x.y` near the start and return the version.
fn read_header(data: &[u8]) -> Result<String, ParseError> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let marker = b"%PDF-";
    let at = window
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or(ParseError::MissingHeader)?;

    let version: String = data[at + marker.len()..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|b| *b as char)
        .collect();

    if version.is_empty() {
        return Err(ParseError::MissingHeader);
    }
    Ok(version)
}
