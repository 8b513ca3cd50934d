//! Copying pages between documents.
//!
//! Object ids are only meaningful inside the document that issued them, so
//! copying a page means copying everything reachable from it and rewriting
//! every reference to a freshly allocated destination id.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::debug;

use crate::pdf::document::Document;
use crate::pdf::error::{CloneError, ParseError};
use crate::pdf::object::{ObjectId, PdfValue};

/// A page created in a destination document by [`clone_pages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(ObjectId);

impl PageHandle {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self(id)
    }

    /// The page dictionary's id in the destination.
    pub fn id(&self) -> ObjectId {
        self.0
    }
}

/// Outcome of copying a subgraph: how source ids map to destination ids,
/// and the rewritten objects to insert under those ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Remapping {
    /// Source id to destination id.
    pub mapping: BTreeMap<ObjectId, ObjectId>,
    /// Destination id and value, in discovery order.
    pub entries: Vec<(ObjectId, PdfValue)>,
}

/// Copy everything reachable from `roots`, numbering the copies from
/// `next_id` upward in breadth-first discovery order. Roots are numbered
/// first, in the order given.
///
/// Nothing is written anywhere; the caller decides where the entries go.
pub fn remap_subgraph(
    source: &mut Document,
    roots: &[ObjectId],
    next_id: u32,
) -> Result<Remapping, ParseError> {
    ObjectCopier::new(source, next_id, HashMap::new()).run(roots)
}

/// Copy the pages at `indices` (zero-based, in page-list order) from
/// `source` into `dest` and return handles to the copies, in request order.
///
/// All indices are checked before anything is copied. One mapping is
/// shared by every requested page, so a resource reachable from several
/// of them is copied once. Attributes a page inherits from the source
/// page tree are written onto the copy.
pub fn clone_pages(
    source: &mut Document,
    indices: &[usize],
    dest: &mut Document,
) -> Result<Vec<PageHandle>, CloneError> {
    let page_count = source.page_count();
    if let Some(&index) = indices.iter().find(|&&index| index >= page_count) {
        return Err(CloneError::PageOutOfRange { index, page_count });
    }

    let requested: Vec<ObjectId> = indices.iter().map(|&i| source.pages()[i].id).collect();

    let mut roots = Vec::new();
    let mut overrides = HashMap::new();
    for &index in indices {
        let entry = source.pages()[index].clone();
        if overrides.contains_key(&entry.id) {
            continue;
        }

        let mut page = source.get_dict(entry.id)?.clone();
        page.remove(b"Parent");
        for (key, value) in &entry.inherited {
            if !page.has(key) {
                page.set(key.clone(), value.clone());
            }
        }
        overrides.insert(entry.id, PdfValue::Dictionary(page));
        roots.push(entry.id);
    }

    let remapping = ObjectCopier::new(source, dest.max_id() + 1, overrides).run(&roots)?;
    let copied = remapping.entries.len();

    let mut first_copies = HashMap::new();
    for (id, value) in remapping.entries {
        if roots
            .iter()
            .any(|root| remapping.mapping.get(root) == Some(&id))
        {
            first_copies.insert(id, value.clone());
        }
        dest.insert(id, value);
    }

    // A page requested more than once gets one more page object per extra
    // request; its resources stay shared.
    let mut seen = HashMap::new();
    let mut handles = Vec::with_capacity(requested.len());
    for source_id in requested {
        let first = remapping
            .mapping
            .get(&source_id)
            .copied()
            .ok_or(ParseError::DanglingReference { id: source_id })?;

        let occurrences = seen.entry(source_id).or_insert(0usize);
        *occurrences += 1;
        if *occurrences == 1 {
            handles.push(PageHandle::new(first));
        } else {
            let value = first_copies
                .get(&first)
                .cloned()
                .ok_or(CloneError::UnknownPage { id: first })?;
            handles.push(PageHandle::new(dest.add_object(value)));
        }
    }

    debug!(
        "Cloned {} page(s) with {} object(s) into the destination",
        handles.len(),
        copied
    );

    Ok(handles)
}

/// Breadth-first copier. Each source id is assigned a destination id the
/// first time it is seen and copied exactly once.
struct ObjectCopier<'a> {
    source: &'a mut Document,
    overrides: HashMap<ObjectId, PdfValue>,
    mapping: BTreeMap<ObjectId, ObjectId>,
    queue: VecDeque<ObjectId>,
    next_id: u32,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a mut Document, next_id: u32, overrides: HashMap<ObjectId, PdfValue>) -> Self {
        Self {
            source,
            overrides,
            mapping: BTreeMap::new(),
            queue: VecDeque::new(),
            next_id,
        }
    }

    fn map_id(&mut self, id: ObjectId) -> ObjectId {
        if let Some(mapped) = self.mapping.get(&id) {
            return *mapped;
        }
        let mapped = (self.next_id, 0);
        self.next_id += 1;
        self.mapping.insert(id, mapped);
        self.queue.push_back(id);
        mapped
    }

    fn run(mut self, roots: &[ObjectId]) -> Result<Remapping, ParseError> {
        for root in roots {
            self.map_id(*root);
        }

        let mut entries = Vec::new();
        while let Some(id) = self.queue.pop_front() {
            let mut value = match self.overrides.remove(&id) {
                Some(value) => value,
                None => self.source.get(id)?.clone(),
            };

            match &mut value {
                // The copy's place in a page tree is decided by the destination.
                PdfValue::Dictionary(dict) if dict.has_type(b"Page") => {
                    dict.remove(b"Parent");
                }
                PdfValue::Stream(stream) => {
                    let length = stream.content.len() as i64;
                    stream.dict.set("Length", length);
                }
                _ => {}
            }

            for reference in value.references() {
                self.map_id(reference);
            }

            let mapping = &self.mapping;
            value.remap_references(&mut |old| mapping.get(&old).copied().unwrap_or(old));

            let dest_id = self.mapping.get(&id).copied().unwrap_or(id);
            entries.push((dest_id, value));
        }

        Ok(Remapping {
            mapping: self.mapping,
            entries,
        })
    }
}
