//! Page tree flattening.

use std::collections::HashSet;

use tracing::warn;

use crate::pdf::document::Document;
use crate::pdf::error::ParseError;
use crate::pdf::object::{Dictionary, ObjectId, PdfValue};

/// Attributes a page may inherit from its ancestors.
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A page in flattened order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// The page dictionary's id.
    pub id: ObjectId,
    /// Inheritable attributes found on ancestors and absent from the page
    /// itself, nearest ancestor first to win.
    pub inherited: Dictionary,
}

/// Walk the tree below `root` depth-first, left to right.
///
/// Every kid must be an indirect reference that resolves, and no node may
/// be reached twice.
pub(crate) fn flatten(doc: &mut Document, root: ObjectId) -> Result<Vec<PageEntry>, ParseError> {
    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root, Dictionary::new())];

    while let Some((id, inherited)) = stack.pop() {
        if !visited.insert(id) {
            return Err(ParseError::PageTreeCycle { id });
        }

        let node = match doc.get(id)?.as_dict() {
            Some(dict) => dict.clone(),
            None => return Err(ParseError::invalid_page_tree(id, "node is not a dictionary")),
        };

        if !is_pages_node(&node) {
            let mut own_inherited = Dictionary::new();
            for (key, value) in &inherited {
                if !node.has(key) {
                    own_inherited.set(key.clone(), value.clone());
                }
            }
            pages.push(PageEntry {
                id,
                inherited: own_inherited,
            });
            continue;
        }

        let mut passed_down = inherited;
        for key in INHERITABLE {
            if let Some(value) = node.get(key) {
                passed_down.set(key, value.clone());
            }
        }

        let kids = match node.get(b"Kids") {
            Some(PdfValue::Array(kids)) => kids.clone(),
            Some(PdfValue::Reference(kids_id)) => match doc.get(*kids_id)? {
                PdfValue::Array(kids) => kids.clone(),
                _ => return Err(ParseError::invalid_page_tree(id, "/Kids is not an array")),
            },
            _ => return Err(ParseError::invalid_page_tree(id, "/Kids is not an array")),
        };

        for kid in kids.iter().rev() {
            let kid_id = kid
                .as_reference()
                .ok_or_else(|| ParseError::invalid_page_tree(id, "kid is not an indirect reference"))?;
            stack.push((kid_id, passed_down.clone()));
        }
    }

    if let Some(count) = doc
        .object(root)
        .and_then(PdfValue::as_dict)
        .and_then(|dict| dict.get(b"Count"))
        .and_then(PdfValue::as_i64)
    {
        if usize::try_from(count).ok() != Some(pages.len()) {
            warn!(
                "Page tree root claims /Count {} but {} page(s) were found",
                count,
                pages.len()
            );
        }
    }

    Ok(pages)
}

/// `/Type /Pages`, or no usable `/Type` and a `/Kids` entry.
fn is_pages_node(node: &Dictionary) -> bool {
    match node.type_name() {
        Some(b"Pages") => true,
        Some(b"Page") => false,
        _ => node.has(b"Kids"),
    }
}
