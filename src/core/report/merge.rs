//! Page-level PDF concatenation with `lopdf`.
//!
//! Every input keeps its own objects; only the page tree and catalog are rebuilt.
//! Attributes a page inherits from its original page tree (media box, resources,
//! crop box, rotation) are copied onto the page before the old tree is dropped.

use crate::errors::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"Resources", b"CropBox", b"Rotate"];
const DROPPED_TYPES: [&[u8]; 6] = [b"Catalog", b"Pages", b"Page", b"Outlines", b"Outline", b"XRef"];

/// A merged document and the number of pages it holds.
#[derive(Debug, Clone)]
pub struct MergedPdf {
    /// Serialized PDF
    pub bytes: Vec<u8>,
    /// Page count of the result
    pub page_count: usize,
}

/// Parses a PDF, rejecting documents without pages.
pub fn parse_pdf(bytes: &[u8]) -> Result<Document> {
    let document = Document::load_mem(bytes).map_err(Error::pdf)?;
    if document.get_pages().is_empty() {
        return Err(Error::Pdf {
            message: "document has no pages".to_string(),
        });
    }
    Ok(document)
}

fn object_type(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

fn parent_of(dict: &Dictionary) -> Option<ObjectId> {
    dict.get(b"Parent").and_then(Object::as_reference).ok()
}

/// Looks `key` up through the page's ancestors.
fn inherited(document: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut next = parent_of(page);
    let mut depth = 0;
    while let Some(id) = next {
        if depth > 64 {
            break;
        }
        let node = document.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        next = parent_of(node);
        depth += 1;
    }
    None
}

/// Concatenates the pages of `documents` in order.
pub fn merge_documents(documents: Vec<Document>) -> Result<MergedPdf> {
    if documents.is_empty() {
        return Err(Error::Pdf {
            message: "nothing to merge".to_string(),
        });
    }

    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut merged = Document::with_version("1.5");

    for mut document in documents {
        document.renumber_objects_with(next_id);
        next_id = document.max_id + 1;

        for page_id in document.get_pages().into_values() {
            let mut page = document
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(Error::pdf)?
                .clone();
            for key in INHERITABLE {
                if page.has(key) {
                    continue;
                }
                if let Some(value) = inherited(&document, &page, key) {
                    page.set(key, value);
                }
            }
            pages.push((page_id, page));
        }

        for (id, object) in document.objects {
            let dropped = object_type(&object)
                .is_some_and(|kind| DROPPED_TYPES.iter().any(|dropped| *dropped == kind));
            if !dropped {
                merged.objects.insert(id, object);
            }
        }
    }

    let pages_id = (next_id, 0);
    let catalog_id = (next_id + 1, 0);
    let page_count = pages.len();

    let mut kids = Vec::with_capacity(page_count);
    for (id, mut page) in pages {
        page.set("Parent", Object::Reference(pages_id));
        merged.objects.insert(id, Object::Dictionary(page));
        kids.push(Object::Reference(id));
    }

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set(
        "Count",
        Object::Integer(i64::try_from(page_count).unwrap_or(i64::MAX)),
    );
    tree.set("Kids", Object::Array(kids));
    merged.objects.insert(pages_id, Object::Dictionary(tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = catalog_id.0;
    merged.renumber_objects();
    merged.compress();

    let mut bytes = Vec::new();
    merged.save_to(&mut bytes).map_err(Error::pdf)?;
    debug!("Merged {page_count} pages into {} bytes", bytes.len());
    Ok(MergedPdf { bytes, page_count })
}
