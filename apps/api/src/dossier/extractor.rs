//! PDF Extractor: turns uploaded bytes into page text plus an optional candidate photo.
//!
//! Text comes from `pdf-extract` page by page; when it fails (or finds nothing)
//! the same pages are read with `lopdf` instead. Images are walked in encounter
//! order and the first one that is a real, decodable photo is kept.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dossier::models::Photo;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Images narrower or shorter than this are logos and icons, not portraits.
pub const PHOTO_MIN_SIZE: u32 = 150;

/// Guards the `Parent` walk against cyclic page trees.
const MAX_PAGE_TREE_DEPTH: usize = 32;

static RE_CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f]").unwrap());
static RE_INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("The document contains no extractable text")]
    EmptyDocument,
}

/// Text and photo pulled out of one uploaded PDF. The PDF bytes are not retained.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub page_count: usize,
    /// Cleaned text of each page, in document order.
    pub pages: Vec<String>,
    pub photo: Option<Photo>,
}

impl RawDocument {
    /// All pages concatenated in document order.
    pub fn text(&self) -> String {
        self.pages.join("\n").trim().to_string()
    }
}

/// Extracts page text and the candidate photo from raw PDF bytes.
///
/// Fails with `UnsupportedFormat` when the bytes are not a loadable PDF and with
/// `EmptyDocument` when no page carries a single non-whitespace character.
pub fn extract_document(bytes: &[u8]) -> Result<RawDocument, ExtractionError> {
    let doc = load_pdf(bytes)?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    let pages: Vec<String> = extract_page_texts(bytes, &doc)?
        .iter()
        .map(|page| clean_text(page))
        .collect();

    if !pages.iter().any(|page| has_visible_text(page)) {
        return Err(ExtractionError::EmptyDocument);
    }

    let photo = find_photo(&doc, &page_ids);
    debug!(
        "Extracted {} pages, {} chars, photo: {}",
        page_ids.len(),
        pages.iter().map(|p| p.chars().count()).sum::<usize>(),
        photo.is_some()
    );

    Ok(RawDocument {
        page_count: page_ids.len(),
        pages,
        photo,
    })
}

/// Only the candidate photo; documents without any text are accepted here.
pub fn extract_photo(bytes: &[u8]) -> Result<Option<Photo>, ExtractionError> {
    let doc = load_pdf(bytes)?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    Ok(find_photo(&doc, &page_ids))
}

fn load_pdf(bytes: &[u8]) -> Result<Document, ExtractionError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::UnsupportedFormat(
            "input does not start with a %PDF header".to_string(),
        ));
    }
    Document::load_mem(bytes)
        .map_err(|e| ExtractionError::UnsupportedFormat(format!("failed to parse PDF: {e}")))
}

/// Runs `pdf-extract`, falling back to `lopdf` when it errors or returns no text.
fn extract_page_texts(bytes: &[u8], doc: &Document) -> Result<Vec<String>, ExtractionError> {
    with_fallback(doc, || {
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())
    })
}

/// Runs the primary text extractor and falls back to lopdf when it fails,
/// panics, or finds no visible text. pdf-extract panics on some font encodings.
fn with_fallback<F>(doc: &Document, primary: F) -> Result<Vec<String>, ExtractionError>
where
    F: FnOnce() -> Result<Vec<String>, String> + std::panic::UnwindSafe,
{
    let outcome = std::panic::catch_unwind(primary)
        .unwrap_or_else(|_| Err("pdf-extract panicked".to_string()));
    match outcome {
        Ok(pages) if pages.iter().any(|p| has_visible_text(p)) => Ok(pages),
        Ok(pages) => {
            debug!("pdf-extract found no text, trying lopdf");
            Ok(extract_with_lopdf(doc).unwrap_or(pages))
        }
        Err(e) => {
            warn!("pdf-extract failed ({e}), falling back to lopdf text extraction");
            extract_with_lopdf(doc).ok_or_else(|| {
                ExtractionError::UnsupportedFormat(format!("text extraction failed: {e}"))
            })
        }
    }
}

fn extract_with_lopdf(doc: &Document) -> Option<Vec<String>> {
    let mut pages = Vec::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                warn!("lopdf could not read page {page_num}: {e}");
                return None;
            }
        }
    }
    Some(pages)
}

fn has_visible_text(text: &str) -> bool {
    text.chars().any(|c| !c.is_whitespace())
}

/// Removes control characters and collapses the whitespace runs PDF text layers produce.
pub fn clean_text(text: &str) -> String {
    let text = RE_CONTROL_CHARS.replace_all(text, "");
    let text = RE_INLINE_SPACE.replace_all(&text, " ");
    let text = RE_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Photo lookup
// ────────────────────────────────────────────────────────────────────────────

fn find_photo(doc: &Document, page_ids: &[ObjectId]) -> Option<Photo> {
    page_ids
        .iter()
        .flat_map(|page_id| page_images(doc, *page_id))
        .find_map(as_photo)
}

/// Image XObjects of one page in resource-dictionary order.
fn page_images(doc: &Document, page_id: ObjectId) -> Vec<&Stream> {
    let Some(resources) = page_resources(doc, page_id) else {
        return vec![];
    };
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
    else {
        return vec![];
    };

    xobjects
        .iter()
        .filter_map(|(_, obj)| {
            let (_, target) = doc.dereference(obj).ok()?;
            let stream = target.as_stream().ok()?;
            let subtype = stream.dict.get(b"Subtype").and_then(|s| s.as_name()).ok()?;
            (subtype == b"Image").then_some(stream)
        })
        .collect()
}

/// Page resources, inherited from the nearest ancestor in the page tree when absent.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    doc.dereference(obj)
        .ok()
        .and_then(|(_, target)| target.as_dict().ok())
}

/// Accepts single-filter JPEG and JPEG 2000 streams of portrait size.
fn as_photo(stream: &Stream) -> Option<Photo> {
    let filter = match stream.dict.get(b"Filter").ok()? {
        Object::Name(name) => name.as_slice(),
        Object::Array(filters) if filters.len() == 1 => filters[0].as_name().ok()?,
        _ => return None,
    };
    let mime_type = match filter {
        b"DCTDecode" => "image/jpeg",
        b"JPXDecode" => "image/jp2",
        _ => return None,
    };

    let width = dimension(stream, b"Width")?;
    let height = dimension(stream, b"Height")?;
    if width < PHOTO_MIN_SIZE || height < PHOTO_MIN_SIZE {
        debug!("Skipping {width}x{height} image: below photo size");
        return None;
    }

    Some(Photo {
        mime_type: mime_type.to_string(),
        width,
        height,
        data: stream.content.clone(),
    })
}

fn dimension(stream: &Stream, key: &[u8]) -> Option<u32> {
    let value = stream.dict.get(key).and_then(|v| v.as_i64()).ok()?;
    u32::try_from(value).ok()
}
