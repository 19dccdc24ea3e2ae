//! Text and metadata extraction for book sources (PDF, EPUB).
//!
//! Extraction is ingestion-layer: the corpus reader supplies a path and this
//! module returns plain UTF-8 text plus whatever metadata the file carries.
//! Errors never panic; the caller logs and skips the book.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_ZIP_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported book format: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("EPUB extraction failed: {0}")]
    Epub(String),
}

/// Extracted book content plus the metadata the file itself provides.
#[derive(Debug, Clone)]
pub struct ExtractedBook {
    pub text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    /// PDF only; EPUBs have no page concept before layout.
    pub page_count: Option<u32>,
}

/// Extract text and metadata from a book file, dispatching on extension.
pub fn extract_book(path: &Path) -> Result<ExtractedBook, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => extract_pdf(path),
        "epub" => extract_epub(path),
        other => Err(ExtractError::UnsupportedFormat(other.to_string())),
    }
}

// ============ PDF ============

fn extract_pdf(path: &Path) -> Result<ExtractedBook, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let text =
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let (title, author, page_count) = pdf_info(&bytes);
    Ok(ExtractedBook {
        text,
        title,
        author,
        page_count,
    })
}

/// Best-effort read of the PDF Info dictionary and page count. Metadata is
/// optional everywhere downstream, so parse failures degrade to `None`.
fn pdf_info(bytes: &[u8]) -> (Option<String>, Option<String>, Option<u32>) {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(_) => return (None, None, None),
    };

    let page_count = Some(doc.get_pages().len() as u32);

    let mut title = None;
    let mut author = None;
    if let Ok(info) = doc.trailer.get(b"Info") {
        let dict = match info {
            lopdf::Object::Reference(id) => {
                doc.get_object(*id).ok().and_then(|obj| obj.as_dict().ok())
            }
            lopdf::Object::Dictionary(dict) => Some(dict),
            _ => None,
        };
        if let Some(dict) = dict {
            title = dict.get(b"Title").ok().and_then(pdf_text_string);
            author = dict.get(b"Author").ok().and_then(pdf_text_string);
        }
    }

    (title, author, page_count)
}

/// Decode a PDF text string: UTF-16BE when BOM-prefixed, latin-ish bytes
/// otherwise.
fn pdf_text_string(obj: &lopdf::Object) -> Option<String> {
    let lopdf::Object::String(bytes, _) = obj else {
        return None;
    };
    let decoded = if bytes.starts_with(&[0xFE, 0xFF]) {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============ EPUB ============

/// An EPUB is a ZIP of XHTML documents plus an OPF package manifest.
/// `META-INF/container.xml` points at the OPF; the OPF carries Dublin Core
/// metadata and the spine (reading order).
fn extract_epub(path: &Path) -> Result<ExtractedBook, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Epub(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|e| ExtractError::Epub(e.to_string()))?;

    let container = read_zip_entry_bounded(&mut archive, "META-INF/container.xml")?;
    let opf_path = parse_container_rootfile(&container)?;
    let opf = read_zip_entry_bounded(&mut archive, &opf_path)?;
    let package = parse_opf(&opf)?;

    let opf_dir = opf_path
        .rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default();

    let mut entry_names: Vec<String> = package
        .spine_hrefs
        .iter()
        .map(|href| resolve_href(&opf_dir, href))
        .collect();
    if entry_names.is_empty() {
        // No usable spine; fall back to every XHTML entry in archive order.
        entry_names = archive
            .file_names()
            .filter(|name| {
                name.ends_with(".xhtml") || name.ends_with(".html") || name.ends_with(".xht")
            })
            .map(|name| name.to_string())
            .collect();
        entry_names.sort();
    }

    let mut text = String::new();
    for name in entry_names {
        // A manifest may reference entries that are absent or non-document;
        // skip them rather than losing the whole book.
        let Ok(xml) = read_zip_entry_bounded(&mut archive, &name) else {
            continue;
        };
        let body = extract_xhtml_text(&xml)?;
        if body.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&body);
    }

    Ok(ExtractedBook {
        text,
        title: package.title,
        author: package.author,
        page_count: None,
    })
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Epub(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_ZIP_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Epub(e.to_string()))?;
    if out.len() as u64 >= MAX_ZIP_ENTRY_BYTES {
        return Err(ExtractError::Epub(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_ZIP_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Pull the OPF package path out of `META-INF/container.xml`.
fn parse_container_rootfile(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"rootfile" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"full-path" {
                            let value = attr
                                .unescape_value()
                                .map_err(|err| ExtractError::Epub(err.to_string()))?;
                            return Ok(value.into_owned());
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Epub(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Err(ExtractError::Epub(
        "container.xml has no rootfile entry".to_string(),
    ))
}

struct OpfPackage {
    title: Option<String>,
    author: Option<String>,
    /// Manifest hrefs in spine (reading) order, relative to the OPF.
    spine_hrefs: Vec<String>,
}

/// Parse the OPF package document: Dublin Core title/creator, manifest
/// id→href map, and spine reading order.
fn parse_opf(xml: &[u8]) -> Result<OpfPackage, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut title = None;
    let mut author = None;
    let mut manifest: Vec<(String, String)> = Vec::new();
    let mut spine_idrefs: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if matches!(e.local_name().as_ref(), b"title" | b"creator") => {
                let is_title = e.local_name().as_ref() == b"title";
                if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                    let value = te.unescape().unwrap_or_default().trim().to_string();
                    if !value.is_empty() {
                        let slot = if is_title { &mut title } else { &mut author };
                        if slot.is_none() {
                            *slot = Some(value);
                        }
                    }
                }
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    let mut id = None;
                    let mut href = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"id" => id = attr.unescape_value().ok().map(|v| v.into_owned()),
                            b"href" => href = attr.unescape_value().ok().map(|v| v.into_owned()),
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(href)) = (id, href) {
                        manifest.push((id, href));
                    }
                }
                b"itemref" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"idref" {
                            if let Ok(idref) = attr.unescape_value() {
                                spine_idrefs.push(idref.into_owned());
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Epub(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let spine_hrefs = spine_idrefs
        .iter()
        .filter_map(|idref| {
            manifest
                .iter()
                .find(|(id, _)| id == idref)
                .map(|(_, href)| href.clone())
        })
        .collect();

    Ok(OpfPackage {
        title,
        author,
        spine_hrefs,
    })
}

/// Join a manifest href onto the OPF's directory, resolving `.`/`..`.
fn resolve_href(base_dir: &str, href: &str) -> String {
    let mut parts: Vec<&str> = if base_dir.is_empty() {
        Vec::new()
    } else {
        base_dir.split('/').collect()
    };
    for segment in href.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Collect the text content of an XHTML document, skipping script/style and
/// inserting newlines after block elements so paragraph boundaries survive
/// into chunking.
fn extract_xhtml_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    const BLOCK_ELEMENTS: [&[u8]; 12] = [
        b"p", b"div", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"li", b"tr", b"blockquote",
        b"section",
    ];

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if matches!(e.local_name().as_ref(), b"script" | b"style") {
                    skip_depth += 1;
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"script" | b"style") {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if BLOCK_ELEMENTS.contains(&name.as_ref()) && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(Event::Text(te)) => {
                if skip_depth == 0 {
                    let text = te.unescape().unwrap_or_default();
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                            out.push(' ');
                        }
                        out.push_str(trimmed);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Epub(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim().to_string())
}
