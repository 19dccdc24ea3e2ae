//! Corpus enumeration: per-page web scrape records and whole-book files.
//!
//! Normalizes both source layouts into [`SourceDocument`] values. All
//! per-file failures (malformed JSON, unreadable books) are logged and
//! skipped so one bad record never aborts an indexing run.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::extract;
use crate::models::{BookText, SourceDocument, WebPage};

/// Manifest file written by the scraper alongside the page records; never
/// ingested.
const DOC_INDEX_FILE: &str = "doc_index.json";

const BOOK_EXTENSIONS: [&str; 2] = ["pdf", "epub"];

/// One scraped page record as stored on disk. `content` may legitimately be
/// missing or empty (a fetched-but-blank page); the other fields are
/// required.
#[derive(Debug, Deserialize)]
struct PageRecord {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    source: String,
    guide: String,
}

/// Reads a technology's documentation corpus from its docs and books
/// directories.
pub struct CorpusReader {
    docs_dir: PathBuf,
    books_dir: PathBuf,
}

impl CorpusReader {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            docs_dir: config.docs_dir.clone(),
            books_dir: config.books_dir.clone(),
        }
    }

    /// Lazily yield one [`SourceDocument::Web`] per readable page record.
    ///
    /// Directory enumeration order; stability across runs is not required
    /// because chunk ids derive from filename stems, not positions.
    pub fn web_documents(&self) -> impl Iterator<Item = SourceDocument> + '_ {
        scan_files(&self.docs_dir)
            .filter(|path| {
                path.extension().and_then(|e| e.to_str()) == Some("json")
                    && path.file_name().and_then(|n| n.to_str()) != Some(DOC_INDEX_FILE)
            })
            .filter_map(|path| read_page_record(&path))
    }

    /// Lazily yield one [`SourceDocument::Book`] per extractable book file.
    pub fn book_documents(&self) -> impl Iterator<Item = SourceDocument> + '_ {
        scan_files(&self.books_dir)
            .filter(|path| is_book_file(path))
            .filter_map(|path| read_book(&path))
    }

    /// Number of book files on disk, extractable or not. Health signal for
    /// the surrounding service.
    pub fn book_count(&self) -> usize {
        scan_files(&self.books_dir)
            .filter(|path| is_book_file(path))
            .count()
    }
}

fn scan_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

fn is_book_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .map(|e| BOOK_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

fn read_page_record(path: &Path) -> Option<SourceDocument> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read page record");
            return None;
        }
    };
    let record: PageRecord = match serde_json::from_str(&raw) {
        Ok(record) => record,
        Err(e) => {
            error!(path = %path.display(), error = %e, "malformed page record, skipping");
            return None;
        }
    };
    if record.content.is_empty() {
        debug!(path = %path.display(), "page record has no content");
    }
    Some(SourceDocument::Web(WebPage {
        source_id: file_stem(path),
        title: record.title,
        url: record.url,
        source: record.source,
        guide: record.guide,
        content: record.content,
    }))
}

fn read_book(path: &Path) -> Option<SourceDocument> {
    let extracted = match extract::extract_book(path) {
        Ok(extracted) => extracted,
        Err(e) => {
            error!(path = %path.display(), error = %e, "book extraction failed, skipping");
            return None;
        }
    };
    let stem = file_stem(path);
    if extracted.text.trim().is_empty() {
        warn!(path = %path.display(), "book extracted to empty text");
    }
    Some(SourceDocument::Book(BookText {
        source_id: stem.clone(),
        filename: path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string(),
        // Many PDFs carry no Info title; the filename stem is the stable
        // fallback shown in prompts and citations.
        title: extracted.title.unwrap_or(stem),
        author: extracted.author,
        page_count: extracted.page_count,
        text: extracted.text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use std::fs;

    fn reader_for(dir: &Path) -> CorpusReader {
        CorpusReader {
            docs_dir: dir.join("docs"),
            books_dir: dir.join("books"),
        }
    }

    fn write_page(dir: &Path, name: &str, title: &str, content: &str) {
        let record = serde_json::json!({
            "title": title,
            "url": format!("https://docs.example.com/{name}"),
            "content": content,
            "source": "example_docs",
            "guide": name,
        });
        fs::write(dir.join(format!("{name}.json")), record.to_string()).unwrap();
    }

    #[test]
    fn reads_page_records_and_skips_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        write_page(&docs, "networking", "Networking", "Configure the network.");
        write_page(&docs, "storage", "Storage", "Configure storage.");
        fs::write(docs.join(DOC_INDEX_FILE), "{\"total_docs\": 2}").unwrap();

        let docs: Vec<_> = reader_for(tmp.path()).web_documents().collect();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.kind() == SourceKind::Web));
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        write_page(&docs, "good", "Good", "Some content.");
        fs::write(docs.join("broken.json"), "{not json").unwrap();
        fs::write(docs.join("incomplete.json"), "{\"title\": \"no url\"}").unwrap();

        let docs: Vec<_> = reader_for(tmp.path()).web_documents().collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_id(), "good");
    }

    #[test]
    fn missing_content_yields_document_with_empty_text() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        let record = serde_json::json!({
            "title": "Empty",
            "url": "https://docs.example.com/empty",
            "source": "example_docs",
            "guide": "empty",
        });
        fs::write(docs.join("empty.json"), record.to_string()).unwrap();

        let docs: Vec<_> = reader_for(tmp.path()).web_documents().collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].raw_text(), "");
    }

    #[test]
    fn missing_directories_yield_empty_iterators() {
        let tmp = tempfile::tempdir().unwrap();
        let reader = reader_for(tmp.path());
        assert_eq!(reader.web_documents().count(), 0);
        assert_eq!(reader.book_documents().count(), 0);
        assert_eq!(reader.book_count(), 0);
    }

    #[test]
    fn book_count_sees_unextractable_files() {
        let tmp = tempfile::tempdir().unwrap();
        let books = tmp.path().join("books");
        fs::create_dir_all(&books).unwrap();
        fs::write(books.join("corrupt.pdf"), b"not a pdf").unwrap();
        fs::write(books.join("notes.txt"), b"not a book").unwrap();

        let reader = reader_for(tmp.path());
        assert_eq!(reader.book_count(), 1);
        // ...but extraction failures never surface as documents
        assert_eq!(reader.book_documents().count(), 0);
    }
}
