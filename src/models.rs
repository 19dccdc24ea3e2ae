//! Core data models used throughout docdex.
//!
//! These types represent the source documents, chunks, and retrieval results
//! that flow through the indexing and answer pipeline. Source documents are
//! a tagged enum so web/book dispatch is exhaustive at compile time.

use serde::{Deserialize, Serialize};

/// Origin class of an indexed chunk: scraped web page or extracted book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    Pdf,
}

impl SourceKind {
    /// Storage/filter value, also the chunk-id prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "web" => Some(SourceKind::Web),
            "pdf" => Some(SourceKind::Pdf),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scraped documentation page, parsed from a per-page JSON record.
#[derive(Debug, Clone)]
pub struct WebPage {
    /// Filename stem of the JSON record; basis for chunk ids.
    pub source_id: String,
    pub title: String,
    pub url: String,
    /// Name of the documentation source the scraper pulled from.
    pub source: String,
    /// Guide identifier within that source.
    pub guide: String,
    pub content: String,
}

/// One whole book (PDF or EPUB) with extracted text and file metadata.
#[derive(Debug, Clone)]
pub struct BookText {
    /// Filename stem of the book file; basis for chunk ids.
    pub source_id: String,
    pub filename: String,
    pub title: String,
    pub author: Option<String>,
    pub page_count: Option<u32>,
    pub text: String,
}

/// A logical unit before chunking. Immutable once read from disk.
#[derive(Debug, Clone)]
pub enum SourceDocument {
    Web(WebPage),
    Book(BookText),
}

impl SourceDocument {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceDocument::Web(_) => SourceKind::Web,
            SourceDocument::Book(_) => SourceKind::Pdf,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            SourceDocument::Web(page) => &page.source_id,
            SourceDocument::Book(book) => &book.source_id,
        }
    }

    pub fn raw_text(&self) -> &str {
        match self {
            SourceDocument::Web(page) => &page.content,
            SourceDocument::Book(book) => &book.text,
        }
    }
}

/// Metadata carried by every indexed chunk, round-tripped through storage
/// as JSON. Web-only and book-only fields are optional and omitted when
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub technology: String,
    pub title: String,
    /// Empty for book chunks.
    #[serde(default)]
    pub origin_url: String,
    pub source_kind: SourceKind,
    pub chunk_index: usize,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

/// A contiguous segment of a source document, ready for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic: `{kind}_{source_id}_{index}`. Re-chunking the same
    /// document with the same parameters reproduces identical ids, which is
    /// what makes full-rebuild indexing idempotent.
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Derive the deterministic chunk id for `(kind, document, index)`.
pub fn chunk_id(kind: SourceKind, source_id: &str, index: usize) -> String {
    format!("{}_{}_{}", kind.as_str(), source_id, index)
}

/// A single retrieval result: chunk content plus metadata and cosine
/// distance to the query. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct ContextRecord {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub distance: Option<f32>,
}
