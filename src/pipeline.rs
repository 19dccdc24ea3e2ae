//! Indexing orchestration: corpus → chunker → vector index.
//!
//! A full indexing run is always a rebuild. Chunk ids derive from filename
//! stems, which are not reliably diffable across corpus edits (renamed or
//! removed source files would leave orphans), so the collection is replaced
//! wholesale rather than upserted per chunk.

use tracing::{info, warn};

use crate::chunker::chunk_text;
use crate::config::{ChunkProfile, Config};
use crate::corpus::CorpusReader;
use crate::index::{IndexError, VectorIndex};
use crate::models::{chunk_id, Chunk, ChunkMetadata, SourceDocument};

/// Counters for one indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    /// Web chunks produced by chunking (before any batch failures).
    pub web_chunks: usize,
    /// Book chunks produced by chunking.
    pub book_chunks: usize,
    /// Chunks actually committed to the collection. Lower than
    /// `web_chunks + book_chunks` when a batch was lost mid-run.
    pub total_indexed: usize,
}

/// Rebuild the whole collection from the corpus on disk.
///
/// The only hard failure here is an unusable vector store
/// ([`IndexError::Unavailable`] from open/recreate); every per-document and
/// per-batch problem is logged and absorbed.
pub async fn index_all_documents(
    config: &Config,
    corpus: &CorpusReader,
    index: &VectorIndex,
) -> Result<IndexReport, IndexError> {
    let technology = &config.corpus.technology;
    info!(technology = %technology, "indexing all documents");

    let web_chunks = collect_chunks(
        technology,
        corpus.web_documents(),
        &config.chunking.web,
    );
    if web_chunks.is_empty() {
        warn!(docs_dir = %config.corpus.docs_dir.display(), "no web chunks produced");
    }

    let book_chunks = collect_chunks(
        technology,
        corpus.book_documents(),
        &config.chunking.book,
    );

    let report_web = web_chunks.len();
    let report_books = book_chunks.len();

    let groups = [
        (web_chunks, config.chunking.web.batch_size),
        (book_chunks, config.chunking.book.batch_size),
    ];
    let total = index.rebuild(&groups).await?;

    info!(
        total,
        web = report_web,
        books = report_books,
        "indexing finished"
    );

    Ok(IndexReport {
        web_chunks: report_web,
        book_chunks: report_books,
        total_indexed: total,
    })
}

fn collect_chunks(
    technology: &str,
    documents: impl Iterator<Item = SourceDocument>,
    profile: &ChunkProfile,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(chunk_document(technology, &document, profile));
    }
    chunks
}

/// Chunk one document and attach metadata. Pieces below the profile's
/// minimum length are discarded but keep their position in the index
/// numbering, so ids stay stable regardless of which pieces survive.
pub fn chunk_document(
    technology: &str,
    document: &SourceDocument,
    profile: &ChunkProfile,
) -> Vec<Chunk> {
    let kind = document.kind();
    let document_id = document.source_id().to_string();

    chunk_text(document.raw_text(), profile.chunk_size, profile.overlap)
        .into_iter()
        .enumerate()
        .filter(|(_, text)| text.chars().count() >= profile.min_chunk_chars)
        .map(|(index, text)| Chunk {
            id: chunk_id(kind, &document_id, index),
            document_id: document_id.clone(),
            index,
            text,
            metadata: metadata_for(technology, document, index),
        })
        .collect()
}

fn metadata_for(technology: &str, document: &SourceDocument, index: usize) -> ChunkMetadata {
    match document {
        SourceDocument::Web(page) => ChunkMetadata {
            technology: technology.to_string(),
            title: page.title.clone(),
            origin_url: page.url.clone(),
            source_kind: document.kind(),
            chunk_index: index,
            filename: format!("{}.json", page.source_id),
            source: Some(page.source.clone()),
            guide: Some(page.guide.clone()),
            author: None,
            page_count: None,
        },
        SourceDocument::Book(book) => ChunkMetadata {
            technology: technology.to_string(),
            title: book.title.clone(),
            origin_url: String::new(),
            source_kind: document.kind(),
            chunk_index: index,
            filename: book.filename.clone(),
            source: None,
            guide: None,
            author: book.author.clone(),
            page_count: book.page_count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookText, SourceKind, WebPage};

    fn web_profile() -> ChunkProfile {
        ChunkProfile {
            chunk_size: 1200,
            overlap: 200,
            min_chunk_chars: 100,
            batch_size: 100,
        }
    }

    fn book_profile() -> ChunkProfile {
        ChunkProfile {
            chunk_size: 1500,
            overlap: 300,
            min_chunk_chars: 150,
            batch_size: 50,
        }
    }

    fn web_doc(content: &str) -> SourceDocument {
        SourceDocument::Web(WebPage {
            source_id: "netguide".to_string(),
            title: "Networking".to_string(),
            url: "https://docs.example.com/netguide".to_string(),
            source: "example_docs".to_string(),
            guide: "netguide".to_string(),
            content: content.to_string(),
        })
    }

    fn book_doc(text: &str) -> SourceDocument {
        SourceDocument::Book(BookText {
            source_id: "admin-guide".to_string(),
            filename: "admin-guide.pdf".to_string(),
            title: "Admin Guide".to_string(),
            author: Some("Docs Team".to_string()),
            page_count: Some(300),
            text: text.to_string(),
        })
    }

    #[test]
    fn web_chunk_below_minimum_length_is_dropped() {
        let doc = web_doc(&"x".repeat(99));
        assert!(chunk_document("rhel", &doc, &web_profile()).is_empty());

        let doc = web_doc(&"x".repeat(101));
        let chunks = chunk_document("rhel", &doc, &web_profile());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn book_threshold_is_one_hundred_fifty() {
        let doc = book_doc(&"x".repeat(149));
        assert!(chunk_document("rhel", &doc, &book_profile()).is_empty());

        let doc = book_doc(&"x".repeat(151));
        let chunks = chunk_document("rhel", &doc, &book_profile());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.source_kind, SourceKind::Pdf);
    }

    #[test]
    fn chunk_ids_are_prefixed_and_positional() {
        let text = format!("{}. {}. {}.", "a".repeat(800), "b".repeat(800), "c".repeat(800));
        let chunks = chunk_document("rhel", &web_doc(&text), &web_profile());
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.id.starts_with("web_netguide_"));
            assert_eq!(chunk.id, format!("web_netguide_{}", chunk.index));
        }
    }

    #[test]
    fn rechunking_reproduces_identical_ids() {
        let text = format!("{}. short. {}.", "a".repeat(1100), "b".repeat(1100));
        let chunks = chunk_document("rhel", &web_doc(&text), &web_profile());
        let rechunked = chunk_document("rhel", &web_doc(&text), &web_profile());
        let ids: Vec<_> = chunks.iter().map(|c| c.id.clone()).collect();
        let ids_again: Vec<_> = rechunked.iter().map(|c| c.id.clone()).collect();
        assert!(!ids.is_empty());
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn short_tail_piece_is_dropped_but_ids_keep_positions() {
        let profile = ChunkProfile {
            chunk_size: 100,
            overlap: 20,
            min_chunk_chars: 50,
            batch_size: 10,
        };
        // Three pieces: 100, 100, and a 25-char tail below the minimum.
        let text = "x".repeat(185);
        let chunks = chunk_document("rhel", &web_doc(&text), &profile);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "web_netguide_0");
        assert_eq!(chunks[1].id, "web_netguide_1");
    }

    #[test]
    fn web_metadata_carries_page_fields() {
        let chunks = chunk_document("rhel", &web_doc(&"z".repeat(200)), &web_profile());
        let meta = &chunks[0].metadata;
        assert_eq!(meta.technology, "rhel");
        assert_eq!(meta.title, "Networking");
        assert_eq!(meta.origin_url, "https://docs.example.com/netguide");
        assert_eq!(meta.source.as_deref(), Some("example_docs"));
        assert_eq!(meta.guide.as_deref(), Some("netguide"));
        assert_eq!(meta.author, None);
    }

    #[test]
    fn book_metadata_carries_file_fields_and_empty_url() {
        let chunks = chunk_document("rhel", &book_doc(&"z".repeat(200)), &book_profile());
        let meta = &chunks[0].metadata;
        assert_eq!(meta.origin_url, "");
        assert_eq!(meta.filename, "admin-guide.pdf");
        assert_eq!(meta.author.as_deref(), Some("Docs Team"));
        assert_eq!(meta.page_count, Some(300));
    }
}
