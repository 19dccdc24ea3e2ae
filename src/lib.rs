//! # docdex
//!
//! A local documentation indexing and retrieval-augmented QA pipeline.
//!
//! docdex ingests a technology's documentation corpus (per-page web
//! scrapes and whole PDF/EPUB books) into a persistent cosine-similarity
//! vector collection, then answers natural-language questions by retrieving
//! relevant passages and handing them, with source attribution, to a
//! text-generation backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌─────────────┐
//! │ Corpus Reader │──▶│ Chunker │──▶│ VectorIndex │
//! │ JSON/PDF/EPUB │   │         │   │  (SQLite)   │
//! └──────────────┘   └─────────┘   └──────┬──────┘
//!                                         │
//!                  ┌──────────────────────┤
//!                  ▼                      ▼
//!           ┌────────────┐        ┌──────────────┐
//!           │ Retrieval  │───────▶│   Answer     │
//!           │  Engine    │        │ Synthesizer  │
//!           └────────────┘        └──────────────┘
//! ```
//!
//! Indexing is always a full rebuild: chunk ids are deterministic, and the
//! collection is replaced wholesale so no stale chunk survives a corpus
//! change.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunker`] | Boundary-aware text chunking |
//! | [`extract`] | PDF/EPUB text and metadata extraction |
//! | [`corpus`] | Corpus enumeration and normalization |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persistent vector collection |
//! | [`retrieval`] | Scoped similarity retrieval |
//! | [`generate`] | Generation backend client |
//! | [`answer`] | Grounded answer assembly |
//! | [`pipeline`] | Full-rebuild indexing orchestration |

pub mod answer;
pub mod chunker;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod retrieval;
