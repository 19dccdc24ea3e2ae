use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Technology name used in prompts, fallback messages, and chunk metadata.
    pub technology: String,
    /// Directory of per-page scraped JSON records.
    pub docs_dir: PathBuf,
    /// Directory of PDF/EPUB books.
    pub books_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite file holding this technology's collection. One file per corpus.
    pub path: PathBuf,
}

/// Chunking parameters for one source kind.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkProfile {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Chunks shorter than this (in characters) are discarded at ingestion.
    pub min_chunk_chars: usize,
    /// Embedding/store batch size; a batch never splits a chunk.
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_web_profile")]
    pub web: ChunkProfile,
    #[serde(default = "default_book_profile")]
    pub book: ChunkProfile,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            web: default_web_profile(),
            book: default_book_profile(),
        }
    }
}

fn default_web_profile() -> ChunkProfile {
    ChunkProfile {
        chunk_size: 1200,
        overlap: 200,
        min_chunk_chars: 100,
        batch_size: 100,
    }
}

fn default_book_profile() -> ChunkProfile {
    ChunkProfile {
        chunk_size: 1500,
        overlap: 300,
        min_chunk_chars: 150,
        batch_size: 50,
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: default_base_url(),
            dims: None,
            timeout_secs: default_embedding_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
// Retries are opt-in: a failed batch is dropped and the run continues.
fn default_max_retries() -> u32 {
    0
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Upper bound on a single generation call. Timeouts become an inline
    /// error string rather than blocking indefinitely.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "mistral".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.corpus.technology.trim().is_empty() {
        anyhow::bail!("corpus.technology must not be empty");
    }

    for (name, profile) in [
        ("chunking.web", &config.chunking.web),
        ("chunking.book", &config.chunking.book),
    ] {
        if profile.chunk_size == 0 {
            anyhow::bail!("{}.chunk_size must be > 0", name);
        }
        if profile.overlap >= profile.chunk_size {
            anyhow::bail!("{}.overlap must be smaller than chunk_size", name);
        }
        if profile.batch_size == 0 {
            anyhow::bail!("{}.batch_size must be > 0", name);
        }
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.generation.timeout_secs == 0 {
        anyhow::bail!("generation.timeout_secs must be > 0");
    }

    match config.embedding.provider.as_str() {
        "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be ollama or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[corpus]
technology = "rhel"
docs_dir = "./data/rhel/docs"
books_dir = "./data/rhel/books"

[index]
path = "./data/rhel/index.sqlite"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.chunking.web.chunk_size, 1200);
        assert_eq!(config.chunking.web.overlap, 200);
        assert_eq!(config.chunking.web.min_chunk_chars, 100);
        assert_eq!(config.chunking.web.batch_size, 100);
        assert_eq!(config.chunking.book.chunk_size, 1500);
        assert_eq!(config.chunking.book.overlap, 300);
        assert_eq!(config.chunking.book.min_chunk_chars, 150);
        assert_eq!(config.chunking.book.batch_size, 50);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.generation.timeout_secs, 120);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let bad = format!(
            "{}\n[chunking.web]\nchunk_size = 100\noverlap = 100\nmin_chunk_chars = 10\nbatch_size = 10\n",
            MINIMAL
        );
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn unknown_embedding_provider_rejected() {
        let bad = format!("{}\n[embedding]\nprovider = \"chroma\"\n", MINIMAL);
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn profiles_are_overridable() {
        let custom = format!(
            "{}\n[chunking.book]\nchunk_size = 2000\noverlap = 400\nmin_chunk_chars = 150\nbatch_size = 25\n",
            MINIMAL
        );
        let config = parse(&custom).unwrap();
        assert_eq!(config.chunking.book.chunk_size, 2000);
        assert_eq!(config.chunking.book.batch_size, 25);
        // untouched profile keeps its defaults
        assert_eq!(config.chunking.web.chunk_size, 1200);
    }
}
