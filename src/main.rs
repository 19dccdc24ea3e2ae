//! # docdex CLI
//!
//! Command-line interface over one technology's documentation corpus.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docdex init` | Create the vector collection (idempotent) |
//! | `docdex index` | Full rebuild: ingest, chunk, embed, and store the corpus |
//! | `docdex search "<query>"` | Show ranked context records for a query |
//! | `docdex ask "<question>"` | Answer a question from the indexed corpus |
//! | `docdex stats` | Collection and corpus health overview |
//!
//! All commands accept `--config` pointing to a TOML configuration file.
//! `search` and `ask` accept `--scope all|web|pdf` to restrict retrieval to
//! web pages or books.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docdex::answer::AnswerSynthesizer;
use docdex::config::{load_config, Config};
use docdex::corpus::CorpusReader;
use docdex::embedding::create_provider;
use docdex::generate::GenerationClient;
use docdex::index::VectorIndex;
use docdex::models::SourceKind;
use docdex::pipeline::index_all_documents;
use docdex::retrieval::{RetrievalEngine, Scope};

/// docdex: index a documentation corpus and answer questions from it.
#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Local documentation indexing and retrieval-augmented QA",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector collection. Idempotent.
    Init,

    /// Rebuild the whole collection from the corpus on disk.
    ///
    /// Drops every previously indexed chunk first, so renamed or removed
    /// source files leave no orphans behind.
    Index,

    /// Retrieve ranked context records for a query.
    Search {
        query: String,
        /// Restrict to web pages or books.
        #[arg(long, default_value = "all")]
        scope: Scope,
        /// Number of records to return.
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Answer a question from the indexed corpus.
    Ask {
        question: String,
        /// Restrict to web pages or books.
        #[arg(long, default_value = "all")]
        scope: Scope,
    },

    /// Collection and corpus health overview.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docdex=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Index => run_index(&config).await,
        Commands::Search { query, scope, k } => run_search(&config, &query, scope, k).await,
        Commands::Ask { question, scope } => run_ask(&config, &question, scope).await,
        Commands::Stats => run_stats(&config).await,
    }
}

async fn open_index(config: &Config) -> Result<Arc<VectorIndex>> {
    let provider = create_provider(&config.embedding)?;
    let index = VectorIndex::open(&config.index.path, provider).await?;
    Ok(Arc::new(index))
}

async fn run_init(config: &Config) -> Result<()> {
    let index = open_index(config).await?;
    println!(
        "collection ready at {} ({} chunks)",
        config.index.path.display(),
        index.count().await?
    );
    Ok(())
}

async fn run_index(config: &Config) -> Result<()> {
    let index = open_index(config).await?;
    let corpus = CorpusReader::new(&config.corpus);

    let report = index_all_documents(config, &corpus, &index).await?;

    println!("index {}", config.corpus.technology);
    println!("  web chunks:   {}", report.web_chunks);
    println!("  book chunks:  {}", report.book_chunks);
    println!("  indexed:      {}", report.total_indexed);
    if report.total_indexed < report.web_chunks + report.book_chunks {
        println!(
            "  lost to failed batches: {}",
            report.web_chunks + report.book_chunks - report.total_indexed
        );
    }
    println!("ok");
    Ok(())
}

async fn run_search(config: &Config, query: &str, scope: Scope, k: Option<usize>) -> Result<()> {
    let index = open_index(config).await?;
    let engine = RetrievalEngine::new(index);
    let k = k.unwrap_or(config.retrieval.top_k);

    let records = engine.retrieve(query, k, scope).await;
    if records.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        let distance = record
            .distance
            .map(|d| format!("{:.4}", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}. [{}] {} ({})",
            i + 1,
            distance,
            record.metadata.title,
            record.metadata.source_kind
        );
        match record.metadata.source_kind {
            SourceKind::Web => println!("    url: {}", record.metadata.origin_url),
            SourceKind::Pdf => println!("    file: {}", record.metadata.filename),
        }
        let excerpt: String = record.content.chars().take(240).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        println!();
    }
    Ok(())
}

async fn run_ask(config: &Config, question: &str, scope: Scope) -> Result<()> {
    let index = open_index(config).await?;
    let engine = RetrievalEngine::new(index);
    let backend = GenerationClient::new(&config.generation)?;
    let synthesizer = AnswerSynthesizer::new(
        config.corpus.technology.clone(),
        engine,
        backend,
        config.retrieval.top_k,
    );

    println!("{}", synthesizer.answer_text(question, scope).await);
    Ok(())
}

async fn run_stats(config: &Config) -> Result<()> {
    let index = open_index(config).await?;
    let corpus = CorpusReader::new(&config.corpus);

    let chunk_count = index.count().await?;
    let book_count = corpus.book_count();
    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let rebuilt_at = index.meta_value("rebuilt_at").await?;
    let model = index.meta_value("embedding_model").await?;

    println!("docdex — {}", config.corpus.technology);
    println!("  collection:   {}", config.index.path.display());
    println!("  size:         {}", format_bytes(db_size));
    println!("  chunks:       {}", chunk_count);
    println!("  books:        {}", book_count);
    if let Some(model) = model {
        println!("  embeddings:   {}", model);
    }
    println!(
        "  last rebuild: {}",
        rebuilt_at.as_deref().unwrap_or("never")
    );
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
