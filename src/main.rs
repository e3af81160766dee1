//! ragassist CLI - chat with your own documents

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ragassist::bucket::{self, ObjectStore};
use ragassist::chat::ChatService;
use ragassist::config::{self, RagConfig};
use ragassist::ingest::{DocumentChunker, IndexReport, Indexer};
use ragassist::output::is_quiet;
use ragassist::query::{Embedder, EmbeddingEngine, Retriever};
use ragassist::server::{self, AppState};
use ragassist::storage::{self, SharedIndex};
use ragassist::ui::{self, Icons};
use ragassist::{llm, SqliteIndex};

#[derive(Parser)]
#[command(name = "ragassist")]
#[command(version)]
#[command(about = "Personal RAG assistant - chat with documents stored in S3")]
#[command(long_about = r#"
ragassist indexes PDF, text and Markdown documents from an S3 bucket,
embeds them locally and answers questions with a hosted language model.

Example usage:
  ragassist init --bucket my-rag-documents
  ragassist upload ./documents
  ragassist index
  ragassist ask "What are the types of machine learning?"
  ragassist serve
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "ragassist.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// S3 bucket holding the documents
        #[arg(short, long)]
        bucket: Option<String>,

        /// Use a local directory instead of S3
        #[arg(long)]
        local_dir: Option<PathBuf>,

        /// AWS region
        #[arg(long)]
        region: Option<String>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Upload local documents to the bucket
    Upload {
        /// File or directory to upload
        path: PathBuf,

        /// Key prefix (defaults to storage.prefix)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Extra gitignore-style exclude patterns
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// List documents in the bucket
    Documents,

    /// Extract, chunk and embed new or changed documents
    Index {
        /// Re-embed documents even if unchanged
        #[arg(short, long)]
        force: bool,

        /// Drop the whole index before indexing
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the chunks most similar to a query
    Search {
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Ask a single question
    Ask {
        question: String,
    },

    /// Show index statistics
    Stats,

    /// Start the web chat UI
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip indexing at startup
        #[arg(long)]
        no_index: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { bucket, local_dir, region, force } => {
            run_init(&cli.config, bucket, local_dir, region, force)
        }
        Commands::Upload { path, prefix, exclude } => {
            let config = load(&cli.config)?;
            run_upload(&config, &path, prefix, &exclude).await
        }
        Commands::Documents => {
            let config = load(&cli.config)?;
            run_documents(&config).await
        }
        Commands::Index { force, rebuild } => {
            let config = load(&cli.config)?;
            let index = open_index(&config)?;
            if rebuild {
                storage::lock_index(&index).clear_all()?;
                ui::warn("Cleared the index");
            }
            let embedder = load_embedder(&config)?;
            run_index(&config, index, embedder, force).await.map(|_| ())
        }
        Commands::Search { query, limit } => {
            let config = load(&cli.config)?;
            run_search(&config, &query, limit)
        }
        Commands::Ask { question } => {
            let config = load(&cli.config)?;
            run_ask(&config, &question).await
        }
        Commands::Stats => {
            let config = load(&cli.config)?;
            run_stats(&config)
        }
        Commands::Serve { port, no_index } => {
            let mut config = load(&cli.config)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            run_serve(config, no_index).await
        }
    }
}

fn load(path: &Path) -> anyhow::Result<RagConfig> {
    let mut config = match config::load_config(Some(path))? {
        Some(config) => config,
        None => {
            tracing::warn!("No config at {}; using defaults", path.display());
            RagConfig::default()
        }
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn open_index(config: &RagConfig) -> anyhow::Result<SharedIndex> {
    config::ensure_db_dir(&config.index.database)?;
    let index = SqliteIndex::open(&config.index.database)
        .with_context(|| format!("failed to open index {}", config.index.database.display()))?;
    Ok(storage::shared(index))
}

fn load_embedder(config: &RagConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    let spinner = ui::Spinner::new("Loading embedding model (all-MiniLM-L6-v2)...");
    let engine = EmbeddingEngine::with_options(config.index.model_cache.clone(), config.index.batch_size)?;
    spinner.finish_and_clear();
    Ok(Arc::new(engine))
}

fn run_init(
    path: &Path,
    bucket: Option<String>,
    local_dir: Option<PathBuf>,
    region: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let mut config = RagConfig::default();
    config.topics = config::sample_topics();
    config.example_questions = config::sample_questions();
    if let Some(bucket) = bucket {
        config.storage.bucket = bucket;
    }
    if let Some(region) = region {
        config.storage.region = region;
    }
    config.storage.local_dir = local_dir;
    config.validate()?;

    config::write_config(path, &config, force)?;
    let root = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    config::ensure_db_dir(&config.index.database)?;
    config::ensure_gitignore(root)?;

    ui::success(&format!("Wrote {}", path.display()));
    ui::info("Documents", &config.store_name());
    ui::info("Index", &config.index.database.display().to_string());
    Ok(())
}

async fn run_upload(
    config: &RagConfig,
    path: &Path,
    prefix: Option<String>,
    exclude: &[String],
) -> anyhow::Result<()> {
    let prefix = prefix.unwrap_or_else(|| config.storage.prefix.clone());
    let candidates = ragassist::ignore::collect_uploads(path, &prefix, exclude);
    if candidates.is_empty() {
        ui::warn(&format!("No PDF, text or Markdown files found at {}", path.display()));
        return Ok(());
    }

    let store = bucket::from_config(config).await?;
    if !is_quiet() {
        ui::header(&format!("Uploading {} documents to {}", candidates.len(), store.name()));
    }

    let mut failed = 0;
    for candidate in &candidates {
        let data = tokio::fs::read(&candidate.path).await?;
        match store.put(&candidate.key, data, candidate.kind.content_type()).await {
            Ok(()) => {
                if !is_quiet() {
                    println!("{} {}", Icons::UP, candidate.key);
                }
            }
            Err(e) => {
                failed += 1;
                ui::document_failed(&candidate.key, &e.to_string());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} uploads failed", failed, candidates.len());
    }
    ui::success(&format!("Uploaded {} documents", candidates.len()));
    Ok(())
}

async fn run_documents(config: &RagConfig) -> anyhow::Result<()> {
    let store = bucket::from_config(config).await?;
    let objects = store.list(&config.storage.prefix).await?;
    if objects.is_empty() {
        ui::warn(&format!("No documents in {}", store.name()));
        return Ok(());
    }

    let indexed = open_index(config)?;
    let indexed = storage::lock_index(&indexed).documents()?;

    println!("{} {} ({} documents)", Icons::BUCKET, store.name(), objects.len());
    println!("{}", ui::documents_table(&objects, &indexed));
    Ok(())
}

async fn run_index(
    config: &RagConfig,
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    force: bool,
) -> anyhow::Result<IndexReport> {
    let store = bucket::from_config(config).await?;
    let chunker = DocumentChunker::with_settings(config.chunking.chunk_size, config.chunking.overlap);
    let indexer = Indexer::new(index, embedder, chunker)
        .with_prefix(config.storage.prefix.clone())
        .with_force(force);

    if is_quiet() {
        return Ok(indexer.run(store.as_ref()).await?);
    }

    ui::header(&format!("Indexing {}", store.name()));
    let start = Instant::now();
    let (progress, tx) = ui::IndexProgress::new();
    let report = indexer.with_progress(tx).run(store.as_ref()).await?;
    progress.finish_with_summary(start.elapsed(), &report);

    if report.failed > 0 {
        ui::warn(&format!("{} documents could not be indexed", report.failed));
    }
    Ok(report)
}

fn run_search(config: &RagConfig, query: &str, limit: usize) -> anyhow::Result<()> {
    let index = open_index(config)?;
    let embedder = load_embedder(config)?;

    println!("{} Searching for: '{}'", Icons::SEARCH, query);
    let results = Retriever::new(&index, embedder.as_ref()).find_similar_chunks(query, limit)?;

    if results.is_empty() {
        ui::warn("No chunks indexed yet. Run `ragassist index` first.");
        return Ok(());
    }
    for result in results {
        println!(
            "- {} {} {}",
            result.chunk.source.style(ui::theme().header.clone()),
            ui::muted(&format!("#{}", result.chunk.chunk_index)),
            ui::dim(&format!("(score {:.3})", result.score))
        );
        println!("  {}", result.chunk.preview());
    }
    Ok(())
}

async fn run_ask(config: &RagConfig, question: &str) -> anyhow::Result<()> {
    let index = open_index(config)?;
    let embedder = load_embedder(config)?;
    let llm = llm::from_config(&config.llm).await?;
    let chat = ChatService::new(index, embedder, llm, config);

    let spinner = ui::Spinner::new("Thinking...");
    let response = chat.respond("cli", question).await;
    spinner.finish_and_clear();
    let response = response?;

    ui::answer(&response.answer);
    if !response.sources.is_empty() {
        ui::section("Sources");
        if response.relevance_scores.len() == response.sources.len() {
            for (source, score) in response.sources.iter().zip(&response.relevance_scores) {
                ui::source(source, *score);
            }
        } else {
            for source in &response.sources {
                println!("  {} {}", Icons::FILE, source);
            }
        }
    }
    if let Some(cost) = response.estimated_cost {
        println!("{}", ui::dim(&format!("Estimated cost: ~${:.3}", cost)));
    }
    Ok(())
}

fn run_stats(config: &RagConfig) -> anyhow::Result<()> {
    let index = open_index(config)?;
    let index = storage::lock_index(&index);
    let stats = index.stats()?;

    println!(
        "{} ragassist statistics ({})",
        Icons::STATS,
        config.index.database.display()
    );
    println!(
        "{}",
        ui::stats_table(&[
            ("Documents", stats.documents.to_string()),
            ("Chunks", stats.chunks.to_string()),
            ("Embeddings", stats.embeddings.to_string()),
            ("Chunk size", format!("{} words", config.chunking.chunk_size)),
            ("Overlap", format!("{} words", config.chunking.overlap)),
        ])
    );

    let documents = index.documents()?;
    if !documents.is_empty() {
        ui::section("Documents");
        for doc in documents {
            ui::summary_row(
                &doc.key,
                &format!(
                    "{} chunks, {} chars, indexed {}",
                    doc.chunks,
                    doc.characters,
                    doc.indexed_at.format("%Y-%m-%d %H:%M")
                ),
            );
        }
    }
    Ok(())
}

async fn run_serve(config: RagConfig, no_index: bool) -> anyhow::Result<()> {
    let index = open_index(&config)?;
    let embedder = load_embedder(&config)?;

    if !no_index {
        let start = Instant::now();
        let report = run_index(&config, index.clone(), embedder.clone(), false).await?;
        tracing::info!("Startup indexing finished in {:?}: {} indexed", start.elapsed(), report.indexed);
    }

    let llm = llm::from_config(&config.llm).await?;
    let store = bucket::from_config(&config).await?;
    let chat = ChatService::new(index, embedder, llm, &config);

    if !is_quiet() {
        ui::header("Personal RAG Assistant");
        ui::info("Documents", &config.store_name());
        ui::info("Model", &format!("{:?} {}", config.llm.provider, config.llm.model_name()));
        ui::info(
            "Rate limit",
            &format!(
                "{} queries per {} minutes per client",
                config.safety.max_queries, config.safety.window_minutes
            ),
        );
    }

    server::start_server(AppState::new(chat, store, config)).await
}
