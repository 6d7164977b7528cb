//! `chunkdb` command-line front end over a LanceDB-backed hybrid engine.
//!
//! ```bash
//! chunkdb ingest notes/ --method paragraph
//! chunkdb search "quick jump" --method bm25 -n 3
//! chunkdb search "animal" --filter source=notes/a.txt --json
//! chunkdb list --order-by chunkIndex --desc
//! ```
//!
//! The store location comes from the `store.path` config key (default
//! `data/lance`); see `chunkdb_core::config` for the other layers.

mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use chunkdb_core::config::{expand_path, Config, EngineConfig};
use chunkdb_core::traits::Embedder;
use chunkdb_core::types::{
    ChunkingMethod, DistanceMetric, FusionWeights, Metadata, MetadataFilter, OrderBy, SearchMethod, SelectOptions,
    SortOrder,
};
use chunkdb_embed::{get_default_embedder, use_fake_embeddings, HashingEmbedder};
use chunkdb_hybrid::{AddTextOptions, HybridSearchEngine, SearchOptions};
use chunkdb_vector::LanceStore;

#[derive(Parser)]
#[command(name = "chunkdb", version, about = "Hybrid vector + BM25 search over chunked text")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store a .txt file or every .txt file under a directory
    Ingest {
        path: PathBuf,
        #[arg(long)]
        method: Option<ChunkingMethod>,
        /// Ingest all files concurrently under one batch id
        #[arg(long)]
        batch: bool,
    },
    /// Rank stored chunks against a query
    Search {
        query: String,
        #[arg(long)]
        method: Option<SearchMethod>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long, requires = "bm25_weight")]
        vector_weight: Option<f32>,
        #[arg(long, requires = "vector_weight")]
        bm25_weight: Option<f32>,
        #[arg(long)]
        distance: Option<DistanceMetric>,
        /// Exact-match metadata predicate, repeatable
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Hybrid "more like this" search
    Similar {
        query: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print the chunks a file would be split into, without storing anything
    Chunk {
        file: PathBuf,
        #[arg(long)]
        method: Option<ChunkingMethod>,
    },
    /// List stored chunks
    List {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
        #[arg(long)]
        order_by: Option<OrderBy>,
        #[arg(long)]
        desc: bool,
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
}

fn parse_filter(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

fn to_filter(pairs: Vec<(String, String)>) -> Option<MetadataFilter> {
    if pairs.is_empty() {
        return None;
    }
    Some(pairs.into_iter().map(|(k, v)| (k, v.into())).collect())
}

fn embedder_for(config: &EngineConfig) -> Result<Arc<dyn Embedder>> {
    if !use_fake_embeddings() && std::env::var("OPENAI_API_KEY").is_err() {
        warn!("OPENAI_API_KEY not set; falling back to the offline hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(config.embedding.dimensions)));
    }
    Ok(get_default_embedder(&config.embedding)?)
}

async fn open_engine(config: &Config) -> Result<HybridSearchEngine<LanceStore>> {
    let engine_config = config.engine()?;
    let table = config.table()?;
    let store_path: String = config.get_or("store.path", "data/lance".to_string())?;
    let store_path = expand_path(store_path);
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let uri = store_path.to_string_lossy();
    info!(store = %uri, table = %table.table_name, env = config.env(), "opening store");
    let store = LanceStore::open(&uri, table.clone(), engine_config.embedding.dimensions).await?;
    let embedder = embedder_for(&engine_config)?;
    let engine = HybridSearchEngine::new(store, embedder, table, engine_config)?;
    engine.initialize().await?;
    Ok(engine)
}

fn txt_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.into_path())
        .collect()
}

fn source_metadata(file: &Path) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), file.display().to_string().into());
    metadata
}

/// Non-empty files with their `source` metadata, in walk order.
fn read_sourced(files: &[PathBuf]) -> Result<Vec<(String, Metadata)>> {
    let mut texts = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        if text.trim().is_empty() {
            warn!(file = %file.display(), "skipping empty file");
            continue;
        }
        texts.push((text, source_metadata(file)));
    }
    Ok(texts)
}

async fn ingest(engine: &HybridSearchEngine<LanceStore>, path: &Path, method: Option<ChunkingMethod>, batch: bool) -> Result<()> {
    let files = txt_files(path);
    if files.is_empty() {
        bail!("no .txt files found under {}", path.display());
    }

    if batch {
        let texts = read_sourced(&files)?;
        if texts.is_empty() {
            bail!("every .txt file under {} is empty", path.display());
        }
        let report = engine
            .add_texts_with_metadata(&texts, AddTextOptions { chunking_method: method, metadata: Metadata::new() })
            .await?;
        println!("Ingested {} chunks from {} files (batch {})", report.count, files.len(), report.batch_id.unwrap_or_default());
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let mut total = 0usize;
    for file in &files {
        let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        pb.set_message(file.display().to_string());
        if text.trim().is_empty() {
            warn!(file = %file.display(), "skipping empty file");
            pb.inc(1);
            continue;
        }
        let report = engine.add_text(&text, AddTextOptions { chunking_method: method, metadata: source_metadata(file) }).await?;
        total += report.count;
        pb.inc(1);
    }
    pb.finish_with_message("done");
    println!("Ingested {total} chunks from {} files", files.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    match cli.command {
        Command::Chunk { file, method } => {
            let engine_config = config.engine()?;
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let chunker = chunkdb_core::Chunker::new(engine_config.chunking.fixed_size);
            let chunks = chunker.chunk(&text, method.unwrap_or(engine_config.chunking.default_method));
            output::print_chunks(&chunks, cli.json)?;
        }
        Command::Ingest { path, method, batch } => {
            let engine = open_engine(&config).await?;
            ingest(&engine, &path, method, batch).await?;
        }
        Command::Search { query, method, limit, vector_weight, bm25_weight, distance, filters } => {
            let engine = open_engine(&config).await?;
            let weights = match (vector_weight, bm25_weight) {
                (Some(v), Some(b)) => Some(FusionWeights::new(v, b)),
                _ => None,
            };
            let options = SearchOptions { method, limit, weights, filter: to_filter(filters), distance };
            let results = engine.search(&query, options).await?;
            output::print_results(&query, &results, cli.json)?;
        }
        Command::Similar { query, limit } => {
            let engine = open_engine(&config).await?;
            let results = engine.search_similar_chunks(&query, limit).await?;
            output::print_results(&query, &results, cli.json)?;
        }
        Command::List { limit, order_by, desc, filters } => {
            let engine = open_engine(&config).await?;
            let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
            let rows = engine.select(SelectOptions { limit, filter: to_filter(filters), order_by, order }).await?;
            output::print_rows(&rows, cli.json)?;
        }
    }
    Ok(())
}
