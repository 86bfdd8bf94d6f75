//! Hybrid CLI - index a corpus and run dense, sparse or hybrid searches.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use hybrid_core::{
    DenseEmbedder, HybridConfig, HybridError, IndexReport, Result, SearchResults, Stats, Store,
};
use hybrid_embed::{EmbeddingProvider, MockEmbedder, OnnxEmbedder};
use hybrid_index::{load_corpus, CorpusIndexer};
use hybrid_query::FusionRanker;
use hybrid_store::SqliteStore;

/// Hybrid - dense + sparse document retrieval
#[derive(Parser)]
#[command(name = "hybrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, then ./hybrid-search.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Build the index from a JSON Lines corpus
    Index {
        /// Corpus file (.jsonl, or .json holding an array)
        corpus: PathBuf,

        /// Abort on the first document that fails
        #[arg(long)]
        strict: bool,

        /// Concurrent embedding batches
        #[arg(short, long)]
        workers: Option<usize>,

        /// Replace an existing index
        #[arg(long)]
        rebuild: bool,

        /// Use the deterministic hashing embedder instead of the ONNX model
        #[arg(long)]
        mock_embedder: bool,
    },

    /// Search the index
    Search {
        /// Search query
        query: String,

        /// Search mode: dense, sparse or hybrid
        #[arg(short, long, default_value = "hybrid")]
        mode: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Dense weight for hybrid mode, within [0, 1]
        #[arg(long)]
        dense_weight: Option<f32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Use the deterministic hashing embedder instead of the ONNX model
        #[arg(long)]
        mock_embedder: bool,
    },

    /// Show statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&Path>, database: Option<PathBuf>) -> Result<HybridConfig> {
    let mut config = match path {
        Some(path) => HybridConfig::load(path)?,
        None => HybridConfig::load_default()?,
    };
    if let Some(database) = database {
        config.database.path = database;
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(exit_code(&e));
    }
}

/// 2 for usage errors the caller can fix, 1 for everything else.
fn exit_code(err: &HybridError) -> i32 {
    if err.is_precondition() {
        2
    } else {
        1
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.database)?;
    debug!("Using database {}", config.database.path.display());

    match cli.command {
        Commands::Init => init_database(&config),
        Commands::Index {
            corpus,
            strict,
            workers,
            rebuild,
            mock_embedder,
        } => {
            let mut config = config;
            config.indexing.strict |= strict;
            if let Some(workers) = workers {
                config.indexing.workers = workers.max(1);
            }
            let store = open_store(&config)?;
            let provider = build_provider(&config, mock_embedder)?;
            index(store, provider, &config, &corpus, rebuild).await
        }
        Commands::Search {
            query,
            mode,
            top_k,
            dense_weight,
            json,
            mock_embedder,
        } => {
            let store = open_store(&config)?;
            let provider = build_provider(&config, mock_embedder)?;
            let limit = top_k.unwrap_or(config.search.default_limit);
            let ranker = FusionRanker::with_config(store, provider, config.search.clone());
            let results = ranker.search_str(&query, &mode, limit, dense_weight).await?;
            print_results(&results, json)
        }
        Commands::Stats { json } => {
            let store = open_store(&config)?;
            let stats = store.get_stats().await?;
            print_stats(&stats, &config.database.path, json)
        }
    }
}

fn init_database(config: &HybridConfig) -> Result<()> {
    let path = &config.database.path;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Opening the store creates the schema
    let _store = SqliteStore::open_with_config(&config.database)?;
    println!("Initialized database at: {}", path.display());
    Ok(())
}

fn open_store(config: &HybridConfig) -> Result<Arc<SqliteStore>> {
    let path = &config.database.path;
    if !path.exists() {
        return Err(HybridError::store_unavailable(format!(
            "no database at {}; run 'hybrid init' first, or specify a path with -d",
            path.display()
        )));
    }
    Ok(Arc::new(SqliteStore::open_with_config(&config.database)?))
}

fn build_provider(config: &HybridConfig, mock: bool) -> Result<Arc<EmbeddingProvider>> {
    let embedder: Arc<dyn DenseEmbedder> = if mock {
        Arc::new(MockEmbedder::with_config(
            config.embedding.dimension,
            config.embedding.max_tokens,
        ))
    } else {
        Arc::new(OnnxEmbedder::from_config(&config.embedding)?)
    };
    Ok(Arc::new(EmbeddingProvider::new(
        embedder,
        config.sparse.clone(),
    )))
}

async fn index(
    store: Arc<SqliteStore>,
    provider: Arc<EmbeddingProvider>,
    config: &HybridConfig,
    corpus: &Path,
    rebuild: bool,
) -> Result<()> {
    let records = load_corpus(corpus)?;
    println!(
        "Indexing {} record(s) from {}...",
        records.len(),
        corpus.display()
    );

    let indexer =
        CorpusIndexer::new(store, provider, config.indexing.clone()).with_rebuild(rebuild);
    let report = indexer.index(records).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &IndexReport) {
    for failure in &report.failures {
        eprintln!(
            "  record {} ({}) - Error: {}",
            failure.position + 1,
            failure.title,
            failure.reason
        );
    }
    println!(
        "\nComplete: {} indexed, {} failed, {} vocabulary terms in {}ms",
        report.indexed, report.failed, report.vocabulary_terms, report.elapsed_ms
    );
}

fn print_results(results: &SearchResults, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.results.is_empty() {
        println!("No results for {:?}", results.query);
        return Ok(());
    }

    let weight = results
        .dense_weight
        .map(|w| format!(", dense weight {}", w))
        .unwrap_or_default();
    println!(
        "{} result(s) for {:?} ({} search{}, {}ms)\n",
        results.total_results, results.query, results.mode, weight, results.latency_ms
    );

    for result in &results.results {
        let doc = &result.document;
        println!(
            "{}. [{:.4}] {} ({}, #{})",
            result.rank, result.score, doc.title, doc.document_type, doc.id
        );
        println!("   {}", snippet(&doc.content, 160));
    }
    Ok(())
}

fn snippet(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

fn print_stats(stats: &Stats, path: &Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    let dimension = |d: Option<usize>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    println!("Database:        {}", path.display());
    println!("State:           {}", stats.state);
    println!("Documents:       {}", stats.documents);
    println!(
        "Dense vectors:   {} (dimension {})",
        stats.dense_vectors,
        dimension(stats.dense_dimension)
    );
    println!(
        "Sparse vectors:  {} (dimension {})",
        stats.sparse_vectors,
        dimension(stats.sparse_dimension)
    );
    println!("Vocabulary:      {} terms", stats.vocabulary_terms);
    println!("Storage:         {:.1} KB", stats.storage_bytes as f64 / 1024.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "hybrid",
            "search",
            "revenue growth",
            "--mode",
            "sparse",
            "-k",
            "5",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                query,
                mode,
                top_k,
                json,
                ..
            } => {
                assert_eq!(query, "revenue growth");
                assert_eq!(mode, "sparse");
                assert_eq!(top_k, Some(5));
                assert!(json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_exit_code_separates_usage_errors() {
        assert_eq!(exit_code(&HybridError::IndexNotBuilt), 2);
        assert_eq!(exit_code(&HybridError::unknown_mode("semantic")), 2);
        assert_eq!(exit_code(&HybridError::store_unavailable("gone")), 1);
    }

    #[test]
    fn test_snippet_truncates() {
        assert_eq!(snippet("short  text", 20), "short text");
        assert_eq!(snippet("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn test_index_then_search_with_mock_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.jsonl");
        fs::write(
            &corpus,
            "{\"title\":\"A\",\"content\":\"revenue growth\"}\n\
             {\"title\":\"B\",\"content\":\"digital transformation\"}\n",
        )
        .unwrap();

        let mut config = HybridConfig::default();
        config.database.path = dir.path().join("hybrid.db");
        config.embedding.dimension = 64;
        init_database(&config).unwrap();

        let store = open_store(&config).unwrap();
        let provider = build_provider(&config, true).unwrap();
        index(store, provider, &config, &corpus, false).await.unwrap();

        // Separate store and provider, as a later search invocation would have
        let store = open_store(&config).unwrap();
        let provider = build_provider(&config, true).unwrap();
        let ranker = FusionRanker::with_config(store, provider, config.search.clone());
        let results = ranker
            .search_str("revenue", "hybrid", 2, None)
            .await
            .unwrap();
        assert_eq!(results.results[0].document.title, "A");

        // A search with a differently sized model is refused, not mis-scored
        config.embedding.dimension = 32;
        let store = open_store(&config).unwrap();
        let provider = build_provider(&config, true).unwrap();
        let ranker = FusionRanker::with_config(store, provider, config.search.clone());
        let err = ranker
            .search_str("revenue", "dense", 2, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "EMBEDDER_MISMATCH");
        assert_eq!(exit_code(&err), 2);
    }
}
