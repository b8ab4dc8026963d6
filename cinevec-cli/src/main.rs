//! cinevec: embed the demo movie catalog and run a similarity search
//!
//! Opens (or creates) the vector store, embeds every catalog movie through
//! the configured embedding backend, upserts them, then embeds the query and
//! prints the nearest movies.

use anyhow::Context;
use clap::Parser;
use cinevec_core::config::CinevecConfig;
use cinevec_core::embeddings::{create_backend, BackendConfig, EmbeddingBackend};
use cinevec_core::{db, RecordStore};
use cinevec_pipeline::{
    ingest_catalog, movie_catalog, movies_collection, render_json, render_text, search_movies,
    QueryOptions,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cinevec", author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML). Missing file means built-in defaults.
    #[arg(short, long, default_value = "cinevec.toml")]
    config: String,

    /// Query text to search for
    #[arg(short, long)]
    query: Option<String>,

    /// Number of results to return
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// SQLite database file
    #[arg(long)]
    db_path: Option<String>,

    /// Embedding service base URL
    #[arg(long, env = "CINEVEC__EMBEDDING__ENDPOINT")]
    embedding_endpoint: Option<String>,

    /// Embedding model name
    #[arg(long, env = "CINEVEC__EMBEDDING__MODEL")]
    embedding_model: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Search what is already stored instead of re-ingesting the catalog
    #[arg(long)]
    skip_ingest: bool,
}

impl Args {
    fn apply(&self, config: &mut CinevecConfig) {
        if let Some(q) = &self.query {
            config.query.text = q.clone();
        }
        if let Some(k) = self.top_k {
            config.query.top_k = k;
        }
        if let Some(p) = &self.db_path {
            config.store.db_path = p.clone();
        }
        if let Some(e) = &self.embedding_endpoint {
            config.embedding.endpoint = e.clone();
        }
        if let Some(m) = &self.embedding_model {
            config.embedding.model = m.clone();
        }
    }
}

/// `RUST_LOG` directives when set and valid, otherwise `info`.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr; stdout carries only the results
    fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match CinevecConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cinevec: failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    let backend = match create_backend(BackendConfig::from(&config.embedding)) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("cinevec: failed to create embedding backend: {}", e);
            std::process::exit(1);
        }
    };

    let store = match db::open_store(&config.store).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cinevec: failed to open vector store: {}", e);
            std::process::exit(1);
        }
    };

    // The store is closed whether or not the pipelines succeed
    let outcome = run(&args, &config, backend.as_ref(), store.as_ref()).await;
    store.close().await;

    if let Err(e) = outcome {
        eprintln!("cinevec: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(
    args: &Args,
    config: &CinevecConfig,
    backend: &dyn EmbeddingBackend,
    store: &dyn RecordStore,
) -> anyhow::Result<()> {
    let collection = movies_collection(&config.store.collection, config.embedding.dimensions)
        .context("invalid collection")?;
    store
        .ensure_collection(&collection)
        .await
        .with_context(|| format!("failed to create collection '{}'", collection.name()))?;

    if args.skip_ingest {
        tracing::info!("Skipping ingestion");
    } else {
        let catalog = movie_catalog();
        ingest_catalog(&catalog, backend, store, &collection, |movie| {
            eprintln!("Upserting movie: {}", movie.title);
        })
        .await
        .context("ingestion failed")?;
    }

    let options = QueryOptions {
        top_k: config.query.top_k,
        vector_field: config.query.vector_field.clone(),
    };
    let results = search_movies(&config.query.text, backend, store, &collection, &options)
        .await
        .context("search failed")?;

    if args.json {
        println!("{}", render_json(&config.query.text, &results)?);
    } else {
        print!("{}", render_text(&results));
    }

    Ok(())
}
