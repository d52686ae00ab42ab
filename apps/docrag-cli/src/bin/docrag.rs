use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use docrag_core::config::{Config, Settings};
use docrag_core::source::DirectorySource;
use docrag_hybrid::{RetrievalEngine, RetrieveOptions, SourceWatcher};

/// Hybrid keyword + vector retrieval over local documents
#[derive(Parser)]
#[command(name = "docrag", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents by reference (paths relative to the documents dir)
    Ingest {
        #[arg(required = true)]
        refs: Vec<String>,
    },

    /// Ingest every .md/.txt file under a directory
    IngestDir {
        /// Defaults to `ingest.documents_dir`
        dir: Option<PathBuf>,
    },

    /// Retrieve context for a query
    Query {
        text: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the ranked results as JSON instead of formatted context
        #[arg(long)]
        json: bool,
    },

    /// Show store location, chunk count and size
    Status,

    /// Remove every chunk of a document
    Delete { source_id: String },

    /// Re-ingest documents whenever their content changes (Ctrl-C to stop)
    Watch {
        /// Defaults to `watch.sources`
        refs: Vec<String>,

        /// Poll interval in seconds (defaults to `watch.poll_interval_secs`)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;

    match cli.command {
        Commands::Ingest { refs } => {
            let mut engine = open_engine(&settings)?;
            ingest_with_progress(&mut engine, &refs)?;
        }
        Commands::IngestDir { dir } => {
            let dir = dir.unwrap_or_else(|| settings.documents_dir());
            let mut settings = settings;
            settings.ingest.documents_dir = dir.to_string_lossy().into_owned();
            let refs = DirectorySource::new(&dir).list_documents();
            if refs.is_empty() {
                println!("No .md/.txt documents under {}", dir.display());
                return Ok(());
            }
            let mut engine = open_engine(&settings)?;
            ingest_with_progress(&mut engine, &refs)?;
        }
        Commands::Query { text, top_k, json } => {
            let engine = open_engine(&settings)?;
            let mut options = RetrieveOptions::from(&settings.retrieval);
            if let Some(k) = top_k {
                options.top_k = k;
            }
            let (context, results) = engine.retrieve_with(&text, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{context}");
            }
        }
        Commands::Status => {
            let status = open_engine(&settings)?.status()?;
            println!("Location: {}", status.location.display());
            println!("Chunks:   {}", status.chunk_count);
            println!("Size:     {:.1} MiB", status.size_bytes as f64 / (1024.0 * 1024.0));
        }
        Commands::Delete { source_id } => {
            let removed = open_engine(&settings)?.delete_source(&source_id)?;
            println!("Removed {removed} chunks of {source_id}");
        }
        Commands::Watch { refs, interval } => {
            let refs = if refs.is_empty() { settings.watch.sources.clone() } else { refs };
            if refs.is_empty() {
                return Err(anyhow!("nothing to watch: pass document refs or set watch.sources"));
            }
            let interval = Duration::from_secs(interval.unwrap_or(settings.watch.poll_interval_secs).max(1));
            let engine = Arc::new(Mutex::new(open_engine(&settings)?));
            let mut watcher = SourceWatcher::new(engine, refs, interval);
            if let Some(state) = &settings.watch.state_file {
                watcher = watcher.with_state_file(docrag_core::config::expand_path(state));
            }
            watcher.start()?;
            println!("Watching every {}s, press Ctrl-C to stop", interval.as_secs());
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(tokio::signal::ctrl_c())
                .context("waiting for Ctrl-C")?;
            watcher.stop();
        }
    }
    Ok(())
}

fn open_engine(settings: &Settings) -> Result<RetrievalEngine> {
    RetrievalEngine::from_settings(settings)
        .with_context(|| format!("opening store at {}", settings.store_dir().display()))
}

fn ingest_with_progress(engine: &mut RetrievalEngine, refs: &[String]) -> Result<()> {
    let pb = ProgressBar::new(refs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
            .map_err(|e| anyhow!("progress template: {e}"))?
            .progress_chars("#>-"),
    );
    let mut total = 0usize;
    for source_id in refs {
        pb.set_message(source_id.clone());
        total += engine.ingest_document(source_id)?;
        pb.inc(1);
    }
    pb.finish_with_message("done");
    println!("Ingested {} documents into {} chunks", refs.len(), total);
    Ok(())
}
