//! CLI interface for the vector store

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use annstore::{DistanceMetric, StoreConfig, VectorStore};

#[derive(Parser)]
#[command(name = "annstore")]
#[command(about = "An approximate-nearest-neighbor vector store with stable external IDs", long_about = None)]
struct Cli {
    /// Base path for persistence. If the store artifacts exist there they
    /// are loaded; otherwise a new store is created and saved there after
    /// each mutating command.
    #[arg(long)]
    path: Option<PathBuf>,

    /// Vector dimension (used when creating a new store)
    #[arg(long, default_value_t = 128)]
    dim: usize,

    /// Distance metric (used when creating a new store)
    #[arg(long, value_enum, default_value = "euclidean")]
    metric: MetricArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum MetricArg {
    Euclidean,
    Cosine,
    DotProduct,
}

impl From<MetricArg> for DistanceMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Euclidean => DistanceMetric::Euclidean,
            MetricArg::Cosine => DistanceMetric::Cosine,
            MetricArg::DotProduct => DistanceMetric::DotProduct,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a vector
    Insert {
        /// Vector ID (64-bit, caller-assigned)
        id: u64,
        /// Vector data as comma-separated values (e.g., "1.0,2.0,3.0")
        #[arg(short, long)]
        vector: String,
    },
    /// Insert a batch of vectors from a JSON file: [{"id": 1, "vector": [..]}, ...]
    Batch {
        file: PathBuf,
        /// Attempt every item without upfront validation
        #[arg(long)]
        no_validate: bool,
    },
    /// Search for similar vectors
    Search {
        /// Query vector as comma-separated values (e.g., "1.0,2.0,3.0")
        query: String,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
    /// Print store configuration and counts
    Info,
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
}

#[derive(Deserialize)]
struct BatchItem {
    id: u64,
    vector: Vec<f32>,
}

fn parse_vector(s: &str) -> Result<Vec<f32>> {
    s.split(',')
        .map(|x| {
            x.trim()
                .parse::<f32>()
                .with_context(|| format!("invalid float: {}", x))
        })
        .collect()
}

fn meta_exists(base: &Path) -> bool {
    let mut os = OsString::from(base.as_os_str());
    os.push(".meta");
    Path::new(&os).exists()
}

fn open_store(cli: &Cli) -> Result<VectorStore> {
    if let Some(base) = &cli.path {
        if meta_exists(base) {
            return Ok(VectorStore::load(base)?);
        }
    }
    let config = StoreConfig::new(cli.dim).with_metric(cli.metric.into());
    Ok(VectorStore::with_config(config)?)
}

fn save_if_persistent(store: &VectorStore, cli: &Cli) -> Result<()> {
    if let Some(base) = &cli.path {
        store.save(base)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli)?;

    // The serve command needs the async runtime; everything else is synchronous
    if let Commands::Serve { ref addr } = cli.command {
        annstore::server::start(addr, store).await?;
        return Ok(());
    }

    match &cli.command {
        Commands::Insert { id, vector } => {
            let v = parse_vector(vector)?;
            store.add_vector(*id, &v)?;
            save_if_persistent(&store, &cli)?;
            println!("Inserted vector with ID: {}", id);
        }
        Commands::Batch { file, no_validate } => {
            let reader = File::open(file)
                .with_context(|| format!("cannot open batch file {}", file.display()))?;
            let items: Vec<BatchItem> = serde_json::from_reader(reader)?;
            let batch: Vec<(u64, Vec<f32>)> =
                items.into_iter().map(|i| (i.id, i.vector)).collect();

            let report = store.try_add_vector_batch(&batch, !*no_validate);
            save_if_persistent(&store, &cli)?;

            println!(
                "Accepted {} of {} vectors",
                report.accepted_count(),
                batch.len()
            );
            for (id, reason) in &report.skipped {
                println!("  skipped {}: {}", id, reason);
            }
        }
        Commands::Search { query, k } => {
            let q = parse_vector(query)?;
            let results = store.search_vectors(&q, *k)?;

            if results.is_empty() {
                println!("No results found (store is empty)");
            } else {
                println!("Top {} results:", results.len());
                for (i, result) in results.iter().enumerate() {
                    println!(
                        "{}. {} (distance: {:.4})",
                        i + 1,
                        result.user_id,
                        result.distance
                    );
                }
            }
        }
        Commands::Info => {
            let config = store.config();
            println!("dimension:        {}", config.dim);
            println!("metric:           {:?}", config.metric);
            println!("capacity:         {}", config.max_elements);
            println!("M:                {}", config.m);
            println!("ef_construction:  {}", config.ef_construction);
            println!("ef:               {}", config.ef);
            println!("vectors:          {}", store.len());
        }
        Commands::Serve { .. } => unreachable!("serve handled above"),
    }

    Ok(())
}
