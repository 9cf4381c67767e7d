//! # vlm-datasets CLI (`vlmds`)
//!
//! Configuration comes from the environment; a `.env` file in the working
//! directory is loaded first. See [`vlm_datasets::config`] for the variables.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vlmds init` | Create the database and run schema migrations |
//! | `vlmds serve` | Start the JSON HTTP API |
//! | `vlmds list` | List datasets, newest first |
//! | `vlmds show <id>` | Print a dataset with its documents and samples |
//! | `vlmds create <name>` | Create a dataset and print its upload URL |
//! | `vlmds upload <id> <file>` | Upload a local PDF as the dataset's raw object |
//! | `vlmds parse <id>` | Parse the uploaded PDF into samples |
//! | `vlmds presign <key>` | Pre-sign a GET or PUT for any key |
//!
//! `vlmds parse` runs in its own process and does not go through the
//! server's task queue. Don't parse a dataset from the CLI while a server
//! using the same database may be parsing it too; both can pass the
//! already-parsed check and each write a document.
//!
//! `vlmds presign` only signs locally and never creates the bucket.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use vlm_datasets::config::Config;
use vlm_datasets::ingest::Ingestor;
use vlm_datasets::storage::{PresignMethod, S3Storage, DEFAULT_PRESIGN_TTL_SECS};
use vlm_datasets::store::SqliteStore;
use vlm_datasets::{db, migrate, server};

/// Build evaluation datasets from uploaded PDFs.
#[derive(Parser)]
#[command(
    name = "vlmds",
    about = "Dataset ingestion service: pre-signed PDF uploads parsed into per-page samples",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP server on `BIND_ADDR`.
    Serve,

    /// List datasets with document and sample counts.
    List,

    /// Print a dataset, its documents and its first 100 samples as JSON.
    Show {
        /// Dataset id.
        id: String,
    },

    /// Create a dataset and print the pre-signed upload URL.
    Create {
        /// Dataset name; also names the raw object key.
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Upload a local PDF to a dataset's raw object key.
    Upload {
        /// Dataset id.
        id: String,

        /// Path to the PDF file.
        file: PathBuf,
    },

    /// Fetch the uploaded PDF and store one sample per page.
    Parse {
        /// Dataset id.
        id: String,
    },

    /// Print a pre-signed URL for an arbitrary object key.
    Presign {
        key: String,

        #[arg(long, value_enum)]
        method: MethodArg,

        /// Content type the uploader must send (PUT only).
        #[arg(long)]
        content_type: Option<String>,

        /// URL lifetime in seconds.
        #[arg(long, default_value_t = DEFAULT_PRESIGN_TTL_SECS)]
        ttl: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Get,
    Put,
}

impl From<MethodArg> for PresignMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Get => PresignMethod::Get,
            MethodArg::Put => PresignMethod::Put,
        }
    }
}

async fn build_ingestor(cfg: &Config) -> anyhow::Result<Ingestor> {
    let pool = db::connect(&cfg.db.url).await?;
    migrate::run_migrations(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let storage = Arc::new(S3Storage::new(&cfg.s3)?);
    Ok(Ingestor::new(store, storage))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.url).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::List => {
            let ingestor = build_ingestor(&cfg).await?;
            let datasets = ingestor.list_datasets().await?;
            if datasets.is_empty() {
                println!("No datasets.");
            }
            for d in datasets {
                println!(
                    "{}  {}  {}  docs={} samples={}",
                    d.id,
                    d.created_at.format("%Y-%m-%d %H:%M:%S"),
                    d.name,
                    d.counts.documents,
                    d.counts.samples
                );
            }
        }
        Commands::Show { id } => {
            let ingestor = build_ingestor(&cfg).await?;
            let detail = ingestor.get_dataset(&id).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
        Commands::Create { name, description } => {
            let ingestor = build_ingestor(&cfg).await?;
            let created = ingestor
                .create_dataset(&name, description.as_deref())
                .await?;
            println!("dataset:    {}", created.dataset_id);
            println!("object key: {}", created.object_key);
            println!("upload url: {}", created.upload_url);
        }
        Commands::Upload { id, file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let ingestor = build_ingestor(&cfg).await?;
            let key = ingestor.upload_raw(&id, bytes).await?;
            println!("Uploaded {} to {}", file.display(), key);
        }
        Commands::Parse { id } => {
            let ingestor = build_ingestor(&cfg).await?;
            let outcome = ingestor.parse_dataset(&id).await?;
            println!(
                "Parsed dataset {}: document {} with {} samples",
                id, outcome.document_id, outcome.sample_count
            );
        }
        Commands::Presign {
            key,
            method,
            content_type,
            ttl,
        } => {
            let ingestor = build_ingestor(&cfg).await?;
            let url = ingestor.presign(&key, method.into(), content_type.as_deref(), ttl)?;
            println!("{}", url);
        }
    }

    Ok(())
}
