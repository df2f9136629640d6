//! CLI front-end for the Dataset Pipeline: status, process,
//! process-all, and build-index, each scoped to one dataset.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use kl3m_core::{ObjectStore, Stage, Tokenizer};
use kl3m_parse::{ExtractorSet, HfTokenizer};
use kl3m_pipeline::{DatasetPipeline, ProcessOptions};
use kl3m_store::{S3Config, S3ObjectStore};

#[derive(Parser, Debug)]
#[command(about = "Per-dataset forward-stage pipeline")]
struct Cli {
    #[arg(long, env = "KL3M_BUCKET", default_value = "data.kl3m.ai")]
    bucket: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-2")]
    region: String,

    #[arg(long, default_value = "tokenizer.json")]
    tokenizer_path: String,

    #[arg(long)]
    dataset_id: String,

    #[arg(long)]
    sub_prefix: Option<String>,

    #[arg(long, default_value_t = 8)]
    workers: usize,

    #[arg(long)]
    clobber: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report missing-document counts for the next two stage transitions.
    Status,
    /// Run both forward transitions, then rebuild the index if progress
    /// was made.
    ProcessAll,
    /// Rebuild the stage index from the current stage-2 key listing.
    BuildIndex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(S3Config {
        bucket: cli.bucket.clone(),
        region: cli.region.clone(),
        ..Default::default()
    })?);

    let tokenizer: Arc<dyn Tokenizer> = Arc::new(HfTokenizer::from_file("canonical", &cli.tokenizer_path)?);
    let pipeline = DatasetPipeline::new(
        store.clone(),
        Arc::new(ExtractorSet::default()),
        vec![tokenizer.clone()],
        tokenizer,
    );

    let opts = ProcessOptions {
        workers: cli.workers,
        size_cap: None,
        clobber: cli.clobber,
    };

    match cli.command {
        Command::Status => {
            let status = pipeline.status(&cli.dataset_id, cli.sub_prefix.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&status_to_json(&status))?);
        }
        Command::ProcessAll => {
            let now = chrono::Utc::now().to_rfc3339();
            let (to_representations, to_parquet) = pipeline
                .process_all(&cli.dataset_id, cli.sub_prefix.as_deref(), &opts, || now.clone())
                .await?;
            tracing::info!(
                dataset_id = %cli.dataset_id,
                to_representations = ?to_representations,
                to_parquet = ?to_parquet,
                "process-all complete"
            );
        }
        Command::BuildIndex => {
            let now = chrono::Utc::now().to_rfc3339();
            let count = pipeline.build_index(&cli.dataset_id, cli.sub_prefix.as_deref(), || now.clone()).await?;
            tracing::info!(dataset_id = %cli.dataset_id, count, "index rebuilt");
        }
    }

    Ok(())
}

fn status_to_json(status: &kl3m_pipeline::DatasetStatus) -> serde_json::Value {
    serde_json::json!({
        "documents_count": status.documents_count,
        "representations_count": status.representations_count,
        "parquet_count": status.parquet_count,
        "missing_representations": status.missing_representations,
        "missing_parquet": status.missing_parquet,
    })
}
