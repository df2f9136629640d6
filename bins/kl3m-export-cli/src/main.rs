//! CLI front-end for the JSONL Exporter.

use std::fs::File;
use std::sync::Arc;

use clap::Parser;

use kl3m_core::ObjectStore;
use kl3m_export::{export_dataset, ExportConcurrency, ExportOptions, OutputFormat, StopFlag};
use kl3m_parse::HfTokenizer;
use kl3m_store::{S3Config, S3ObjectStore};

#[derive(Parser, Debug)]
#[command(about = "Exports a dataset's stage-3 artifacts to gzipped JSONL")]
struct Cli {
    #[arg(long, env = "KL3M_BUCKET", default_value = "data.kl3m.ai")]
    bucket: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-2")]
    region: String,

    #[arg(long)]
    dataset_id: String,

    #[arg(long)]
    key_prefix: Option<String>,

    #[arg(long)]
    output: String,

    #[arg(long, value_enum, default_value = "tokens")]
    format: FormatArg,

    #[arg(long, default_value = "tokenizer.json")]
    tokenizer_path: Option<String>,

    #[arg(long)]
    no_dedup: bool,

    #[arg(long)]
    quality_threshold: Option<f64>,

    #[arg(long)]
    include_all_documents: bool,

    #[arg(long)]
    auto_tune: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Tokens,
    Text,
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

    let tokenizer = match (&cli.format, &cli.tokenizer_path) {
        (FormatArg::Text, None) => anyhow::bail!("--tokenizer-path is required for text-format export"),
        (_, Some(path)) => Some(HfTokenizer::from_file("canonical", path)?),
        (FormatArg::Tokens, None) => None,
    };

    let concurrency = if cli.auto_tune {
        ExportConcurrency::detect()
    } else {
        ExportConcurrency::fixed_defaults()
    };

    let opts = ExportOptions {
        format: match cli.format {
            FormatArg::Tokens => OutputFormat::Tokens,
            FormatArg::Text => OutputFormat::Text,
        },
        dedup: !cli.no_dedup,
        quality_threshold: cli.quality_threshold,
        include_all_documents: cli.include_all_documents,
        concurrency,
    };

    let file = File::create(&cli.output)?;
    let stats = export_dataset(
        store,
        &cli.dataset_id,
        cli.key_prefix.as_deref(),
        tokenizer.as_ref().map(|t| t as &dyn kl3m_core::Tokenizer),
        opts,
        StopFlag::new(),
        file,
    )
    .await?;

    tracing::info!(
        written = stats.written,
        duplicates_dropped = stats.duplicates_dropped,
        quality_dropped = stats.quality_dropped,
        fetch_errors = stats.fetch_errors,
        "export complete"
    );
    Ok(())
}
