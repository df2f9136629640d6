//! Training-sample Producer: tokenizes source documents, feeds
//! them to every enabled task handler, windows and pads the result, and
//! pushes the samples onto the broker's queues. Ported from
//! `kl3m_data/api/loader/base.py`.

mod buffer;
mod convert;
mod source;

use std::sync::Arc;

use clap::Parser;
use rand::SeedableRng;

use kl3m_core::{KlResult, QueueStore, Tokenizer};
use kl3m_parse::HfTokenizer;
use kl3m_store::RedisQueueStore;
use kl3m_tasks::{process_clm, process_lmlm, process_mlm, process_pmlm, window_sample, LmlmState, SpecialTokens, TaskKind};

use buffer::SampleBuffers;
use convert::convert_tokenizer;
use source::DatasetSource;

#[derive(Parser, Debug)]
#[command(about = "Training-sample producer for kl3m sample queues")]
struct Args {
    #[arg(long, env = "KL3M_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[arg(long, value_delimiter = ',')]
    datasets: Vec<String>,

    #[arg(long, default_value = "source_tokenizer.json")]
    source_tokenizer_path: String,

    #[arg(long, default_value = "target_tokenizer.json")]
    target_tokenizer_path: String,

    #[arg(long, value_delimiter = ',', default_value = "mlm,pmlm,lmlm,clm")]
    tasks: Vec<String>,

    #[arg(long, default_value_t = 512)]
    sequence_length: usize,

    #[arg(long, default_value_t = 64)]
    flush_batch_size: usize,

    #[arg(long, default_value_t = true)]
    shuffle: bool,

    #[arg(long, env = "KL3M_BUCKET", default_value = "data.kl3m.ai")]
    bucket: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-2")]
    region: String,
}

fn parse_task(name: &str) -> Option<TaskKind> {
    match name {
        "mlm" => Some(TaskKind::Mlm),
        "pmlm" => Some(TaskKind::Pmlm),
        "lmlm" => Some(TaskKind::Lmlm),
        "clm" => Some(TaskKind::Clm),
        _ => None,
    }
}

async fn run(args: Args, stop: Arc<std::sync::atomic::AtomicBool>) -> KlResult<()> {
    let queue_store = RedisQueueStore::connect(&args.redis_url)
        .await
        .map_err(kl3m_core::KlError::Other)?;

    let source_tokenizer = HfTokenizer::from_file("source", &args.source_tokenizer_path)?;
    let target_tokenizer = HfTokenizer::from_file("target", &args.target_tokenizer_path)?;
    let special = SpecialTokens::resolve(&target_tokenizer)?;
    let lmlm_state = LmlmState::new(&target_tokenizer)?;

    let tasks: Vec<TaskKind> = args.tasks.iter().filter_map(|t| parse_task(t)).collect();
    let object_store = kl3m_store::S3ObjectStore::new(kl3m_store::S3Config {
        bucket: args.bucket.clone(),
        region: args.region.clone(),
        ..Default::default()
    })
    .map_err(kl3m_core::KlError::Other)?;
    let store: Arc<dyn kl3m_core::ObjectStore> = Arc::new(object_store);
    let mut source = DatasetSource::new(store, args.datasets.clone(), args.shuffle);
    let mut buffers = SampleBuffers::new(args.sequence_length, args.flush_batch_size);
    let mut rng = rand::rngs::StdRng::from_entropy();

    while !stop.load(std::sync::atomic::Ordering::SeqCst) {
        let Some(doc) = source.next().await? else {
            break;
        };

        let tokens = convert_tokenizer(&doc.tokens, &source_tokenizer, &target_tokenizer)?;

        for &task in &tasks {
            let processed = match task {
                TaskKind::Mlm => process_mlm(&tokens, &special, &mut rng),
                TaskKind::Pmlm => process_pmlm(&tokens, &special, target_tokenizer.vocab_size(), &mut rng),
                TaskKind::Lmlm => process_lmlm(&tokens, &special, &lmlm_state, &mut rng),
                TaskKind::Clm => process_clm(&tokens),
            };

            for sample in &processed {
                let (start, end) = task.sequence_bounds(&special);
                for window in window_sample(sample, args.sequence_length, start, end, special.pad) {
                    buffers.offer(task, &doc.dataset_id, window, &queue_store as &dyn QueueStore).await?;
                }
            }
        }
    }

    buffers.flush_all(&queue_store as &dyn QueueStore).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_for_signal = stop.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        stop_for_signal.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    run(args, stop).await?;
    Ok(())
}
