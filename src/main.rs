use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::{error, info};
use std::path::PathBuf;
use std::time::Duration;

use rag_deck::config::{
    ContextPolicy, PipelineConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_TOP_K,
};
use rag_deck::database::{MemoryStore, QdrantConfig, QdrantStore, VectorStore};
use rag_deck::events::RunEvent;
use rag_deck::gemini::{GeminiClient, GeminiConfig};
use rag_deck::openai::{OpenAiClient, OpenAiConfig};
use rag_deck::provider::{EmbeddingProvider, TextGenerator};
use rag_deck::rag::RagPipeline;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    Gemini,
    Openai,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Store {
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContextMode {
    None,
    Shared,
    PerSlide,
}

/// Generate a slide deck on a topic, grounded in a local document collection
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Topic of the presentation
    #[arg(index = 1)]
    topic: String,

    /// Directory of reference documents (text and PDF)
    #[arg(long, default_value = "doc")]
    corpus: PathBuf,

    /// Directory the presentation is written to
    #[arg(long, default_value = "doc")]
    output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Provider::Gemini)]
    provider: Provider,

    /// Vector store backing the index
    #[arg(long, value_enum, default_value_t = Store::Memory)]
    store: Store,

    /// Maximum chunk length in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: usize,

    /// Chunks retrieved per query
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// How retrieved context is used for slide bodies
    #[arg(long, value_enum, default_value_t = ContextMode::PerSlide)]
    context: ContextMode,

    /// Slide bodies generated in parallel
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Timeout for each provider request
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Print an HTML download link with the presentation embedded as a data URI
    #[arg(long)]
    data_uri: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let topic = args.topic.trim().to_string();
    if topic.is_empty() {
        info!("Empty topic; nothing to generate");
        return Ok(());
    }

    let timeout = Duration::from_secs(args.timeout_secs);
    let config = PipelineConfig {
        corpus_dir: args.corpus.clone(),
        output_dir: args.output_dir.clone(),
        chunk_size: args.chunk_size,
        chunk_overlap: args.overlap,
        top_k: args.top_k,
        concurrency: args.concurrency,
        request_timeout: timeout,
        context_policy: match args.context {
            ContextMode::None => ContextPolicy::None,
            ContextMode::Shared => ContextPolicy::Shared,
            ContextMode::PerSlide => ContextPolicy::PerSlide,
        },
        ..PipelineConfig::default()
    };

    match args.provider {
        Provider::Gemini => {
            let mut gemini_config = GeminiConfig::from_env().context("Missing GEMINI_API_KEY")?;
            gemini_config.timeout = timeout;
            let gemini = GeminiClient::new(gemini_config)?;
            with_store(&args, config, gemini.clone(), gemini, &topic).await
        }
        Provider::Openai => {
            let mut openai_config = OpenAiConfig::from_env().context("Missing OPENAI_API_KEY")?;
            openai_config.timeout = timeout;
            let openai = OpenAiClient::new(openai_config)?;
            with_store(&args, config, openai.clone(), openai, &topic).await
        }
    }
}

async fn with_store<E, G>(
    args: &Args,
    config: PipelineConfig,
    embedder: E,
    generator: G,
    topic: &str,
) -> Result<()>
where
    E: EmbeddingProvider,
    G: TextGenerator,
{
    match args.store {
        Store::Memory => {
            run(config, embedder, generator, MemoryStore::new(), topic, args.data_uri).await
        }
        Store::Qdrant => {
            let qdrant_config = QdrantConfig::from_env().context("Missing QDRANT_URL")?;
            let label = args.corpus.display().to_string();
            let store = QdrantStore::new(qdrant_config, &label)?;
            run(config, embedder, generator, store, topic, args.data_uri).await
        }
    }
}

async fn run<E, G, S>(
    config: PipelineConfig,
    embedder: E,
    generator: G,
    store: S,
    topic: &str,
    print_data_uri: bool,
) -> Result<()>
where
    E: EmbeddingProvider,
    G: TextGenerator,
    S: VectorStore,
{
    info!("Indexing corpus in {}", config.corpus_dir.display());
    let pipeline = RagPipeline::build(config, embedder, generator, store)
        .await
        .context("Failed to build the document index")?;
    if let Some(chunks) = pipeline.indexed_chunks() {
        info!("Index ready with {} chunks", chunks);
    }

    pipeline
        .run(topic, |event| match event {
            RunEvent::Started { topic } => {
                info!("Generating presentation for '{}'... Please wait.", topic)
            }
            RunEvent::Succeeded {
                path,
                slide_count,
                download,
            } => {
                info!(
                    "Presentation generated successfully: {} slides at {}",
                    slide_count,
                    path.display()
                );
                if print_data_uri {
                    println!("{}", download.to_html());
                }
            }
            RunEvent::Failed { kind, message } => error!("{}: {}", kind, message),
        })
        .await?;

    Ok(())
}
