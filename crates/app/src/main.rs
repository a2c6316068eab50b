use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ragline_core::{
    AnswerSynthesizer, ChunkingConfig, CompletionConfig, DocumentListing, DocumentStore,
    HashSeededEmbedder, InMemoryStore, Ingestor, OpenAiChatModel, PipelineConfig, PipelineError,
    QueryRequest, Retriever, SupabaseStore,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type SharedStore = Arc<dyn DocumentStore + Send + Sync>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    /// Supabase/PostgREST tables and the `match_chunks` function.
    Supabase,
    /// Process-local store; contents are lost on exit.
    Memory,
}

#[derive(Parser)]
#[command(name = "ragline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Which document store to use
    #[arg(long, env = "RAG_STORE", value_enum, default_value = "supabase")]
    store: StoreKind,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Supabase service key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    supabase_key: Option<String>,

    /// OpenAI-compatible API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Completion model identifier
    #[arg(long, env = "RAG_COMPLETION_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Seconds to wait for the language model before giving up
    #[arg(long, env = "RAG_COMPLETION_TIMEOUT_SECS", default_value = "60")]
    completion_timeout_secs: u64,

    /// Characters per chunk
    #[arg(long, default_value = "800")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value = "100")]
    chunk_overlap: usize,

    /// Ingest this folder before running the command (useful with `--store memory`)
    #[arg(long)]
    preload: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a single .txt or .md file.
    Ingest {
        /// File to ingest.
        #[arg(long)]
        file: PathBuf,
    },
    /// Ingest every .txt and .md file under a folder, recursively.
    IngestFolder {
        /// Folder to walk.
        #[arg(long)]
        folder: PathBuf,
    },
    /// List ingested documents.
    List,
    /// Show the chunks retrieved for a question without calling the model.
    Retrieve {
        /// Question text.
        #[arg(long)]
        question: String,
        /// Number of chunks to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Answer a question from retrieved context.
    Query {
        /// Question text.
        #[arg(long)]
        question: Option<String>,
    },
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let config = PipelineConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            ..PipelineConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn build_store(&self, dimensions: usize) -> anyhow::Result<SharedStore> {
        match self.store {
            StoreKind::Memory => Ok(Arc::new(InMemoryStore::new(dimensions))),
            StoreKind::Supabase => {
                let url = self
                    .supabase_url
                    .as_deref()
                    .context("SUPABASE_URL is not set")?;
                let key = self
                    .supabase_key
                    .as_deref()
                    .context("SUPABASE_KEY is not set")?;
                Ok(Arc::new(SupabaseStore::new(url, key, dimensions)?))
            }
        }
    }

    fn build_model(&self) -> anyhow::Result<OpenAiChatModel> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY is not set")?;
        let config = CompletionConfig {
            model: self.model.clone(),
            endpoint: self.openai_base_url.clone(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(self.completion_timeout_secs),
        };
        Ok(OpenAiChatModel::new(config)?)
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn ingest_folder(
    ingestor: &Ingestor<SharedStore, HashSeededEmbedder>,
    folder: &Path,
) -> anyhow::Result<()> {
    let report = ingestor.ingest_folder(folder).await?;

    for skipped in &report.skipped_files {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
    }
    info!(
        folder = %folder.display(),
        documents = report.documents.len(),
        chunk_count = report.chunk_count(),
        "folder ingested"
    );

    print_json(&report.documents)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    // a missing .env file is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.pipeline_config()?;

    let embedder = HashSeededEmbedder::new(config.embedding_dimensions);
    let store = cli.build_store(config.embedding_dimensions)?;
    let ingestor = Ingestor::new(
        store.clone(),
        embedder,
        ChunkingConfig::from(config.clone()),
    );

    info!(
        version = app_version,
        store = ?cli.store,
        started_at = %Utc::now().to_rfc3339(),
        "ragline boot"
    );

    if let Some(folder) = &cli.preload {
        ingest_folder(&ingestor, folder).await?;
    }

    match &cli.command {
        Command::Ingest { file } => {
            let receipt = ingestor.ingest_path(file).await?;
            print_json(&receipt)?;
        }
        Command::IngestFolder { folder } => {
            ingest_folder(&ingestor, folder).await?;
        }
        Command::List => {
            let documents = store.list_documents().await?;
            print_json(&DocumentListing::from(documents))?;
        }
        Command::Retrieve { question, top_k } => {
            let retriever = Retriever::new(store.clone(), embedder);
            let hits = retriever.retrieve(question, *top_k).await?;
            print_json(&json!({ "sources": hits }))?;
        }
        Command::Query { question } => {
            let synthesizer = AnswerSynthesizer::new(
                Retriever::new(store.clone(), embedder),
                cli.build_model()?,
                config.top_k,
            );
            let request = QueryRequest {
                question: question.clone(),
            };

            match synthesizer.answer_request(&request).await {
                Ok(answer) => print_json(&answer)?,
                Err(PipelineError::Generation(error)) => {
                    print_json(&json!({
                        "answer": null,
                        "error": error.message,
                        "sources": error.sources,
                    }))?;
                    return Err(anyhow!("relevant passages found but no answer generated"));
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    Ok(())
}
