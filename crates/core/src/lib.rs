pub mod answer;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod stores;
pub mod traits;

pub use answer::{build_context, build_prompt, AnswerSynthesizer, NO_RELEVANT_INFORMATION};
pub use chunking::{chunk_text, ChunkingConfig};
pub use completion::OpenAiChatModel;
pub use config::{CompletionConfig, PipelineConfig};
pub use embeddings::{Embedder, HashSeededEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{CompletionFailure, GenerationError, PipelineError, StoreError, ValidationError};
pub use ingest::{
    decode_lossy, discover_text_files, validate_upload_name, IngestionReport, Ingestor,
    SkippedFile,
};
pub use models::{
    Answer, ChunkRecord, Document, DocumentListing, DocumentSummary, IngestReceipt,
    QueryRequest, ScoredChunk,
};
pub use retrieval::Retriever;
pub use stores::{InMemoryStore, SupabaseStore};
pub use traits::{CompletionModel, DocumentStore};
