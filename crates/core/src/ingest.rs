use crate::chunking::{chunk_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{PipelineError, Result, ValidationError};
use crate::models::IngestReceipt;
use crate::traits::DocumentStore;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["txt", "md"];

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

pub fn validate_upload_name(filename: &str) -> Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::MissingFileName);
    }

    if !has_allowed_extension(Path::new(filename)) {
        return Err(ValidationError::UnsupportedExtension {
            filename: filename.to_string(),
        });
    }

    Ok(())
}

/// Decodes UTF-8, dropping any byte sequence that is not valid UTF-8.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut decoded = String::with_capacity(bytes.len());
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                decoded.push_str(valid);
                break;
            }
            Err(error) => {
                let (valid, after) = rest.split_at(error.valid_up_to());
                if let Ok(valid) = std::str::from_utf8(valid) {
                    decoded.push_str(valid);
                }
                match error.error_len() {
                    Some(invalid) => rest = &after[invalid..],
                    // truncated sequence at the end of input
                    None => break,
                }
            }
        }
    }

    decoded
}

pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if entry.file_type().is_file() && has_allowed_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub documents: Vec<IngestReceipt>,
    pub skipped_files: Vec<SkippedFile>,
}

impl IngestionReport {
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|doc| doc.chunk_count).sum()
    }
}

/// Document ingestion: validate, decode, chunk, embed, persist.
///
/// Chunks are inserted one at a time. If chunk N fails, chunks before it stay
/// in the store and the error is returned; there is no rollback.
pub struct Ingestor<S, E>
where
    S: DocumentStore,
    E: Embedder,
{
    store: S,
    embedder: E,
    chunking: ChunkingConfig,
}

impl<S, E> Ingestor<S, E>
where
    S: DocumentStore + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(store: S, embedder: E, chunking: ChunkingConfig) -> Self {
        Self {
            store,
            embedder,
            chunking,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReceipt> {
        validate_upload_name(filename)?;

        let text = decode_lossy(bytes);
        let chunks = chunk_text(&text, self.chunking)?;
        let document_id = self.store.create_document(filename).await?;

        for (index, chunk) in chunks.iter().enumerate() {
            let embedding = self.embedder.embed(chunk);
            if let Err(error) = self.store.insert_chunk(&document_id, chunk, &embedding).await {
                warn!(
                    document.id = %document_id,
                    stored = index,
                    total = chunks.len(),
                    error = %error,
                    "chunk insert failed; earlier chunks remain stored"
                );
                return Err(error.into());
            }
            debug!(document.id = %document_id, chunk_index = index, "chunk ingested");
        }

        info!(
            document.id = %document_id,
            filename = filename,
            chunk_count = chunks.len(),
            "document ingested"
        );

        Ok(IngestReceipt {
            id: document_id,
            filename: filename.to_string(),
            chunk_count: chunks.len(),
        })
    }

    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReceipt> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(ValidationError::MissingFileName)?;
        validate_upload_name(filename)?;

        let bytes = tokio::fs::read(path).await?;
        self.ingest(filename, &bytes).await
    }

    /// Ingests every `.txt`/`.md` file under `folder`.
    ///
    /// Unreadable or rejected files are skipped and reported; a store failure
    /// stops the run.
    pub async fn ingest_folder(&self, folder: &Path) -> Result<IngestionReport> {
        let files = discover_text_files(folder);

        if files.is_empty() {
            return Err(ValidationError::InvalidArgument(format!(
                "no .txt or .md files found in {}",
                folder.display()
            ))
            .into());
        }

        let mut documents = Vec::new();
        let mut skipped_files = Vec::new();

        for path in files {
            match self.ingest_path(&path).await {
                Ok(receipt) => documents.push(receipt),
                Err(PipelineError::Store(error)) => return Err(error.into()),
                Err(error) => skipped_files.push(SkippedFile {
                    path,
                    reason: error.to_string(),
                }),
            }
        }

        Ok(IngestionReport {
            documents,
            skipped_files,
        })
    }
}
