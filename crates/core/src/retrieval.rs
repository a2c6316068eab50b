use crate::embeddings::Embedder;
use crate::error::{Result, ValidationError};
use crate::models::ScoredChunk;
use crate::traits::DocumentStore;
use tracing::info;

/// Turns a question into ranked context chunks: embed, then search.
pub struct Retriever<S, E>
where
    S: DocumentStore,
    E: Embedder,
{
    store: S,
    embedder: E,
}

impl<S, E> Retriever<S, E>
where
    S: DocumentStore + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(store: S, embedder: E) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns up to `k` chunks, highest similarity first, exactly as the
    /// store ranked them. Blank questions are rejected before any embedding
    /// or store call.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if question.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion.into());
        }
        if k == 0 {
            return Err(
                ValidationError::InvalidArgument("k must be greater than zero".to_string()).into(),
            );
        }

        let query_vector = self.embedder.embed(question);
        let hits = self.store.similarity_search(&query_vector, k).await?;

        info!(top_k = k, hits = hits.len(), "retrieved context");
        Ok(hits)
    }
}
