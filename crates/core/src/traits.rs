use crate::error::{CompletionFailure, StoreError};
use crate::models::{Document, ScoredChunk};
use async_trait::async_trait;
use std::sync::Arc;

/// Persistence for documents and their embedded chunks.
///
/// Chunks are owned by their document: a store that supports deletion must
/// remove a document's chunks together with it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists a new document and returns its freshly assigned id.
    async fn create_document(&self, name: &str) -> Result<String, StoreError>;

    async fn insert_chunk(
        &self,
        document_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError>;

    /// Up to `k` chunks, most similar first. An empty store yields no rows.
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;
}

#[async_trait]
impl<T> DocumentStore for Arc<T>
where
    T: DocumentStore + ?Sized,
{
    async fn create_document(&self, name: &str) -> Result<String, StoreError> {
        (**self).create_document(name).await
    }

    async fn insert_chunk(
        &self,
        document_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        (**self).insert_chunk(document_id, content, embedding).await
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        (**self).similarity_search(query_embedding, k).await
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        (**self).list_documents().await
    }
}

/// Single-shot prompt in, text out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionFailure>;
}
