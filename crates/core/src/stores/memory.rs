use crate::models::{ChunkRecord, Document, ScoredChunk};
use crate::traits::DocumentStore;
use crate::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store ranking chunks by cosine similarity.
///
/// Rows live in insertion order, and the ranking sort is stable, so equal
/// scores come back in the order their chunks were inserted.
#[derive(Debug)]
pub struct InMemoryStore {
    vector_size: usize,
    documents: RwLock<Vec<Document>>,
    chunks: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new(vector_size: usize) -> Self {
        Self {
            vector_size,
            documents: RwLock::new(Vec::new()),
            chunks: RwLock::new(Vec::new()),
        }
    }

    pub async fn chunk_count(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn chunks_for(&self, document_id: &str) -> Vec<ChunkRecord> {
        self.chunks
            .read()
            .await
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
            .cloned()
            .collect()
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.vector_size {
            return Err(StoreError::DimensionMismatch {
                expected: self.vector_size,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot: f64 = left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    let left_norm = left.iter().map(|a| f64::from(*a).powi(2)).sum::<f64>().sqrt();
    let right_norm = right.iter().map(|b| f64::from(*b).powi(2)).sum::<f64>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(&self, name: &str) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.documents.write().await.push(Document {
            id: id.clone(),
            filename: name.to_string(),
            created_at: Some(Utc::now()),
        });
        Ok(id)
    }

    async fn insert_chunk(
        &self,
        document_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        self.check_dimensions(embedding)?;

        let known = self
            .documents
            .read()
            .await
            .iter()
            .any(|document| document.id == document_id);
        if !known {
            return Err(StoreError::UnknownDocument(document_id.to_string()));
        }

        self.chunks.write().await.push(ChunkRecord {
            document_id: document_id.to_string(),
            content: content.to_string(),
            embedding: embedding.to_vec(),
        });
        Ok(())
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.check_dimensions(query_embedding)?;

        let chunks = self.chunks.read().await;
        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .map(|chunk| ScoredChunk {
                content: chunk.content.clone(),
                score: cosine_similarity(&chunk.embedding, query_embedding),
                document_id: chunk.document_id.clone(),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents.read().await.clone())
    }
}
