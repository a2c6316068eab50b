use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A chunk as persisted: its text, its parent and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub document_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// One row of a similarity search, also used as a cited source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub content: String,
    pub score: f64,
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReceipt {
    pub id: String,
    pub filename: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentListing {
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
}

impl From<Document> for DocumentSummary {
    fn from(value: Document) -> Self {
        Self {
            id: value.id,
            filename: value.filename,
        }
    }
}

impl From<Vec<Document>> for DocumentListing {
    fn from(value: Vec<Document>) -> Self {
        Self {
            documents: value.into_iter().map(DocumentSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
}
