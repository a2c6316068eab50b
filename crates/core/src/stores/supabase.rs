use crate::models::{Document, ScoredChunk};
use crate::traits::DocumentStore;
use crate::StoreError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "supabase";

/// Supabase/PostgREST-backed store.
///
/// Expects a `documents (id, filename)` table, a
/// `document_chunks (document_id, content, embedding vector(N))` table with a
/// cascading foreign key, and a `match_chunks(query_embedding, match_count)`
/// function returning `content`, `document_id` and `similarity` ordered by
/// cosine similarity.
pub struct SupabaseStore {
    rest_url: Url,
    api_key: String,
    client: Client,
    vector_size: usize,
}

impl SupabaseStore {
    pub fn new(
        project_url: &str,
        api_key: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        let mut base = project_url.trim_end_matches('/').to_string();
        base.push_str("/rest/v1/");
        Ok(Self {
            rest_url: Url::parse(&base)?,
            api_key: api_key.into(),
            client: Client::new(),
            vector_size,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.rest_url.join(path)?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
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

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        },
    })
}

fn missing_field(field: &str) -> StoreError {
    StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("match_chunks row missing {field}"),
    }
}

fn parse_match_row(row: &Value) -> Result<ScoredChunk, StoreError> {
    let content = row
        .pointer("/content")
        .and_then(Value::as_str)
        .ok_or_else(|| missing_field("content"))?;
    let score = row
        .pointer("/similarity")
        .or_else(|| row.pointer("/score"))
        .and_then(Value::as_f64)
        .ok_or_else(|| missing_field("similarity"))?;
    let document_id = row
        .pointer("/document_id")
        .and_then(Value::as_str)
        .ok_or_else(|| missing_field("document_id"))?;

    Ok(ScoredChunk {
        content: content.to_string(),
        score,
        document_id: document_id.to_string(),
    })
}

/// Converts `match_chunks` rows into ranked hits.
///
/// Rows are re-sorted (stably) by descending similarity so callers always see
/// a non-increasing sequence, whatever order the function returned.
pub fn parse_match_rows(parsed: &Value) -> Result<Vec<ScoredChunk>, StoreError> {
    let rows = parsed.as_array().ok_or_else(|| StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: "match_chunks did not return an array".to_string(),
    })?;

    let mut hits = rows.iter().map(parse_match_row).collect::<Result<Vec<_>, _>>()?;

    hits.sort_by(|left, right| right.score.total_cmp(&left.score));
    Ok(hits)
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn create_document(&self, name: &str) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let response = self
            .authorized(self.client.post(self.endpoint("documents")?))
            .header("Prefer", "return=minimal")
            .json(&json!({ "id": id, "filename": name }))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(id)
    }

    async fn insert_chunk(
        &self,
        document_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        self.check_dimensions(embedding)?;

        let response = self
            .authorized(self.client.post(self.endpoint("document_chunks")?))
            .header("Prefer", "return=minimal")
            .json(&json!({
                "document_id": document_id,
                "content": content,
                "embedding": embedding,
            }))
            .send()
            .await?;

        // PostgREST reports a missing parent as a foreign-key conflict
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(StoreError::UnknownDocument(document_id.to_string()));
        }
        ensure_success(response).await?;
        debug!(document.id = document_id, chars = content.len(), "chunk stored");
        Ok(())
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.check_dimensions(query_embedding)?;

        let response = self
            .authorized(self.client.post(self.endpoint("rpc/match_chunks")?))
            .json(&json!({
                "query_embedding": query_embedding,
                "match_count": k,
            }))
            .send()
            .await?;

        let parsed: Value = ensure_success(response).await?.json().await?;
        let mut hits = parse_match_rows(&parsed)?;
        hits.truncate(k);
        Ok(hits)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let mut url = self.endpoint("documents")?;
        url.query_pairs_mut().append_pair("select", "id,filename");

        let response = self.authorized(self.client.get(url)).send().await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
