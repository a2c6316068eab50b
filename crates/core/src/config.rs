use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::error::ValidationError;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embedding_dimensions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chunk_size == 0 {
            return Err(ValidationError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ValidationError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(ValidationError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(ValidationError::InvalidArgument(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.embedding_dimensions, 384);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidChunkConfig(_))
        ));
    }
}
