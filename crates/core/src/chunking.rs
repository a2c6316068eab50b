use crate::config::PipelineConfig;
use crate::error::ValidationError;

/// Sliding-window settings, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        PipelineConfig::default().into()
    }
}

impl From<PipelineConfig> for ChunkingConfig {
    fn from(value: PipelineConfig) -> Self {
        Self {
            size: value.chunk_size,
            overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ValidationError> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.size == 0 {
            return Err(ValidationError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.size {
            return Err(ValidationError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap, self.size
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.size - self.overlap
    }
}

/// Splits `text` into windows of `config.size` characters, each starting
/// `size - overlap` characters after the previous one.
///
/// The window stops advancing once it has reached the end of the text, so the
/// last chunk may be shorter than `size` and is never fully contained in its
/// predecessor. Empty text yields no chunks.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, ValidationError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += config.stride();
    }

    Ok(chunks)
}
