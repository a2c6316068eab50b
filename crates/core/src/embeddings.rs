use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

const DEFAULT: usize = 384;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

pub trait Embedder {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Placeholder embedder: the SHA-256 digest of the UTF-8 text seeds a
/// ChaCha8 generator, which draws `dimensions` uniform values in `[0, 1)`.
///
/// No semantic similarity is encoded. The hash, generator and draw order are
/// part of the stored-vector format: changing any of them invalidates every
/// embedding already persisted.
#[derive(Debug, Clone, Copy)]
pub struct HashSeededEmbedder {
    pub dimensions: usize,
}

impl Default for HashSeededEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashSeededEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn seed(text: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hasher.finalize());
        seed
    }
}

impl Embedder for HashSeededEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        // generator is local to the call; nothing is shared between embeds
        let mut rng = ChaCha8Rng::from_seed(Self::seed(text));
        (0..self.dimensions).map(|_| rng.gen::<f32>()).collect()
    }
}
