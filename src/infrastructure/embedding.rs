use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;

use crate::domain::Embedder;
use crate::error::{RagError, RagResult};

/// Dimension of the default model, all-MiniLM-L6-v2.
pub const MINILM_DIMENSION: usize = 384;

/// A struct responsible for generating text embeddings using a pre-initialized model.
pub struct EmbeddingGenerator {
    model: TextEmbedding,
    dimension: usize,
}

impl EmbeddingGenerator {
    /// Creates a new EmbeddingGenerator, initializing the specified embedding model.
    ///
    /// # Arguments
    ///
    /// * `model_name` - The embedding model to use (e.g., EmbeddingModel::AllMiniLML6V2).
    /// * `cache_dir` - The cache directory for the model weights (None for fastembed's default).
    ///
    /// Loading may download the weights on first use, so call this off the async runtime.
    pub fn new(model_name: EmbeddingModel, cache_dir: Option<PathBuf>) -> RagResult<Self> {
        let dimension = TextEmbedding::list_supported_models()
            .iter()
            .find(|m| m.model == model_name)
            .map(|m| m.dim)
            .ok_or_else(|| RagError::Embedding(format!("unsupported embedding model {:?}", model_name)))?;

        let mut opts = InitOptions::new(model_name);
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(opts).map_err(|e| RagError::Embedding(e.to_string()))?;
        log::info!("Embedding model loaded ({} dimensions).", dimension);
        Ok(EmbeddingGenerator { model, dimension })
    }

    /// The model used for every paragraph and query: all-MiniLM-L6-v2.
    pub fn minilm(cache_dir: Option<PathBuf>) -> RagResult<Self> {
        Self::new(EmbeddingModel::AllMiniLML6V2, cache_dir)
    }
}

impl Embedder for EmbeddingGenerator {
    fn embed(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "model returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
