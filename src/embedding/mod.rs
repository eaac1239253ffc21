mod fastembed_manager;

pub use fastembed_manager::{FastEmbedManager, SUPPORTED_MODELS};

use crate::error::EmbeddingError;
use anyhow::Result;

/// Trait for embedding generation
///
/// The same provider must embed both commit documents and search queries.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text, one vector per input in order
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Embed a single query string
    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector for query"))
    }
}

/// Recover a typed embedding failure from a provider error
///
/// Providers that raise an [`EmbeddingError`] keep its variant; anything else
/// is reported as a generation failure.
pub(crate) fn classify_error(err: anyhow::Error) -> EmbeddingError {
    match err.downcast::<EmbeddingError>() {
        Ok(typed) => typed,
        Err(other) => EmbeddingError::GenerationFailed(format!("{:#}", other)),
    }
}
