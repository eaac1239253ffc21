use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, IndexError, Result, ValidationError};
use crate::types::CommitHit;
use crate::vector_db::CommitIndex;
use std::sync::Arc;

/// Semantic search over a built commit index
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn CommitIndex>,
}

impl Retriever {
    /// `embedder` must be the provider the index was built with
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn CommitIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `k` commits most relevant to `query`, best first
    pub async fn search(&self, query: &str, k: usize, min_score: f32) -> Result<Vec<CommitHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::Empty("query".to_string()).into());
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let exists = self
            .index
            .exists()
            .await
            .map_err(|e| IndexError::ReadFailed(format!("{:#}", e)))?;
        if !exists {
            return Err(IndexError::NotFound.into());
        }

        tracing::debug!("Searching commit index: query='{}', k={}", query, k);

        let embedder = self.embedder.clone();
        let text = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed_query(&text))
            .await
            .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?
            .map_err(crate::embedding::classify_error)?;

        let hits = self
            .index
            .search(query_vector, k, min_score)
            .await
            .map_err(|e| IndexError::ReadFailed(format!("{:#}", e)))?;

        tracing::info!("Retrieved {} commits for '{}'", hits.len(), query);
        Ok(hits)
    }
}
