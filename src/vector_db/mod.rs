// LanceDB is the embedded store backing each session's index
pub mod lance_client;
pub use lance_client::LanceCommitIndex;

use crate::git::CommitMetadata;
use crate::types::CommitHit;
use anyhow::Result;

/// Trait for the per-session commit index
///
/// Keys are commit hashes; writes with an existing key replace the row.
#[async_trait::async_trait]
pub trait CommitIndex: Send + Sync {
    /// Drop any existing table and create an empty one for `dimension`-sized vectors
    async fn reset(&self, dimension: usize) -> Result<()>;

    /// Insert or replace rows keyed by `ids`
    async fn upsert(
        &self,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadata: Vec<CommitMetadata>,
        contents: Vec<String>,
    ) -> Result<usize>;

    /// Nearest commits to `query_vector`, best first, dropping hits under `min_score`
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<CommitHit>>;

    /// Whether the table has been created
    async fn exists(&self) -> Result<bool>;

    /// Number of rows (0 when the table does not exist)
    async fn count(&self) -> Result<usize>;

    /// All stored commit hashes
    async fn ids(&self) -> Result<Vec<String>>;

    /// Remove the table if present
    async fn drop_index(&self) -> Result<()>;
}
