//! Index Builder
//!
//! A blocking producer walks the history and feeds commit records through a
//! bounded channel; the async consumer normalizes, batches, embeds and upserts
//! them. At most one batch plus the channel capacity is held in memory.

use crate::embedding::EmbeddingProvider;
use crate::error::{ArchaeologistError, EmbeddingError, GitError, IndexError, Result};
use crate::git::{CommitDocument, CommitRecord, ExtractionOptions, HistoryWalker};
use crate::vector_db::CommitIndex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Where to read history from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySource {
    /// Local working copy
    pub path: PathBuf,
    /// Requested branch; configured fallbacks apply when it does not resolve
    pub branch: String,
}

impl RepositorySource {
    pub fn new(path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            branch: branch.into(),
        }
    }
}

/// Emitted after every stored batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub batches_completed: usize,
    pub commits_indexed: usize,
    /// Commits the walk is expected to yield
    pub estimated_total: usize,
}

/// Caller-side hooks for a build
#[derive(Debug, Clone, Default)]
pub struct BuildControl {
    pub progress: Option<mpsc::UnboundedSender<BuildProgress>>,
    /// Checked between batches; the batch in flight always completes
    pub cancel: CancellationToken,
}

/// Summary of a completed build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub repository: PathBuf,
    /// Branch actually walked
    pub branch: String,
    pub commits_indexed: usize,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Builds a fresh commit index from a repository's history
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn CommitIndex>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn CommitIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Replace the index with the history of `source`
    ///
    /// Repository and branch errors surface before the index is touched. Any
    /// later failure leaves a partial index behind; callers treat it as invalid.
    pub async fn build(
        &self,
        source: &RepositorySource,
        options: &ExtractionOptions,
        control: BuildControl,
    ) -> Result<BuildReport> {
        let start_time = Instant::now();

        tracing::info!(
            "Building commit index: repository='{}', branch='{}', limit={}",
            source.path.display(),
            source.branch,
            options.commit_limit
        );

        let (branch, estimated_total) = tokio::task::spawn_blocking({
            let path = source.path.clone();
            let branch = source.branch.clone();
            let options = options.clone();
            move || -> Result<(String, usize)> {
                let walker = HistoryWalker::open(&path)?;
                let resolved = match walker.resolve_branch(&branch, &options.fallback_branches) {
                    Ok((resolved, _)) => resolved,
                    Err(GitError::BranchNotFound { .. }) if !walker.has_commits() => {
                        return Err(IndexError::EmptyHistory.into());
                    }
                    Err(e) => return Err(e.into()),
                };
                let estimate = walker.estimate_commit_count(&resolved, &options)?;
                Ok((resolved, estimate))
            }
        })
        .await
        .map_err(|e| ArchaeologistError::other(format!("History scan task failed: {}", e)))??;

        tracing::info!(
            "Resolved branch '{}', about {} commits to index",
            branch,
            estimated_total
        );

        self.index
            .reset(self.embedder.dimension())
            .await
            .map_err(|e| IndexError::WriteFailed(format!("{:#}", e)))?;

        let (tx, mut rx) = mpsc::channel::<CommitRecord>(self.batch_size);

        let producer = tokio::task::spawn_blocking({
            let path = source.path.clone();
            let branch = branch.clone();
            let options = options.clone();
            move || -> std::result::Result<usize, GitError> {
                let walker = HistoryWalker::open(&path)?;
                let mut sent = 0;
                for record in walker.commits(&branch, &options)? {
                    if tx.blocking_send(record).is_err() {
                        tracing::debug!("Consumer stopped, ending history walk after {}", sent);
                        break;
                    }
                    sent += 1;
                }
                Ok(sent)
            }
        });

        let consumed = self
            .consume(&mut rx, options, &control, estimated_total)
            .await;

        // Unblocks the producer if the consumer bailed early
        drop(rx);
        let produced = producer
            .await
            .map_err(|e| ArchaeologistError::other(format!("History walk task failed: {}", e)))?;

        let (commits_indexed, batches) = consumed?;
        produced?;

        if commits_indexed == 0 {
            return Err(IndexError::EmptyHistory.into());
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexed {} commits in {} batches ({}ms)",
            commits_indexed,
            batches,
            duration_ms
        );

        Ok(BuildReport {
            repository: source.path.clone(),
            branch,
            commits_indexed,
            batches,
            duration_ms,
        })
    }

    /// Drain the channel in batches; returns (commits indexed, batches)
    async fn consume(
        &self,
        rx: &mut mpsc::Receiver<CommitRecord>,
        options: &ExtractionOptions,
        control: &BuildControl,
        estimated_total: usize,
    ) -> Result<(usize, usize)> {
        let mut batch: Vec<CommitDocument> = Vec::with_capacity(self.batch_size);
        let mut commits_indexed = 0;
        let mut batches = 0;

        loop {
            let exhausted = match rx.recv().await {
                Some(record) => {
                    batch.push(CommitDocument::new(record));
                    if batch.len() < self.batch_size {
                        continue;
                    }
                    false
                }
                None => true,
            };

            if !batch.is_empty() {
                let documents = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                commits_indexed += self
                    .write_batch(documents, options.store_changed_files)
                    .await?;
                batches += 1;

                tracing::debug!("Stored batch {} ({} commits so far)", batches, commits_indexed);

                if let Some(progress) = &control.progress {
                    // A dropped receiver only means nobody is watching
                    let _ = progress.send(BuildProgress {
                        batches_completed: batches,
                        commits_indexed,
                        estimated_total,
                    });
                }

                if !exhausted && control.cancel.is_cancelled() {
                    tracing::info!("Build cancelled after {} commits", commits_indexed);
                    return Err(IndexError::Cancelled {
                        indexed: commits_indexed,
                    }
                    .into());
                }
            }

            if exhausted {
                return Ok((commits_indexed, batches));
            }
        }
    }

    /// Embed and upsert one batch of documents
    async fn write_batch(
        &self,
        documents: Vec<CommitDocument>,
        store_changed_files: bool,
    ) -> Result<usize> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut metadata = Vec::with_capacity(documents.len());
        let mut contents = Vec::with_capacity(documents.len());

        for document in documents {
            metadata.push(document.metadata(store_changed_files));
            let (record, content) = document.into_parts();
            ids.push(record.hash);
            contents.push(content);
        }

        let embedder = self.embedder.clone();
        let texts = contents.clone();
        let embeddings = tokio::task::spawn_blocking(move || embedder.embed_batch(texts))
            .await
            .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?
            .map_err(crate::embedding::classify_error)?;

        if embeddings.len() != ids.len() {
            return Err(EmbeddingError::GenerationFailed(format!(
                "expected {} embeddings, got {}",
                ids.len(),
                embeddings.len()
            ))
            .into());
        }
        let expected = self.embedder.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: bad.len(),
            }
            .into());
        }

        self.index
            .upsert(embeddings, ids, metadata, contents)
            .await
            .map_err(|e| IndexError::WriteFailed(format!("{:#}", e)).into())
    }
}
