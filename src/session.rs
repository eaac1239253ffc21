//! Session-scoped resources
//!
//! A session owns `{sessions_dir}/{id}/` with an `index/` directory for the
//! commit index and a `repo/` directory for cloned repositories. Everything
//! under it is released on [`Session::teardown`] or when the session drops.

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, FastEmbedManager};
use crate::error::{ArchaeologistError, EmbeddingError, IndexError, Result};
use crate::git::{ExtractionOptions, clone_repository};
use crate::pipeline::{BuildControl, BuildReport, IndexBuilder, RepositorySource};
use crate::retriever::Retriever;
use crate::types::CommitHit;
use crate::vector_db::{CommitIndex, LanceCommitIndex};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// What the active index was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexState {
    pub repository: PathBuf,
    pub branch: String,
    pub commits_indexed: usize,
    /// Embedding model used at build time; queries must use the same one
    pub model_name: String,
    pub built_at: i64,
}

/// One user's analysis workspace: a single index guarded by a read/write lock
pub struct Session {
    id: String,
    root: PathBuf,
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<LanceCommitIndex>,
    state: RwLock<Option<IndexState>>,
    torn_down: AtomicBool,
}

impl Session {
    /// Open a session with the configured FastEmbed model
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let embedding_config = config.embedding.clone();
        let embedder = tokio::task::spawn_blocking(move || {
            FastEmbedManager::from_config(&embedding_config)
        })
        .await
        .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?
        .map_err(|e| EmbeddingError::InitializationFailed(format!("{:#}", e)))?;

        Self::with_provider(config, Arc::new(embedder)).await
    }

    /// Open a session with an explicit embedding provider
    pub async fn with_provider(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let id = new_session_id();
        let root = config.session.sessions_dir.join(&id);
        tokio::fs::create_dir_all(root.join("index")).await?;
        tokio::fs::create_dir_all(root.join("repo")).await?;

        let index = LanceCommitIndex::with_path(&root.join("index"), &config.indexing.table_name)
            .await
            .map_err(|e| IndexError::WriteFailed(format!("{:#}", e)))?;

        tracing::info!(
            "Opened session {} at {} (model: {})",
            id,
            root.display(),
            embedder.model_name()
        );

        Ok(Self {
            id,
            root,
            config,
            embedder,
            index: Arc::new(index),
            state: RwLock::new(None),
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.root.join("repo")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Extraction options from configuration, optionally overriding the commit limit
    pub fn extraction_options(&self, commit_limit: Option<usize>) -> Result<ExtractionOptions> {
        let options = ExtractionOptions::from_config(&self.config.extraction)?;
        Ok(match commit_limit {
            Some(limit) => options.with_commit_limit(limit),
            None => options,
        })
    }

    /// Snapshot of the active index, if any
    pub async fn state(&self) -> Option<IndexState> {
        self.state.read().await.clone()
    }

    /// Clone `url` into the session's repo directory, replacing any previous clone
    ///
    /// `depth` limits fetched history (0 = full); `None` uses the configured depth.
    pub async fn clone_repository(&self, url: &str, depth: Option<u32>) -> Result<PathBuf> {
        // Keep the working copy stable while a build may be reading it
        let _guard = self.state.write().await;

        let url = url.to_string();
        let dest = self.repo_dir();
        let depth = depth.unwrap_or(self.config.session.clone_depth);
        let path = tokio::task::spawn_blocking(move || clone_repository(&url, &dest, depth))
            .await
            .map_err(|e| ArchaeologistError::other(format!("Clone task failed: {}", e)))??;
        Ok(path)
    }

    /// Rebuild the index from `source`
    ///
    /// The previous index is invalid from the moment this starts. On failure
    /// the session has no index until the next successful analysis.
    pub async fn analyze(
        &self,
        source: &RepositorySource,
        options: &ExtractionOptions,
        control: BuildControl,
    ) -> Result<BuildReport> {
        let mut state = self.state.write().await;
        *state = None;

        let builder = IndexBuilder::new(
            self.embedder.clone(),
            self.index.clone(),
            self.config.indexing.batch_size,
        );

        match builder.build(source, options, control).await {
            Ok(report) => {
                *state = Some(IndexState {
                    repository: report.repository.clone(),
                    branch: report.branch.clone(),
                    commits_indexed: report.commits_indexed,
                    model_name: self.embedder.model_name().to_string(),
                    built_at: chrono::Utc::now().timestamp(),
                });
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("Analysis failed: {}", e);
                if let Err(drop_err) = self.index.drop_index().await {
                    tracing::warn!("Failed to discard partial index: {:#}", drop_err);
                }
                Err(e)
            }
        }
    }

    /// Commits most relevant to `query`
    pub async fn search(&self, query: &str, k: usize, min_score: f32) -> Result<Vec<CommitHit>> {
        let state = self.state.read().await;
        let Some(active) = state.as_ref() else {
            return Err(IndexError::NotFound.into());
        };

        if active.model_name != self.embedder.model_name() {
            return Err(EmbeddingError::ModelMismatch {
                indexed: active.model_name.clone(),
                active: self.embedder.model_name().to_string(),
            }
            .into());
        }

        Retriever::new(self.embedder.clone(), self.index.clone())
            .search(query, k, min_score)
            .await
    }

    /// Drop the index and any clone; the session stays usable
    pub async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = None;

        self.index
            .drop_index()
            .await
            .map_err(|e| IndexError::WriteFailed(format!("{:#}", e)))?;

        let repo_dir = self.repo_dir();
        if tokio::fs::try_exists(&repo_dir).await? {
            tokio::fs::remove_dir_all(&repo_dir).await?;
        }
        tokio::fs::create_dir_all(&repo_dir).await?;

        tracing::info!("Reset session {}", self.id);
        Ok(())
    }

    /// Remove the whole session directory
    pub async fn teardown(&self) -> Result<()> {
        let _state = self.state.write().await;
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if tokio::fs::try_exists(&self.root).await? {
            tokio::fs::remove_dir_all(&self.root).await?;
        }
        tracing::info!("Tore down session {}", self.id);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("Failed to remove session dir {}: {}", self.root.display(), e);
        }
    }
}

/// 16 hex chars derived from time, process id and a per-process counter
fn new_session_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
