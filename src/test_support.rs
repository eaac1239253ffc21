//! Fixtures shared by unit tests: throwaway git repositories and an offline embedder

use crate::embedding::EmbeddingProvider;
use anyhow::Result;
use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use sha2::{Digest, Sha256};
use std::path::Path;
use tempfile::TempDir;

/// A git repository in a temp directory with a deterministic clock
pub(crate) struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
    clock: i64,
}

impl TestRepo {
    /// Empty repository whose HEAD points at `branch`
    pub fn with_branch(branch: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(branch);
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        Self {
            dir,
            repo,
            clock: 1_704_067_200,
        }
    }

    pub fn new() -> Self {
        Self::with_branch("main")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `files` into the working tree and commit them on HEAD
    pub fn commit(&mut self, message: &str, files: &[(&str, &str)]) -> Oid {
        for (path, content) in files {
            let full = self.dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&full, content).unwrap();
        }

        let mut index = self.repo.index().unwrap();
        for (path, _) in files {
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        self.commit_tree(message, tree_id)
    }

    /// Commit the current index as-is (an empty change set if nothing was staged)
    pub fn commit_unchanged(&mut self, message: &str) -> Oid {
        let tree_id = self.repo.index().unwrap().write_tree().unwrap();
        self.commit_tree(message, tree_id)
    }

    fn commit_tree(&mut self, message: &str, tree_id: Oid) -> Oid {
        self.clock += 60;
        let tree = self.repo.find_tree(tree_id).unwrap();
        let signature =
            Signature::new("Test Author", "test@example.com", &Time::new(self.clock, 0)).unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .unwrap()
    }
}

/// Three commits; the last one changes `timeout=5` to `timeout=10` in config.yaml
pub(crate) fn timeout_repo() -> TestRepo {
    let mut repo = TestRepo::new();
    repo.commit(
        "Initial project skeleton",
        &[
            ("README.md", "# Demo project\n"),
            ("config.yaml", "retries=3\ntimeout=5\n"),
        ],
    );
    repo.commit(
        "Add greeting module",
        &[("src/greet.py", "def greet(name):\n    return 'hello ' + name\n")],
    );
    repo.commit(
        "Raise request timeout",
        &[("config.yaml", "retries=3\ntimeout=10\n")],
    );
    repo
}

/// Deterministic bag-of-words embedder for offline tests
///
/// Tokens are lowercased alphanumeric runs hashed into a fixed number of
/// buckets; vectors are L2-normalized so distance ordering follows cosine.
pub(crate) struct HashingEmbedder {
    dimension: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            name: format!("hashing-{}", dimension),
        }
    }

    pub fn named(dimension: usize, name: &str) -> Self {
        Self {
            dimension,
            name: name.to_string(),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap()) as usize
                % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Embedder that always fails, for error-path tests
pub(crate) struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed_batch(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service unavailable")
    }

    fn dimension(&self) -> usize {
        16
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}
