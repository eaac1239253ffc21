#![allow(dead_code)]

use git_archaeologist::embedding::EmbeddingProvider;
use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::path::Path;
use tempfile::TempDir;

/// Throwaway repository with a fixed clock
pub struct Fixture {
    pub dir: TempDir,
    pub repo: Repository,
    clock: i64,
}

impl Fixture {
    pub fn new(branch: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(branch);
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        Self {
            dir,
            repo,
            clock: 1_700_000_000,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn commit(&mut self, author: &str, message: &str, files: &[(&str, &str)]) -> Oid {
        for (path, content) in files {
            let full = self.dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, content).unwrap();
        }

        let mut index = self.repo.index().unwrap();
        for (path, _) in files {
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        self.clock += 3600;
        let sig = Signature::new(author, "dev@example.com", &Time::new(self.clock, 60)).unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }
}

/// A small service whose history mentions retries, timeouts and a lockfile
pub fn service_history() -> Fixture {
    let mut fx = Fixture::new("main");
    fx.commit(
        "Ada",
        "Bootstrap service",
        &[
            ("service.toml", "retries = 3\ntimeout = 5\n"),
            ("src/main.rs", "fn main() {}\n"),
        ],
    );
    fx.commit(
        "Grace",
        "Pin dependencies",
        &[
            ("Cargo.lock", "[[package]]\nname = \"serde\"\n"),
            ("docs/logo.png", "PNG"),
        ],
    );
    fx.commit(
        "Ada",
        "Increase timeout for slow upstreams",
        &[("service.toml", "retries = 3\ntimeout = 30\n")],
    );
    fx.commit(
        "Linus",
        "Log startup banner",
        &[("src/main.rs", "fn main() {\n    println!(\"starting\");\n}\n")],
    );
    fx
}

/// Offline bag-of-words embedder (FNV-1a token hashing, L2-normalized)
pub struct BagOfWords {
    pub dimension: usize,
}

impl EmbeddingProvider for BagOfWords {
    fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dimension];
                for token in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                {
                    let mut hash: u64 = 0xcbf29ce484222325;
                    for byte in token.to_lowercase().bytes() {
                        hash ^= byte as u64;
                        hash = hash.wrapping_mul(0x100000001b3);
                    }
                    v[(hash % self.dimension as u64) as usize] += 1.0;
                }
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    v.iter_mut().for_each(|x| *x /= norm);
                }
                v
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }
}
