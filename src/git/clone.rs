use crate::error::GitError;
use git2::FetchOptions;
use git2::build::RepoBuilder;
use std::path::{Path, PathBuf};

/// Clone `url` into `dest`, replacing anything already there
///
/// A `depth` of 0 fetches full history; anything else produces a shallow clone
/// whose oldest commits are recorded in `.git/shallow`.
pub fn clone_repository(url: &str, dest: &Path, depth: u32) -> Result<PathBuf, GitError> {
    let failed = |reason: String| GitError::CloneFailed {
        url: url.to_string(),
        reason,
    };

    if url.trim().is_empty() {
        return Err(failed("empty repository URL".to_string()));
    }

    if dest.exists() {
        std::fs::remove_dir_all(dest)
            .map_err(|e| failed(format!("cannot clear {}: {}", dest.display(), e)))?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| failed(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    tracing::info!(
        "Cloning {} into {}{}",
        url,
        dest.display(),
        if depth > 0 {
            format!(" (depth {})", depth)
        } else {
            String::new()
        }
    );

    let mut fetch_options = FetchOptions::new();
    if depth > 0 {
        fetch_options.depth(i32::try_from(depth).unwrap_or(i32::MAX));
    }

    let repo = RepoBuilder::new()
        .fetch_options(fetch_options)
        .clone(url, dest)
        .map_err(|e| failed(e.message().to_string()))?;

    Ok(repo
        .workdir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dest.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::walker::{ExtractionOptions, HistoryWalker};
    use crate::test_support::timeout_repo;
    use tempfile::TempDir;

    #[test]
    fn test_clone_local_repository() {
        let source = timeout_repo();
        let target = TempDir::new().unwrap();
        let dest = target.path().join("repo");

        let url = source.path().to_string_lossy().to_string();
        let cloned = clone_repository(&url, &dest, 0).unwrap();

        let walker = HistoryWalker::open(&cloned).unwrap();
        let options = ExtractionOptions::default();
        assert_eq!(walker.commits("main", &options).unwrap().count(), 3);
    }

    #[test]
    fn test_clone_replaces_existing_destination() {
        let source = timeout_repo();
        let target = TempDir::new().unwrap();
        let dest = target.path().join("repo");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.txt"), "left over").unwrap();

        let url = source.path().to_string_lossy().to_string();
        clone_repository(&url, &dest, 0).unwrap();

        assert!(!dest.join("stale.txt").exists());
        assert!(dest.join("config.yaml").exists());
    }

    #[test]
    fn test_clone_failure() {
        let target = TempDir::new().unwrap();
        let missing = target.path().join("does-not-exist");
        let result = clone_repository(
            &missing.to_string_lossy(),
            &target.path().join("repo"),
            0,
        );
        assert!(matches!(result, Err(GitError::CloneFailed { .. })));
    }

    #[test]
    fn test_clone_empty_url() {
        let target = TempDir::new().unwrap();
        let result = clone_repository("  ", &target.path().join("repo"), 0);
        assert!(matches!(result, Err(GitError::CloneFailed { .. })));
    }
}
