use crate::config::ExtractionConfig;
use crate::error::GitError;
use crate::git::diff::{self, DiffBudget};
use crate::git::ignore::IgnorePolicy;
use chrono::{DateTime, FixedOffset};
use git2::{Oid, Repository, Revwalk, Sort};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Information about a single commit on the analyzed branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Full commit object id (hex)
    pub hash: String,
    /// Author's name, capped at the author ceiling
    pub author: String,
    /// Author's email address
    pub author_email: String,
    /// Commit timestamp (Unix epoch seconds)
    pub committed_at: i64,
    /// Canonical display form of `committed_at` in the commit's own offset
    pub date: String,
    /// Trimmed commit message, capped at the message ceiling
    pub message: String,
    /// Paths touched versus the first parent, in diff order
    pub changed_files: Vec<String>,
    /// Bounded patch text or a sentinel
    pub diff_text: String,
    /// Parent object ids
    pub parent_hashes: Vec<String>,
}

/// Knobs for one extraction run
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Most-recent commits to walk (0 = all)
    pub commit_limit: usize,
    pub per_file_diff_ceiling: usize,
    pub total_diff_ceiling: usize,
    pub message_ceiling: usize,
    pub author_ceiling: usize,
    pub store_changed_files: bool,
    /// Tried in order when the requested branch does not resolve
    pub fallback_branches: Vec<String>,
    pub ignore: IgnorePolicy,
}

impl ExtractionOptions {
    pub fn from_config(config: &ExtractionConfig) -> anyhow::Result<Self> {
        Ok(Self {
            commit_limit: config.commit_limit,
            per_file_diff_ceiling: config.per_file_diff_ceiling,
            total_diff_ceiling: config.total_diff_ceiling,
            message_ceiling: config.message_ceiling,
            author_ceiling: config.author_ceiling,
            store_changed_files: config.store_changed_files,
            fallback_branches: config.fallback_branches.clone(),
            ignore: IgnorePolicy::new(&config.ignore_extensions, &config.ignore_dirs)?,
        })
    }

    pub fn with_commit_limit(mut self, commit_limit: usize) -> Self {
        self.commit_limit = commit_limit;
        self
    }

    pub fn budget(&self) -> DiffBudget {
        DiffBudget {
            per_file: self.per_file_diff_ceiling,
            total: self.total_diff_ceiling,
        }
    }

    /// Upper bound on the rendered document of any extracted commit
    pub fn content_ceiling(&self) -> usize {
        crate::git::document::content_ceiling(self)
    }
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        let config = ExtractionConfig::default();
        Self::from_config(&config).unwrap_or_else(|e| {
            tracing::warn!("Default ignore policy failed to compile: {:#}", e);
            Self {
                commit_limit: config.commit_limit,
                per_file_diff_ceiling: config.per_file_diff_ceiling,
                total_diff_ceiling: config.total_diff_ceiling,
                message_ceiling: config.message_ceiling,
                author_ceiling: config.author_ceiling,
                store_changed_files: config.store_changed_files,
                fallback_branches: config.fallback_branches,
                ignore: IgnorePolicy::empty(),
            }
        })
    }
}

/// Git repository walker for extracting commit records
pub struct HistoryWalker {
    repo: Repository,
    repo_path: PathBuf,
    /// Commits listed in `.git/shallow`, whose parents are absent
    shallow_boundary: HashSet<Oid>,
}

impl HistoryWalker {
    /// Open the working copy at exactly `path` (no upward discovery)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(GitError::RepositoryNotFound(path.display().to_string()));
        }

        let repo = Repository::open(path).map_err(|e| {
            tracing::debug!("git2 open failed for {}: {}", path.display(), e);
            GitError::InvalidRepository(path.display().to_string())
        })?;

        let repo_path = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();
        let shallow_boundary = read_shallow_file(repo.path());

        tracing::info!(
            "Opened git repository at: {}{}",
            repo_path.display(),
            if shallow_boundary.is_empty() {
                ""
            } else {
                " (shallow)"
            }
        );

        Ok(Self {
            repo,
            repo_path,
            shallow_boundary,
        })
    }

    /// Get the repository root path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Whether the clone is missing history beyond some boundary commits
    pub fn is_shallow(&self) -> bool {
        !self.shallow_boundary.is_empty() || self.repo.is_shallow()
    }

    /// Whether any commit is reachable from HEAD or another reference
    ///
    /// False for a freshly initialized repository, whose HEAD names an
    /// unborn branch.
    pub fn has_commits(&self) -> bool {
        if self.repo.head().is_ok() {
            return true;
        }
        match self.repo.references() {
            Ok(mut refs) => refs.any(|r| r.ok().and_then(|r| r.peel_to_commit().ok()).is_some()),
            Err(_) => false,
        }
    }

    /// Resolve `branch`, then each fallback, to a commit id
    ///
    /// Each name is tried as a local ref and as `origin/<name>`.
    pub fn resolve_branch(
        &self,
        branch: &str,
        fallbacks: &[String],
    ) -> Result<(String, Oid), GitError> {
        let candidates = std::iter::once(branch)
            .chain(fallbacks.iter().map(String::as_str))
            .filter(|name| !name.trim().is_empty());

        for name in candidates {
            for revspec in [name.to_string(), format!("origin/{}", name)] {
                if let Ok(object) = self.repo.revparse_single(&revspec)
                    && let Ok(commit) = object.peel_to_commit()
                {
                    if name != branch {
                        tracing::info!(
                            "Branch '{}' not found, falling back to '{}'",
                            branch,
                            name
                        );
                    }
                    return Ok((name.to_string(), commit.id()));
                }
            }
        }

        Err(GitError::BranchNotFound {
            requested: branch.to_string(),
            tried: fallbacks.join(", "),
        })
    }

    fn revwalk_from(&self, start: Oid) -> Result<Revwalk<'_>, GitError> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| GitError::WalkFailed(e.message().to_string()))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| GitError::WalkFailed(e.message().to_string()))?;
        revwalk
            .push(start)
            .map_err(|e| GitError::WalkFailed(e.message().to_string()))?;
        Ok(revwalk)
    }

    /// Lazily walk the resolved branch, most recent first
    pub fn commits<'a>(
        &'a self,
        branch: &str,
        options: &'a ExtractionOptions,
    ) -> Result<CommitIter<'a>, GitError> {
        let (resolved, start) = self.resolve_branch(branch, &options.fallback_branches)?;
        let revwalk = self.revwalk_from(start)?;

        Ok(CommitIter {
            walker: self,
            revwalk,
            options,
            branch: resolved,
            remaining: (options.commit_limit > 0).then_some(options.commit_limit),
            yielded: 0,
            done: false,
        })
    }

    /// Count commits the walk would visit, without rendering diffs
    pub fn estimate_commit_count(
        &self,
        branch: &str,
        options: &ExtractionOptions,
    ) -> Result<usize, GitError> {
        let (_, start) = self.resolve_branch(branch, &options.fallback_branches)?;
        let revwalk = self.revwalk_from(start)?;
        let count = revwalk.take_while(|oid| oid.is_ok()).count();
        Ok(match options.commit_limit {
            0 => count,
            limit => count.min(limit),
        })
    }

    /// Extract detailed information from a commit
    fn extract_record(&self, commit: &git2::Commit, options: &ExtractionOptions) -> CommitRecord {
        let hash = commit.id().to_string();

        let author = commit.author();
        let mut author_name = String::from_utf8_lossy(author.name_bytes()).trim().to_string();
        diff::truncate_with_marker(&mut author_name, options.author_ceiling);
        let author_email = String::from_utf8_lossy(author.email_bytes()).to_string();

        let mut message = String::from_utf8_lossy(commit.message_bytes())
            .trim()
            .to_string();
        diff::truncate_with_marker(&mut message, options.message_ceiling);

        let committed_at = commit.time().seconds();
        let date = format_commit_time(commit.time());

        let parent_hashes: Vec<String> = commit.parent_ids().map(|p| p.to_string()).collect();

        let (changed_files, diff_text) = match diff::render_first_parent_diff(
            &self.repo,
            commit,
            &options.ignore,
            options.budget(),
            &self.shallow_boundary,
        ) {
            Ok(rendered) => (rendered.changed_files, rendered.text),
            Err(failure) => {
                let sentinel = failure.sentinel().to_string();
                tracing::warn!("{}", failure.into_error(commit.id()));
                (Vec::new(), sentinel)
            }
        };

        CommitRecord {
            hash,
            author: author_name,
            author_email,
            committed_at,
            date,
            message,
            changed_files,
            diff_text,
            parent_hashes,
        }
    }
}

/// Single-pass, lazy sequence of commit records
pub struct CommitIter<'a> {
    walker: &'a HistoryWalker,
    revwalk: Revwalk<'a>,
    options: &'a ExtractionOptions,
    branch: String,
    remaining: Option<usize>,
    yielded: usize,
    done: bool,
}

impl CommitIter<'_> {
    /// Branch the walk actually started from (after fallback)
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Records produced so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }
}

impl Iterator for CommitIter<'_> {
    type Item = CommitRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == Some(0) {
            return None;
        }

        loop {
            let oid = match self.revwalk.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    // Typically the edge of a shallow clone
                    tracing::warn!(
                        "Stopping history walk after {} commits: {}",
                        self.yielded,
                        e.message()
                    );
                    self.done = true;
                    return None;
                }
                Some(Ok(oid)) => oid,
            };

            let commit = match self.walker.repo.find_commit(oid) {
                Ok(commit) => commit,
                Err(e) => {
                    tracing::warn!("Skipping unreadable commit {}: {}", oid, e.message());
                    continue;
                }
            };

            let record = self.walker.extract_record(&commit, self.options);
            self.yielded += 1;
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            if self.yielded % 50 == 0 {
                tracing::debug!("Extracted {} commits", self.yielded);
            }
            return Some(record);
        }
    }
}

impl std::iter::FusedIterator for CommitIter<'_> {}

/// Render a commit time as `%Y-%m-%d %H:%M:%S` in the commit's own offset
pub fn format_commit_time(time: git2::Time) -> String {
    let Some(utc) = DateTime::from_timestamp(time.seconds(), 0) else {
        return time.seconds().to_string();
    };
    match FixedOffset::east_opt(time.offset_minutes() * 60) {
        Some(offset) => utc
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => utc.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn read_shallow_file(git_dir: &Path) -> HashSet<Oid> {
    std::fs::read_to_string(git_dir.join("shallow"))
        .map(|content| {
            content
                .lines()
                .filter_map(|line| Oid::from_str(line.trim()).ok())
                .collect()
        })
        .unwrap_or_default()
}
