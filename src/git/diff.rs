//! First-parent diff rendering with a two-level size budget
//!
//! Each file's patch is capped at `per_file` bytes, then the concatenation of
//! all fragments is capped at `total` bytes. Both cuts append
//! [`TRUNCATION_MARKER`] and always land on a UTF-8 character boundary.

use super::ignore::IgnorePolicy;
use crate::error::GitError;
use git2::{Commit, DiffOptions, Oid, Patch, Repository};
use std::collections::HashSet;

/// Appended wherever diff text was cut
pub const TRUNCATION_MARKER: &str = "\n...(truncated)";

/// Diff text of a commit without parents
pub const ROOT_COMMIT_SENTINEL: &str = "(First commit - no diffs)";

/// Diff text of a commit whose parent is missing from a shallow clone
pub const SHALLOW_BOUNDARY_SENTINEL: &str = "(Diff unavailable: boundary of shallow clone)";

/// Diff text of a commit whose diff could not be computed
pub const DIFF_FAILED_SENTINEL: &str = "(Diff failed to load)";

/// Byte ceilings for diff text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffBudget {
    pub per_file: usize,
    pub total: usize,
}

impl DiffBudget {
    /// Longest diff text this budget can produce, sentinels included
    pub fn max_len(&self) -> usize {
        let sentinel = [
            ROOT_COMMIT_SENTINEL,
            SHALLOW_BOUNDARY_SENTINEL,
            DIFF_FAILED_SENTINEL,
        ]
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(0);
        (self.total + TRUNCATION_MARKER.len()).max(sentinel)
    }
}

/// Rendered first-parent delta of one commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDiff {
    pub changed_files: Vec<String>,
    pub text: String,
}

/// Why a commit's diff could not be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DiffFailure {
    ShallowBoundary(String),
    Failed(String),
}

impl DiffFailure {
    pub(crate) fn sentinel(&self) -> &'static str {
        match self {
            DiffFailure::ShallowBoundary(_) => SHALLOW_BOUNDARY_SENTINEL,
            DiffFailure::Failed(_) => DIFF_FAILED_SENTINEL,
        }
    }

    pub(crate) fn into_error(self, commit: Oid) -> GitError {
        let reason = match self {
            DiffFailure::ShallowBoundary(reason) => format!("shallow clone boundary ({})", reason),
            DiffFailure::Failed(reason) => reason,
        };
        GitError::DiffUnavailable {
            commit: commit.to_string(),
            reason,
        }
    }
}

/// Render `commit` against its first parent
///
/// Root commits produce [`ROOT_COMMIT_SENTINEL`] and no changed files, unless
/// the commit is a recorded shallow boundary, in which case its real parent
/// exists upstream and the diff is reported unavailable.
pub(crate) fn render_first_parent_diff(
    repo: &Repository,
    commit: &Commit,
    policy: &IgnorePolicy,
    budget: DiffBudget,
    shallow: &HashSet<Oid>,
) -> Result<RenderedDiff, DiffFailure> {
    if commit.parent_count() == 0 {
        if shallow.contains(&commit.id()) {
            return Err(DiffFailure::ShallowBoundary(
                "parent not present in clone".to_string(),
            ));
        }
        return Ok(RenderedDiff {
            changed_files: Vec::new(),
            text: ROOT_COMMIT_SENTINEL.to_string(),
        });
    }

    let parent_tree = commit
        .parent(0)
        .and_then(|parent| parent.tree())
        .map_err(|e| DiffFailure::ShallowBoundary(e.message().to_string()))?;
    let tree = commit
        .tree()
        .map_err(|e| DiffFailure::Failed(e.message().to_string()))?;

    let mut diff_opts = DiffOptions::new();
    diff_opts
        .context_lines(3)
        .interhunk_lines(0)
        .ignore_whitespace(false);

    let diff = repo
        .diff_tree_to_tree(Some(&parent_tree), Some(&tree), Some(&mut diff_opts))
        .map_err(|e| DiffFailure::Failed(e.message().to_string()))?;

    let mut rendered = RenderedDiff::default();

    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
            continue;
        };
        let path = path.to_string_lossy().replace('\\', "/");
        rendered.changed_files.push(path.clone());

        if policy.is_ignored(&path) {
            tracing::trace!("Ignoring diff for {}", path);
            continue;
        }

        // Fragments past the total ceiling would be cut anyway
        if rendered.text.len() > budget.total {
            continue;
        }

        match render_file_patch(&diff, idx, budget.per_file) {
            Ok(patch_text) => {
                rendered.text.push_str("\nFile: ");
                rendered.text.push_str(&path);
                rendered.text.push('\n');
                rendered.text.push_str(&patch_text);
                rendered.text.push('\n');
            }
            Err(e) => {
                tracing::debug!("Skipping patch for {} in {}: {}", path, commit.id(), e);
            }
        }
    }

    if truncate_with_marker(&mut rendered.text, budget.total) {
        tracing::debug!("Truncated diff text for commit {}", commit.id());
    }

    Ok(rendered)
}

/// Render one delta as hunk headers plus prefixed content lines
fn render_file_patch(diff: &git2::Diff, idx: usize, ceiling: usize) -> Result<String, git2::Error> {
    let mut patch = match Patch::from_diff(diff, idx)? {
        Some(patch) => patch,
        None => return Ok(String::new()),
    };

    let mut text = String::new();
    let mut binary = false;
    patch.print(&mut |_delta, _hunk, line| {
        // Keep going but stop buffering once past the ceiling
        if text.len() > ceiling {
            return true;
        }

        let content = String::from_utf8_lossy(line.content());
        match line.origin() {
            origin @ ('+' | '-' | ' ') => {
                text.push(origin);
                text.push_str(&content);
            }
            'H' => text.push_str(&content),
            'B' => binary = true,
            _ => {}
        }
        true
    })?;

    if binary && text.is_empty() {
        text.push_str("(binary file changed)");
    }

    truncate_with_marker(&mut text, ceiling);
    Ok(text)
}

/// Cut `text` to at most `ceiling` bytes and append the marker
///
/// Returns whether anything was cut.
pub(crate) fn truncate_with_marker(text: &mut String, ceiling: usize) -> bool {
    if text.len() <= ceiling {
        return false;
    }
    let cut = floor_char_boundary(text, ceiling);
    text.truncate(cut);
    text.push_str(TRUNCATION_MARKER);
    true
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut cut = index;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_noop_under_ceiling() {
        let mut text = "short".to_string();
        assert!(!truncate_with_marker(&mut text, 10));
        assert_eq!(text, "short");
    }

    #[test]
    fn test_truncate_appends_marker() {
        let mut text = "x".repeat(100);
        assert!(truncate_with_marker(&mut text, 10));
        assert_eq!(text.len(), 10 + TRUNCATION_MARKER.len());
        assert!(text.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // Each 'é' is two bytes, so byte 5 falls inside a character
        let mut text = "éééééé".to_string();
        truncate_with_marker(&mut text, 5);
        assert!(text.starts_with("éé"));
        assert!(text.len() <= 5 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_budget_max_len_covers_sentinels() {
        let tiny = DiffBudget {
            per_file: 1,
            total: 1,
        };
        assert!(tiny.max_len() >= SHALLOW_BOUNDARY_SENTINEL.len());

        let normal = DiffBudget {
            per_file: 600,
            total: 1500,
        };
        assert_eq!(normal.max_len(), 1500 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_failure_sentinels() {
        assert_eq!(
            DiffFailure::ShallowBoundary("x".into()).sentinel(),
            SHALLOW_BOUNDARY_SENTINEL
        );
        assert_eq!(
            DiffFailure::Failed("x".into()).sentinel(),
            DIFF_FAILED_SENTINEL
        );
    }

    #[test]
    fn test_failure_into_error() {
        let err = DiffFailure::ShallowBoundary("object not found".into()).into_error(Oid::zero());
        assert!(matches!(err, GitError::DiffUnavailable { .. }));
        assert!(err.to_string().contains("shallow clone boundary"));
    }
}
