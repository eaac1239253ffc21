//! Ignore policy for diff rendering
//!
//! Paths with noise extensions (images, archives, lock files) or inside
//! build/dependency/IDE directories never contribute patch text.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled extension and directory rules
#[derive(Debug, Clone)]
pub struct IgnorePolicy {
    matcher: GlobSet,
    rules: usize,
}

impl IgnorePolicy {
    /// Compile a policy from extensions (".png" or "png") and directory names
    pub fn new(extensions: &[String], dirs: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut rules = 0;

        for ext in extensions {
            let ext = ext.trim().trim_start_matches('.');
            if ext.is_empty() {
                continue;
            }
            builder.add(compile(&format!("**/*.{}", ext))?);
            rules += 1;
        }

        for dir in dirs {
            let dir = dir.trim().trim_matches('/');
            if dir.is_empty() {
                continue;
            }
            // The directory entry itself (a gitlink or a file of that name) and everything below it
            builder.add(compile(&format!("**/{}", dir))?);
            builder.add(compile(&format!("**/{}/**", dir))?);
            rules += 1;
        }

        let matcher = builder.build().context("Failed to build ignore policy")?;
        Ok(Self { matcher, rules })
    }

    /// A policy that ignores nothing
    pub fn empty() -> Self {
        Self {
            matcher: GlobSet::empty(),
            rules: 0,
        }
    }

    /// Whether the repository-relative path is excluded from diff text
    pub fn is_ignored(&self, path: &str) -> bool {
        if path.is_empty() {
            return true;
        }
        self.matcher.is_match(path)
    }

    /// Number of compiled rules
    pub fn len(&self) -> usize {
        self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules == 0
    }
}

fn compile(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Invalid ignore pattern: {}", pattern))
}
