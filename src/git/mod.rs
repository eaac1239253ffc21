//! Git history extraction
//!
//! Walks a branch most-recent-first, renders a bounded first-parent diff for
//! each commit, and normalizes every commit into a single text document.

/// Cloning remote repositories into a session workspace
pub mod clone;
/// Bounded first-parent diff rendering
pub mod diff;
/// Commit document rendering
pub mod document;
/// Path ignore policy for diff rendering
pub mod ignore;
/// Branch resolution and lazy commit walking
pub mod walker;

pub use clone::clone_repository;
pub use document::{CommitDocument, CommitMetadata, normalize};
pub use ignore::IgnorePolicy;
pub use walker::{CommitIter, CommitRecord, ExtractionOptions, HistoryWalker};
