//! # Git Archaeologist - Question Answering over Commit History
//!
//! Mines a repository's commit log into bounded, normalized documents, embeds
//! them into a per-session semantic index, and retrieves the commits most
//! relevant to a natural-language question. Retrieved commits are rendered
//! into a grounded prompt; the model call itself is left to the client.
//!
//! ## Pipeline
//!
//! ```text
//! repository ──▶ HistoryWalker ──▶ normalize ──▶ IndexBuilder ──▶ LanceDB
//!               (bounded diffs)    (template)    (batches,        (per session)
//!                                                 FastEmbed)          │
//! question ─────────────────────────────────────▶ Retriever ◀────────┘
//!                                                    │
//!                                                    ▼
//!                                         render_context / render_prompt
//! ```
//!
//! ## Modules
//!
//! - [`git`]: history walking, diff budgets, ignore policy, commit documents, cloning
//! - [`pipeline`]: index builder (bounded producer/consumer over a channel)
//! - [`retriever`]: semantic search over a built index
//! - [`session`]: session workspace, index lock and teardown
//! - [`context`]: context and prompt templating
//! - [`embedding`]: embedding generation using FastEmbed
//! - [`vector_db`]: commit index abstraction backed by LanceDB
//! - [`mcp_server`]: MCP protocol server with tools and prompts
//! - [`config`]: configuration file, environment overrides and validation
//! - [`types`]: MCP request/response types with JSON schema
//! - [`error`]: error types and result aliases
//! - [`paths`]: platform directories
//!
//! ## Usage Example
//!
//! ```no_run
//! use git_archaeologist::config::Config;
//! use git_archaeologist::pipeline::{BuildControl, RepositorySource};
//! use git_archaeologist::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = Session::open(Config::new()?).await?;
//!     let options = session.extraction_options(Some(200))?;
//!
//!     session
//!         .analyze(
//!             &RepositorySource::new(".", "main"),
//!             &options,
//!             BuildControl::default(),
//!         )
//!         .await?;
//!
//!     for hit in session.search("why did the timeout change?", 5, 0.0).await? {
//!         println!("{} {}", hit.hash, hit.score);
//!     }
//!
//!     session.teardown().await?;
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Context and prompt templating for answer composition
pub mod context;

/// Embedding generation using FastEmbed (all-MiniLM-L6-v2)
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Git history extraction and commit normalization
pub mod git;

/// MCP server implementation with tools and prompts
pub mod mcp_server;

/// Platform data, cache and config directories
pub mod paths;

/// Index builder
pub mod pipeline;

/// Semantic search over the commit index
pub mod retriever;

/// Session-scoped workspace and index lifecycle
pub mod session;

/// MCP request/response types with JSON schema definitions
pub mod types;

/// Commit index abstraction backed by LanceDB
pub mod vector_db;

#[cfg(test)]
mod test_support;
