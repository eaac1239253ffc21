use crate::error::ValidationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request to analyze (index) a repository's history
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeRequest {
    /// Path to a local git working copy
    #[serde(default)]
    pub path: Option<String>,
    /// Remote URL to clone into the session workspace
    #[serde(default)]
    pub url: Option<String>,
    /// Branch to analyze (default from configuration, falls back to main/master)
    #[serde(default)]
    pub branch: Option<String>,
    /// Most-recent commits to index; 0 indexes the whole history
    #[serde(default)]
    pub commit_limit: Option<usize>,
}

impl AnalyzeRequest {
    /// Exactly one of `path` and `url` must be set and non-blank
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if has(&self.path) == has(&self.url) {
            return Err(ValidationError::ExactlyOne("path, url".to_string()));
        }
        if let Some(branch) = &self.branch
            && branch.trim().is_empty()
        {
            return Err(ValidationError::Empty("branch".to_string()));
        }
        Ok(())
    }
}

/// Response from an analysis run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeResponse {
    /// Local path of the analyzed repository
    pub repository: String,
    /// Branch actually walked (after fallback)
    pub branch: String,
    /// Number of commits written to the index
    pub commits_indexed: usize,
    /// Number of batches embedded and stored
    pub batches: usize,
    /// Embedding model used for the index
    pub model: String,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Request to search the analyzed history
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchHistoryRequest {
    /// Natural-language question or search phrase
    pub query: String,
    /// Number of commits to return (default: 5)
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum similarity score (0.0 to 1.0, default: 0.0)
    #[serde(default)]
    pub min_score: f32,
}

pub(crate) fn default_limit() -> usize {
    5
}

/// Shared checks for query text, result count and score threshold
pub fn validate_query(query: &str, limit: usize, min_score: f32) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        return Err(ValidationError::Empty("query".to_string()));
    }
    if limit == 0 || limit > 100 {
        return Err(ValidationError::ConstraintViolation {
            field: "limit".to_string(),
            constraint: "between 1 and 100".to_string(),
            actual: limit.to_string(),
        });
    }
    if !(0.0..=1.0).contains(&min_score) {
        return Err(ValidationError::ConstraintViolation {
            field: "min_score".to_string(),
            constraint: "between 0.0 and 1.0".to_string(),
            actual: min_score.to_string(),
        });
    }
    Ok(())
}

impl SearchHistoryRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_query(&self.query, self.limit, self.min_score)
    }
}

/// A commit retrieved for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CommitHit {
    /// Commit hash (index key)
    pub hash: String,
    /// Normalized commit document
    pub content: String,
    /// Author name
    pub author: String,
    /// Commit date, `%Y-%m-%d %H:%M:%S`
    pub date: String,
    /// Commit time as Unix seconds
    pub committed_at: i64,
    /// Changed paths, when stored at index time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Similarity score (0.0 to 1.0, higher is closer)
    pub score: f32,
}

/// Response from a history search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchHistoryResponse {
    /// Commits ordered by relevance
    pub results: Vec<CommitHit>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Request to retrieve commits and compose a grounded prompt
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildPromptRequest {
    /// The user's question about the project history
    pub question: String,
    /// Number of commits to include (default: 5)
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum similarity score (0.0 to 1.0, default: 0.0)
    #[serde(default)]
    pub min_score: f32,
}

impl BuildPromptRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_query(&self.question, self.limit, self.min_score)
    }
}

/// A composed prompt plus the commits it was built from
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildPromptResponse {
    /// Full prompt to hand to a language model
    pub prompt: String,
    /// The commit-history context block alone
    pub context: String,
    /// Hashes of the commits in the context, most relevant first
    pub commits: Vec<String>,
}

/// Request to drop the current index and any cloned repository
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResetRequest {}

/// Response from a reset
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResetResponse {
    /// Whether the operation was successful
    pub success: bool,
    /// Optional message
    pub message: String,
}
