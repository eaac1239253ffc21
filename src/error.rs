/// Centralized error types for git-archaeologist using thiserror
///
/// Every failure the pipeline can surface renders as a single human-readable line.
use thiserror::Error;

/// Main error type for history mining, indexing and retrieval
#[derive(Error, Debug)]
pub enum ArchaeologistError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to repository access and history walking
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Repository path not found: {0}")]
    RepositoryNotFound(String),

    #[error("Not a valid git repository: {0}")]
    InvalidRepository(String),

    #[error("Branch not found: {requested} (also tried {tried})")]
    BranchNotFound { requested: String, tried: String },

    #[error("Failed to clone '{url}': {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("Failed to walk commit history: {0}")]
    WalkFailed(String),

    /// Recorded as sentinel text in the commit document, never propagated
    #[error("Diff unavailable for commit {commit}: {reason}")]
    DiffUnavailable { commit: String, reason: String },
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index was built with model '{indexed}' but the active model is '{active}'")]
    ModelMismatch { indexed: String, active: String },

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to building and reading the commit index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to write batch to index: {0}")]
    WriteFailed(String),

    #[error("Failed to read from index: {0}")]
    ReadFailed(String),

    #[error("No commits found to index")]
    EmptyHistory,

    #[error("No repository has been analyzed yet; run an analysis first")]
    NotFound,

    #[error("Indexing was cancelled after {indexed} commits")]
    Cancelled { indexed: usize },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty {0}")]
    Empty(String),

    #[error("{field} must be {constraint}, got {actual}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        actual: String,
    },

    #[error("Exactly one of {0} must be provided")]
    ExactlyOne(String),
}

impl From<anyhow::Error> for ArchaeologistError {
    fn from(err: anyhow::Error) -> Self {
        ArchaeologistError::Other(format!("{:#}", err))
    }
}

/// Result alias used across the crate's typed boundaries
pub type Result<T, E = ArchaeologistError> = std::result::Result<T, E>;

impl ArchaeologistError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        ArchaeologistError::Other(msg.into())
    }

    /// Convert to a user-facing error string suitable for MCP responses
    pub fn to_user_string(&self) -> String {
        format!("{}", self)
    }

    /// Whether the user can fix this by changing input or running another action
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ArchaeologistError::Validation(_)
                | ArchaeologistError::Config(ConfigError::InvalidValue { .. })
                | ArchaeologistError::Git(GitError::RepositoryNotFound(_))
                | ArchaeologistError::Git(GitError::InvalidRepository(_))
                | ArchaeologistError::Git(GitError::BranchNotFound { .. })
                | ArchaeologistError::Index(IndexError::NotFound)
                | ArchaeologistError::Index(IndexError::EmptyHistory)
        )
    }
}
