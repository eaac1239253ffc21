/// Configuration system for git-archaeologist
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ArchaeologistError, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// History extraction and diff budgets
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Index building configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Session working directories
    #[serde(default)]
    pub session: SessionConfig,
}

/// History extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Preferred branch to walk
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Branches tried in order when the preferred one does not resolve
    #[serde(default = "default_fallback_branches")]
    pub fallback_branches: Vec<String>,

    /// Most-recent commits to walk (0 = entire history)
    #[serde(default = "default_commit_limit")]
    pub commit_limit: usize,

    /// Ceiling in bytes for a single file's patch fragment
    #[serde(default = "default_per_file_diff_ceiling")]
    pub per_file_diff_ceiling: usize,

    /// Ceiling in bytes for a commit's whole diff text
    #[serde(default = "default_total_diff_ceiling")]
    pub total_diff_ceiling: usize,

    /// Ceiling in bytes for the commit message
    #[serde(default = "default_message_ceiling")]
    pub message_ceiling: usize,

    /// Ceiling in bytes for the author name
    #[serde(default = "default_author_ceiling")]
    pub author_ceiling: usize,

    /// Store the changed-file list as index metadata
    #[serde(default = "default_store_changed_files")]
    pub store_changed_files: bool,

    /// File extensions excluded from diff text (binary, generated, lock files)
    #[serde(default = "default_ignore_extensions")]
    pub ignore_extensions: Vec<String>,

    /// Directory names excluded from diff text (build, dependency, IDE artifacts)
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2", "BAAI/bge-small-en-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Directory where downloaded model files are cached
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,
}

/// Index building configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Commits embedded and written per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Table name for the commit index
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of commits retrieved per question
    #[serde(default = "default_result_limit")]
    pub limit: usize,

    /// Default minimum similarity score (0.0 to 1.0)
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Parent directory of per-session working directories
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,

    /// History depth for clones (0 = full history)
    #[serde(default)]
    pub clone_depth: u32,
}

// Default value functions
fn default_branch() -> String {
    "main".to_string()
}

fn default_fallback_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

fn default_commit_limit() -> usize {
    500
}

fn default_per_file_diff_ceiling() -> usize {
    600
}

fn default_total_diff_ceiling() -> usize {
    1500
}

fn default_message_ceiling() -> usize {
    2000
}

fn default_author_ceiling() -> usize {
    256
}

fn default_store_changed_files() -> bool {
    true
}

fn default_ignore_extensions() -> Vec<String> {
    [
        ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".mp4", ".pdf", ".zip", ".tar", ".gz",
        ".woff", ".woff2", ".exe", ".dll", ".so", ".bin", ".jar", ".lock", ".json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignore_dirs() -> Vec<String> {
    [
        "dist",
        "build",
        "node_modules",
        "__pycache__",
        ".idea",
        ".vscode",
        "vendor",
        "target",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_cache_dir() -> PathBuf {
    crate::paths::PlatformPaths::default_model_cache_dir()
}

fn default_batch_size() -> usize {
    10
}

fn default_table_name() -> String {
    "git_commits".to_string()
}

fn default_result_limit() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.0
}

fn default_sessions_dir() -> PathBuf {
    crate::paths::PlatformPaths::default_sessions_dir()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            fallback_branches: default_fallback_branches(),
            commit_limit: default_commit_limit(),
            per_file_diff_ceiling: default_per_file_diff_ceiling(),
            total_diff_ceiling: default_total_diff_ceiling(),
            message_ceiling: default_message_ceiling(),
            author_ceiling: default_author_ceiling(),
            store_changed_files: default_store_changed_files(),
            ignore_extensions: default_ignore_extensions(),
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            cache_dir: default_model_cache_dir(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            table_name: default_table_name(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_result_limit(),
            min_score: default_min_score(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
            clone_depth: 0,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, ArchaeologistError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, ArchaeologistError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ArchaeologistError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ArchaeologistError> {
        let positive = [
            (
                "extraction.per_file_diff_ceiling",
                self.extraction.per_file_diff_ceiling,
            ),
            (
                "extraction.total_diff_ceiling",
                self.extraction.total_diff_ceiling,
            ),
            ("extraction.message_ceiling", self.extraction.message_ceiling),
            ("extraction.author_ceiling", self.extraction.author_ceiling),
            ("indexing.batch_size", self.indexing.batch_size),
            ("search.limit", self.search.limit),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(invalid(key, "must be greater than 0"));
            }
        }

        if self.extraction.total_diff_ceiling < self.extraction.per_file_diff_ceiling {
            return Err(invalid(
                "extraction.total_diff_ceiling",
                &format!(
                    "must be at least per_file_diff_ceiling ({}), got {}",
                    self.extraction.per_file_diff_ceiling, self.extraction.total_diff_ceiling
                ),
            ));
        }

        if self.extraction.branch.trim().is_empty() {
            return Err(invalid("extraction.branch", "must not be empty"));
        }

        if self.indexing.table_name.trim().is_empty() {
            return Err(invalid("indexing.table_name", "must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.search.min_score) {
            return Err(invalid(
                "search.min_score",
                &format!("must be between 0.0 and 1.0, got {}", self.search.min_score),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(branch) = std::env::var("ARCHAEOLOGIST_BRANCH") {
            self.extraction.branch = branch;
        }

        if let Ok(limit) = std::env::var("ARCHAEOLOGIST_COMMIT_LIMIT")
            && let Ok(limit) = limit.parse()
        {
            self.extraction.commit_limit = limit;
        }

        if let Ok(model) = std::env::var("ARCHAEOLOGIST_MODEL") {
            self.embedding.model_name = model;
        }

        if let Ok(batch_size) = std::env::var("ARCHAEOLOGIST_BATCH_SIZE")
            && let Ok(size) = batch_size.parse()
        {
            self.indexing.batch_size = size;
        }

        if let Ok(path) = std::env::var("ARCHAEOLOGIST_SESSIONS_DIR") {
            self.session.sessions_dir = PathBuf::from(path);
        }

        if let Ok(min_score) = std::env::var("ARCHAEOLOGIST_MIN_SCORE")
            && let Ok(score) = min_score.parse()
        {
            self.search.min_score = score;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, ArchaeologistError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

fn invalid(key: &str, reason: &str) -> ArchaeologistError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
