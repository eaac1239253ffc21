use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use anyhow::{Context, Result, bail};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;

/// Model names accepted in configuration, with their fastembed model and dimension
pub const SUPPORTED_MODELS: &[(&str, EmbeddingModel, usize)] = &[
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384),
    ("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2, 384),
    ("BAAI/bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384),
    ("BAAI/bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768),
];

/// Look up a configured model name (case-insensitive, `BAAI/` prefix optional)
fn lookup_model(name: &str) -> Option<(&'static str, EmbeddingModel, usize)> {
    let wanted = name.trim().to_ascii_lowercase();
    SUPPORTED_MODELS.iter().find_map(|(model_name, model, dim)| {
        let canonical = model_name.to_ascii_lowercase();
        let short = canonical.trim_start_matches("baai/");
        (wanted == canonical || wanted == short).then(|| (*model_name, model.clone(), *dim))
    })
}

/// FastEmbed-based embedding provider running locally on the CPU
pub struct FastEmbedManager {
    model: Mutex<TextEmbedding>,
    model_name: &'static str,
    dimension: usize,
}

impl FastEmbedManager {
    /// Create a manager with the default model (all-MiniLM-L6-v2)
    pub fn new(cache_dir: &Path) -> Result<Self> {
        Self::from_model_name("all-MiniLM-L6-v2", cache_dir)
    }

    /// Create a manager from the embedding section of the configuration
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::from_model_name(&config.model_name, &config.cache_dir)
    }

    /// Create a manager for a supported model name, caching weights under `cache_dir`
    pub fn from_model_name(name: &str, cache_dir: &Path) -> Result<Self> {
        let Some((model_name, model, dimension)) = lookup_model(name) else {
            let known: Vec<&str> = SUPPORTED_MODELS.iter().map(|(n, _, _)| *n).collect();
            bail!(
                "Unsupported embedding model '{}'; expected one of: {}",
                name,
                known.join(", ")
            );
        };

        tracing::info!(
            "Initializing FastEmbed model: {} (cache: {})",
            model_name,
            cache_dir.display()
        );

        std::fs::create_dir_all(cache_dir).with_context(|| {
            format!("Failed to create model cache dir {}", cache_dir.display())
        })?;

        let mut options = InitOptions::default();
        options.model_name = model;
        options.show_download_progress = false;
        options.cache_dir = cache_dir.to_path_buf();

        let embedding_model =
            TextEmbedding::try_new(options).context("Failed to initialize FastEmbed model")?;

        Ok(Self {
            model: Mutex::new(embedding_model),
            model_name,
            dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedManager {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::LockPoisoned(e.to_string()))?;
        let embeddings = model
            .embed(texts, None)
            .context("Failed to generate embeddings")?;

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                bad.len()
            );
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        self.model_name
    }
}
