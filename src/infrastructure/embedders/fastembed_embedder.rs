use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use super::Embedder;
use crate::domain::error::{AppError, Result};

pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-mpnet-base-v2";

/// ONNX sentence-embedding model loaded on first use.
pub struct FastEmbedder {
    model_name: String,
    model: EmbeddingModel,
    dimension: usize,
    max_length: usize,
    batch_size: usize,
    cache_dir: Option<PathBuf>,
    embedder: Mutex<Option<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn new(
        model_name: &str,
        max_length: usize,
        batch_size: usize,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let (model, dimension) = Self::resolve_model(model_name)?;
        Ok(Self {
            model_name: model_name.trim().to_lowercase(),
            model,
            dimension,
            max_length,
            batch_size,
            cache_dir,
            embedder: Mutex::new(None),
        })
    }

    fn resolve_model(model: &str) -> Result<(EmbeddingModel, usize)> {
        let normalized = model.trim().to_lowercase();
        let name = normalized.trim_start_matches("sentence-transformers/");
        match name {
            "paraphrase-multilingual-mpnet-base-v2" => {
                Ok((EmbeddingModel::ParaphraseMLMpnetBaseV2, 768))
            }
            "multilingual-e5-base" | "intfloat/multilingual-e5-base" => {
                Ok((EmbeddingModel::MultilingualE5Base, 768))
            }
            "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
            other => Err(AppError::ConfigError(format!(
                "Unsupported embedding model: {}",
                other
            ))),
        }
    }

    fn load(&self) -> Result<TextEmbedding> {
        info!(
            model = %self.model_name,
            max_length = self.max_length,
            "Loading sentence-embedding model"
        );
        let mut options = InitOptions::new(self.model.clone())
            .with_max_length(self.max_length)
            .with_show_download_progress(false);
        if let Some(cache_dir) = &self.cache_dir {
            options = options.with_cache_dir(cache_dir.clone());
        }
        TextEmbedding::try_new(options)
            .map_err(|e| AppError::EmbeddingError(format!("Failed to init embedder: {}", e)))
    }
}

impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut guard = self
            .embedder
            .lock()
            .map_err(|_| AppError::Internal("Embedder lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let embedder = guard
            .as_mut()
            .ok_or_else(|| AppError::Internal("Embedder unavailable".to_string()))?;

        embedder
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| AppError::EmbeddingError(format!("Failed to embed texts: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_model_is_768_wide() {
        let embedder = FastEmbedder::new(
            "sentence-transformers/paraphrase-multilingual-mpnet-base-v2",
            512,
            32,
            None,
        )
        .unwrap();
        assert_eq!(embedder.dimension(), 768);
        assert_eq!(embedder.model_name(), "sentence-transformers/paraphrase-multilingual-mpnet-base-v2");
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(matches!(
            FastEmbedder::new("word2vec", 512, 32, None),
            Err(AppError::ConfigError(_))
        ));
    }
}
