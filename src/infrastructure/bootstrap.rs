use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::application::use_cases::embedding_service::EmbeddingService;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::{EmbeddingProvider, Settings};
use crate::infrastructure::db::{
    init_database, StagingRepository, VectorRepository, STAGING_SCHEMA, VECTOR_SCHEMA,
};
use crate::infrastructure::embedders::{Embedder, FastEmbedder, HashEmbedder};
use crate::infrastructure::storage::{ensure_data_dir, ensure_parent_dir};
use crate::interfaces::http::{add_log, LogEntry};
use crate::interfaces::AppState;

/// Opens both databases, builds the encoder and wires the use cases.
pub async fn bootstrap(settings: &Settings, logs: &Arc<Mutex<Vec<LogEntry>>>) -> Result<Arc<AppState>> {
    let data_dir = ensure_data_dir(&settings.data_dir).map_err(|err| {
        error!(
            error = %err,
            data_dir = %settings.data_dir.display(),
            "Failed to create data dir"
        );
        AppError::IoError(format!("Failed to create data dir: {}", err))
    })?;

    let staging_db_path = settings.staging_db_path();
    let vector_db_path = settings.vector_db_path();
    ensure_parent_dir(&staging_db_path)?;
    ensure_parent_dir(&vector_db_path)?;

    let staging_pool = init_database(&staging_db_path, &STAGING_SCHEMA).await?;
    let vector_pool = init_database(&vector_db_path, &VECTOR_SCHEMA).await?;

    let staging_repository = Arc::new(StagingRepository::new(
        staging_pool,
        settings.staging.ttl_seconds,
    ));
    let vector_repository = Arc::new(VectorRepository::new(vector_pool));

    let embedder = build_embedder(settings)?;
    let embedding_service = EmbeddingService::new(embedder);
    if embedding_service.dimension() != settings.vector_index.default_dim {
        add_log(
            logs,
            "WARN",
            "System",
            &format!(
                "Encoder {} produces {}-d vectors but vector_index.default_dim is {}",
                embedding_service.model_name(),
                embedding_service.dimension(),
                settings.vector_index.default_dim
            ),
        );
    }

    add_log(
        logs,
        "INFO",
        "System",
        &format!(
            "Data dir {} ready (staging TTL {}s, encoder {})",
            data_dir.display(),
            settings.staging.ttl_seconds,
            embedding_service.model_name()
        ),
    );
    info!(
        data_dir = %data_dir.display(),
        app_env = %settings.app_env,
        encoder = embedding_service.model_name(),
        "Backend initialized"
    );

    Ok(Arc::new(AppState::new(
        staging_repository,
        vector_repository,
        embedding_service,
        settings.index_config(),
    )))
}

fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let embedding = &settings.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.provider {
        EmbeddingProvider::Fastembed => Arc::new(FastEmbedder::new(
            &embedding.model,
            embedding.max_length,
            embedding.batch_size,
            embedding.cache_dir.clone(),
        )?),
        EmbeddingProvider::Hash => {
            Arc::new(HashEmbedder::new(settings.vector_index.default_dim))
        }
    };
    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_with_hash_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.data_dir = dir.path().join("nested").join("data");
        settings.embedding.provider = EmbeddingProvider::Hash;
        settings.vector_index.default_dim = 16;
        let logs = Arc::new(Mutex::new(Vec::new()));

        let state = bootstrap(&settings, &logs).await.unwrap();

        assert!(settings.staging_db_path().exists());
        assert!(settings.vector_db_path().exists());
        assert_eq!(state.embedding_service.dimension(), 16);
        assert!(state.vector_repository.list_collections().await.unwrap().is_empty());
        assert!(!logs.lock().unwrap().is_empty());
    }
}
