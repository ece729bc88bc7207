use std::sync::Arc;

use tracing::info;

use crate::domain::error::{AppError, Result};
use crate::domain::vector_record::{VectorRecord, DEFAULT_DUMP_LIMIT};
use crate::infrastructure::db::VectorRepository;

/// Largest page a dump may return in one call.
pub const MAX_DUMP_LIMIT: usize = 16_384;

pub struct CollectionAdminUseCase {
    vectors: Arc<VectorRepository>,
}

impl CollectionAdminUseCase {
    pub fn new(vectors: Arc<VectorRepository>) -> Self {
        Self { vectors }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.vectors.list_collections().await
    }

    pub async fn dump(&self, collection: &str, limit: Option<usize>) -> Result<Vec<VectorRecord>> {
        let limit = limit.unwrap_or(DEFAULT_DUMP_LIMIT);
        if !(1..=MAX_DUMP_LIMIT).contains(&limit) {
            return Err(AppError::ValidationError(format!(
                "limit must be between 1 and {}",
                MAX_DUMP_LIMIT
            )));
        }
        self.vectors.dump(collection, limit).await
    }

    pub async fn drop(&self, collection: &str) -> Result<String> {
        self.vectors.drop_collection(collection).await?;
        info!(collection, "Collection dropped by admin request");
        Ok(collection.to_string())
    }
}
