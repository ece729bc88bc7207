use tracing::{info, warn};

use crate::domain::error::{AppError, Result};
use crate::domain::vector_record::{validate_collection_name, EnsureOutcome, IndexConfig};

use super::entities::VectorCollectionEntity;
use super::VectorRepository;

impl VectorRepository {
    pub(super) async fn fetch_collection(
        &self,
        name: &str,
    ) -> Result<Option<VectorCollectionEntity>> {
        sqlx::query_as::<_, VectorCollectionEntity>(
            "SELECT name, dim, metric_type, index_type, index_params, created_at
             FROM vector_collections WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch collection: {}", e)))
    }

    pub(super) async fn require_collection(&self, name: &str) -> Result<VectorCollectionEntity> {
        self.fetch_collection(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", name)))
    }

    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.fetch_collection(name).await?.is_some())
    }

    #[cfg(test)]
    pub async fn get_collection(
        &self,
        name: &str,
    ) -> Result<crate::domain::vector_record::CollectionInfo> {
        self.require_collection(name).await?.into_info()
    }

    /// Creates the collection unless it already exists. An existing
    /// collection is never altered, whatever `dim` was asked for.
    pub async fn ensure_collection(
        &self,
        name: &str,
        dim: usize,
        index: &IndexConfig,
    ) -> Result<EnsureOutcome> {
        validate_collection_name(name)?;
        if dim == 0 {
            return Err(AppError::ValidationError(
                "Collection dimension must be greater than zero".to_string(),
            ));
        }

        if let Some(existing) = self.fetch_collection(name).await? {
            return Ok(existing_outcome(name, existing.dimension(), dim));
        }

        let created = sqlx::query(
            "INSERT INTO vector_collections (name, dim, metric_type, index_type, index_params, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(dim as i64)
        .bind(index.metric.as_str())
        .bind(index.index_type.as_str())
        .bind(index.params.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create collection: {}", e)))?;

        if created.rows_affected() == 1 {
            info!(
                collection = name,
                dim,
                metric = %index.metric,
                index_type = %index.index_type,
                "Created vector collection"
            );
            return Ok(EnsureOutcome::Created);
        }

        // Lost a race with a concurrent creator.
        let existing = self.require_collection(name).await?;
        Ok(existing_outcome(name, existing.dimension(), dim))
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT name FROM vector_collections ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list collections: {}", e)))
    }

    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM vector_records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete records: {}", e)))?;

        let dropped = sqlx::query("DELETE FROM vector_collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to drop collection: {}", e)))?;

        if dropped.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Collection '{}' not found",
                name
            )));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        info!(collection = name, "Dropped vector collection");
        Ok(())
    }
}

fn existing_outcome(name: &str, stored_dim: usize, requested_dim: usize) -> EnsureOutcome {
    let dimension_mismatch = stored_dim != requested_dim;
    if dimension_mismatch {
        warn!(
            collection = name,
            stored_dim,
            requested_dim,
            "Collection exists with a different dimension; leaving it unchanged"
        );
    }
    EnsureOutcome::Existing {
        dim: stored_dim,
        dimension_mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{record, repository};
    use super::*;

    #[tokio::test]
    async fn test_ensure_creates_once() {
        let (_dir, repo) = repository().await;
        let index = IndexConfig::default();

        assert_eq!(
            repo.ensure_collection("cases", 4, &index).await.unwrap(),
            EnsureOutcome::Created
        );
        assert_eq!(
            repo.ensure_collection("cases", 4, &index).await.unwrap(),
            EnsureOutcome::Existing {
                dim: 4,
                dimension_mismatch: false
            }
        );

        let info = repo.get_collection("cases").await.unwrap();
        assert_eq!(info.dim, 4);
        assert_eq!(info.index, index);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_yields_one_collection() {
        let (_dir, repo) = repository().await;
        let index = IndexConfig::default();

        let (a, b) = tokio::join!(
            repo.ensure_collection("cases", 4, &index),
            repo.ensure_collection("cases", 4, &index)
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        let created = outcomes
            .iter()
            .filter(|o| **o == EnsureOutcome::Created)
            .count();

        assert_eq!(created, 1);
        assert_eq!(repo.list_collections().await.unwrap(), vec!["cases"]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_collection_untouched() {
        let (_dir, repo) = repository().await;
        let index = IndexConfig::default();
        repo.ensure_collection("cases", 4, &index).await.unwrap();

        let outcome = repo.ensure_collection("cases", 8, &index).await.unwrap();
        assert_eq!(
            outcome,
            EnsureOutcome::Existing {
                dim: 4,
                dimension_mismatch: true
            }
        );
        assert_eq!(repo.get_collection("cases").await.unwrap().dim, 4);
    }

    #[tokio::test]
    async fn test_invalid_name_and_zero_dim_are_rejected() {
        let (_dir, repo) = repository().await;
        let index = IndexConfig::default();
        assert!(matches!(
            repo.ensure_collection("bad-name", 4, &index).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            repo.ensure_collection("cases", 0, &index).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_drop_removes_collection_and_records() {
        let (_dir, repo) = repository().await;
        let index = IndexConfig::default();
        repo.ensure_collection("b_cases", 2, &index).await.unwrap();
        repo.ensure_collection("a_cases", 2, &index).await.unwrap();
        repo.insert("b_cases", &[record(0, 1, vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(
            repo.list_collections().await.unwrap(),
            vec!["a_cases", "b_cases"]
        );

        repo.drop_collection("b_cases").await.unwrap();
        assert_eq!(repo.list_collections().await.unwrap(), vec!["a_cases"]);
        assert!(!repo.has_collection("b_cases").await.unwrap());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_records")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);

        assert!(matches!(
            repo.drop_collection("b_cases").await,
            Err(AppError::NotFound(_))
        ));
    }
}
