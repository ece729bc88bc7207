//! Staging store for normalized datasets.
//!
//! A dataset is written once under a fresh job handle and can be read until
//! its TTL runs out. Reads never extend the TTL and there is no delete; rows
//! past their expiry are invisible and get purged on the next `put`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::error::{AppError, Result};
use crate::domain::staging::{StagedDataset, StagingReceipt};
use crate::domain::test_case::TestCase;

#[derive(sqlx::FromRow)]
struct StagedDatasetEntity {
    job_handle: String,
    payload: String,
    created_at: i64,
    expires_at: i64,
}

pub struct StagingRepository {
    pool: SqlitePool,
    ttl_seconds: u64,
}

impl StagingRepository {
    pub fn new(pool: SqlitePool, ttl_seconds: u64) -> Self {
        Self { pool, ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub async fn put(&self, cases: &[TestCase]) -> Result<StagingReceipt> {
        self.put_with_ttl(cases, self.ttl_seconds).await
    }

    pub async fn put_with_ttl(&self, cases: &[TestCase], ttl_seconds: u64) -> Result<StagingReceipt> {
        let payload = serde_json::to_string(cases)?;
        let job_handle = Uuid::new_v4().simple().to_string();
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl_seconds.saturating_mul(1_000)).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);

        let purged = self.purge_expired(now).await?;
        if purged > 0 {
            debug!(purged, "Purged expired staged datasets");
        }

        sqlx::query(
            "INSERT INTO staged_datasets (job_handle, payload, case_count, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&job_handle)
        .bind(&payload)
        .bind(cases.len() as i64)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to stage dataset: {}", e)))?;

        info!(
            job_handle = %job_handle,
            cases = cases.len(),
            ttl_seconds,
            "Staged normalized dataset"
        );
        Ok(StagingReceipt {
            job_handle,
            ttl_seconds,
        })
    }

    pub async fn get(&self, job_handle: &str) -> Result<StagedDataset> {
        let now = Utc::now().timestamp_millis();
        let entity = sqlx::query_as::<_, StagedDatasetEntity>(
            "SELECT job_handle, payload, created_at, expires_at
             FROM staged_datasets WHERE job_handle = ? AND expires_at > ?",
        )
        .bind(job_handle)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch staged dataset: {}", e)))?;

        let Some(entity) = entity else {
            return Err(AppError::NotFound(format!(
                "job_id '{}' not found or expired",
                job_handle
            )));
        };

        let cases: Vec<TestCase> = serde_json::from_str(&entity.payload).map_err(|e| {
            AppError::Internal(format!("Staged dataset {} is corrupt: {}", job_handle, e))
        })?;

        Ok(StagedDataset {
            job_handle: entity.job_handle,
            cases,
            created_at: from_millis(entity.created_at),
            expires_at: from_millis(entity.expires_at),
        })
    }

    async fn purge_expired(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM staged_datasets WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to purge expired datasets: {}", e))
            })?;
        Ok(result.rows_affected())
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::connection::{init_database, STAGING_SCHEMA};
    use tempfile::TempDir;

    async fn repository(ttl_seconds: u64) -> (TempDir, StagingRepository) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("staging.db"), &STAGING_SCHEMA)
            .await
            .unwrap();
        (dir, StagingRepository::new(pool, ttl_seconds))
    }

    fn cases() -> Vec<TestCase> {
        vec![
            TestCase {
                id: 2,
                direction: "Auth".to_string(),
                section: "Login".to_string(),
                name: "Wrong password".to_string(),
                steps: "Enter a wrong password".to_string(),
                expected_result: "Error shown".to_string(),
            },
            TestCase {
                id: 1,
                direction: "Auth".to_string(),
                section: "Login".to_string(),
                name: "Happy path".to_string(),
                steps: String::new(),
                expected_result: String::new(),
            },
        ]
    }

    #[tokio::test]
    async fn test_get_returns_what_was_put() {
        let (_dir, repo) = repository(3_600).await;
        let receipt = repo.put(&cases()).await.unwrap();

        assert_eq!(receipt.ttl_seconds, 3_600);
        assert_eq!(receipt.job_handle.len(), 32);

        let staged = repo.get(&receipt.job_handle).await.unwrap();
        assert_eq!(staged.cases, cases());
        assert!(staged.expires_at > staged.created_at);

        // Re-reads are allowed and identical.
        let again = repo.get(&receipt.job_handle).await.unwrap();
        assert_eq!(again.cases, staged.cases);
        assert_eq!(again.expires_at, staged.expires_at);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let (_dir, repo) = repository(3_600).await;
        assert!(matches!(
            repo.get("deadbeef").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_handle_is_not_found_without_prior_reads() {
        let (_dir, repo) = repository(3_600).await;
        let receipt = repo.put_with_ttl(&cases(), 0).await.unwrap();
        assert!(matches!(
            repo.get(&receipt.job_handle).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_purges_expired_rows() {
        let (_dir, repo) = repository(3_600).await;
        repo.put_with_ttl(&cases(), 0).await.unwrap();
        let live = repo.put(&cases()).await.unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staged_datasets")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
        assert!(repo.get(&live.job_handle).await.is_ok());
    }
}
