use tracing::{debug, info};

use crate::domain::error::{AppError, Result};
use crate::domain::vector_record::{MetricType, VectorHit, VectorRecord};

use super::entities::{VectorRecordEntity, RECORD_COLUMNS};
use super::{embedding_to_bytes, VectorRepository, MAX_NAME_BYTES, MAX_TEXT_BYTES};

impl VectorRepository {
    /// Inserts every record or none of them.
    pub async fn insert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize> {
        let stored = self.require_collection(collection).await?;
        let dim = stored.dimension();

        for record in records {
            check_record(record, dim)?;
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for record in records {
            sqlx::query(
                "INSERT INTO vector_records (
                    collection, idx, vector, inner_id, direction_name, section_name,
                    test_case_name, steps, expected_result
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(collection)
            .bind(record.idx)
            .bind(embedding_to_bytes(&record.vector))
            .bind(record.inner_id)
            .bind(&record.direction_name)
            .bind(&record.section_name)
            .bind(&record.test_case_name)
            .bind(&record.steps)
            .bind(&record.expected_result)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert record: {}", e)))?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        info!(collection, inserted = records.len(), "Inserted vector records");
        Ok(records.len())
    }

    /// Every record whose `idx` is in `keys`, including duplicates written
    /// by different batches.
    pub async fn get_by_keys(&self, collection: &str, keys: &[i64]) -> Result<Vec<VectorRecord>> {
        self.require_collection(collection).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        // One JSON parameter keeps large key lists under SQLite's bind limit.
        let sql = format!(
            "SELECT {} FROM vector_records
             WHERE collection = ? AND idx IN (SELECT value FROM json_each(?))
             ORDER BY row_id",
            RECORD_COLUMNS
        );
        let rows = sqlx::query_as::<_, VectorRecordEntity>(&sql)
            .bind(collection)
            .bind(serde_json::to_string(keys)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch records: {}", e)))?;
        rows.into_iter().map(VectorRecordEntity::into_record).collect()
    }

    pub async fn query_by_inner_id(
        &self,
        collection: &str,
        inner_id: i64,
    ) -> Result<Vec<VectorRecord>> {
        self.require_collection(collection).await?;

        let sql = format!(
            "SELECT {} FROM vector_records WHERE collection = ? AND inner_id = ? ORDER BY row_id",
            RECORD_COLUMNS
        );
        let rows = sqlx::query_as::<_, VectorRecordEntity>(&sql)
            .bind(collection)
            .bind(inner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to query records: {}", e)))?;
        rows.into_iter().map(VectorRecordEntity::into_record).collect()
    }

    /// Top `limit` records ranked by the collection metric, best first.
    pub async fn search_vectors(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let stored = self.require_collection(collection).await?;
        let dim = stored.dimension();
        if query.len() != dim {
            return Err(AppError::ValidationError(format!(
                "Query vector has {} dimensions, collection '{}' expects {}",
                query.len(),
                collection,
                dim
            )));
        }
        let metric: MetricType = stored.into_info()?.index.metric;

        let records = self.scan(collection, None).await?;
        let scanned = records.len();
        let mut hits: Vec<VectorHit> = records
            .into_iter()
            .map(|record| {
                let score = metric.score(query, &record.vector);
                VectorHit {
                    record,
                    score: Some(score),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .unwrap_or(f32::MIN)
                .total_cmp(&a.score.unwrap_or(f32::MIN))
        });
        hits.truncate(limit);

        debug!(collection, scanned, returned = hits.len(), "Semantic search");
        Ok(hits)
    }

    /// Up to `limit` records in insertion order.
    pub async fn dump(&self, collection: &str, limit: usize) -> Result<Vec<VectorRecord>> {
        self.require_collection(collection).await?;
        self.scan(collection, Some(limit)).await
    }

    async fn scan(&self, collection: &str, limit: Option<usize>) -> Result<Vec<VectorRecord>> {
        let sql = format!(
            "SELECT {} FROM vector_records WHERE collection = ? ORDER BY row_id LIMIT ?",
            RECORD_COLUMNS
        );
        let limit = limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);

        let rows = sqlx::query_as::<_, VectorRecordEntity>(&sql)
            .bind(collection)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to scan records: {}", e)))?;
        rows.into_iter().map(VectorRecordEntity::into_record).collect()
    }
}

fn check_record(record: &VectorRecord, dim: usize) -> Result<()> {
    if record.vector.len() != dim {
        return Err(AppError::InsertError(format!(
            "Record idx={} has a {}-dimensional vector, collection expects {}",
            record.idx,
            record.vector.len(),
            dim
        )));
    }

    let fields = [
        ("direction_name", record.direction_name.as_str(), MAX_NAME_BYTES),
        ("section_name", record.section_name.as_str(), MAX_NAME_BYTES),
        ("test_case_name", record.test_case_name.as_str(), MAX_NAME_BYTES),
        ("steps", record.steps.as_str(), MAX_TEXT_BYTES),
        ("expected_result", record.expected_result.as_str(), MAX_TEXT_BYTES),
    ];
    for (field, value, max) in fields {
        if value.len() > max {
            return Err(AppError::InsertError(format!(
                "Record idx={} field {} is {} bytes, limit is {}",
                record.idx,
                field,
                value.len(),
                max
            )));
        }
    }
    Ok(())
}
