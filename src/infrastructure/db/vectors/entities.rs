use crate::domain::error::{AppError, Result};
use crate::domain::vector_record::{CollectionInfo, IndexConfig, VectorRecord};

use super::bytes_to_embedding;

#[derive(sqlx::FromRow)]
pub(super) struct VectorCollectionEntity {
    pub name: String,
    pub dim: i64,
    metric_type: String,
    index_type: String,
    index_params: String,
    created_at: String,
}

impl VectorCollectionEntity {
    pub fn dimension(&self) -> usize {
        usize::try_from(self.dim).unwrap_or(0)
    }

    pub fn into_info(self) -> Result<CollectionInfo> {
        let params = serde_json::from_str(&self.index_params).map_err(|e| {
            AppError::DatabaseError(format!(
                "Collection {} has unreadable index params: {}",
                self.name, e
            ))
        })?;

        Ok(CollectionInfo {
            dim: self.dimension(),
            index: IndexConfig {
                metric: self.metric_type.parse()?,
                index_type: self.index_type.parse()?,
                params,
            },
            created_at: chrono::DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            name: self.name,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct VectorRecordEntity {
    idx: i64,
    vector: Vec<u8>,
    inner_id: i64,
    direction_name: String,
    section_name: String,
    test_case_name: String,
    steps: String,
    expected_result: String,
}

impl VectorRecordEntity {
    pub fn into_record(self) -> Result<VectorRecord> {
        let vector = bytes_to_embedding(&self.vector).ok_or_else(|| {
            AppError::DatabaseError(format!(
                "Record idx={} has a malformed vector blob ({} bytes)",
                self.idx,
                self.vector.len()
            ))
        })?;

        Ok(VectorRecord {
            idx: self.idx,
            vector,
            inner_id: self.inner_id,
            direction_name: self.direction_name,
            section_name: self.section_name,
            test_case_name: self.test_case_name,
            steps: self.steps,
            expected_result: self.expected_result,
        })
    }
}

pub(super) const RECORD_COLUMNS: &str =
    "idx, vector, inner_id, direction_name, section_name, test_case_name, steps, expected_result";
