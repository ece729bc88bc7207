use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::use_cases::embedding_service::EmbeddingService;
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::TestCase;
use crate::domain::vector_record::{
    validate_collection_name, EnsureOutcome, IndexConfig, VectorRecord,
};
use crate::infrastructure::db::{StagingRepository, VectorRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorizeSummary {
    pub inserted: usize,
    pub collection: String,
}

/// Staged dataset → embeddings → vector collection.
pub struct VectorizeUseCase {
    staging: Arc<StagingRepository>,
    vectors: Arc<VectorRepository>,
    embedding_service: EmbeddingService,
    index: IndexConfig,
}

impl VectorizeUseCase {
    pub fn new(
        staging: Arc<StagingRepository>,
        vectors: Arc<VectorRepository>,
        embedding_service: EmbeddingService,
        index: IndexConfig,
    ) -> Self {
        Self {
            staging,
            vectors,
            embedding_service,
            index,
        }
    }

    pub async fn execute(&self, job_id: &str, collection: &str) -> Result<VectorizeSummary> {
        validate_collection_name(collection)?;

        let staged = self.staging.get(job_id).await?;
        let (cases, vectors) = self
            .embedding_service
            .encode_in_background(staged.cases)
            .await?;

        let dim = self.embedding_service.dimension();
        let outcome = self
            .vectors
            .ensure_collection(collection, dim, &self.index)
            .await?;
        if let EnsureOutcome::Existing {
            dim: stored,
            dimension_mismatch: true,
        } = outcome
        {
            warn!(
                collection,
                stored_dim = stored,
                model_dim = dim,
                "Target collection dimension differs from the encoder; insert will be rejected"
            );
        }

        let records = build_records(&cases, vectors)?;
        let inserted = self.vectors.insert(collection, &records).await?;

        info!(
            job_id,
            collection,
            inserted,
            model = self.embedding_service.model_name(),
            "Vectorized staged dataset"
        );
        Ok(VectorizeSummary {
            inserted,
            collection: collection.to_string(),
        })
    }
}

/// One record per case; `idx` is the position within this batch.
pub fn build_records(cases: &[TestCase], vectors: Vec<Vec<f32>>) -> Result<Vec<VectorRecord>> {
    if cases.len() != vectors.len() {
        return Err(AppError::Internal(format!(
            "{} vectors for {} cases",
            vectors.len(),
            cases.len()
        )));
    }

    Ok(cases
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(position, (case, vector))| VectorRecord {
            idx: position as i64,
            vector,
            inner_id: case.id,
            direction_name: case.direction.clone(),
            section_name: case.section.clone(),
            test_case_name: case.name.clone(),
            steps: single_line(&case.steps),
            expected_result: single_line(&case.expected_result),
        })
        .collect())
}

fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::embedding_service::EMBEDDING_DIM;
    use crate::infrastructure::db::connection::{init_database, STAGING_SCHEMA, VECTOR_SCHEMA};
    use crate::infrastructure::embedders::HashEmbedder;

    struct Fixture {
        _dir: tempfile::TempDir,
        staging: Arc<StagingRepository>,
        vectors: Arc<VectorRepository>,
        use_case: VectorizeUseCase,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let staging_pool = init_database(&dir.path().join("staging.db"), &STAGING_SCHEMA)
            .await
            .unwrap();
        let vector_pool = init_database(&dir.path().join("vectors.db"), &VECTOR_SCHEMA)
            .await
            .unwrap();
        let staging = Arc::new(StagingRepository::new(staging_pool, 3_600));
        let vectors = Arc::new(VectorRepository::new(vector_pool));
        let embedding = EmbeddingService::new(Arc::new(HashEmbedder::new(EMBEDDING_DIM)));
        let use_case = VectorizeUseCase::new(
            staging.clone(),
            vectors.clone(),
            embedding,
            IndexConfig::default(),
        );
        Fixture {
            _dir: dir,
            staging,
            vectors,
            use_case,
        }
    }

    fn case(id: i64, steps: &str) -> TestCase {
        TestCase {
            id,
            direction: "Auth".to_string(),
            section: "Login".to_string(),
            name: format!("Case {}", id),
            steps: steps.to_string(),
            expected_result: "Line one\nLine two".to_string(),
        }
    }

    #[test]
    fn test_build_records_numbers_batch_and_flattens_text() {
        let records =
            build_records(&[case(5, "a\r\nb"), case(3, "c")], vec![vec![1.0], vec![0.5]]).unwrap();
        assert_eq!(records[0].idx, 0);
        assert_eq!(records[1].idx, 1);
        assert_eq!(records[1].inner_id, 3);
        assert_eq!(records[0].steps, "a b");
        assert_eq!(records[0].expected_result, "Line one Line two");

        assert!(build_records(&[case(1, "")], vec![]).is_err());
    }

    #[tokio::test]
    async fn test_two_cases_end_to_end() {
        let f = fixture().await;
        let receipt = f
            .staging
            .put(&[case(1, "Open form"), case(2, "Submit form")])
            .await
            .unwrap();

        let summary = f
            .use_case
            .execute(&receipt.job_handle, "testcases_v1")
            .await
            .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.collection, "testcases_v1");

        let rows = f.vectors.dump("testcases_v1", 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].inner_id, 1);
        assert_eq!(rows[0].vector.len(), EMBEDDING_DIM);

        // Re-running the same job appends a second batch with the same idx values.
        f.use_case
            .execute(&receipt.job_handle, "testcases_v1")
            .await
            .unwrap();
        assert_eq!(f.vectors.get_by_keys("testcases_v1", &[0]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found_and_creates_nothing() {
        let f = fixture().await;
        assert!(matches!(
            f.use_case.execute("missing", "testcases_v1").await,
            Err(AppError::NotFound(_))
        ));
        assert!(f.vectors.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_collection_with_other_dimension_rejects_insert() {
        let f = fixture().await;
        f.vectors
            .ensure_collection("small", 8, &IndexConfig::default())
            .await
            .unwrap();
        let receipt = f.staging.put(&[case(1, "x")]).await.unwrap();

        assert!(matches!(
            f.use_case.execute(&receipt.job_handle, "small").await,
            Err(AppError::InsertError(_))
        ));
        assert_eq!(f.vectors.get_collection("small").await.unwrap().dim, 8);
    }
}
