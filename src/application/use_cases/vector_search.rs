use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::application::use_cases::embedding_service::EmbeddingService;
use crate::domain::error::{AppError, Result};
use crate::domain::vector_record::{
    SearchMode, SearchParams, VectorHit, VectorRecord, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT,
};
use crate::infrastructure::db::VectorRepository;

pub const DEFAULT_TEXT_COLLECTION: &str = "test_cases";
pub const MIN_QUERY_CHARS: usize = 3;
pub const DEFAULT_TOP_K: usize = 10;
pub const MAX_TOP_K: usize = 100;

/// A free-text search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextHit {
    pub id: i64,
    pub idx: i64,
    pub score: f32,
    pub snippet: String,
}

pub struct VectorSearchUseCase {
    vectors: Arc<VectorRepository>,
    embedding_service: EmbeddingService,
}

impl VectorSearchUseCase {
    pub fn new(vectors: Arc<VectorRepository>, embedding_service: EmbeddingService) -> Self {
        Self {
            vectors,
            embedding_service,
        }
    }

    /// Looks records up by batch key, by test-case id or by similarity.
    /// A missing collection is reported before any parameter problem.
    pub async fn search(
        &self,
        collection: &str,
        mode: SearchMode,
        params: SearchParams,
    ) -> Result<Vec<VectorHit>> {
        if !self.vectors.has_collection(collection).await? {
            return Err(AppError::NotFound(format!(
                "Collection '{}' not found",
                collection
            )));
        }

        let hits = match mode {
            SearchMode::ByKey => {
                let keys = params.keys.filter(|k| !k.is_empty()).ok_or_else(|| {
                    AppError::ValidationError("Field 'idx' is required for mode=by_key".to_string())
                })?;
                without_scores(self.vectors.get_by_keys(collection, &keys).await?)
            }
            SearchMode::ByInnerId => {
                let inner_id = params.inner_id.ok_or_else(|| {
                    AppError::ValidationError(
                        "Field 'inner_id' is required for mode=by_inner_id".to_string(),
                    )
                })?;
                without_scores(self.vectors.query_by_inner_id(collection, inner_id).await?)
            }
            SearchMode::Semantic => {
                let vector = params.vector.ok_or_else(|| {
                    AppError::ValidationError(
                        "Field 'vector' is required for mode=semantic".to_string(),
                    )
                })?;
                let limit = search_limit(params.limit)?;
                self.vectors.search_vectors(collection, &vector, limit).await?
            }
        };

        debug!(collection, mode = ?mode, results = hits.len(), "Vector search");
        Ok(hits)
    }

    /// Encodes `query` and runs a semantic search over `collection`
    /// (default `test_cases`).
    pub async fn search_text(
        &self,
        query: &str,
        top_k: Option<usize>,
        collection: Option<&str>,
    ) -> Result<Vec<TextHit>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(AppError::ValidationError(format!(
                "Query must be at least {} characters",
                MIN_QUERY_CHARS
            )));
        }
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(AppError::ValidationError(format!(
                "top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }
        let collection = collection.unwrap_or(DEFAULT_TEXT_COLLECTION);

        if !self.vectors.has_collection(collection).await? {
            return Err(AppError::NotFound(format!(
                "Collection '{}' not found",
                collection
            )));
        }

        let vector = self
            .embedding_service
            .encode_query_in_background(query.to_string())
            .await?;
        let hits = self.vectors.search_vectors(collection, &vector, top_k).await?;

        Ok(hits
            .into_iter()
            .map(|hit| TextHit {
                id: hit.record.inner_id,
                idx: hit.record.idx,
                score: hit.score.unwrap_or_default(),
                snippet: hit.record.test_case_name,
            })
            .collect())
    }
}

fn search_limit(limit: Option<usize>) -> Result<usize> {
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if (1..=MAX_SEARCH_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(AppError::ValidationError(format!(
            "limit must be between 1 and {}",
            MAX_SEARCH_LIMIT
        )))
    }
}

fn without_scores(records: Vec<VectorRecord>) -> Vec<VectorHit> {
    records
        .into_iter()
        .map(|record| VectorHit {
            record,
            score: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::embedding_service::{build_embedding_text, EMBEDDING_DIM};
    use crate::application::use_cases::vectorizer::build_records;
    use crate::domain::test_case::TestCase;
    use crate::domain::vector_record::IndexConfig;
    use crate::infrastructure::db::connection::{init_database, VECTOR_SCHEMA};
    use crate::infrastructure::db::vectors::test_support::record;
    use crate::infrastructure::embedders::HashEmbedder;

    fn cases() -> Vec<TestCase> {
        vec![
            TestCase {
                id: 1,
                direction: "Платежи".to_string(),
                section: "Карты".to_string(),
                name: "Оплата картой".to_string(),
                steps: "Открыть корзину Нажать оплатить".to_string(),
                expected_result: "Платёж проведён".to_string(),
            },
            TestCase {
                id: 2,
                direction: "Профиль".to_string(),
                section: "Аватар".to_string(),
                name: "Смена аватара".to_string(),
                steps: "Открыть профиль Загрузить фото".to_string(),
                expected_result: "Аватар обновлён".to_string(),
            },
        ]
    }

    async fn seeded() -> (tempfile::TempDir, VectorSearchUseCase, Vec<Vec<f32>>) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("vectors.db"), &VECTOR_SCHEMA)
            .await
            .unwrap();
        let vectors = Arc::new(VectorRepository::new(pool));
        let embedding = EmbeddingService::new(Arc::new(HashEmbedder::new(EMBEDDING_DIM)));

        let cases = cases();
        let encoded = embedding.encode(&cases).unwrap();
        vectors
            .ensure_collection("test_cases", EMBEDDING_DIM, &IndexConfig::default())
            .await
            .unwrap();
        vectors
            .insert("test_cases", &build_records(&cases, encoded.clone()).unwrap())
            .await
            .unwrap();

        let use_case = VectorSearchUseCase::new(vectors, embedding);
        (dir, use_case, encoded)
    }

    #[tokio::test]
    async fn test_semantic_self_match_ranks_first() {
        let (_dir, use_case, encoded) = seeded().await;
        let params = SearchParams {
            vector: Some(encoded[1].clone()),
            limit: Some(2),
            ..Default::default()
        };

        let hits = use_case
            .search("test_cases", SearchMode::Semantic, params)
            .await
            .unwrap();
        assert_eq!(hits[0].record.inner_id, 2);
        assert!((hits[0].score.unwrap() - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_lookup_modes() {
        let (_dir, use_case, _) = seeded().await;

        let by_key = use_case
            .search(
                "test_cases",
                SearchMode::ByKey,
                SearchParams {
                    keys: Some(vec![1]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_key.len(), 1);
        assert_eq!(by_key[0].record.inner_id, 2);
        assert_eq!(by_key[0].score, None);

        let by_inner = use_case
            .search(
                "test_cases",
                SearchMode::ByInnerId,
                SearchParams {
                    inner_id: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_inner.len(), 1);
        assert_eq!(by_inner[0].record.idx, 0);
    }

    #[tokio::test]
    async fn test_missing_parameters_are_validation_errors() {
        let (_dir, use_case, encoded) = seeded().await;

        for (mode, params) in [
            (
                SearchMode::ByKey,
                SearchParams {
                    keys: Some(vec![]),
                    ..Default::default()
                },
            ),
            (SearchMode::ByInnerId, SearchParams::default()),
            (SearchMode::Semantic, SearchParams::default()),
            (
                SearchMode::Semantic,
                SearchParams {
                    vector: Some(vec![1.0, 0.0]),
                    ..Default::default()
                },
            ),
            (
                SearchMode::Semantic,
                SearchParams {
                    vector: Some(encoded[0].clone()),
                    limit: Some(129),
                    ..Default::default()
                },
            ),
        ] {
            assert!(matches!(
                use_case.search("test_cases", mode, params).await,
                Err(AppError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_semantic_limit_defaults_to_ten_and_rejects_zero() {
        let (_dir, use_case, _) = seeded().await;
        use_case
            .vectors
            .ensure_collection("many", 2, &IndexConfig::default())
            .await
            .unwrap();
        let batch: Vec<_> = (0..12).map(|i| record(i, i, vec![1.0, 0.0])).collect();
        use_case.vectors.insert("many", &batch).await.unwrap();

        let hits = use_case
            .search(
                "many",
                SearchMode::Semantic,
                SearchParams {
                    vector: Some(vec![1.0, 0.0]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), DEFAULT_SEARCH_LIMIT);

        assert!(matches!(
            use_case
                .search(
                    "many",
                    SearchMode::Semantic,
                    SearchParams {
                        vector: Some(vec![1.0, 0.0]),
                        limit: Some(0),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_collection_wins_over_bad_params() {
        let (_dir, use_case, _) = seeded().await;
        assert!(matches!(
            use_case
                .search("ghost", SearchMode::ByInnerId, SearchParams::default())
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_text() {
        let (_dir, use_case, _) = seeded().await;
        // Same text the first case was encoded from.
        let query = build_embedding_text(&cases()[0]);

        let hits = use_case.search_text(&query, Some(1), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[0].snippet, "Оплата картой");

        assert!(matches!(
            use_case.search_text("ab", None, None).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            use_case.search_text("оплата", Some(0), None).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            use_case.search_text("оплата", None, Some("ghost")).await,
            Err(AppError::NotFound(_))
        ));
    }
}
