use std::sync::Arc;

use crate::application::use_cases::case_ingestion::CaseIngestionUseCase;
use crate::application::use_cases::collection_admin::CollectionAdminUseCase;
use crate::application::use_cases::embedding_service::EmbeddingService;
use crate::application::use_cases::vector_search::VectorSearchUseCase;
use crate::application::use_cases::vectorizer::VectorizeUseCase;
use crate::domain::vector_record::IndexConfig;
use crate::infrastructure::db::{StagingRepository, VectorRepository};

/// Everything a request handler needs, built once at startup.
pub struct AppState {
    pub case_ingestion_use_case: CaseIngestionUseCase,
    pub vectorize_use_case: VectorizeUseCase,
    pub vector_search_use_case: VectorSearchUseCase,
    pub collection_admin_use_case: CollectionAdminUseCase,
    pub embedding_service: EmbeddingService,
    pub staging_repository: Arc<StagingRepository>,
    pub vector_repository: Arc<VectorRepository>,
}

impl AppState {
    pub fn new(
        staging_repository: Arc<StagingRepository>,
        vector_repository: Arc<VectorRepository>,
        embedding_service: EmbeddingService,
        index: IndexConfig,
    ) -> Self {
        Self {
            case_ingestion_use_case: CaseIngestionUseCase::new(staging_repository.clone()),
            vectorize_use_case: VectorizeUseCase::new(
                staging_repository.clone(),
                vector_repository.clone(),
                embedding_service.clone(),
                index,
            ),
            vector_search_use_case: VectorSearchUseCase::new(
                vector_repository.clone(),
                embedding_service.clone(),
            ),
            collection_admin_use_case: CollectionAdminUseCase::new(vector_repository.clone()),
            embedding_service,
            staging_repository,
            vector_repository,
        }
    }
}
