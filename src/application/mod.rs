pub mod use_cases;

pub use use_cases::case_ingestion::CaseIngestionUseCase;
pub use use_cases::collection_admin::CollectionAdminUseCase;
pub use use_cases::vector_search::VectorSearchUseCase;
pub use use_cases::vectorizer::VectorizeUseCase;
