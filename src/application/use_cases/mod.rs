pub mod case_ingestion;
pub mod case_normalizer;
pub mod collection_admin;
pub mod embedding_service;
pub mod vector_search;
pub mod vectorizer;
