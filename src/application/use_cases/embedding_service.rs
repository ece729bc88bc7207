use std::sync::Arc;

use tracing::debug;

use crate::domain::error::{AppError, Result};
use crate::domain::test_case::TestCase;
use crate::infrastructure::embedders::Embedder;

pub const EMBEDDING_DIM: usize = 768;

/// Longest input, in model tokens, that reaches the encoder. Longer texts
/// are cut by the tokenizer without an error.
pub const MAX_SEQUENCE_TOKENS: usize = 512;

pub const DEFAULT_BATCH_SIZE: usize = 32;

pub const TEXT_SEPARATOR: &str = " | ";

/// Text fed to the encoder for one case. Field order is fixed.
pub fn build_embedding_text(case: &TestCase) -> String {
    [
        case.direction.as_str(),
        case.name.as_str(),
        case.steps.as_str(),
        case.expected_result.as_str(),
    ]
    .join(TEXT_SEPARATOR)
}

pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Turns test cases and free-text queries into unit-length vectors.
#[derive(Clone)]
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// One vector per case, in input order.
    pub fn encode(&self, cases: &[TestCase]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = cases.iter().map(build_embedding_text).collect();
        self.embed_texts(&texts)
    }

    pub fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbeddingError("Empty embedding response".to_string()))
    }

    /// Runs `encode` on the blocking pool and hands the cases back with
    /// their vectors.
    pub async fn encode_in_background(
        &self,
        cases: Vec<TestCase>,
    ) -> Result<(Vec<TestCase>, Vec<Vec<f32>>)> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || {
            let vectors = service.encode(&cases)?;
            Ok((cases, vectors))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Embedding worker failed: {}", e)))?
    }

    pub async fn encode_query_in_background(&self, query: String) -> Result<Vec<f32>> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.encode_query(&query))
            .await
            .map_err(|e| AppError::Internal(format!("Embedding worker failed: {}", e)))?
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(AppError::EmbeddingError(format!(
                "Embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let expected = self.embedder.dimension();
        for vector in vectors.iter_mut() {
            if vector.len() != expected {
                return Err(AppError::EmbeddingError(format!(
                    "Embedder returned a {}-dimensional vector, expected {}",
                    vector.len(),
                    expected
                )));
            }
            l2_normalize(vector);
        }

        debug!(
            model = self.embedder.model_name(),
            count = vectors.len(),
            "Encoded texts"
        );
        Ok(vectors)
    }
}
