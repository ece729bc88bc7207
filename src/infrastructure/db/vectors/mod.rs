//! SQLite-backed vector index.
//!
//! Collections are rows of `vector_collections`; their records live in
//! `vector_records` with the embedding stored as a little-endian `f32` blob.
//! Similarity search is an exhaustive scan scored with the collection metric.

use sqlx::SqlitePool;

mod collections;
mod entities;
mod records;

/// Longest `direction_name`, `section_name` and `test_case_name`, in bytes.
pub const MAX_NAME_BYTES: usize = 1_024;

/// Longest `steps` and `expected_result`, in bytes.
pub const MAX_TEXT_BYTES: usize = 8_192;

#[derive(Clone)]
pub struct VectorRepository {
    pool: SqlitePool,
}

impl VectorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub(crate) fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    let mut embedding = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        let arr = [chunk[0], chunk[1], chunk[2], chunk[3]];
        embedding.push(f32::from_le_bytes(arr));
    }

    Some(embedding)
}
