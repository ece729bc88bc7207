use crate::domain::error::Result;

mod fastembed_embedder;
mod hash_embedder;

pub use self::fastembed_embedder::{FastEmbedder, DEFAULT_MODEL};
pub use self::hash_embedder::HashEmbedder;

/// Model behind the embedding encoder.
///
/// Implementations are CPU-bound and synchronous; callers move them to the
/// blocking pool. Outputs are not required to be normalized.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
