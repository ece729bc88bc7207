use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{AppError, Result};

pub const DEFAULT_VECTOR_DIM: usize = 768;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 128;
pub const DEFAULT_DUMP_LIMIT: usize = 1_000;

static COLLECTION_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,254}$").unwrap());

pub fn validate_collection_name(name: &str) -> Result<()> {
    if COLLECTION_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "Invalid collection name '{}': use letters, digits and underscores, starting with a letter or underscore (max 255 chars)",
            name
        )))
    }
}

/// A persisted row of a vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub idx: i64,
    pub vector: Vec<f32>,
    pub inner_id: i64,
    pub direction_name: String,
    pub section_name: String,
    pub test_case_name: String,
    pub steps: String,
    pub expected_result: String,
}

/// A record returned by a lookup. `score` is only set for similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorHit {
    #[serde(flatten)]
    pub record: VectorRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Cosine similarity; over unit vectors this equals the inner product.
    Cosine,
    #[serde(rename = "ip")]
    InnerProduct,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Cosine => "COSINE",
            MetricType::InnerProduct => "IP",
        }
    }

    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            MetricType::Cosine => cosine_similarity(a, b),
            MetricType::InnerProduct => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "COSINE" => Ok(MetricType::Cosine),
            "IP" | "INNER_PRODUCT" => Ok(MetricType::InnerProduct),
            other => Err(AppError::ValidationError(format!(
                "Unsupported metric type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Flat,
    IvfFlat,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Flat => "FLAT",
            IndexType::IvfFlat => "IVF_FLAT",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FLAT" => Ok(IndexType::Flat),
            "IVF_FLAT" => Ok(IndexType::IvfFlat),
            other => Err(AppError::ValidationError(format!(
                "Unsupported index type: {}",
                other
            ))),
        }
    }
}

/// Index configuration recorded with a collection at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub metric: MetricType,
    pub index_type: IndexType,
    pub params: serde_json::Value,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: MetricType::Cosine,
            index_type: IndexType::IvfFlat,
            params: serde_json::json!({ "nlist": 128 }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dim: usize,
    pub index: IndexConfig,
    pub created_at: DateTime<Utc>,
}

/// Result of `ensure_collection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    /// The collection was already there. Its schema is never altered, even
    /// when the requested dimension differs from the stored one.
    Existing { dim: usize, dimension_mismatch: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    #[serde(rename = "by_key", alias = "idx")]
    ByKey,
    #[serde(rename = "by_inner_id", alias = "inner_id")]
    ByInnerId,
    #[serde(rename = "semantic")]
    Semantic,
}

/// Mode-specific parameters; which fields are required depends on the mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub keys: Option<Vec<i64>>,
    pub inner_id: Option<i64>,
    pub vector: Option<Vec<f32>>,
    pub limit: Option<usize>,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
