use chrono::{DateTime, Utc};
use serde::Serialize;

use super::test_case::TestCase;

pub const DEFAULT_STAGING_TTL_SECONDS: u64 = 3_600;

/// What `put` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingReceipt {
    pub job_handle: String,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedDataset {
    pub job_handle: String,
    pub cases: Vec<TestCase>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
