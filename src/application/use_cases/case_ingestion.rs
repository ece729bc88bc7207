use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::application::use_cases::case_normalizer::normalize;
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::TestCase;
use crate::infrastructure::db::StagingRepository;
use crate::infrastructure::workbook::read_workbook;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub imported: usize,
    pub job_id: String,
    pub ttl: u64,
}

/// Workbook file → normalized test cases → staging store.
pub struct CaseIngestionUseCase {
    staging: Arc<StagingRepository>,
}

impl CaseIngestionUseCase {
    pub fn new(staging: Arc<StagingRepository>) -> Self {
        Self { staging }
    }

    pub async fn execute(&self, path: &Path) -> Result<IngestSummary> {
        let cases = load_cases(path.to_path_buf()).await?;
        let receipt = self.staging.put(&cases).await?;

        info!(
            path = %path.display(),
            imported = cases.len(),
            job_id = %receipt.job_handle,
            "Ingested workbook"
        );
        Ok(IngestSummary {
            imported: cases.len(),
            job_id: receipt.job_handle,
            ttl: receipt.ttl_seconds,
        })
    }
}

/// Reading and normalizing is blocking file work; keep it off the runtime.
async fn load_cases(path: PathBuf) -> Result<Vec<TestCase>> {
    tokio::task::spawn_blocking(move || {
        let rows = read_workbook(&path)?;
        normalize(&rows)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Workbook reader failed: {}", e)))?
}
