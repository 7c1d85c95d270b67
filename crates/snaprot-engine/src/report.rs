use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snaprot_common::{Result, RotatorError};

// Per-volume result of one rotation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOutcome {
    pub volume_id: String,
    pub created_snapshot: Option<String>,
    /// Deleted snapshots, or the ones that would be deleted on a dry run.
    pub deleted: Vec<String>,
    pub failed_deletions: Vec<String>,
    /// Snapshots left on the volume according to the plan.
    pub retained: usize,
    pub dry_run: bool,
    pub error: Option<String>,
}

impl VolumeOutcome {
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            ..Self::default()
        }
    }

    pub fn failed(volume_id: impl Into<String>, error: &RotatorError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(volume_id)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed_deletions.is_empty()
    }

    /// Turn failed deletions into an error once every candidate was attempted.
    pub fn check(&self) -> Result<()> {
        if self.failed_deletions.is_empty() {
            return Ok(());
        }
        Err(RotatorError::DeleteFailed {
            volume_id: self.volume_id.clone(),
            failed: self.failed_deletions.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub retain: usize,
    pub dry_run: bool,
    pub volumes: Vec<VolumeOutcome>,
}

impl RotationReport {
    pub fn new(retain: usize, dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            retain,
            dry_run,
            volumes: Vec::new(),
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn snapshots_created(&self) -> usize {
        self.volumes
            .iter()
            .filter(|v| v.created_snapshot.is_some())
            .count()
    }

    pub fn snapshots_deleted(&self) -> usize {
        self.volumes.iter().map(|v| v.deleted.len()).sum()
    }

    pub fn failed_volumes(&self) -> usize {
        self.volumes.iter().filter(|v| !v.is_success()).count()
    }

    /// Fails when any volume did not rotate cleanly.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed_volumes();
        if failed > 0 {
            return Err(RotatorError::VolumesFailed {
                failed,
                total: self.volumes.len(),
            });
        }
        Ok(self)
    }
}
