use crate::{
    plan_retention, OnVolumeError, RotationConfig, RotationReport, SnapshotProvider,
    VolumeOutcome,
};
use snaprot_common::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stands in for the snapshot a dry run would have created.
pub const NEW_SNAPSHOT_PLACEHOLDER: &str = "<new snapshot>";

/// Runs the create-then-prune cycle over every tagged boot volume.
pub struct Rotator {
    provider: Arc<dyn SnapshotProvider>,
    config: RotationConfig,
}

impl Rotator {
    pub fn new(provider: Arc<dyn SnapshotProvider>, config: RotationConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// One rotation pass. Volumes are handled one after another; what happens
    /// after a failing volume depends on [`OnVolumeError`].
    pub async fn run(&self) -> Result<RotationReport> {
        let mut report = RotationReport::new(self.config.retain.get(), self.config.dry_run);

        let volumes = self
            .provider
            .list_boot_volumes(&self.config.tag_key, self.config.root_device.as_deref())
            .await?;
        info!(
            tag_key = %self.config.tag_key,
            "found {} boot volume(s) to snapshot",
            volumes.len()
        );

        for volume_id in &volumes {
            let mut outcome = VolumeOutcome::new(volume_id);
            let result = match self.rotate_into(volume_id, &mut outcome).await {
                Ok(()) => outcome.check(),
                Err(err) => Err(err),
            };
            if let Err(err) = &result {
                outcome.error = Some(err.to_string());
            }
            report.volumes.push(outcome);

            if let Err(err) = result {
                match self.config.on_volume_error {
                    OnVolumeError::Abort => return Err(err),
                    OnVolumeError::Continue => {
                        error!(
                            volume = %volume_id,
                            error = %err,
                            "rotation failed, moving on to next volume"
                        );
                    }
                }
            }
        }

        let report = report.finish();
        info!(
            created = report.snapshots_created(),
            deleted = report.snapshots_deleted(),
            failed = report.failed_volumes(),
            "rotation pass complete"
        );
        Ok(report)
    }

    /// Snapshot `volume_id` and prune its history down to the retention count.
    ///
    /// Every deletion candidate is attempted; failed deletions are collected in
    /// the outcome rather than returned, see [`VolumeOutcome::check`].
    pub async fn rotate_volume(&self, volume_id: &str) -> Result<VolumeOutcome> {
        let mut outcome = VolumeOutcome::new(volume_id);
        self.rotate_into(volume_id, &mut outcome).await?;
        Ok(outcome)
    }

    // Fills `outcome` as each step lands, so a snapshot created before a later
    // failure is still recorded.
    async fn rotate_into(&self, volume_id: &str, outcome: &mut VolumeOutcome) -> Result<()> {
        if self.config.dry_run {
            return self.preview_into(volume_id, outcome).await;
        }

        let retain = self.config.retain.get();
        let description = format!("snaprot backup of {volume_id}");
        let created = self.provider.create_snapshot(volume_id, &description).await?;
        info!(
            snapshot = %created.snapshot_id,
            volume = %volume_id,
            "created snapshot {} for volume {}",
            created.snapshot_id,
            volume_id
        );
        outcome.created_snapshot = Some(created.snapshot_id.clone());

        let mut history = self.provider.list_snapshots(volume_id).await?;
        if !history.iter().any(|s| s.snapshot_id == created.snapshot_id) {
            // Listings are eventually consistent; count the new snapshot anyway
            warn!(
                snapshot = %created.snapshot_id,
                volume = %volume_id,
                "new snapshot missing from listing, adding it to the history"
            );
            history.push(created.clone());
        }

        let total = history.len();
        let plan = plan_retention(history, retain);
        if plan.is_noop() {
            debug!(volume = %volume_id, total, retain, "within retention, nothing to delete");
        } else {
            info!(
                volume = %volume_id,
                "total snapshot count of {} for volume {} exceeds maximum retention \
                 of {} snaps per volume, cleaning up older snaps",
                total,
                volume_id,
                retain
            );
        }

        outcome.retained = plan.keep.len();

        for snapshot in &plan.delete {
            match self.provider.delete_snapshot(&snapshot.snapshot_id).await {
                Ok(()) => {
                    info!(
                        snapshot = %snapshot.snapshot_id,
                        volume = %volume_id,
                        "deleted snapshot {} for volume {}",
                        snapshot.snapshot_id,
                        volume_id
                    );
                    outcome.deleted.push(snapshot.snapshot_id.clone());
                }
                Err(err) => {
                    warn!(
                        snapshot = %snapshot.snapshot_id,
                        volume = %volume_id,
                        error = %err,
                        "failed to delete snapshot"
                    );
                    outcome.failed_deletions.push(snapshot.snapshot_id.clone());
                }
            }
        }

        Ok(())
    }

    // Plan against the current history as if one more snapshot had been taken.
    // With a retention of zero that snapshot would be deleted right away too.
    async fn preview_into(&self, volume_id: &str, outcome: &mut VolumeOutcome) -> Result<()> {
        let retain = self.config.retain.get();
        outcome.dry_run = true;
        let history = self.provider.list_snapshots(volume_id).await?;
        let plan = plan_retention(history, retain.saturating_sub(1));

        let mut deleted = plan.delete_ids();
        if retain == 0 {
            deleted.insert(0, NEW_SNAPSHOT_PLACEHOLDER.to_string());
        }

        info!(volume = %volume_id, "[dry-run] would create snapshot for volume {}", volume_id);
        for snapshot_id in &deleted {
            info!(
                snapshot = %snapshot_id,
                volume = %volume_id,
                "[dry-run] would delete snapshot {} for volume {}",
                snapshot_id,
                volume_id
            );
        }

        outcome.deleted = deleted;
        outcome.retained = (plan.keep.len() + 1).min(retain);
        Ok(())
    }
}
