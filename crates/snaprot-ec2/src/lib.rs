//! [`SnapshotProvider`] backed by the EC2 API.
//!
//! Instances are discovered with `DescribeInstances` filtered on the backup
//! tag key, snapshots are listed with `DescribeSnapshots` restricted to the
//! calling account, and every paginated call is drained before returning.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::primitives::DateTime as AwsDateTime;
use aws_sdk_ec2::types::{self as ec2, Filter};
use aws_sdk_ec2::Client;
use chrono::{DateTime, Utc};
use snaprot_common::{
    BlockDevice, Result, RotatorError, Snapshot, SnapshotProvider, SnapshotState, TaggedInstance,
};
use tracing::debug;

pub struct Ec2Provider {
    client: Client,
}

impl Ec2Provider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS credential and region chain.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;
        debug!(region = ?sdk_config.region(), "EC2 client configured");
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl SnapshotProvider for Ec2Provider {
    async fn list_tagged_instances(&self, tag_key: &str) -> Result<Vec<TaggedInstance>> {
        let mut pages = self
            .client
            .describe_instances()
            .filters(Filter::builder().name("tag-key").values(tag_key).build())
            .into_paginator()
            .send();

        let mut instances = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("DescribeInstances", e))?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    instances.push(convert_instance(instance)?);
                }
            }
        }
        Ok(instances)
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<Snapshot> {
        let output = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await
            .map_err(|e| sdk_error("CreateSnapshot", e))?;

        let snapshot_id = output.snapshot_id().ok_or_else(|| {
            RotatorError::MalformedResponse(format!(
                "CreateSnapshot for {volume_id} returned no snapshot id"
            ))
        })?;

        Ok(Snapshot {
            snapshot_id: snapshot_id.to_string(),
            volume_id: output.volume_id().unwrap_or(volume_id).to_string(),
            // An in-progress snapshot may not report its start time yet
            start_time: output.start_time().and_then(to_chrono).unwrap_or_else(Utc::now),
            state: output.state().and_then(convert_state),
        })
    }

    async fn list_snapshots(&self, volume_id: &str) -> Result<Vec<Snapshot>> {
        let mut pages = self
            .client
            .describe_snapshots()
            .owner_ids("self")
            .filters(Filter::builder().name("volume-id").values(volume_id).build())
            .into_paginator()
            .send();

        let mut snapshots = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("DescribeSnapshots", e))?;
            for snapshot in page.snapshots() {
                snapshots.push(convert_snapshot(snapshot, volume_id)?);
            }
        }
        Ok(snapshots)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteSnapshot", e))?;
        Ok(())
    }
}

fn sdk_error<E>(operation: &str, err: E) -> RotatorError
where
    E: std::error::Error + 'static,
{
    RotatorError::provider(operation, DisplayErrorContext(err).to_string())
}

fn to_chrono(time: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(time.secs(), time.subsec_nanos())
}

fn convert_state(state: &ec2::SnapshotState) -> Option<SnapshotState> {
    match state {
        ec2::SnapshotState::Pending => Some(SnapshotState::Pending),
        ec2::SnapshotState::Completed => Some(SnapshotState::Completed),
        ec2::SnapshotState::Error => Some(SnapshotState::Error),
        ec2::SnapshotState::Recoverable => Some(SnapshotState::Recoverable),
        ec2::SnapshotState::Recovering => Some(SnapshotState::Recovering),
        _ => None,
    }
}

fn convert_instance(instance: &ec2::Instance) -> Result<TaggedInstance> {
    let instance_id = instance.instance_id().ok_or_else(|| {
        RotatorError::MalformedResponse(
            "DescribeInstances returned an instance without an id".to_string(),
        )
    })?;

    let block_devices = instance
        .block_device_mappings()
        .iter()
        .filter_map(|mapping| {
            Some(BlockDevice {
                device_name: mapping.device_name()?.to_string(),
                volume_id: mapping
                    .ebs()
                    .and_then(|ebs| ebs.volume_id())
                    .map(str::to_string),
            })
        })
        .collect();

    Ok(TaggedInstance {
        instance_id: instance_id.to_string(),
        root_device_name: instance.root_device_name().map(str::to_string),
        block_devices,
    })
}

// Ordering depends on start times, so a snapshot without one is rejected
fn convert_snapshot(snapshot: &ec2::Snapshot, volume_id: &str) -> Result<Snapshot> {
    let snapshot_id = snapshot.snapshot_id().ok_or_else(|| {
        RotatorError::MalformedResponse(format!(
            "DescribeSnapshots for {volume_id} returned a snapshot without an id"
        ))
    })?;
    let start_time = snapshot.start_time().and_then(to_chrono).ok_or_else(|| {
        RotatorError::MalformedResponse(format!("snapshot {snapshot_id} has no usable start time"))
    })?;

    Ok(Snapshot {
        snapshot_id: snapshot_id.to_string(),
        volume_id: snapshot.volume_id().unwrap_or(volume_id).to_string(),
        start_time,
        state: snapshot.state().and_then(convert_state),
    })
}
