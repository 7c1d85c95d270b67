// Re-export dependencies used in public interfaces of common types

use std::fmt::Display;

use async_trait::async_trait;
pub use chrono;
use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod discovery;

#[derive(Error, Debug)]
pub enum RotatorError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Provider Error during {operation}: {message}")]
    Provider { operation: String, message: String },

    #[error("Malformed Provider Response: {0}")]
    MalformedResponse(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error(
        "Failed to delete {} snapshot(s) of volume {volume_id}: {}",
        .failed.len(),
        .failed.join(", ")
    )]
    DeleteFailed {
        volume_id: String,
        failed: Vec<String>,
    },

    #[error("{failed} of {total} volume(s) failed to rotate")]
    VolumesFailed { failed: usize, total: usize },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl RotatorError {
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

// Define the primary Result type for rotation operations
pub type Result<T> = std::result::Result<T, RotatorError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    pub device_name: String,
    /// EBS volume backing the device, `None` for instance-store devices.
    #[serde(default)]
    pub volume_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedInstance {
    pub instance_id: String,
    #[serde(default)]
    pub root_device_name: Option<String>,
    #[serde(default)]
    pub block_devices: Vec<BlockDevice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
    Recoverable,
    Recovering,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub volume_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub state: Option<SnapshotState>,
}

impl Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Snapshot(id: {}, volume: {}, started: {})",
            self.snapshot_id,
            self.volume_id,
            self.start_time.to_rfc3339()
        )
    }
}

/// Boundary to the cloud provider's instance and snapshot catalog.
///
/// Every rotation pass talks to the provider only through this trait, so a
/// handle is passed into the engine explicitly and tests can substitute an
/// in-memory catalog.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Instances carrying `tag_key`, regardless of the tag's value.
    async fn list_tagged_instances(&self, tag_key: &str) -> Result<Vec<TaggedInstance>>;

    /// The returned snapshot may still be in progress.
    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<Snapshot>;

    /// Full current snapshot history of `volume_id`.
    async fn list_snapshots(&self, volume_id: &str) -> Result<Vec<Snapshot>>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;

    /// Volumes attached as the designated root device of any tagged instance.
    async fn list_boot_volumes(
        &self,
        tag_key: &str,
        root_device_override: Option<&str>,
    ) -> Result<Vec<String>> {
        let instances = self.list_tagged_instances(tag_key).await?;
        Ok(discovery::boot_volumes(&instances, root_device_override))
    }
}
