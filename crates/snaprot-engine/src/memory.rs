use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use snaprot_common::{
    Result, RotatorError, Snapshot, SnapshotProvider, SnapshotState, TaggedInstance,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryInstance {
    #[serde(flatten)]
    pub instance: TaggedInstance,
    /// Tag keys carried by the instance.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Seed data for [`InMemoryProvider`], typically loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFixture {
    #[serde(default)]
    pub instances: Vec<MemoryInstance>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ListTaggedInstances(String),
    CreateSnapshot(String),
    ListSnapshots(String),
    DeleteSnapshot(String),
}

#[derive(Debug, Default)]
struct Faults {
    create: HashSet<String>,
    list: HashSet<String>,
    delete: HashSet<String>,
    hide_created: bool,
}

// In-memory provider for development/testing
pub struct InMemoryProvider {
    instances: Arc<RwLock<Vec<MemoryInstance>>>,
    snapshots: Arc<RwLock<Vec<Snapshot>>>,
    /// Created snapshots not yet visible to listings.
    pending_visibility: Arc<RwLock<HashSet<String>>>,
    faults: Arc<RwLock<Faults>>,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
    next_id: AtomicU64,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::from_fixture(MemoryFixture::default())
    }

    pub fn from_fixture(fixture: MemoryFixture) -> Self {
        Self {
            instances: Arc::new(RwLock::new(fixture.instances)),
            snapshots: Arc::new(RwLock::new(fixture.snapshots)),
            pending_visibility: Arc::new(RwLock::new(HashSet::new())),
            faults: Arc::new(RwLock::new(Faults::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn load_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let fixture: MemoryFixture = serde_json::from_str(&content).map_err(|e| {
            RotatorError::Config(format!("invalid fixture {}: {e}", path.display()))
        })?;
        Ok(Self::from_fixture(fixture))
    }

    pub async fn add_instance(&self, instance: TaggedInstance, tags: &[&str]) {
        self.instances.write().await.push(MemoryInstance {
            instance,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
    }

    pub async fn add_snapshot(&self, snapshot: Snapshot) {
        self.snapshots.write().await.push(snapshot);
    }

    /// Every snapshot of `volume_id` currently stored, visible or not.
    pub async fn snapshots_of(&self, volume_id: &str) -> Vec<Snapshot> {
        self.snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.volume_id == volume_id)
            .cloned()
            .collect()
    }

    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().await.clone()
    }

    pub async fn fail_create_for(&self, volume_id: &str) {
        self.faults.write().await.create.insert(volume_id.to_string());
    }

    pub async fn fail_list_for(&self, volume_id: &str) {
        self.faults.write().await.list.insert(volume_id.to_string());
    }

    pub async fn fail_delete_of(&self, snapshot_id: &str) {
        self.faults.write().await.delete.insert(snapshot_id.to_string());
    }

    /// Keep each created snapshot out of the next listing of its volume.
    pub async fn hide_created_snapshots(&self, hide: bool) {
        self.faults.write().await.hide_created = hide;
    }

    async fn record(&self, call: ProviderCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl SnapshotProvider for InMemoryProvider {
    async fn list_tagged_instances(&self, tag_key: &str) -> Result<Vec<TaggedInstance>> {
        self.record(ProviderCall::ListTaggedInstances(tag_key.to_string()))
            .await;

        Ok(self
            .instances
            .read()
            .await
            .iter()
            .filter(|i| i.tags.iter().any(|t| t == tag_key))
            .map(|i| i.instance.clone())
            .collect())
    }

    async fn create_snapshot(&self, volume_id: &str, _description: &str) -> Result<Snapshot> {
        self.record(ProviderCall::CreateSnapshot(volume_id.to_string()))
            .await;

        let hide = {
            let faults = self.faults.read().await;
            if faults.create.contains(volume_id) {
                return Err(RotatorError::provider(
                    "CreateSnapshot",
                    format!("injected failure for {volume_id}"),
                ));
            }
            faults.hide_created
        };

        let snapshot = Snapshot {
            snapshot_id: format!("snap-mem{:08x}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            volume_id: volume_id.to_string(),
            start_time: Utc::now(),
            state: Some(SnapshotState::Pending),
        };

        if hide {
            self.pending_visibility
                .write()
                .await
                .insert(snapshot.snapshot_id.clone());
        }
        self.snapshots.write().await.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list_snapshots(&self, volume_id: &str) -> Result<Vec<Snapshot>> {
        self.record(ProviderCall::ListSnapshots(volume_id.to_string()))
            .await;

        if self.faults.read().await.list.contains(volume_id) {
            return Err(RotatorError::provider(
                "DescribeSnapshots",
                format!("injected failure for {volume_id}"),
            ));
        }

        let snapshots = self.snapshots.read().await;
        let mut hidden = self.pending_visibility.write().await;
        let mut visible = Vec::new();
        for snapshot in snapshots.iter().filter(|s| s.volume_id == volume_id) {
            // Hidden snapshots surface on the following listing
            if !hidden.remove(&snapshot.snapshot_id) {
                visible.push(snapshot.clone());
            }
        }
        Ok(visible)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.record(ProviderCall::DeleteSnapshot(snapshot_id.to_string()))
            .await;

        if self.faults.read().await.delete.contains(snapshot_id) {
            return Err(RotatorError::provider(
                "DeleteSnapshot",
                format!("injected failure for {snapshot_id}"),
            ));
        }

        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|s| s.snapshot_id != snapshot_id);
        if snapshots.len() == before {
            return Err(RotatorError::NotFound(format!("snapshot {snapshot_id}")));
        }
        Ok(())
    }
}
