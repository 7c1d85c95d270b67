// snaprot engine - retention policy and the per-volume rotation cycle
mod config;
mod memory;
mod report;
mod retention;
mod rotator;

pub use config::*;
pub use memory::{InMemoryProvider, MemoryFixture, MemoryInstance, ProviderCall};
pub use report::{RotationReport, VolumeOutcome};
pub use retention::{newest_first, plan_retention, RetentionPlan};
pub use rotator::{Rotator, NEW_SNAPSHOT_PLACEHOLDER};
pub use snaprot_common::{
    discovery, BlockDevice, Result, RotatorError, Snapshot, SnapshotProvider, SnapshotState,
    TaggedInstance,
};
