//! Boot-volume discovery over a provider's instance listing.

use crate::TaggedInstance;
use tracing::debug;

/// Resolve the boot volume of every instance.
///
/// The designated root device is `root_device_override` when given, otherwise
/// the root device name the instance reports. Instances without a matching
/// EBS-backed device are skipped. Volumes keep the order in which they were
/// first seen and appear once even when several instances report them.
///
/// Older deployments of this rotation always snapshotted `/dev/xvda`, whatever
/// root device the instance reported. Passing `Some("/dev/xvda")` as the
/// override (`SNAPROT_ROOT_DEVICE=/dev/xvda`) reproduces that.
pub fn boot_volumes(
    instances: &[TaggedInstance],
    root_device_override: Option<&str>,
) -> Vec<String> {
    let mut volumes: Vec<String> = Vec::new();

    for instance in instances {
        let reported = instance.root_device_name.as_deref();
        let Some(root_device) = root_device_override.or(reported) else {
            debug!(instance = %instance.instance_id, "no root device name, skipping");
            continue;
        };

        let volume = instance
            .block_devices
            .iter()
            .find(|device| device.device_name == root_device)
            .and_then(|device| device.volume_id.as_deref());

        match volume {
            Some(volume_id) if !volumes.iter().any(|v| v == volume_id) => {
                volumes.push(volume_id.to_string());
            }
            Some(volume_id) => {
                debug!(
                    instance = %instance.instance_id,
                    volume = volume_id,
                    "volume already queued"
                );
            }
            None => {
                debug!(
                    instance = %instance.instance_id,
                    root_device,
                    "no EBS volume on root device, skipping"
                );
            }
        }
    }

    volumes
}
