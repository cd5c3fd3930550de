//! Update-time protection of networks with live endpoints
//!
//! The backing device and VNI of a network must not change under running
//! pods: rewiring the segment would silently cut their traffic. Other
//! field changes pass freely.

use tracing::debug;

use crate::client::DanmClient;
use crate::crd::NetworkManifest;
use crate::{Error, Result};

/// Whether the fields pinning a network to its physical segment differ
pub fn vni_fields_changed(old: &NetworkManifest, new: &NetworkManifest) -> bool {
    old.spec.options.device != new.spec.options.device
        || old.spec.options.device_pool != new.spec.options.device_pool
        || old.spec.options.vlan != new.spec.options.vlan
        || old.spec.options.vxlan != new.spec.options.vxlan
}

/// Reject the update when a device or VNI change would disturb attached
/// endpoints
pub async fn check_endpoint_safety(
    client: &dyn DanmClient,
    old: &NetworkManifest,
    new: &NetworkManifest,
) -> Result<()> {
    if !vni_fields_changed(old, new) {
        return Ok(());
    }
    let namespace = if old.kind.is_namespaced() {
        old.namespace.clone()
    } else {
        None
    };
    let endpoints = client.list_endpoints(namespace).await?;
    let attached = endpoints.iter().any(|ep| {
        ep.is_attached_to(old.kind.as_str(), &old.name)
            && (!old.kind.is_namespaced() || ep.metadata.namespace == old.namespace)
    });
    if attached {
        return Err(Error::validation(format!(
            "vlan, vxlan, host_device, and device_pool of {} cannot change while endpoints are attached to it",
            old.name
        )));
    }
    debug!(network = %old.name, "No endpoints attached, change admitted");
    Ok(())
}
