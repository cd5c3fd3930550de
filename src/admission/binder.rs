//! Tenant binding of freshly created TenantNetworks
//!
//! On TenantNetwork create, the network is bound to one of the tenant's
//! interface profiles: a VNI is reserved from the profile's range, the
//! chosen device and VNI are patched into the manifest, and the mutated
//! profile is persisted through the CRD client. Static backends skip the
//! VNI reservation and only get their NetworkID mapped.

use serde_json::json;
use tracing::{debug, info};

use crate::admission::patch::PatchSet;
use crate::client::DanmClient;
use crate::cni;
use crate::crd::NetworkManifest;
use crate::vni::{AllocBitmap, VniRange, VniType};
use crate::{Error, Result};

/// Bind a TenantNetwork being created to the cluster's tenant profile
pub async fn bind_tenant_network(
    client: &dyn DanmClient,
    net: &NetworkManifest,
    patches: &mut PatchSet,
) -> Result<()> {
    let ne_type = net.effective_type();
    let mut tconf = client.get_tenant_config().await?.ok_or_else(|| {
        Error::validation("no TenantConfig exists, TenantNetworks cannot be admitted")
    })?;

    if cni::is_dynamic_type(&ne_type) {
        match tconf.network_ids.get(&ne_type) {
            Some(mapped) => {
                if *mapped != net.spec.network_id {
                    patches.replace(&["spec", "NetworkID"], json!(mapped));
                }
            }
            None if net.spec.network_id.is_empty() => {
                return Err(Error::validation(format!(
                    "the tenant profile maps no NetworkID for type {ne_type}"
                )));
            }
            None => {}
        }
    }

    if !cni::allocates_vni(&ne_type) {
        debug!(network = %net.name, ne_type, "Static backend, no VNI to reserve");
        return Ok(());
    }

    let opts = &net.spec.options;
    let required_type = if opts.vlan != 0 {
        Some(VniType::Vlan)
    } else if opts.vxlan != 0 {
        Some(VniType::Vxlan)
    } else {
        None
    };
    let auto_selected = opts.device.is_empty() && opts.device_pool.is_empty();

    let position = tconf.host_devices.iter().position(|profile| {
        let name_matches = if !opts.device_pool.is_empty() {
            profile.name == opts.device_pool
        } else if !opts.device.is_empty() {
            profile.name == opts.device
        } else {
            !cni::is_device_pool_name(&profile.name)
        };
        let type_matches = match required_type {
            Some(required) => profile.vni_type.to_lowercase() == required.to_string(),
            None => true,
        };
        name_matches && type_matches
    });
    let Some(idx) = position else {
        return Err(if !opts.device_pool.is_empty() {
            Error::validation(format!(
                "device pool {} is not part of the tenant's interface profiles",
                opts.device_pool
            ))
        } else if !opts.device.is_empty() {
            Error::validation(format!(
                "host device {} is not part of the tenant's interface profiles",
                opts.device
            ))
        } else {
            Error::exhausted("the tenant profile offers no eligible host device")
        });
    };

    let profile = tconf.host_devices[idx].clone();
    let vni_type: VniType = profile.vni_type.parse()?;
    let range = VniRange::parse(&profile.vni_range, vni_type)?;
    let mut bitmap = if profile.alloc.is_empty() {
        AllocBitmap::zeroed(&range)
    } else {
        AllocBitmap::decode(&profile.alloc)?
    };
    if !bitmap.matches(&range) {
        return Err(Error::client(format!(
            "allocation bitset of {} does not fit its vniRange {}",
            profile.name, profile.vni_range
        )));
    }
    let vni = bitmap.first_free(&range).ok_or_else(|| {
        Error::exhausted(format!(
            "no free VNI left in range {} of {}",
            profile.vni_range, profile.name
        ))
    })?;
    bitmap.set(&range, vni);

    if auto_selected {
        patches.replace(&["spec", "Options", "host_device"], json!(profile.name));
    }
    match vni_type {
        VniType::Vlan => patches.replace(&["spec", "Options", "vlan"], json!(vni)),
        VniType::Vxlan => patches.replace(&["spec", "Options", "vxlan"], json!(vni)),
    }

    tconf.host_devices[idx].alloc = bitmap.encode();
    client.update_tenant_config(&tconf).await?;
    info!(network = %net.name, device = %profile.name, %vni_type, vni, "Reserved tenant VNI");
    Ok(())
}
