//! Validation and normalization of TenantConfig profiles
//!
//! Rules run top to bottom; the first failure rejects the request. On
//! acceptance, profiles lacking an allocation bitset get a freshly zeroed
//! one, emitted as a single `/hostDevices` replace covering the whole
//! normalized list.

use kube::core::admission::Operation;

use crate::admission::patch::PatchSet;
use crate::cni::{is_dynamic_type, MAX_NID_LENGTH};
use crate::crd::{InterfaceProfile, TenantConfig};
use crate::vni::{AllocBitmap, VniRange, VniType};
use crate::{Error, Result};

/// Validate a submitted TenantConfig
pub fn validate_tenant_config(new: &TenantConfig, op: &Operation) -> Result<()> {
    if new.host_devices.is_empty() && new.network_ids.is_empty() {
        return Err(Error::validation(
            "a TenantConfig must declare hostDevices or networkIds",
        ));
    }
    for profile in &new.host_devices {
        validate_interface_profile(profile, op)?;
    }
    for (ne_type, nid) in &new.network_ids {
        if ne_type.is_empty() {
            return Err(Error::validation(
                "networkIds entries must name a network type",
            ));
        }
        if nid.is_empty() {
            return Err(Error::validation(format!(
                "networkIds entry {ne_type} must carry a network ID"
            )));
        }
        if is_dynamic_type(ne_type) && nid.len() > MAX_NID_LENGTH {
            return Err(Error::validation(format!(
                "network ID {nid} of dynamic type {ne_type} is longer than {MAX_NID_LENGTH} characters"
            )));
        }
    }
    Ok(())
}

fn validate_interface_profile(profile: &InterfaceProfile, op: &Operation) -> Result<()> {
    if profile.name.is_empty() {
        return Err(Error::validation("every hostDevice must carry a name"));
    }
    if profile.vni_type.is_empty() {
        return Err(Error::validation(format!(
            "hostDevice {} is missing its vniType",
            profile.name
        )));
    }
    if profile.vni_range.is_empty() {
        return Err(Error::validation(format!(
            "hostDevice {} is missing its vniRange",
            profile.name
        )));
    }
    let vni_type: VniType = profile.vni_type.parse()?;
    let range = VniRange::parse(&profile.vni_range, vni_type)?;
    if !profile.alloc.is_empty() {
        if matches!(op, Operation::Create) {
            return Err(Error::validation(format!(
                "alloc of hostDevice {} is owned by the controller and may not be set at creation",
                profile.name
            )));
        }
        let bitmap = AllocBitmap::decode(&profile.alloc)?;
        if !bitmap.matches(&range) {
            return Err(Error::validation(format!(
                "alloc of hostDevice {} does not match the cardinality of vniRange {}",
                profile.name, profile.vni_range
            )));
        }
    }
    Ok(())
}

/// Fill in zeroed allocation bitsets for profiles that lack one
///
/// Emits one `/hostDevices` replace carrying the whole normalized list, or
/// nothing when every profile already has a bitset.
pub fn normalize_host_devices(new: &TenantConfig, patches: &mut PatchSet) -> Result<()> {
    if new.host_devices.iter().all(|p| !p.alloc.is_empty()) {
        return Ok(());
    }
    let mut normalized = new.host_devices.clone();
    for profile in &mut normalized {
        if profile.alloc.is_empty() {
            let vni_type: VniType = profile.vni_type.parse()?;
            let range = VniRange::parse(&profile.vni_range, vni_type)?;
            profile.alloc = AllocBitmap::zeroed(&range).encode();
        }
    }
    let value = serde_json::to_value(&normalized)
        .map_err(|e| Error::serialization(format!("host device list: {e}")))?;
    patches.replace(&["hostDevices"], value);
    Ok(())
}
