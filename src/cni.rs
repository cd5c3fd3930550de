//! Registry of network backends the controller knows how to delegate to
//!
//! Kept as data rather than code so new backends can be added without
//! touching validator logic.

/// Backend names whose concrete backing identifier is allocated by the
/// controller rather than the user. `ipvlan` and the empty string (the
/// default backend) are dynamic as well, see [`is_dynamic_type`].
pub const SUPPORTED_NATIVE_CNIS: &[&str] = &["sriov", "flannel", "calico", "macvlan", "cnv-bridge"];

/// Vendor prefix marking an interface-profile name as a device pool rather
/// than a kernel interface.
pub const DEVICE_POOL_PREFIX: &str = "nokia.k8s.io/";

/// Longest NetworkID a dynamic backend accepts
pub const MAX_NID_LENGTH: usize = 11;

/// Whether `ne_type` names a dynamic backend (controller-selected backing)
///
/// Dynamic backends enforce the [`MAX_NID_LENGTH`] ceiling on NetworkIDs.
pub fn is_dynamic_type(ne_type: &str) -> bool {
    let lowered = ne_type.to_lowercase();
    lowered.is_empty()
        || lowered == "ipvlan"
        || SUPPORTED_NATIVE_CNIS.contains(&lowered.as_str())
}

/// Whether a tenant network of `ne_type` is backed by a host device and
/// therefore needs a VNI reserved against an interface profile
///
/// Static delegates (flannel, calico, ...) bring their own fabric and skip
/// VNI allocation entirely.
pub fn allocates_vni(ne_type: &str) -> bool {
    matches!(
        ne_type.to_lowercase().as_str(),
        "" | "ipvlan" | "macvlan" | "sriov"
    )
}

/// Whether an interface-profile name refers to a device pool
pub fn is_device_pool_name(name: &str) -> bool {
    name.starts_with(DEVICE_POOL_PREFIX)
}
