//! Validation and mutation of the three network kinds
//!
//! An ordered list of small predicates judges the submitted manifest;
//! patches are emitted only after every predicate passed, so a rejection
//! never leaves partial mutation behind.

use std::net::Ipv6Addr;

use base64::{engine::general_purpose::STANDARD, Engine};
use kube::core::admission::Operation;
use serde_json::json;

use crate::admission::patch::PatchSet;
use crate::cidr::{self, MAX_ALLOC_BITS};
use crate::cni::{is_dynamic_type, MAX_NID_LENGTH};
use crate::crd::{NetworkKind, NetworkManifest};
use crate::{Error, Result};

/// Run every validation predicate against the submitted manifest
pub fn validate_network(new: &NetworkManifest, op: &Operation) -> Result<()> {
    validate_ipv4_fields(new)?;
    validate_ipv6_fields(new)?;
    validate_v4_pool(new, op)?;
    validate_v6_pool(new, op)?;
    validate_vids(new)?;
    validate_network_id(new)?;
    validate_allowed_tenants(new)?;
    validate_device_refs(new)?;
    Ok(())
}

fn validate_ipv4_fields(new: &NetworkManifest) -> Result<()> {
    let opts = &new.spec.options;
    if opts.cidr.is_empty() {
        if !opts.routes.is_empty() {
            return Err(Error::validation("routes require cidr to be set"));
        }
        return Ok(());
    }
    let net = cidr::parse_v4(&opts.cidr)?;
    if net.prefix_len() < 8 {
        return Err(Error::validation(format!(
            "cidr {} is larger than a /8",
            opts.cidr
        )));
    }
    for (dest, gateway) in &opts.routes {
        let gw = cidr::parse_v4_addr(gateway)?;
        if !net.contains(&gw) {
            return Err(Error::validation(format!(
                "gateway {gateway} of route {dest} lies outside cidr {}",
                opts.cidr
            )));
        }
    }
    Ok(())
}

fn validate_ipv6_fields(new: &NetworkManifest) -> Result<()> {
    let opts = &new.spec.options;
    if opts.net6.is_empty() {
        if !opts.routes6.is_empty() {
            return Err(Error::validation("routes6 require net6 to be set"));
        }
        return Ok(());
    }
    let net6 = cidr::parse_v6(&opts.net6)?;
    for (dest, gateway) in &opts.routes6 {
        let gw = cidr::parse_v6_addr(gateway)?;
        if !net6.contains(&gw) {
            return Err(Error::validation(format!(
                "gateway {gateway} of route {dest} lies outside net6 {}",
                opts.net6
            )));
        }
    }
    Ok(())
}

fn validate_v4_pool(new: &NetworkManifest, op: &Operation) -> Result<()> {
    let opts = &new.spec.options;
    if !opts.alloc.is_empty() {
        if matches!(op, Operation::Create) {
            return Err(Error::validation(
                "options.alloc is owned by the controller and may not be set at creation",
            ));
        }
        if opts.cidr.is_empty() {
            return Err(Error::validation("options.alloc requires cidr to be set"));
        }
    }
    if opts.cidr.is_empty() {
        if !opts.pool.is_empty() {
            return Err(Error::validation("allocation_pool requires cidr to be set"));
        }
        return Ok(());
    }
    let net = cidr::parse_v4(&opts.cidr)?;
    let Some((first, last)) = cidr::v4_usable_range(&net) else {
        return Err(Error::validation(format!(
            "cidr {} offers no allocatable addresses",
            opts.cidr
        )));
    };
    let start = if opts.pool.start.is_empty() {
        first
    } else {
        cidr::parse_v4_addr(&opts.pool.start)?
    };
    let end = if opts.pool.end.is_empty() {
        last
    } else {
        cidr::parse_v4_addr(&opts.pool.end)?
    };
    if start < first || start > last {
        return Err(Error::validation(format!(
            "allocation_pool start {start} lies outside the usable range of {}",
            opts.cidr
        )));
    }
    if end < first || end > last {
        return Err(Error::validation(format!(
            "allocation_pool end {end} lies outside the usable range of {}",
            opts.cidr
        )));
    }
    if start > end {
        return Err(Error::validation(
            "allocation_pool start is after its end, the pool is empty",
        ));
    }
    Ok(())
}

fn validate_v6_pool(new: &NetworkManifest, op: &Operation) -> Result<()> {
    let opts = &new.spec.options;
    if !opts.alloc6.is_empty() {
        if matches!(op, Operation::Create) {
            return Err(Error::validation(
                "options.alloc6 is owned by the controller and may not be set at creation",
            ));
        }
        if opts.net6.is_empty() {
            return Err(Error::validation("options.alloc6 requires net6 to be set"));
        }
    }
    if opts.net6.is_empty() {
        if !opts.pool6.is_empty() {
            return Err(Error::validation(
                "allocation_pool_v6 requires net6 to be set",
            ));
        }
        return Ok(());
    }
    let net6 = cidr::parse_v6(&opts.net6)?;
    let pool_cidr = if opts.pool6.cidr.is_empty() {
        cidr::default_pool6_cidr(&net6)
    } else {
        let pool = cidr::parse_v6(&opts.pool6.cidr)?;
        if !net6.contains(&pool) {
            return Err(Error::validation(format!(
                "allocation_pool_v6 cidr {} is not contained in net6 {}",
                opts.pool6.cidr, opts.net6
            )));
        }
        pool
    };

    let v4_bits = if opts.cidr.is_empty() {
        0
    } else {
        cidr::v4_capacity(&cidr::parse_v4(&opts.cidr)?)
    };
    if v4_bits.saturating_add(cidr::v6_capacity(&pool_cidr)) > MAX_ALLOC_BITS {
        return Err(Error::validation(format!(
            "the joint IPv4 and IPv6 allocation size exceeds the supported maximum of {MAX_ALLOC_BITS} addresses"
        )));
    }

    let start = if opts.pool6.pool.start.is_empty() {
        None
    } else {
        let addr = cidr::parse_v6_addr(&opts.pool6.pool.start)?;
        if !pool_cidr.contains(&addr) {
            return Err(Error::validation(format!(
                "allocation_pool_v6 start {addr} lies outside pool cidr {pool_cidr}"
            )));
        }
        Some(addr)
    };
    let end = if opts.pool6.pool.end.is_empty() {
        None
    } else {
        let addr = cidr::parse_v6_addr(&opts.pool6.pool.end)?;
        if !pool_cidr.contains(&addr) {
            return Err(Error::validation(format!(
                "allocation_pool_v6 end {addr} lies outside pool cidr {pool_cidr}"
            )));
        }
        Some(addr)
    };
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(Error::validation(
                "allocation_pool_v6 start does not precede its end, the pool is empty",
            ));
        }
    }
    Ok(())
}

fn validate_vids(new: &NetworkManifest) -> Result<()> {
    let opts = &new.spec.options;
    if opts.vlan != 0 && opts.vxlan != 0 {
        return Err(Error::validation(
            "vlan and vxlan are mutually exclusive, set at most one",
        ));
    }
    Ok(())
}

fn validate_network_id(new: &NetworkManifest) -> Result<()> {
    let nid = &new.spec.network_id;
    if nid.is_empty() {
        // the tenant binder fills TenantNetwork NIDs in, or rejects
        if new.kind != NetworkKind::TenantNetwork {
            return Err(Error::validation("spec.NetworkID is mandatory"));
        }
        return Ok(());
    }
    if nid.len() > MAX_NID_LENGTH && is_dynamic_type(&new.spec.network_type) {
        return Err(Error::validation(format!(
            "NetworkID {nid} is longer than {MAX_NID_LENGTH} characters, the maximum for dynamic backends"
        )));
    }
    Ok(())
}

fn validate_allowed_tenants(new: &NetworkManifest) -> Result<()> {
    if !new.spec.allowed_tenants.is_empty() && new.kind != NetworkKind::ClusterNetwork {
        return Err(Error::validation(format!(
            "AllowedTenants can only be defined on ClusterNetworks, not on {}s",
            new.kind
        )));
    }
    Ok(())
}

fn validate_device_refs(new: &NetworkManifest) -> Result<()> {
    let opts = &new.spec.options;
    if new.effective_type() == "sriov" {
        if !opts.device.is_empty() {
            return Err(Error::validation(
                "host_device may not be set on sriov networks",
            ));
        }
        if opts.device_pool.is_empty() {
            return Err(Error::validation("sriov networks require device_pool"));
        }
        return Ok(());
    }
    if !opts.device.is_empty() && !opts.device_pool.is_empty() {
        return Err(Error::validation(
            "host_device and device_pool are mutually exclusive",
        ));
    }
    Ok(())
}

/// Default the backend to `ipvlan` when none was chosen
pub fn apply_network_type_default(new: &NetworkManifest, patches: &mut PatchSet) {
    if new.spec.network_type.is_empty() {
        patches.replace(&["spec", "NetworkType"], json!("ipvlan"));
    }
}

/// Compute the IPv4 allocation bitset (and pool, when the user left it
/// out) for a network created with a `cidr`
///
/// The bitset covers the whole CIDR; the network address, the broadcast
/// address, and everything outside the pool are pre-reserved.
pub fn add_v4_allocation(new: &NetworkManifest, patches: &mut PatchSet) -> Result<()> {
    let opts = &new.spec.options;
    if opts.cidr.is_empty() {
        return Ok(());
    }
    let net = cidr::parse_v4(&opts.cidr)?;
    let Some((first, last)) = cidr::v4_usable_range(&net) else {
        return Err(Error::validation(format!(
            "cidr {} offers no allocatable addresses",
            opts.cidr
        )));
    };
    let pool_defaulted = opts.pool.start.is_empty() || opts.pool.end.is_empty();
    let start = if opts.pool.start.is_empty() {
        first
    } else {
        cidr::parse_v4_addr(&opts.pool.start)?
    };
    let end = if opts.pool.end.is_empty() {
        last
    } else {
        cidr::parse_v4_addr(&opts.pool.end)?
    };

    let capacity = cidr::v4_capacity(&net) as usize;
    let mut bytes = vec![0u8; capacity.div_ceil(8)];
    let start_idx = cidr::v4_offset(&net, start);
    let end_idx = cidr::v4_offset(&net, end);
    for idx in (0..start_idx).chain(end_idx + 1..capacity) {
        bytes[idx / 8] |= 0x80 >> (idx % 8);
    }

    patches.replace(&["spec", "Options", "alloc"], json!(STANDARD.encode(&bytes)));
    if pool_defaulted {
        patches.replace(
            &["spec", "Options", "allocation_pool"],
            json!({"start": start.to_string(), "end": end.to_string()}),
        );
    }
    Ok(())
}

/// Compute the IPv6 allocation bitset (and pool, when the user left it
/// out) for a network created with a `net6`
pub fn add_v6_allocation(new: &NetworkManifest, patches: &mut PatchSet) -> Result<()> {
    let opts = &new.spec.options;
    if opts.net6.is_empty() {
        return Ok(());
    }
    let net6 = cidr::parse_v6(&opts.net6)?;
    let pool_defaulted = opts.pool6.cidr.is_empty();
    let pool_cidr = if pool_defaulted {
        cidr::default_pool6_cidr(&net6)
    } else {
        cidr::parse_v6(&opts.pool6.cidr)?
    };

    let capacity = cidr::v6_capacity(&pool_cidr);
    if capacity > MAX_ALLOC_BITS {
        return Err(Error::validation(format!(
            "allocation_pool_v6 cidr {pool_cidr} holds more than {MAX_ALLOC_BITS} addresses"
        )));
    }
    let mut bytes = vec![0u8; (capacity as usize).div_ceil(8)];
    // the pool's zeroth address stays reserved
    bytes[0] |= 0x80;

    patches.replace(
        &["spec", "Options", "alloc6"],
        json!(STANDARD.encode(&bytes)),
    );
    if pool_defaulted {
        let start = Ipv6Addr::from(u128::from(pool_cidr.network()) + 1);
        let end = pool_cidr.broadcast();
        patches.replace(
            &["spec", "Options", "allocation_pool_v6"],
            json!({
                "cidr": pool_cidr.to_string(),
                "start": start.to_string(),
                "end": end.to_string(),
            }),
        );
    }
    Ok(())
}
