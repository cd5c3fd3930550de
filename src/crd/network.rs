//! The shared network manifest: ClusterNetwork, TenantNetwork, DanmNet

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kube::core::DynamicObject;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// The three admissible network kinds
///
/// They share [`NetworkSpec`] and differ only in scoping and pipeline:
/// `TenantNetwork` is namespaced and gets tenant binding on create,
/// `DanmNet` is the namespaced legacy variant without binding, and
/// `ClusterNetwork` is cluster-scoped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkKind {
    /// Legacy namespaced network
    DanmNet,
    /// Namespaced network bound to a tenant profile on create
    TenantNetwork,
    /// Cluster-scoped network, may restrict itself to chosen tenants
    ClusterNetwork,
}

impl NetworkKind {
    /// The Kind string as it appears in manifests and endpoint `ApiType`s
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DanmNet => "DanmNet",
            Self::TenantNetwork => "TenantNetwork",
            Self::ClusterNetwork => "ClusterNetwork",
        }
    }

    /// Whether objects of this kind live inside a namespace
    pub fn is_namespaced(self) -> bool {
        !matches!(self, Self::ClusterNetwork)
    }
}

impl FromStr for NetworkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DanmNet" => Ok(Self::DanmNet),
            "TenantNetwork" => Ok(Self::TenantNetwork),
            "ClusterNetwork" => Ok(Self::ClusterNetwork),
            "" => Err(Error::validation("manifest carries no Kind")),
            other => Err(Error::validation(format!(
                "kind {other} is not an admissible network kind"
            ))),
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded network object of any of the three kinds
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkManifest {
    /// Which of the three kinds the gateway submitted
    pub kind: NetworkKind,
    /// Object name
    pub name: String,
    /// Namespace, absent for cluster-scoped kinds
    pub namespace: Option<String>,
    /// The shared network spec
    pub spec: NetworkSpec,
}

impl NetworkManifest {
    /// Decode a network manifest out of an admission payload
    pub fn from_admission_object(obj: &DynamicObject) -> Result<Self, Error> {
        let kind = obj
            .types
            .as_ref()
            .map(|t| t.kind.as_str())
            .unwrap_or_default()
            .parse::<NetworkKind>()?;
        let spec = match obj.data.get("spec") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| Error::serialization(format!("invalid network spec: {e}")))?,
            None => NetworkSpec::default(),
        };
        Ok(Self {
            kind,
            name: obj.metadata.name.clone().unwrap_or_default(),
            namespace: obj.metadata.namespace.clone(),
            spec,
        })
    }

    /// The network type with the default backend applied, lowercased
    pub fn effective_type(&self) -> String {
        if self.spec.network_type.is_empty() {
            "ipvlan".to_owned()
        } else {
            self.spec.network_type.to_lowercase()
        }
    }
}

/// Spec shared by the three network kinds
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct NetworkSpec {
    /// Backend-specific name or VNI hint; dynamic backends cap its length
    #[serde(rename = "NetworkID", default, skip_serializing_if = "String::is_empty")]
    pub network_id: String,

    /// Backend selecting this network's CNI; empty means the default
    /// dynamic backend
    #[serde(rename = "NetworkType", default, skip_serializing_if = "String::is_empty")]
    pub network_type: String,

    /// Tenants allowed to attach; only meaningful on ClusterNetwork
    #[serde(rename = "AllowedTenants", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tenants: Vec<String>,

    /// Addressing and device options
    #[serde(rename = "Options", default)]
    pub options: NetworkOptions,
}

/// Addressing, pool, and device options of a network
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct NetworkOptions {
    /// IPv4 CIDR of the network
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cidr: String,

    /// IPv4 routes: destination CIDR to gateway inside `cidr`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routes: BTreeMap<String, String>,

    /// IPv6 CIDR of the network
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub net6: String,

    /// IPv6 routes: destination CIDR to gateway inside `net6`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routes6: BTreeMap<String, String>,

    /// IPv4 allocation pool inside `cidr`
    #[serde(rename = "allocation_pool", default, skip_serializing_if = "IpPool::is_empty")]
    pub pool: IpPool,

    /// IPv6 allocation pool inside `net6`
    #[serde(
        rename = "allocation_pool_v6",
        default,
        skip_serializing_if = "IpPoolV6::is_empty"
    )]
    pub pool6: IpPoolV6,

    /// IPv4 allocation bitset, server-generated
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alloc: String,

    /// IPv6 allocation bitset, server-generated
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alloc6: String,

    /// VLAN ID of the backing segment
    #[serde(default, skip_serializing_if = "is_zero")]
    pub vlan: u32,

    /// VXLAN ID of the backing segment
    #[serde(default, skip_serializing_if = "is_zero")]
    pub vxlan: u32,

    /// Kernel interface backing the network
    #[serde(rename = "host_device", default, skip_serializing_if = "String::is_empty")]
    pub device: String,

    /// Vendor device pool backing the network
    #[serde(rename = "device_pool", default, skip_serializing_if = "String::is_empty")]
    pub device_pool: String,
}

/// Inclusive address pool
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct IpPool {
    /// First allocatable address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start: String,
    /// Last allocatable address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end: String,
}

impl IpPool {
    /// Whether neither endpoint is set
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }
}

/// IPv6 address pool: a CIDR plus optional start/end bounds inside it
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct IpPoolV6 {
    /// CIDR the pool covers, contained in `net6`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cidr: String,
    /// Optional bounds inside `cidr`
    #[serde(flatten)]
    pub pool: IpPool,
}

impl IpPoolV6 {
    /// Whether no pool field is set
    pub fn is_empty(&self) -> bool {
        self.cidr.is_empty() && self.pool.is_empty()
    }
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}
