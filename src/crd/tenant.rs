//! TenantConfig: the per-cluster tenant profile

use std::collections::BTreeMap;

use kube::core::{DynamicObject, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A named profile describing which host interfaces and device pools
/// tenants on this cluster may use, and how VNIs are partitioned
///
/// Unlike the network kinds, its payload lives at the top level of the
/// object rather than under `spec` — mutation patches target
/// `/hostDevices` directly.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TenantConfig {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Interface profiles tenants may bind networks to, in priority order
    #[serde(rename = "hostDevices", default, skip_serializing_if = "Vec::is_empty")]
    pub host_devices: Vec<InterfaceProfile>,

    /// Network-type name to NetworkID prefix mapping for dynamic backends
    #[serde(rename = "networkIds", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub network_ids: BTreeMap<String, String>,
}

impl TenantConfig {
    /// Decode a TenantConfig out of an admission payload
    pub fn from_admission_object(obj: &DynamicObject) -> Result<Self, Error> {
        let kind = obj
            .types
            .as_ref()
            .map(|t| t.kind.as_str())
            .unwrap_or_default();
        if kind != "TenantConfig" {
            return Err(Error::validation(format!(
                "kind {} is not a TenantConfig",
                if kind.is_empty() { "<missing>" } else { kind }
            )));
        }
        let mut tconf: TenantConfig = serde_json::from_value(obj.data.clone())
            .map_err(|e| Error::serialization(format!("invalid TenantConfig manifest: {e}")))?;
        tconf.metadata = obj.metadata.clone();
        Ok(tconf)
    }
}

/// One host interface or device pool plus its tenant-assignable VNI range
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct InterfaceProfile {
    /// Kernel interface name, or a vendor device-pool identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// `vlan` or `vxlan`
    #[serde(rename = "vniType", default, skip_serializing_if = "String::is_empty")]
    pub vni_type: String,

    /// Textual VNI range, e.g. `"900-4999,5000"`
    #[serde(rename = "vniRange", default, skip_serializing_if = "String::is_empty")]
    pub vni_range: String,

    /// base64 occupancy bitset over the range, server-owned
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alloc: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_top_level_payload() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "danm.k8s.io/v1",
            "kind": "TenantConfig",
            "metadata": {"name": "tconf"},
            "hostDevices": [
                {"name": "ens4", "vniType": "vxlan", "vniRange": "700-710"},
            ],
            "networkIds": {"flannel": "flannel"},
        }))
        .unwrap();
        let tconf = TenantConfig::from_admission_object(&obj).unwrap();
        assert_eq!(tconf.metadata.name.as_deref(), Some("tconf"));
        assert_eq!(tconf.host_devices.len(), 1);
        assert_eq!(tconf.host_devices[0].name, "ens4");
        assert_eq!(tconf.host_devices[0].vni_type, "vxlan");
        assert!(tconf.host_devices[0].alloc.is_empty());
        assert_eq!(tconf.network_ids.get("flannel").unwrap(), "flannel");
    }

    #[test]
    fn rejects_other_kinds() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "danm.k8s.io/v1",
            "kind": "invalid",
            "metadata": {"name": "nope"},
        }))
        .unwrap();
        let err = TenantConfig::from_admission_object(&obj).unwrap_err();
        assert!(err.to_string().contains("not a TenantConfig"));
    }

    #[test]
    fn empty_sections_default() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "danm.k8s.io/v1",
            "kind": "TenantConfig",
            "metadata": {"name": "empty"},
        }))
        .unwrap();
        let tconf = TenantConfig::from_admission_object(&obj).unwrap();
        assert!(tconf.host_devices.is_empty());
        assert!(tconf.network_ids.is_empty());
    }
}
