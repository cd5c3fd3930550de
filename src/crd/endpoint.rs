//! DanmEp: the ephemeral record tying a running pod to a network

use kube::core::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An endpoint connecting a pod interface to one of the network kinds
///
/// The admission core only consults endpoints to decide whether a network
/// change would disturb live traffic.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DanmEp {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Endpoint spec
    #[serde(default)]
    pub spec: DanmEpSpec,
}

impl DanmEp {
    /// Whether this endpoint is attached to the network named `name` of
    /// kind `kind`
    pub fn is_attached_to(&self, kind: &str, name: &str) -> bool {
        self.spec.api_type == kind && self.spec.network_name == name
    }
}

/// Spec of a [`DanmEp`]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct DanmEpSpec {
    /// Kind of the network the endpoint references
    #[serde(rename = "ApiType", default, skip_serializing_if = "String::is_empty")]
    pub api_type: String,

    /// Name of the referenced network
    #[serde(rename = "NetworkName", default, skip_serializing_if = "String::is_empty")]
    pub network_name: String,

    /// Pod owning the endpoint
    #[serde(rename = "Pod", default, skip_serializing_if = "String::is_empty")]
    pub pod: String,
}
