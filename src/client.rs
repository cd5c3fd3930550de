//! The narrow CRD-client capability set the admission core depends on
//!
//! The core never talks to the API server directly: it lists endpoints to
//! judge update safety, and reads/writes the tenant config to reserve
//! VNIs. Concurrency discipline on the tenant config is optimistic — the
//! whole profile is read, mutated in memory, and written back; the API
//! server rejects the losing writer on resource-version mismatch and the
//! failure surfaces as a rejection of that request.

use async_trait::async_trait;
use kube::api::{Api, ListParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use crate::crd::{DanmEp, TenantConfig, API_GROUP, API_VERSION};
use crate::Error;

/// Capability set of the external CRD client
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DanmClient: Send + Sync {
    /// List endpoints, cluster-wide when `namespace` is `None`
    async fn list_endpoints(&self, namespace: Option<String>) -> Result<Vec<DanmEp>, Error>;

    /// Fetch the cluster's tenant config, if one exists
    async fn get_tenant_config(&self) -> Result<Option<TenantConfig>, Error>;

    /// Persist an updated tenant config in place
    async fn update_tenant_config(&self, tconf: &TenantConfig) -> Result<(), Error>;
}

/// Kube-backed [`DanmClient`] going through dynamic typing, since the
/// TenantConfig payload lives at the object's top level
pub struct KubeDanmClient {
    client: Client,
}

impl KubeDanmClient {
    /// Wrap a connected kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn resource(kind: &str) -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk(API_GROUP, API_VERSION, kind))
    }
}

#[async_trait]
impl DanmClient for KubeDanmClient {
    async fn list_endpoints(&self, namespace: Option<String>) -> Result<Vec<DanmEp>, Error> {
        let resource = Self::resource("DanmEp");
        let api: Api<DynamicObject> = match namespace.as_deref() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };
        let list = api.list(&ListParams::default()).await?;
        list.items
            .into_iter()
            .map(|obj| {
                let mut ep: DanmEp = serde_json::from_value(obj.data.clone()).map_err(|e| {
                    Error::serialization(format!(
                        "invalid DanmEp {}: {e}",
                        obj.metadata.name.as_deref().unwrap_or_default()
                    ))
                })?;
                ep.metadata = obj.metadata;
                Ok(ep)
            })
            .collect()
    }

    async fn get_tenant_config(&self) -> Result<Option<TenantConfig>, Error> {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &Self::resource("TenantConfig"));
        let list = api.list(&ListParams::default()).await?;
        let Some(obj) = list.items.into_iter().next() else {
            return Ok(None);
        };
        let mut tconf: TenantConfig = serde_json::from_value(obj.data.clone()).map_err(|e| {
            Error::serialization(format!(
                "invalid TenantConfig {}: {e}",
                obj.metadata.name.as_deref().unwrap_or_default()
            ))
        })?;
        tconf.metadata = obj.metadata;
        Ok(Some(tconf))
    }

    async fn update_tenant_config(&self, tconf: &TenantConfig) -> Result<(), Error> {
        let name = tconf
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::client("tenant config carries no name"))?;
        let resource = Self::resource("TenantConfig");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let mut obj = DynamicObject::new(&name, &resource);
        obj.metadata = tconf.metadata.clone();
        obj.data = serde_json::json!({
            "hostDevices": tconf.host_devices,
            "networkIds": tconf.network_ids,
        });
        api.replace(&name, &PostParams::default(), &obj).await?;
        Ok(())
    }
}
