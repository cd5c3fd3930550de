//! Request dispatching: envelope decoding, pipeline selection, response
//! shaping
//!
//! Every request gets exactly one response carrying the original UID.
//! Undecodable envelopes are answered with a generic rejection; everything
//! else flows through the kind- and operation-specific pipeline and either
//! rejects with a reason or returns the accumulated mutation patch.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use tracing::{debug, info, warn};

use super::patch::PatchSet;
use super::{binder, endpoints, network, tenant_config, WebhookState};
use crate::crd::{NetworkKind, NetworkManifest, TenantConfig};
use crate::{Error, Result};

/// Handle `POST /netvalidation`: the network admission pipeline
pub async fn validate_network_handler(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> Json<AdmissionReview<DynamicObject>> {
    let request = match decode_review(&body) {
        Ok(request) => request,
        Err(response) => return Json(response.into_review()),
    };
    let response = match process_network(&state, &request).await {
        Ok(patches) => accept(&request, patches),
        Err(e) => reject(&request, e),
    };
    Json(response.into_review())
}

/// Handle `POST /confvalidation`: the tenant-config admission pipeline
pub async fn validate_tenant_config_handler(
    State(_state): State<Arc<WebhookState>>,
    body: Bytes,
) -> Json<AdmissionReview<DynamicObject>> {
    let request = match decode_review(&body) {
        Ok(request) => request,
        Err(response) => return Json(response.into_review()),
    };
    let response = match process_tenant_config(&request) {
        Ok(patches) => accept(&request, patches),
        Err(e) => reject(&request, e),
    };
    Json(response.into_review())
}

fn decode_review(body: &[u8]) -> std::result::Result<AdmissionRequest<DynamicObject>, AdmissionResponse> {
    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Received undecodable admission review");
        AdmissionResponse::invalid(format!("undecodable admission review: {e}"))
    })?;
    review.try_into().map_err(|e| {
        warn!(error = %e, "Admission review carries no request");
        AdmissionResponse::invalid(format!("bad admission review: {e}"))
    })
}

fn accept(request: &AdmissionRequest<DynamicObject>, patches: PatchSet) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    if patches.is_empty() {
        debug!(uid = %request.uid, "Admitted unchanged");
        return response;
    }
    info!(uid = %request.uid, paths = ?patches.paths(), "Admitted with mutations");
    match response.with_patch(patches.into_patch()) {
        Ok(response) => response,
        Err(e) => reject(request, Error::serialization(format!("patch encoding: {e}"))),
    }
}

fn reject(request: &AdmissionRequest<DynamicObject>, err: Error) -> AdmissionResponse {
    warn!(uid = %request.uid, error = %err, "Rejecting admission request");
    AdmissionResponse::from(request).deny(err.to_string())
}

async fn process_network(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> Result<PatchSet> {
    let raw = request
        .object
        .as_ref()
        .ok_or_else(|| Error::validation("request carries no object"))?;
    let new = NetworkManifest::from_admission_object(raw)?;
    let old = request
        .old_object
        .as_ref()
        .map(NetworkManifest::from_admission_object)
        .transpose()?;

    network::validate_network(&new, &request.operation)?;
    if matches!(request.operation, Operation::Update) {
        if let Some(old) = &old {
            endpoints::check_endpoint_safety(state.client.as_ref(), old, &new).await?;
        }
    }

    let mut patches = PatchSet::new();
    network::apply_network_type_default(&new, &mut patches);
    if matches!(request.operation, Operation::Create) {
        network::add_v4_allocation(&new, &mut patches)?;
        if new.kind == NetworkKind::TenantNetwork {
            binder::bind_tenant_network(state.client.as_ref(), &new, &mut patches).await?;
        }
        network::add_v6_allocation(&new, &mut patches)?;
    }
    Ok(patches)
}

fn process_tenant_config(request: &AdmissionRequest<DynamicObject>) -> Result<PatchSet> {
    let raw = request
        .object
        .as_ref()
        .ok_or_else(|| Error::validation("request carries no object"))?;
    let new = TenantConfig::from_admission_object(raw)?;
    if let Some(old) = &request.old_object {
        TenantConfig::from_admission_object(old)?;
    }

    tenant_config::validate_tenant_config(&new, &request.operation)?;
    let mut patches = PatchSet::new();
    tenant_config::normalize_host_devices(&new, &mut patches)?;
    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockDanmClient;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::{json, Value};

    fn state_with(client: MockDanmClient) -> Arc<WebhookState> {
        Arc::new(WebhookState::new(Arc::new(client)))
    }

    fn review_body(operation: &str, object: Value, old_object: Value) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "danm.k8s.io", "version": "v1", "kind": "DanmNet"},
                "resource": {"group": "danm.k8s.io", "version": "v1", "resource": "danmnets"},
                "operation": operation,
                "userInfo": {"username": "tenant-admin"},
                "object": object,
                "oldObject": old_object,
            },
        })
    }

    fn net_object(kind: &str, name: &str, spec: Value) -> Value {
        json!({
            "apiVersion": "danm.k8s.io/v1",
            "kind": kind,
            "metadata": {"name": name, "namespace": "vni-test"},
            "spec": spec,
        })
    }

    fn request_from(body: Value) -> AdmissionRequest<DynamicObject> {
        decode_review(&serde_json::to_vec(&body).unwrap()).unwrap()
    }

    fn patch_paths(response: &AdmissionResponse) -> Vec<String> {
        let Some(patch) = &response.patch else {
            return Vec::new();
        };
        let ops: Vec<Value> = serde_json::from_slice(patch).unwrap();
        ops.iter()
            .map(|op| {
                assert_eq!(op["op"], "replace");
                op["path"].as_str().unwrap().to_owned()
            })
            .collect()
    }

    #[test]
    fn undecodable_body_is_answered_with_a_generic_rejection() {
        let response = decode_review(b"not json at all").unwrap_err();
        assert!(!response.allowed);
    }

    #[test]
    fn review_without_request_is_rejected() {
        let body = json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"});
        let response = decode_review(&serde_json::to_vec(&body).unwrap()).unwrap_err();
        assert!(!response.allowed);
    }

    #[tokio::test]
    async fn response_preserves_the_request_uid() {
        let request = request_from(review_body(
            "CREATE",
            net_object("DanmNet", "bad", json!({"NetworkType": "ipvlan", "NetworkID": "nanomsg", "Options": {"cidr": "bogus"}})),
            Value::Null,
        ));
        let state = state_with(MockDanmClient::new());
        let result = process_network(&state, &request).await;
        let response = match result {
            Ok(patches) => accept(&request, patches),
            Err(e) => reject(&request, e),
        };
        assert!(!response.allowed);
        assert_eq!(response.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
    }

    #[tokio::test]
    async fn object_with_foreign_kind_is_rejected() {
        let request = request_from(review_body(
            "CREATE",
            net_object("DanmEp", "invalid-type", json!({})),
            Value::Null,
        ));
        let state = state_with(MockDanmClient::new());
        assert!(process_network(&state, &request).await.is_err());
    }

    #[tokio::test]
    async fn missing_object_is_rejected() {
        let request = request_from(review_body("CREATE", Value::Null, Value::Null));
        let state = state_with(MockDanmClient::new());
        let err = process_network(&state, &request).await.unwrap_err();
        assert!(err.to_string().contains("no object"));
    }

    #[tokio::test]
    async fn typeless_danmnet_create_is_defaulted_and_sized() {
        let request = request_from(review_body(
            "CREATE",
            net_object(
                "DanmNet",
                "no-netype",
                json!({
                    "NetworkID": "nanomsg",
                    "Options": {
                        "cidr": "192.168.1.64/26",
                        "routes": {"10.20.0.0/24": "192.168.1.64"},
                    },
                }),
            ),
            Value::Null,
        ));
        let state = state_with(MockDanmClient::new());
        let patches = process_network(&state, &request).await.unwrap();
        let response = accept(&request, patches);
        assert!(response.allowed);
        assert_eq!(
            patch_paths(&response),
            vec![
                "/spec/NetworkType",
                "/spec/Options/alloc",
                "/spec/Options/allocation_pool"
            ]
        );
    }

    #[tokio::test]
    async fn update_does_not_resize_allocations() {
        let request = request_from(review_body(
            "UPDATE",
            net_object(
                "ClusterNetwork",
                "no-netype-update",
                json!({
                    "NetworkID": "nanomsg",
                    "Options": {
                        "cidr": "192.168.1.64/26",
                        "alloc": STANDARD.encode(vec![0u8; 8]),
                        "allocation_pool": {"start": "192.168.1.65", "end": "192.168.1.126"},
                    },
                }),
            ),
            net_object("ClusterNetwork", "no-netype-update", json!({"NetworkID": "nanomsg"})),
        ));
        let state = state_with(MockDanmClient::new());
        let patches = process_network(&state, &request).await.unwrap();
        let response = accept(&request, patches);
        assert!(response.allowed);
        assert_eq!(patch_paths(&response), vec!["/spec/NetworkType"]);
    }

    #[tokio::test]
    async fn fully_specified_cluster_network_is_admitted_without_patches() {
        let request = request_from(review_body(
            "CREATE",
            net_object(
                "ClusterNetwork",
                "l2-with-allowedtenants",
                json!({
                    "NetworkType": "ipvlan",
                    "NetworkID": "nanomsg",
                    "AllowedTenants": ["tenant1", "tenant2"],
                    "Options": {"host_device": "ens3"},
                }),
            ),
            Value::Null,
        ));
        let state = state_with(MockDanmClient::new());
        let patches = process_network(&state, &request).await.unwrap();
        let response = accept(&request, patches);
        assert!(response.allowed);
        assert!(response.patch.is_none());
    }

    #[tokio::test]
    async fn tenant_network_create_binds_and_persists_once() {
        let mut client = MockDanmClient::new();
        client.expect_get_tenant_config().returning(|| {
            Ok(Some(crate::crd::TenantConfig {
                host_devices: vec![
                    crate::crd::InterfaceProfile {
                        name: "ens3".to_owned(),
                        vni_type: "vlan".to_owned(),
                        vni_range: "900-4999".to_owned(),
                        alloc: STANDARD.encode(vec![0u8; 513]),
                    },
                    crate::crd::InterfaceProfile {
                        name: "ens4".to_owned(),
                        vni_type: "vxlan".to_owned(),
                        vni_range: "1000-5000".to_owned(),
                        alloc: STANDARD.encode(vec![0u8; 501]),
                    },
                ],
                ..crate::crd::TenantConfig::default()
            }))
        });
        client
            .expect_update_tenant_config()
            .withf(|tconf| {
                let bytes = STANDARD.decode(&tconf.host_devices[1].alloc).unwrap();
                bytes[0] == 0x80 && bytes[1..].iter().all(|b| *b == 0)
            })
            .times(1)
            .returning(|_| Ok(()));

        let request = request_from(review_body(
            "CREATE",
            net_object(
                "TenantNetwork",
                "tnet-ens4",
                json!({
                    "NetworkType": "ipvlan",
                    "NetworkID": "nanomsg",
                    "Options": {
                        "cidr": "192.168.1.64/26",
                        "host_device": "ens4",
                        "allocation_pool": {"start": "192.168.1.65", "end": "192.168.1.126"},
                    },
                }),
            ),
            Value::Null,
        ));
        let state = state_with(client);
        let patches = process_network(&state, &request).await.unwrap();
        let response = accept(&request, patches);
        assert!(response.allowed);
        assert_eq!(
            patch_paths(&response),
            vec!["/spec/Options/alloc", "/spec/Options/vxlan"]
        );

        let ops: Vec<Value> =
            serde_json::from_slice(response.patch.as_ref().unwrap()).unwrap();
        assert_eq!(ops[1]["value"], 1000);
    }

    #[tokio::test]
    async fn tenant_network_create_without_tenant_config_is_rejected() {
        let mut client = MockDanmClient::new();
        client.expect_get_tenant_config().returning(|| Ok(None));

        let request = request_from(review_body(
            "CREATE",
            net_object(
                "TenantNetwork",
                "l2",
                json!({
                    "NetworkType": "ipvlan", "NetworkID": "nanomsg",
                    "Options": {"host_device": "ens3"},
                }),
            ),
            Value::Null,
        ));
        let state = state_with(client);
        let err = process_network(&state, &request).await.unwrap_err();
        assert!(err.to_string().contains("no TenantConfig"));
    }

    #[tokio::test]
    async fn tenant_network_create_with_net6_orders_binder_before_v6() {
        let mut client = MockDanmClient::new();
        client.expect_get_tenant_config().returning(|| {
            Ok(Some(crate::crd::TenantConfig {
                host_devices: vec![crate::crd::InterfaceProfile {
                    name: "ens4".to_owned(),
                    vni_type: "vxlan".to_owned(),
                    vni_range: "900-4999".to_owned(),
                    alloc: STANDARD.encode(vec![0u8; 513]),
                }],
                ..crate::crd::TenantConfig::default()
            }))
        });
        client
            .expect_update_tenant_config()
            .times(1)
            .returning(|_| Ok(()));

        let request = request_from(review_body(
            "CREATE",
            net_object(
                "TenantNetwork",
                "big-net6",
                json!({
                    "NetworkType": "ipvlan", "NetworkID": "nanomsg",
                    "Options": {"net6": "2a00:8a00:a000:1193::/64"},
                }),
            ),
            Value::Null,
        ));
        let state = state_with(client);
        let patches = process_network(&state, &request).await.unwrap();
        assert_eq!(
            patches.paths(),
            vec![
                "/spec/Options/host_device",
                "/spec/Options/vxlan",
                "/spec/Options/alloc6",
                "/spec/Options/allocation_pool_v6"
            ]
        );
    }

    #[tokio::test]
    async fn vlan_change_of_a_connected_network_is_rejected() {
        let mut client = MockDanmClient::new();
        client.expect_list_endpoints().returning(|_| {
            Ok(vec![crate::crd::DanmEp {
                metadata: kube::core::ObjectMeta {
                    name: Some("random1".to_owned()),
                    namespace: Some("vni-test".to_owned()),
                    ..Default::default()
                },
                spec: crate::crd::DanmEpSpec {
                    api_type: "DanmNet".to_owned(),
                    network_name: "vniOld".to_owned(),
                    pod: "blurp".to_owned(),
                },
            }])
        });

        let old = net_object(
            "DanmNet",
            "vniOld",
            json!({
                "NetworkType": "ipvlan", "NetworkID": "nanomsg",
                "Options": {"host_device": "ens4", "vlan": 50},
            }),
        );
        let new = net_object(
            "DanmNet",
            "vniOld",
            json!({
                "NetworkType": "ipvlan", "NetworkID": "nanomsg",
                "Options": {"host_device": "ens4", "vlan": 51},
            }),
        );
        let request = request_from(review_body("UPDATE", new, old));
        let state = state_with(client);
        let err = process_network(&state, &request).await.unwrap_err();
        assert!(err.to_string().contains("endpoints are attached"));
    }

    #[tokio::test]
    async fn tenant_config_create_normalizes_host_devices() {
        let object = json!({
            "apiVersion": "danm.k8s.io/v1",
            "kind": "TenantConfig",
            "metadata": {"name": "tconf"},
            "hostDevices": [
                {"name": "ens4", "vniType": "vxlan", "vniRange": "900-4999,5000"},
            ],
        });
        let request = request_from(review_body("CREATE", object, Value::Null));
        let patches = process_tenant_config(&request).unwrap();
        let response = accept(&request, patches);
        assert!(response.allowed);
        assert_eq!(patch_paths(&response), vec!["/hostDevices"]);
    }

    #[tokio::test]
    async fn tenant_config_create_with_alloc_is_rejected() {
        let object = json!({
            "apiVersion": "danm.k8s.io/v1",
            "kind": "TenantConfig",
            "metadata": {"name": "manual-alloc"},
            "hostDevices": [
                {"name": "ens4", "vniType": "vxlan", "vniRange": "700-710",
                 "alloc": STANDARD.encode(vec![0u8; 625])},
            ],
        });
        let request = request_from(review_body("CREATE", object, Value::Null));
        let err = process_tenant_config(&request).unwrap_err();
        assert!(err.to_string().contains("may not be set"));
    }

    #[tokio::test]
    async fn tenant_config_with_wrong_kind_is_rejected() {
        let object = json!({
            "apiVersion": "danm.k8s.io/v1",
            "kind": "invalid",
            "metadata": {"name": "invalid-type"},
            "hostDevices": [
                {"name": "ens4", "vniType": "vxlan", "vniRange": "700-710"},
            ],
        });
        let request = request_from(review_body("CREATE", object, Value::Null));
        assert!(process_tenant_config(&request).is_err());
    }
}
