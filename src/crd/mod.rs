//! Data model for the objects the admission core judges
//!
//! Three network kinds share one spec and differ only in scoping and in
//! which pipelines they trigger; tenant configs and endpoints are separate
//! kinds. Wire names are fixed by the stored CRD schema — patch paths like
//! `/spec/Options/host_device` and `/hostDevices` depend on them.

mod endpoint;
mod network;
mod tenant;

pub use endpoint::{DanmEp, DanmEpSpec};
pub use network::{IpPool, IpPoolV6, NetworkKind, NetworkManifest, NetworkOptions, NetworkSpec};
pub use tenant::{InterfaceProfile, TenantConfig};

/// API group every kind in this model belongs to
pub const API_GROUP: &str = "danm.k8s.io";

/// API version of the model
pub const API_VERSION: &str = "v1";
