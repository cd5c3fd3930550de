//! danm-admission - admission and mutation core for multi-tenant
//! container networking
//!
//! The cluster's API gateway consults this service during create/update of
//! network-definition objects: cluster-wide networks, per-tenant networks,
//! and tenant configuration profiles. For each request the core parses and
//! validates the submitted object, enriches it with computed defaults and
//! tenant bindings, reserves virtual network identifiers against the
//! tenant profile, and answers with either a rejection reason or a
//! JSON-Patch mutation the gateway splices into the stored object.
//!
//! # Modules
//!
//! - [`crd`] - data model of the judged kinds (networks, TenantConfig, DanmEp)
//! - [`admission`] - validation pipelines, tenant binder, patch builder, router
//! - [`vni`] - VNI range parsing and allocation bitsets
//! - [`cidr`] - IPv4/IPv6 CIDR arithmetic and pool sizing
//! - [`cni`] - registry of dynamic network backends
//! - [`client`] - the narrow CRD-client capability set the core consumes
//! - [`error`] - error types

#![deny(missing_docs)]

pub mod admission;
pub mod cidr;
pub mod client;
pub mod cni;
pub mod crd;
pub mod error;
pub mod vni;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
