//! Managing TLS certificates and HTTPS listener bindings on Azure Application Gateways.
//!
//! Certificate stores come in two flavours, selected by [`BindingPolicy`]:
//!
//! - [`BindingPolicy::Certificate`]: an alias names a certificate on the gateway. Adding,
//!   replacing and removing certificates never touches listeners, unless an add names one to bind
//!   to.
//! - [`BindingPolicy::Listener`]: an alias names an HTTPS listener. Adding a certificate binds it
//!   to the listener, and renewing one swaps in a temporary certificate first so the listener is
//!   never left without a certificate.
//!
//! # Usage
//!
//! Implement [`GatewayClient`] for your transport, then run a job against it:
//!
//! ```
//! # async fn run() {
//! use appgw::{BindingPolicy, JobStatus, ManagementJob, ManagementRequest, MemoryGateway};
//!
//! let gateway = MemoryGateway::new(
//!     "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/applicationGateways/agw",
//! );
//! gateway.add_listener("https-443");
//!
//! let req = ManagementRequest::add("https-443", "MIIK...", "password");
//! let res = ManagementJob::new(BindingPolicy::Listener).run(&gateway, &req).await;
//!
//! assert_eq!(res.status, JobStatus::Success);
//! # }
//! ```
//!
//! Complete usage examples are provided in the `demos` directory of the source repository.
//!
//! # Concurrency
//!
//! Calls to the gateway are issued one at a time; each operation re-reads the gateway's state
//! before acting on it. Nothing here coordinates concurrent jobs against the same gateway, so
//! callers must not run them.

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod client;
mod config;
mod error;
mod exec;
mod inventory;
mod job;
mod observe;
mod plan;

pub mod api;

#[cfg(test)]
mod test;

pub use crate::{
    api::{InventoryItem, ManagementRequest},
    client::{CachedClient, Call, GatewayClient, MemoryGateway, Served},
    config::{
        AzureCloud, ClientConfig, Credential, DiscoveryJobConfig, JobCertificate,
        ManagementJobConfig, ResourceId, StoreDetails,
    },
    error::{Error, ErrorKind, GatewayError, Result},
    exec::Executor,
    inventory::{inventory, reconcile, InventoryReport},
    job::{DiscoveryJob, InventoryJob, JobResult, JobStatus, ManagementJob},
    observe::{LogObserver, Observer, Step},
    plan::{plan, validate, BindingPolicy, Operation},
};
