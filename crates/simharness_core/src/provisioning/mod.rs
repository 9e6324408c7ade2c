//! Namespace provisioning module.
//!
//! This module builds synthetic namespace hierarchies in a remote policy
//! control-plane and binds large numbers of simulated agents to them, for
//! load and scale testing.
//!
//! ## Components
//!
//! - **Naming**: namespace path validation (depth bounded by
//!   [`naming::MAX_DEPTH`]) and path composition
//! - **Tree**: desired hierarchies, parsed from YAML/JSON or generated as a
//!   flat fan-out of capacity namespaces
//! - **Provisioner**: pre-order creation of a hierarchy, and deletion of a
//!   single namespace looked up by exact name
//! - **Distributor**: deterministic, capacity-bounded creation of namespace
//!   mapping policies
//!
//! ## Store Seam
//!
//! The remote store is any [`tower::Service`] over [`api::StoreRequest`],
//! wrapped in a [`client::StoreClient`] that applies the per-call timeout.
//! Everything runs sequentially and fails fast: the first remote failure ends
//! the run and already created objects are left in place.

pub mod api;
pub mod client;
pub mod distributor;
pub mod error;
pub mod naming;
pub mod provisioner;
pub mod tree;

use std::time::Duration;

use client::StoreClient;
use distributor::MappingDistributor;
use provisioner::NamespaceProvisioner;

/// Builds a provisioner and a distributor sharing the same store.
///
/// # Arguments
/// * `store` - Policy store service
/// * `timeout` - Bound on every store call, `None` to wait indefinitely
/// * `concurrency` - Maximum mapping policies in flight per capacity namespace
pub fn init_provisioning<S>(
    store: S,
    timeout: Option<Duration>,
    concurrency: usize,
) -> (NamespaceProvisioner<S>, MappingDistributor<S>)
where
    S: tower::Service<api::StoreRequest, Response = api::StoreResponse, Error = error::ProvisionError>
        + Clone,
{
    let mut client = StoreClient::new(store);
    if let Some(timeout) = timeout {
        client = client.with_timeout(timeout);
    }
    (
        NamespaceProvisioner::new(client.clone()),
        MappingDistributor::new(client).with_concurrency(concurrency),
    )
}
