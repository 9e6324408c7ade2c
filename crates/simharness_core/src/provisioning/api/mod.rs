//! Policy store API.
//!
//! Any remote policy store is reachable through a [`tower::Service`] taking a
//! [`StoreRequest`] and answering a [`StoreResponse`]. Transports live in
//! [`crate::transport`]; the provisioner and the distributor only depend on
//! this seam through [`crate::provisioning::client::StoreClient`].

pub mod types;

pub use types::{
    CREATOR_TAG, Filter, MappingPolicyObject, NamespaceObject, RemoteObject, StoreObject,
    StoreRequest, StoreResponse,
};
