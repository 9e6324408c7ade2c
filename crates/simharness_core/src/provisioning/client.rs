//! Typed client over a policy store service.
//!
//! `StoreClient` turns the request/response store seam into the three calls
//! the provisioning core needs, and bounds each of them with the optional
//! timeout configured by the caller. Without a timeout a call waits for as
//! long as the store takes to answer.

use std::time::Duration;

use tower::{Service, ServiceExt};
use tracing::debug;

use crate::provisioning::{
    api::{Filter, RemoteObject, StoreObject, StoreRequest, StoreResponse},
    error::ProvisionError,
};

/// Client for a policy store reachable through `S`.
#[derive(Debug, Clone)]
pub struct StoreClient<S> {
    store: S,
    timeout: Option<Duration>,
}

impl<S> StoreClient<S> {
    pub fn new(store: S) -> Self {
        Self { store, timeout: None }
    }

    /// Bounds every store call by `timeout`. A zero duration disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

impl<S> StoreClient<S>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvisionError> + Clone,
{
    async fn call(&self, request: StoreRequest) -> Result<StoreResponse, ProvisionError> {
        let operation = request.operation();
        debug!(%operation, "store call");
        let call = self.store.clone().oneshot(request);
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| ProvisionError::Timeout { operation })?,
            None => call.await,
        }
    }

    /// Creates `object` in namespace `namespace`.
    pub async fn create_in_namespace(
        &self,
        namespace: &str,
        object: StoreObject,
    ) -> Result<(), ProvisionError> {
        match self
            .call(StoreRequest::CreateInNamespace { namespace: namespace.to_string(), object })
            .await?
        {
            StoreResponse::Ack => Ok(()),
            _ => Err(ProvisionError::UnexpectedResponse),
        }
    }

    /// Deletes `object` from namespace `namespace`.
    pub async fn delete_in_namespace(
        &self,
        namespace: &str,
        object: RemoteObject,
    ) -> Result<(), ProvisionError> {
        match self
            .call(StoreRequest::DeleteInNamespace { namespace: namespace.to_string(), object })
            .await?
        {
            StoreResponse::Ack => Ok(()),
            _ => Err(ProvisionError::UnexpectedResponse),
        }
    }

    /// Retrieves the namespace objects of `namespace` matching `filter`.
    pub async fn retrieve_many(
        &self,
        namespace: &str,
        filter: Filter,
    ) -> Result<Vec<RemoteObject>, ProvisionError> {
        match self
            .call(StoreRequest::RetrieveMany { namespace: namespace.to_string(), filter })
            .await?
        {
            StoreResponse::Objects(objects) => Ok(objects),
            _ => Err(ProvisionError::UnexpectedResponse),
        }
    }
}
