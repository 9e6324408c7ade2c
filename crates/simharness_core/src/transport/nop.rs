use std::{pin::Pin, task::Poll};

use tower::Service;

use crate::provisioning::{
    api::{StoreRequest, StoreResponse},
    error::ProvisionError,
};

/// Store that acknowledges every write and never finds anything.
#[derive(Debug, Clone, Default)]
pub struct StoreNop;

impl Service<StoreRequest> for StoreNop {
    type Response = StoreResponse;
    type Error = ProvisionError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: StoreRequest) -> Self::Future {
        Box::pin(async move {
            Ok(match request {
                StoreRequest::CreateInNamespace { .. } | StoreRequest::DeleteInNamespace { .. } => {
                    StoreResponse::Ack
                }
                StoreRequest::RetrieveMany { .. } => StoreResponse::Objects(Vec::new()),
            })
        })
    }
}
