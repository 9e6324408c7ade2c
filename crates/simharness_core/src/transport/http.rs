//! HTTP transport to a policy control-plane API.
//!
//! Objects are sent as JSON. The namespace a request is scoped to travels in
//! the [`NAMESPACE_HEADER`] header and the caller authenticates with a bearer
//! token.

use std::{pin::Pin, task::Poll, time::Duration};

use reqwest::{Method, RequestBuilder, Response};
use tower::Service;
use tracing::debug;

use crate::provisioning::{
    api::{Filter, RemoteObject, StoreObject, StoreRequest, StoreResponse},
    error::ProvisionError,
};

/// Header carrying the namespace of a request.
pub const NAMESPACE_HEADER: &str = "X-Namespace";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Policy store reached over HTTP.
#[derive(Debug, Clone)]
pub struct StoreHttp {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl StoreHttp {
    /// Creates a transport to the API at `api_url`, authenticating with `token`.
    ///
    /// `insecure` skips verification of the API certificate, which test
    /// control-planes commonly serve self-signed.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        insecure: bool,
    ) -> Result<Self, ProvisionError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(ProvisionError::ConfigError("API url must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .build()?;
        Ok(Self { client, api_url, token: token.into() })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, resource: &str, namespace: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{resource}", self.api_url))
            .bearer_auth(&self.token)
            .header(NAMESPACE_HEADER, namespace)
    }

    async fn check(response: Response) -> Result<Response, ProvisionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProvisionError::Transport(format!("{status}: {body}")))
    }

    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, ProvisionError> {
        match request {
            StoreRequest::CreateInNamespace { namespace, object } => {
                let builder = match &object {
                    StoreObject::Namespace(body) => {
                        self.request(Method::POST, "namespaces", &namespace).json(body)
                    }
                    StoreObject::MappingPolicy(body) => {
                        self.request(Method::POST, "namespacemappingpolicies", &namespace).json(body)
                    }
                };
                Self::check(builder.send().await?).await?;
                Ok(StoreResponse::Ack)
            }
            StoreRequest::DeleteInNamespace { namespace, object } => {
                let resource = format!("namespaces/{}", object.id);
                Self::check(self.request(Method::DELETE, &resource, &namespace).send().await?)
                    .await?;
                Ok(StoreResponse::Ack)
            }
            StoreRequest::RetrieveMany { namespace, filter } => {
                let Filter::NameEquals(name) = filter;
                let query = format!("name == {name:?}");
                let response = self
                    .request(Method::GET, "namespaces", &namespace)
                    .query(&[("q", query.as_str())])
                    .send()
                    .await?;
                let objects: Vec<RemoteObject> = Self::check(response).await?.json().await?;
                Ok(StoreResponse::Objects(objects))
            }
        }
    }
}

impl Service<StoreRequest> for StoreHttp {
    type Response = StoreResponse;
    type Error = ProvisionError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: StoreRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            debug!(api_url = %this.api_url, operation = %request.operation(), "http store call");
            this.send(request).await
        })
    }
}
