//! # Loopback Policy Store
//!
//! In-process policy store used by tests and dry runs. It keeps namespaces and
//! mapping policies in memory, enforces the few rules of the real control-plane
//! that matter to provisioning (objects can only be created in an existing
//! namespace, mapping policies must map into an existing namespace, sibling
//! namespaces have unique names), and records every request it receives so
//! callers can check what was attempted and in which order.
//!
//! ## Failure Injection
//!
//! [`StoreLoopback::fail_on`] makes any create request whose object is named
//! after the given key (a namespace name, or a tag in a mapping policy subject)
//! fail with a transport error. [`StoreLoopback::new`] adds a fixed delay to
//! every call to exercise client timeouts.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    task::Poll,
    time::Duration,
};

use dashmap::DashMap;
use tower::Service;

use crate::provisioning::{
    api::{
        MappingPolicyObject, NamespaceObject, RemoteObject, StoreObject, StoreRequest,
        StoreResponse,
    },
    error::ProvisionError,
    naming,
};

/// In-memory policy store service.
#[derive(Clone, Default)]
pub struct StoreLoopback {
    /// Namespace objects indexed by the namespace they were created in.
    namespaces: Arc<DashMap<String, Vec<RemoteObject>>>,
    /// Every object successfully created, in creation order.
    created: Arc<Mutex<Vec<(String, StoreObject)>>>,
    /// Every request received, including failed ones.
    journal: Arc<Mutex<Vec<StoreRequest>>>,
    /// Object names and subject tags whose creation must fail.
    failures: Arc<DashMap<String, ()>>,
    next_id: Arc<AtomicU64>,
    delay: Duration,
}

impl StoreLoopback {
    /// Creates a loopback store answering every call after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }

    /// Makes the creation of objects matching `key` fail.
    pub fn fail_on(&self, key: impl Into<String>) {
        self.failures.insert(key.into(), ());
    }

    /// Stores a namespace object as is, bypassing sibling uniqueness. Used to
    /// reproduce inconsistent remote state.
    pub fn insert_raw(&self, namespace: &str, object: RemoteObject) {
        self.namespaces.entry(namespace.to_string()).or_default().push(object);
    }

    /// Requests received so far.
    pub fn journal(&self) -> Vec<StoreRequest> {
        self.journal.lock().map(|journal| journal.clone()).unwrap_or_default()
    }

    /// Namespaces created so far, with the namespace they were created in.
    pub fn created_namespaces(&self) -> Vec<(String, NamespaceObject)> {
        self.created()
            .into_iter()
            .filter_map(|(namespace, object)| match object {
                StoreObject::Namespace(object) => Some((namespace, object)),
                StoreObject::MappingPolicy(_) => None,
            })
            .collect()
    }

    /// Mapping policies created so far, with the namespace they were created in.
    pub fn mapping_policies(&self) -> Vec<(String, MappingPolicyObject)> {
        self.created()
            .into_iter()
            .filter_map(|(namespace, object)| match object {
                StoreObject::MappingPolicy(policy) => Some((namespace, policy)),
                StoreObject::Namespace(_) => None,
            })
            .collect()
    }

    /// Number of namespaces currently stored.
    pub fn namespace_count(&self) -> usize {
        self.namespaces.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn contains_namespace(&self, path: &str) -> bool {
        path == naming::ROOT
            || self
                .namespaces
                .get(&naming::parent(path))
                .is_some_and(|siblings| siblings.iter().any(|object| object.name == path))
    }

    fn created(&self) -> Vec<(String, StoreObject)> {
        self.created.lock().map(|created| created.clone()).unwrap_or_default()
    }

    fn should_fail(&self, object: &StoreObject) -> bool {
        match object {
            StoreObject::Namespace(namespace) => self.failures.contains_key(&namespace.name),
            StoreObject::MappingPolicy(policy) => policy
                .subject
                .iter()
                .flatten()
                .any(|tag| self.failures.contains_key(tag)),
        }
    }

    fn create(&self, namespace: String, object: StoreObject) -> Result<(), ProvisionError> {
        if !self.contains_namespace(&namespace) {
            return Err(ProvisionError::Transport(format!("namespace {namespace} not found")));
        }
        if let StoreObject::MappingPolicy(policy) = &object {
            if !self.contains_namespace(&policy.mapped_namespace) {
                return Err(ProvisionError::Transport(format!(
                    "mapped namespace {} not found",
                    policy.mapped_namespace
                )));
            }
        }
        if self.should_fail(&object) {
            return Err(ProvisionError::Transport(format!(
                "injected failure creating {} in {namespace}",
                object.name()
            )));
        }

        if let StoreObject::Namespace(ref created) = object {
            let path = naming::join(&namespace, &created.name);
            let mut siblings = self.namespaces.entry(namespace.clone()).or_default();
            if siblings.iter().any(|sibling| sibling.name == path) {
                return Err(ProvisionError::Transport(format!("namespace {path} already exists")));
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            siblings.push(RemoteObject {
                id: format!("{id:024x}"),
                name: path,
                namespace: namespace.clone(),
            });
        }

        if let Ok(mut created) = self.created.lock() {
            created.push((namespace, object));
        }
        Ok(())
    }

    fn delete(&self, namespace: String, object: RemoteObject) -> Result<(), ProvisionError> {
        let removed = self
            .namespaces
            .get_mut(&namespace)
            .map(|mut siblings| {
                let before = siblings.len();
                siblings.retain(|sibling| sibling.id != object.id);
                before != siblings.len()
            })
            .unwrap_or(false);
        if !removed {
            return Err(ProvisionError::Transport(format!(
                "object {} not found in {namespace}",
                object.id
            )));
        }
        // the subtree goes away with its root
        let prefix = format!("{}/", object.name);
        self.namespaces.retain(|parent, _| *parent != object.name && !parent.starts_with(&prefix));
        Ok(())
    }

    fn handle(&self, request: StoreRequest) -> Result<StoreResponse, ProvisionError> {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(request.clone());
        }
        match request {
            StoreRequest::CreateInNamespace { namespace, object } => {
                self.create(namespace, object).map(|_| StoreResponse::Ack)
            }
            StoreRequest::DeleteInNamespace { namespace, object } => {
                self.delete(namespace, object).map(|_| StoreResponse::Ack)
            }
            StoreRequest::RetrieveMany { namespace, filter } => Ok(StoreResponse::Objects(
                self.namespaces
                    .get(&namespace)
                    .map(|siblings| {
                        siblings.iter().filter(|object| filter.matches(object)).cloned().collect()
                    })
                    .unwrap_or_default(),
            )),
        }
    }
}

impl Service<StoreRequest> for StoreLoopback {
    type Response = StoreResponse;
    type Error = ProvisionError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: StoreRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            if !this.delay.is_zero() {
                tokio::time::sleep(this.delay).await;
            }
            this.handle(request)
        })
    }
}
