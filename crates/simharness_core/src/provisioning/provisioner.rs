//! Namespace hierarchy provisioning.
//!
//! The provisioner realizes a [`NamespaceTree`] in the remote policy store
//! with a pre-order, depth-first walk: a namespace is created before any of its
//! children, and children are created in the order of the tree. The walk stops
//! at the first failure. Namespaces created before the failure are left in
//! place, nothing is rolled back.

use std::{future::Future, pin::Pin};

use tower::Service;
use tracing::{debug, info};

use crate::provisioning::{
    api::{Filter, NamespaceObject, StoreObject, StoreRequest, StoreResponse},
    client::StoreClient,
    error::ProvisionError,
    naming::{self, MAX_DEPTH},
    tree::{NamespaceNode, NamespaceTree},
};

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>>;

/// Creates and deletes namespaces through a policy store client.
#[derive(Debug, Clone)]
pub struct NamespaceProvisioner<S> {
    client: StoreClient<S>,
}

impl<S> NamespaceProvisioner<S> {
    pub fn new(client: StoreClient<S>) -> Self {
        Self { client }
    }
}

impl<S> NamespaceProvisioner<S>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvisionError>
        + Clone
        + Send
        + Sync,
    S::Future: Send,
{
    /// Creates the hierarchy described by `tree` under `base_path`.
    ///
    /// Providing no tree is a no-op. Before a namespace is created its name
    /// must be a single path segment and its path must fit in [`MAX_DEPTH`].
    /// A failure on any child is wrapped with the name of that child at each
    /// level of the walk.
    pub async fn provision(
        &self,
        base_path: &str,
        tree: Option<&NamespaceTree>,
    ) -> Result<(), ProvisionError> {
        let Some(tree) = tree else {
            debug!(base_path, "no namespace tree to provision");
            return Ok(());
        };
        self.provision_node(base_path.to_string(), &tree.root, &tree.tag_prefixes).await
    }

    fn provision_node<'a>(
        &'a self,
        base_path: String,
        node: &'a NamespaceNode,
        tag_prefixes: &'a [String],
    ) -> WalkFuture<'a> {
        Box::pin(async move {
            naming::validate_segment(&node.name)?;
            let new_path = naming::join(&base_path, &node.name);
            let depth = naming::depth(&new_path)?;
            if depth > MAX_DEPTH {
                return Err(ProvisionError::DepthExceeded { max: MAX_DEPTH, path: new_path });
            }

            let object = NamespaceObject {
                name: node.name.clone(),
                associated_tags: node.tags.clone(),
                tag_prefixes: tag_prefixes.to_vec(),
            };
            self.client
                .create_in_namespace(&base_path, StoreObject::Namespace(object))
                .await
                .map_err(|err| ProvisionError::create_failure(&node.name, err))?;
            info!(namespace = %new_path, depth, "namespace created");

            for child in &node.children {
                self.provision_node(new_path.clone(), child, tag_prefixes).await.map_err(
                    |err| ProvisionError::Nested { name: child.name.clone(), source: Box::new(err) },
                )?;
            }
            Ok(())
        })
    }

    /// Creates `namespace` and `num_namespaces` capacity namespaces right under
    /// it, named after the last segment of `namespace`.
    pub async fn provision_flat(
        &self,
        namespace: &str,
        num_namespaces: usize,
    ) -> Result<(), ProvisionError> {
        info!(namespace, num_namespaces, "generating capacity namespaces");
        let tree = NamespaceTree::flat(&naming::base_name(namespace), num_namespaces);
        debug!(?tree, "flat namespace hierarchy");
        self.provision(&naming::parent(namespace), Some(&tree)).await?;
        info!(namespace, num_namespaces, "capacity namespaces generated");
        Ok(())
    }

    /// Deletes namespace `path`, which must match exactly one namespace of its
    /// parent. Children go away with it on the store side.
    pub async fn delete(&self, path: &str) -> Result<(), ProvisionError> {
        naming::depth(path)?;
        let parent = naming::parent(path);
        let mut matches = self
            .client
            .retrieve_many(&parent, Filter::NameEquals(path.to_string()))
            .await
            .map_err(|err| ProvisionError::RemoteRetrieveFailure {
                path: path.to_string(),
                source: Box::new(err),
            })?;

        let object = match matches.len() {
            0 => return Err(ProvisionError::NotFound(path.to_string())),
            1 => matches.remove(0),
            count => return Err(ProvisionError::Ambiguous { path: path.to_string(), count }),
        };

        self.client.delete_in_namespace(&parent, object).await.map_err(|err| {
            ProvisionError::RemoteDeleteFailure { path: path.to_string(), source: Box::new(err) }
        })?;
        info!(namespace = path, "namespace deleted");
        Ok(())
    }
}
