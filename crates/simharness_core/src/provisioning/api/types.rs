//! Policy store API type definitions.
//!
//! The provisioning core only needs three operations from the remote policy
//! store: create an object in a namespace, delete an object from a namespace,
//! and retrieve the objects of a namespace matching a filter. Requests carry
//! the namespace they are scoped to, as the control-plane resolves every
//! object relative to the namespace of the call.

use serde::{Deserialize, Serialize};

/// Name given to every mapping policy created for simulated agents.
pub const MAPPING_POLICY_NAME: &str = "simulator-mapping";

/// Provenance tag attached to everything this harness creates.
pub const CREATOR_TAG: &str = "creator=simulator-test-harness";

/// Subject tag selecting enforcer identities.
pub const ENFORCER_IDENTITY: &str = "$identity=enforcer";

/// Namespace object as sent to the control-plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceObject {
    /// Simple name of the namespace, relative to the namespace of the request
    pub name: String,
    /// User tags attached to the namespace
    pub associated_tags: Vec<String>,
    /// Tag prefixes objects in the namespace are allowed to carry
    pub tag_prefixes: Vec<String>,
}

/// Namespace mapping policy: agents matching `subject` in the namespace of the
/// policy are moved into `mapped_namespace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPolicyObject {
    pub name: String,
    pub associated_tags: Vec<String>,
    /// Disjunction of conjunctions of tag expressions
    pub subject: Vec<Vec<String>>,
    pub mapped_namespace: String,
}

impl MappingPolicyObject {
    /// Builds the mapping policy binding enforcers tagged `tag` to `mapped_namespace`.
    pub fn for_enforcers(tag: &str, mapped_namespace: &str) -> Self {
        Self {
            name: MAPPING_POLICY_NAME.to_string(),
            associated_tags: vec!["type=enforcer".to_string(), CREATOR_TAG.to_string()],
            subject: vec![vec![ENFORCER_IDENTITY.to_string(), tag.to_string()]],
            mapped_namespace: mapped_namespace.to_string(),
        }
    }
}

/// Object handle returned by the store, enough to delete it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub namespace: String,
}

/// Objects that can be created through the store seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreObject {
    Namespace(NamespaceObject),
    MappingPolicy(MappingPolicyObject),
}

impl StoreObject {
    pub fn name(&self) -> &str {
        match self {
            StoreObject::Namespace(namespace) => &namespace.name,
            StoreObject::MappingPolicy(policy) => &policy.name,
        }
    }
}

/// Retrieval filters understood by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Exact match on the object name, which for namespaces is their full path
    NameEquals(String),
}

impl Filter {
    pub fn matches(&self, object: &RemoteObject) -> bool {
        match self {
            Filter::NameEquals(name) => object.name == *name,
        }
    }
}

/// Store request types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    /// Create `object` in `namespace`.
    CreateInNamespace { namespace: String, object: StoreObject },
    /// Delete a previously retrieved namespace object from `namespace`.
    DeleteInNamespace { namespace: String, object: RemoteObject },
    /// Retrieve the namespace objects of `namespace` matching `filter`.
    RetrieveMany { namespace: String, filter: Filter },
}

impl StoreRequest {
    /// Short operation name, used for timeouts and logs.
    pub fn operation(&self) -> String {
        match self {
            StoreRequest::CreateInNamespace { namespace, object } => {
                format!("create {} in {namespace}", object.name())
            }
            StoreRequest::DeleteInNamespace { namespace, object } => {
                format!("delete {} in {namespace}", object.name)
            }
            StoreRequest::RetrieveMany { namespace, .. } => format!("retrieve in {namespace}"),
        }
    }
}

/// Store response types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResponse {
    Ack,
    Objects(Vec<RemoteObject>),
}
