use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProvisionError {
    #[error("Provisioning error, invalid namespace path {0:?}")]
    InvalidPath(String),

    #[error("Provisioning error, max namespace level is {max}, but got namespace {path:?}")]
    DepthExceeded { max: usize, path: String },

    #[error("Provisioning error, failed to create {name}")]
    RemoteCreateFailure {
        name: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Provisioning error, failed to delete {path}")]
    RemoteDeleteFailure {
        path: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Provisioning error, failed to retrieve {path}")]
    RemoteRetrieveFailure {
        path: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Provisioning error, namespace {0} not found")]
    NotFound(String),

    #[error("Provisioning error, {count} namespaces named {path} found")]
    Ambiguous { path: String, count: usize },

    #[error("Provisioning error, invalid configuration: {0}")]
    ConfigError(String),

    #[error("Provisioning error, failed to create {name} and children")]
    Nested {
        name: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Provisioning error, transport failure: {0}")]
    Transport(String),

    #[error("Provisioning error, {operation} timed out")]
    Timeout { operation: String },

    #[error("Provisioning error, unexpected response from the policy store")]
    UnexpectedResponse,
}

impl ProvisionError {
    pub(crate) fn create_failure(name: impl Into<String>, source: ProvisionError) -> Self {
        Self::RemoteCreateFailure { name: name.into(), source: Box::new(source) }
    }

    /// Walks nested recursion context down to the error that stopped the walk.
    pub fn root_cause(&self) -> &ProvisionError {
        match self {
            Self::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_yaml::Error> for ProvisionError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::ConfigError(value.to_string())
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(value: serde_json::Error) -> Self {
        Self::ConfigError(value.to_string())
    }
}
