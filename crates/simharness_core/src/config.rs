//! Backend access configuration.
//!
//! A backend is described by a YAML document:
//!
//! ```yaml
//! api:
//!   url: "https://api.example.test"
//!   # at least one of the two below, token takes precedence
//!   token: "..."
//!   appcred: "path/to/appcred.json"
//!   insecure: true
//! ```
//!
//! or derived from an application credential file alone, a JSON document
//! carrying the API url (`APIURL`) and the token to use.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{provisioning::error::ProvisionError, transport::http::StoreHttp};

/// Environment variable overriding the token of any configuration.
pub const TOKEN_ENV_VAR: &str = "SIMHARNESS_TOKEN";

fn default_insecure() -> bool {
    true
}

/// Access details of a policy control-plane API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDetails {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appcred: Option<String>,
    /// Skip verification of the API certificate
    #[serde(default = "default_insecure")]
    pub insecure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDetails {
    pub api: ApiDetails,
}

/// Application credential document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppCredential {
    #[serde(rename = "APIURL")]
    pub api_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl AppCredential {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let path = path.as_ref();
        let data = read(path)?;
        serde_json::from_str(&data).map_err(|err| {
            ProvisionError::ConfigError(format!("parse credentials {}: {err}", path.display()))
        })
    }
}

fn read(path: &Path) -> Result<String, ProvisionError> {
    std::fs::read_to_string(path)
        .map_err(|err| ProvisionError::ConfigError(format!("read {}: {err}", path.display())))
}

impl BackendDetails {
    /// Parses backend details from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        Ok(serde_yaml::from_str(&read(path.as_ref())?)?)
    }

    /// Builds backend details holding only the API url and credential path
    /// read from an application credential file.
    pub fn from_appcred(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let path = path.as_ref();
        let credential = AppCredential::from_file(path)?;
        Ok(Self {
            api: ApiDetails {
                url: credential.api_url,
                token: None,
                appcred: Some(path.display().to_string()),
                insecure: default_insecure(),
            },
        })
    }

    /// Token to authenticate with, looked up in the environment, then in the
    /// details, then in the application credential.
    pub fn resolve_token(&self) -> Result<String, ProvisionError> {
        self.resolve_token_with(std::env::var(TOKEN_ENV_VAR).ok())
    }

    fn resolve_token_with(&self, env_token: Option<String>) -> Result<String, ProvisionError> {
        if let Some(token) = env_token.filter(|token| !token.is_empty()) {
            return Ok(token);
        }
        if let Some(token) = self.api.token.as_ref().filter(|token| !token.is_empty()) {
            return Ok(token.clone());
        }
        match &self.api.appcred {
            Some(appcred) => AppCredential::from_file(appcred)?.token.ok_or_else(|| {
                ProvisionError::ConfigError(format!("no token in credentials {appcred}"))
            }),
            None => Err(ProvisionError::ConfigError(
                "either a token or an application credential must be provided".to_string(),
            )),
        }
    }

    /// Opens an HTTP transport to the configured API.
    pub fn connect(&self) -> Result<StoreHttp, ProvisionError> {
        StoreHttp::new(&self.api.url, self.resolve_token()?, self.api.insecure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_config_backend_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.yaml");
        std::fs::write(&path, "api:\n  url: https://api.example.test\n  token: abc\n").unwrap();

        let details = BackendDetails::from_file(&path).unwrap();
        assert_eq!(details.api.url, "https://api.example.test");
        assert!(details.api.insecure);
        assert_eq!(details.resolve_token_with(None).unwrap(), "abc");
        assert_eq!(details.resolve_token_with(Some("env".to_string())).unwrap(), "env");
    }

    #[test]
    fn unit_config_backend_from_appcred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appcred.json");
        std::fs::write(&path, r#"{"APIURL": "https://api.example.test", "token": "xyz"}"#)
            .unwrap();

        let details = BackendDetails::from_appcred(&path).unwrap();
        assert_eq!(details.api.url, "https://api.example.test");
        assert_eq!(details.api.appcred.as_deref(), Some(path.display().to_string().as_str()));
        assert_eq!(details.resolve_token_with(None).unwrap(), "xyz");
    }

    #[test]
    fn unit_config_missing_credentials() {
        let details = BackendDetails {
            api: ApiDetails {
                url: "https://api.example.test".to_string(),
                token: None,
                appcred: None,
                insecure: false,
            },
        };
        assert!(matches!(details.resolve_token_with(None), Err(ProvisionError::ConfigError(_))));
        assert!(matches!(
            BackendDetails::from_appcred("/nonexistent/appcred.json"),
            Err(ProvisionError::ConfigError(_))
        ));
    }
}
