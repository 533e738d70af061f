//! Provider connections and their pre-flight validation.
//!
//! A [`Connection`] is what the store holds; a [`ValidConnection`] is what
//! adapters receive. Converting one into the other is the only place a
//! *connection-invalid* error is raised, so it always happens before any
//! remote call.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Active,
    Revoked,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCredentials {
    pub api_key: String,
    /// Signing key material, required by providers that sign requests.
    #[serde(default)]
    pub private_key: Option<String>,
}

impl std::fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCredentials")
            .field("api_key", &"<redacted>")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub client_id: String,
    pub provider: Provider,
    pub status: ConnectionStatus,
    pub url: Option<String>,
    pub credentials: Option<ConnectionCredentials>,
}

/// A connection whose URL parsed and whose credentials are present.
#[derive(Debug, Clone)]
pub struct ValidConnection {
    pub id: String,
    pub client_id: String,
    pub provider: Provider,
    pub url: Url,
    pub credentials: ConnectionCredentials,
}

impl Connection {
    pub fn validate(&self) -> Result<ValidConnection, CoreError> {
        let invalid = |reason: &str| CoreError::ConnectionInvalid {
            connection_id: self.id.clone(),
            reason: reason.to_owned(),
        };

        if self.status != ConnectionStatus::Active {
            return Err(invalid("connection is not active"));
        }

        let raw_url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| invalid("missing url"))?;
        let url = Url::parse(raw_url).map_err(|e| invalid(&format!("malformed url: {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(&format!("unsupported url scheme `{other}`"))),
        }

        let credentials = self
            .credentials
            .clone()
            .ok_or_else(|| invalid("missing credentials"))?;
        if credentials.api_key.trim().is_empty() {
            return Err(invalid("missing api key"));
        }

        Ok(ValidConnection {
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            provider: self.provider,
            url,
            credentials,
        })
    }
}
