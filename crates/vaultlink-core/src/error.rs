use crate::types::Provider;

/// Failure talking to a custodian's API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Network-level failure (DNS, TLS, connection reset, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status other than 404.
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The requested remote resource does not exist.
    #[error("remote resource not found: {0}")]
    NotFound(String),

    /// The response body did not match the expected shape.
    #[error("decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Not-found is the only classified failure; the batch fetcher turns it
    /// into a skip instead of aborting the adapter call.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    #[error("invalid connection {connection_id}: {reason}")]
    ConnectionInvalid {
        connection_id: String,
        reason: String,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("network {network_id} is not supported by {provider}")]
    NetworkUnsupported {
        network_id: String,
        provider: Provider,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("no reconciliation adapter registered for {0}")]
    UnsupportedProvider(Provider),

    #[error("invalid sync run transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable name, persisted in a failed run's error
    /// descriptor.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionInvalid { .. } => "ConnectionInvalid",
            Self::Provider(ProviderError::NotFound(_)) => "ProviderNotFound",
            Self::Provider(_) => "ProviderError",
            Self::NotFound { .. } => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::NetworkUnsupported { .. } => "NetworkUnsupported",
            Self::Persistence(_) => "PersistenceError",
            Self::UnsupportedProvider(_) => "UnsupportedProvider",
            Self::InvalidTransition { .. } => "InvalidTransition",
        }
    }
}
