//! Error types for the model plugin registry.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model plugin not found: {0}")]
    PluginNotFound(String),

    /// The plugin answered and rejected the document. This is a clean
    /// negative result, not a fault.
    #[error("configuration is not valid for model '{model}'")]
    InvalidConfig { model: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("plugin RPC failed with status {status}: {message}")]
    Rpc { status: u16, message: String },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// No client certificate is configured and plaintext was not allowed.
    #[error("plugin channel requires TLS; configure a client certificate or set insecure_plaintext")]
    TlsRequired,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    /// True when the plugin rejected the document, as opposed to the call
    /// failing.
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}
