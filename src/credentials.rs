//! Credential record, provider contract and provider errors.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Credentials as handed out by a [`Provider`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Name of the provider that produced these credentials.
    pub provider_name: String,
}

impl Value {
    /// A record carrying only `provider_name`, with every credential field empty.
    pub fn for_provider(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            ..Self::default()
        }
    }

    /// Whether both the access key id and the secret access key are set.
    pub fn has_keys(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blank = "********";
        f.debug_struct("Value")
            .field("access_key_id", &blank)
            .field("secret_access_key", &blank)
            .field("session_token", &blank)
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

/// A source of credentials that can be consulted as one link of a chain.
pub trait Provider: Send + Sync {
    /// Fetches a fresh credential record from the underlying source.
    fn retrieve(&self) -> Result<Value, ProviderError>;

    /// Whether the credentials last returned by [`Provider::retrieve`] have expired.
    fn is_expired(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "IOError",
            ErrorKind::Parse => "ParseError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    /// The credentials source could not be read.
    #[error("{provider}: failed to read credentials from {}", path.display())]
    Io {
        provider: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credentials source did not hold a valid credentials document.
    #[error("{provider}: failed to parse credentials from {}", path.display())]
    Parse {
        provider: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Io { .. } => ErrorKind::Io,
            ProviderError::Parse { .. } => ErrorKind::Parse,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            ProviderError::Io { provider, .. } | ProviderError::Parse { provider, .. } => provider,
        }
    }

    /// The record that accompanies a failed retrieval: provider name only.
    pub fn value(&self) -> Value {
        Value::for_provider(self.provider_name())
    }
}
