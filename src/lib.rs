//! A credentials provider that reads expiring AWS credentials from a JSON file
//! kept fresh by an external agent.

pub mod credential_provider;
pub mod credentials;
pub mod expiry;

pub use credential_provider::{
    RefreshableCredentialsProvider, REFRESHABLE_CREDENTIALS_PROVIDER_NAME,
};
pub use credentials::{ErrorKind, Provider, ProviderError, Value};
pub use expiry::Expiry;
