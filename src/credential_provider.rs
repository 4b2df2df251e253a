use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use aws_credential_types::{
    provider::{self, error::CredentialsError, future, ProvideCredentials},
    Credentials,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Deserializer};

use crate::{
    credentials::{Provider, ProviderError, Value},
    expiry::Expiry,
};

/// Name tagged onto every [`Value`] produced by [`RefreshableCredentialsProvider`].
pub const REFRESHABLE_CREDENTIALS_PROVIDER_NAME: &str = "RefreshableCredentialsProvider";

/// Layout of the credentials file kept up to date by an external refresher.
///
/// Absent or `null` fields read as empty. A document without an `Expiration`
/// leaves the provider reporting its credentials as expired.
#[derive(Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RefreshableCredentials {
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(rename = "AccessKeyId", default, deserialize_with = "null_as_default")]
    pub access_key_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub secret_access_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl std::fmt::Debug for RefreshableCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let blank = "********";
        f.debug_struct("RefreshableCredentials")
            .field("expiration", &self.expiration)
            .field("access_key_id", &blank)
            .field("secret_access_key", &blank)
            .field("token", &blank)
            .finish()
    }
}

/// Reads credentials from a JSON file that something else keeps refreshed.
///
/// The file is expected to look like:
///
/// ```json
/// {
///   "Expiration": "2030-01-01T00:00:00Z",
///   "AccessKeyId": "AKIDEXAMPLE",
///   "SecretAccessKey": "secret",
///   "Token": "tok"
/// }
/// ```
///
/// Every retrieval re-reads the file and records its `Expiration` with no
/// early-refresh window. Caching is left to the caller.
#[derive(Debug)]
pub struct RefreshableCredentialsProvider {
    filename: PathBuf,
    expiry: Expiry,
}

impl RefreshableCredentialsProvider {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self::with_expiry(filename, Expiry::new())
    }

    pub fn with_expiry(filename: impl Into<PathBuf>, expiry: Expiry) -> Self {
        Self {
            filename: filename.into(),
            expiry,
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn expiry(&self) -> &Expiry {
        &self.expiry
    }

    fn load_credentials(&self) -> provider::Result {
        let (value, expiration) = self.read_credentials().map_err(|err| {
            let missing = matches!(
                &err,
                ProviderError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
            );
            if missing {
                CredentialsError::not_loaded(err)
            } else {
                CredentialsError::provider_error(err)
            }
        })?;

        let session_token = Some(value.session_token).filter(|token| !token.is_empty());
        Ok(Credentials::new(
            value.access_key_id,
            value.secret_access_key,
            session_token,
            expiration,
            REFRESHABLE_CREDENTIALS_PROVIDER_NAME,
        ))
    }

    /// Reads the file once, returning the record together with the expiration it carried.
    fn read_credentials(&self) -> Result<(Value, Option<SystemTime>), ProviderError> {
        debug!("Reading refreshable credentials from {}", self.filename.display());
        let data = std::fs::read(&self.filename).map_err(|source| ProviderError::Io {
            provider: REFRESHABLE_CREDENTIALS_PROVIDER_NAME,
            path: self.filename.clone(),
            source,
        })?;

        let credentials: RefreshableCredentials =
            serde_json::from_slice(&data).map_err(|source| ProviderError::Parse {
                provider: REFRESHABLE_CREDENTIALS_PROVIDER_NAME,
                path: self.filename.clone(),
                source,
            })?;
        debug!("Parsed {:?}", credentials);

        let expiration = credentials.expiration.map(SystemTime::from);
        match expiration {
            Some(expiration) => self.expiry.set_expiration(expiration, Duration::ZERO),
            None => {
                warn!("{} has no Expiration", self.filename.display());
                self.expiry.clear();
            }
        }

        let value = Value {
            access_key_id: credentials.access_key_id,
            secret_access_key: credentials.secret_access_key,
            session_token: credentials.token,
            provider_name: REFRESHABLE_CREDENTIALS_PROVIDER_NAME.to_string(),
        };
        Ok((value, expiration))
    }
}

impl Provider for RefreshableCredentialsProvider {
    fn retrieve(&self) -> Result<Value, ProviderError> {
        self.read_credentials().map(|(value, _)| value)
    }

    fn is_expired(&self) -> bool {
        self.expiry.is_expired()
    }
}

impl ProvideCredentials for RefreshableCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.load_credentials())
    }
}
