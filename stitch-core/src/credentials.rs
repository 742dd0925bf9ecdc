use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Decrypted credential values for one integration instance, keyed by the
/// `config_key` declared in the owning plugin's form fields.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug)]
pub enum ResolveError {
    /// The id does not correspond to a stored integration instance.
    NotFound(Uuid),
    /// The backing store could not be reached; distinct from NotFound so the
    /// engine can decide whether to retry.
    Unavailable(Box<dyn Error + Send + Sync>),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotFound(id) => write!(f, "integration not found: {id}"),
            ResolveError::Unavailable(source) => {
                write!(f, "credential store unavailable: {source}")
            }
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ResolveError::Unavailable(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Maps an integration instance id to its decrypted credential values.
/// Persistence and encryption live behind this boundary; the core only ever
/// sees ready-to-use values.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, integration_id: Uuid) -> Result<Credentials, ResolveError>;
}
