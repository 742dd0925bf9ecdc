use crate::credentials::{CredentialResolver, Credentials, ResolveError};
use crate::error::CoreError;
use crate::registry::Registry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Built-in integration types handled without a plugin descriptor, e.g. a
/// direct database connection. Same shape as pluggable integrations
/// everywhere else in the system.
pub const SYSTEM_TYPES: &[&str] = &["database"];

/// A user-created, persisted connection of one integration type. The
/// credential payload lives in the store and is only reachable through the
/// [`CredentialResolver`] boundary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IntegrationInstance {
    pub id: Uuid,
    pub name: Option<String>,
    pub r#type: String,
}

/// Full stored record: the instance plus its credential payload. Only the
/// store and resolver ever see the payload.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredIntegration {
    pub instance: IntegrationInstance,
    pub credentials: Credentials,
}

/// Partial update; omitted fields are left unchanged.
#[derive(Deserialize, Default, Debug, Clone)]
pub struct IntegrationUpdate {
    pub name: Option<String>,
    pub credentials: Option<Credentials>,
}

pub type StoreError = Box<dyn Error + Send + Sync>;

/// Persistence boundary for integration instances. A `StoreError` means
/// the store itself could not be reached; "not found" is expressed in-band.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<StoredIntegration>, StoreError>;
    async fn put(&self, record: StoredIntegration) -> Result<(), StoreError>;
    async fn remove(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn list(&self) -> Result<Vec<StoredIntegration>, StoreError>;
}

/// Shared monotonic "integrations changed" signal. Consumers caching a
/// type-filtered listing treat any observed change as invalidate-and-reload;
/// the counter carries no payload, only the fact that a change occurred.
#[derive(Clone, Default, Debug)]
pub struct VersionCounter(Arc<AtomicU64>);

impl VersionCounter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// CRUD over integration instances plus the version broadcast. Every
/// mutation bumps the shared counter after the store write succeeds.
pub struct IntegrationLifecycle {
    registry: Arc<Registry>,
    store: Arc<dyn IntegrationStore>,
    version: VersionCounter,
}

impl IntegrationLifecycle {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn IntegrationStore>) -> Self {
        Self { registry, store, version: VersionCounter::new() }
    }

    pub async fn create(
        &self,
        r#type: &str,
        name: Option<String>,
        credentials: Credentials,
    ) -> Result<IntegrationInstance, CoreError> {
        if !self.registry.contains(r#type) && !SYSTEM_TYPES.contains(&r#type) {
            return Err(CoreError::UnknownIntegrationType(r#type.to_owned()));
        }

        let instance = IntegrationInstance {
            id: Uuid::now_v7(),
            name,
            r#type: r#type.to_owned(),
        };
        self.store
            .put(StoredIntegration { instance: instance.clone(), credentials })
            .await
            .map_err(CoreError::StoreUnavailable)?;

        info!(integration.id = %instance.id, integration.kind = r#type, "Created integration");
        self.version.bump();
        Ok(instance)
    }

    /// Updating an id that does not exist is a caller error and fails
    /// loudly rather than upserting.
    pub async fn update(
        &self,
        id: Uuid,
        update: IntegrationUpdate,
    ) -> Result<IntegrationInstance, CoreError> {
        let mut record = self
            .store
            .get(id)
            .await
            .map_err(CoreError::StoreUnavailable)?
            .ok_or(CoreError::IntegrationNotFound(id))?;

        if let Some(name) = update.name {
            record.instance.name = Some(name);
        }
        if let Some(credentials) = update.credentials {
            record.credentials = credentials;
        }

        let instance = record.instance.clone();
        self.store.put(record).await.map_err(CoreError::StoreUnavailable)?;

        info!(integration.id = %id, "Updated integration");
        self.version.bump();
        Ok(instance)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        let removed = self.store.remove(id).await.map_err(CoreError::StoreUnavailable)?;
        if !removed {
            return Err(CoreError::IntegrationNotFound(id));
        }

        info!(integration.id = %id, "Deleted integration");
        self.version.bump();
        Ok(())
    }

    /// Instances of one type, ordered by id, so repeated listings are equal
    /// as long as no mutation happens in between.
    pub async fn list_by_type(&self, r#type: &str) -> Result<Vec<IntegrationInstance>, CoreError> {
        let mut instances: Vec<_> = self
            .store
            .list()
            .await
            .map_err(CoreError::StoreUnavailable)?
            .into_iter()
            .map(|record| record.instance)
            .filter(|instance| instance.r#type == r#type)
            .collect();
        instances.sort_by_key(|instance| instance.id);
        Ok(instances)
    }

    pub fn version(&self) -> u64 {
        self.version.current()
    }

    /// Cloneable handle for consumers that poll for invalidation.
    pub fn version_counter(&self) -> VersionCounter {
        self.version.clone()
    }
}

/// In-memory store for tests and single-process embeddings. Also serves as
/// the credential resolver over its own records.
#[derive(Default)]
pub struct MemoryIntegrationStore {
    records: RwLock<HashMap<Uuid, StoredIntegration>>,
}

impl MemoryIntegrationStore {
    pub fn new() -> Self {
        Default::default()
    }
}

#[async_trait]
impl IntegrationStore for MemoryIntegrationStore {
    async fn get(&self, id: Uuid) -> Result<Option<StoredIntegration>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn put(&self, record: StoredIntegration) -> Result<(), StoreError> {
        self.records.write().await.insert(record.instance.id, record);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<StoredIntegration>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl CredentialResolver for MemoryIntegrationStore {
    async fn resolve(&self, integration_id: Uuid) -> Result<Credentials, ResolveError> {
        self.records
            .read()
            .await
            .get(&integration_id)
            .map(|record| record.credentials.clone())
            .ok_or(ResolveError::NotFound(integration_id))
    }
}
