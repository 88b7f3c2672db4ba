//! Configuration store.

use crate::error::StoreResult;
use crate::event::{StoreEvent, WatchOptions};
use crate::table::{Versioned, VersionedTable};
use async_trait::async_trait;
use cfgplane_types::{Configuration, Revision, TargetId};
use tokio::sync::mpsc;

/// Versioned store of per-target configurations, keyed by target id.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn get(&self, target_id: &TargetId) -> StoreResult<Configuration>;

    async fn list(&self) -> StoreResult<Vec<Configuration>>;

    async fn create(&self, configuration: Configuration) -> StoreResult<Configuration>;

    /// Writes `configuration` if its revision matches the stored one.
    async fn update(&self, configuration: Configuration) -> StoreResult<Configuration>;

    async fn delete(&self, target_id: &TargetId) -> StoreResult<Configuration>;

    async fn watch(
        &self,
        tx: mpsc::Sender<StoreEvent<Configuration>>,
        options: WatchOptions,
    ) -> StoreResult<()>;
}

impl Versioned for Configuration {
    type Key = TargetId;

    fn key(&self) -> &TargetId {
        &self.id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

/// In-memory [`ConfigurationStore`].
pub struct MemoryConfigurationStore {
    table: VersionedTable<Configuration>,
}

impl MemoryConfigurationStore {
    pub fn new() -> Self {
        Self {
            table: VersionedTable::new("configuration"),
        }
    }
}

impl Default for MemoryConfigurationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigurationStore for MemoryConfigurationStore {
    async fn get(&self, target_id: &TargetId) -> StoreResult<Configuration> {
        self.table.get(target_id).await
    }

    async fn list(&self) -> StoreResult<Vec<Configuration>> {
        Ok(self.table.list().await)
    }

    async fn create(&self, configuration: Configuration) -> StoreResult<Configuration> {
        self.table.create(configuration).await
    }

    async fn update(&self, configuration: Configuration) -> StoreResult<Configuration> {
        self.table.update(configuration).await
    }

    async fn delete(&self, target_id: &TargetId) -> StoreResult<Configuration> {
        self.table.delete(target_id).await
    }

    async fn watch(
        &self,
        tx: mpsc::Sender<StoreEvent<Configuration>>,
        options: WatchOptions,
    ) -> StoreResult<()> {
        self.table.watch(tx, options).await
    }
}
