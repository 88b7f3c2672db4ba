//! Shared fixtures for controller tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cfgplane_controller::transaction::TransactionReconciler;
use cfgplane_registry::{
    ModelInfo, ModelPlugin, PluginClient, PluginRegistry, RegistryError, RegistryResult,
    ClientConfig,
};
use cfgplane_store::{
    ConfigurationStore, MemoryConfigurationStore, MemoryTransactionStore, TransactionStore,
};
use cfgplane_types::{
    Change, Configuration, PathValue, Transaction, TransactionId, TransactionState, TypedValue,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEVICE_TYPE: &str = "devicesim";
pub const DEVICE_VERSION: &str = "1.0.0";

/// In-process stand-in for a model plugin.
pub struct FakePluginClient {
    info: ModelInfo,
    valid: bool,
    error_status: Option<u16>,
    delay: Option<Duration>,
    validations: AtomicUsize,
    documents: Mutex<Vec<Value>>,
}

impl FakePluginClient {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            info: ModelInfo {
                name: name.to_string(),
                version: version.to_string(),
                model_data: vec![],
                supported_encodings: vec![],
                read_only_path: vec![],
                read_write_path: vec![],
            },
            valid: true,
            error_status: None,
            delay: None,
            validations: AtomicUsize::new(0),
            documents: Mutex::new(Vec::new()),
        }
    }

    /// Answers every validation with `valid: false`.
    pub fn rejecting(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Fails every validation with an RPC error.
    pub fn failing(mut self, status: u16) -> Self {
        self.error_status = Some(status);
        self
    }

    /// Delays every validation.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<Value> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl PluginClient for FakePluginClient {
    async fn get_model_info(&self) -> RegistryResult<ModelInfo> {
        Ok(self.info.clone())
    }

    async fn validate_config(&self, document: &Value) -> RegistryResult<bool> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().unwrap().push(document.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.error_status {
            return Err(RegistryError::Rpc {
                status,
                message: "plugin unavailable".to_string(),
            });
        }
        Ok(self.valid)
    }

    async fn get_path_values(
        &self,
        _path_prefix: &str,
        _document: &Value,
    ) -> RegistryResult<Vec<PathValue>> {
        Ok(vec![])
    }
}

/// Stores and registry wired together the way the daemon does it.
pub struct Harness {
    pub transactions: Arc<MemoryTransactionStore>,
    pub configurations: Arc<MemoryConfigurationStore>,
    pub registry: Arc<PluginRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(MemoryTransactionStore::new()),
            configurations: Arc::new(MemoryConfigurationStore::new()),
            registry: Arc::new(PluginRegistry::new(vec![], ClientConfig::default())),
        }
    }

    /// Harness with a valid plugin for the default device model.
    pub async fn with_device_plugin() -> (Self, Arc<FakePluginClient>) {
        let harness = Self::new();
        let client = harness
            .plugin(FakePluginClient::new(DEVICE_TYPE, DEVICE_VERSION))
            .await;
        (harness, client)
    }

    pub async fn plugin(&self, client: FakePluginClient) -> Arc<FakePluginClient> {
        let client = Arc::new(client);
        let info = client.get_model_info().await.unwrap();
        self.registry
            .register(ModelPlugin::new(0, info, client.clone()))
            .await;
        client
    }

    pub fn reconciler(&self) -> TransactionReconciler {
        TransactionReconciler::new(
            self.transactions.clone(),
            self.configurations.clone(),
            self.registry.clone(),
        )
    }

    pub async fn target(&self, target: &str) -> Configuration {
        self.configurations
            .create(Configuration::new(target, DEVICE_TYPE, DEVICE_VERSION))
            .await
            .unwrap()
    }

    pub async fn submit(&self, transaction: Transaction) -> Transaction {
        self.transactions.create(transaction).await.unwrap()
    }

    pub async fn transaction(&self, id: &str) -> Transaction {
        self.transactions.get(&TransactionId::new(id)).await.unwrap()
    }

    pub async fn state(&self, id: &str) -> TransactionState {
        self.transaction(id).await.state()
    }

    /// Forces a transaction into `state`, bypassing the reconciler.
    pub async fn set_state(&self, id: &str, state: TransactionState) -> Transaction {
        let mut transaction = self.transaction(id).await;
        transaction.status.state = state;
        self.transactions.update(transaction).await.unwrap()
    }
}

/// A change setting string leaves on a target of the default device model.
pub fn change(target: &str, values: &[(&str, &str)]) -> Change {
    values.iter().fold(
        Change::new(target, DEVICE_TYPE, DEVICE_VERSION),
        |change, (path, value)| {
            change.with_value(PathValue::new(*path, TypedValue::String(value.to_string())))
        },
    )
}

/// Waits until `check` holds, polling the stores.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
